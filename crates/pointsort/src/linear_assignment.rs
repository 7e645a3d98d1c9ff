use crate::*;
use fixedbitset::FixedBitSet;
use ndarray::*;
use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

/// Costs are multiplied by this constant and rounded to i64 before solving (f32 does not implement `std::cmp::Ord`).
pub const COST_SCALE: f64 = 10_000.0;

/// Solves the classical assignment problem.
pub trait AssignmentSolver: Send + Sync {
    /// Returns `(row, column)` pairs of a one-to-one assignment with globally minimal total cost.
    ///
    /// Every row is assigned when the matrix has no more rows than columns, otherwise every column is.
    fn solve(&self, cost_matrix: ArrayView2<f32>) -> Result<Vec<(usize, usize)>>;
}

/// Kuhn-Munkres (aka hungarian) solver with a deterministic tie-break.
///
/// Among assignments of equal total cost the solver returns the lexicographically smallest one: track (row) 0 takes the lowest
/// detection (column) it can hold in any optimal assignment, then track 1 the lowest remaining, and so on. When there are more
/// tracks than detections, lower tracks are matched before higher ones. Costs are compared after quantisation by `COST_SCALE`
/// so equality is exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct HungarianSolver;

impl AssignmentSolver for HungarianSolver {
    fn solve(&self, cost_matrix: ArrayView2<f32>) -> Result<Vec<(usize, usize)>> {
        let (rows, cols) = cost_matrix.dim();
        if rows == 0 || cols == 0 {
            return Ok(vec![]);
        }

        let costs = quantize(cost_matrix)?;

        // kuhn_munkres requires no more rows than columns
        let transposed = rows > cols;
        let oriented = if transposed {
            costs.t().to_owned()
        } else {
            costs.clone()
        };
        let weights = Matrix::from_vec(
            oriented.nrows(),
            oriented.ncols(),
            oriented.iter().copied().collect::<Vec<i64>>(),
        )
        .map_err(|err| TrackingError::SolverFailure(format!("{err:?}")))?;

        // `kuhn_munkres_min` returns just the column of each row, the row index is the position.
        let (_, col_indices) = kuhn_munkres_min(&weights);
        let pairs = col_indices
            .into_iter()
            .enumerate()
            .map(|(row, col)| if transposed { (col, row) } else { (row, col) })
            .collect::<Vec<_>>();

        check_pairing(&pairs, rows, cols)?;

        Ok(canonicalize(&costs, pairs))
    }
}

fn quantize(cost_matrix: ArrayView2<f32>) -> Result<Array2<i64>> {
    let (rows, cols) = cost_matrix.dim();
    // leave headroom for the solver's running sums
    let limit = i64::MAX as f64 / (2.0 * (rows.max(cols) as f64 + 1.0));

    let mut costs = Array2::<i64>::zeros((rows, cols));
    for ((row, col), cost) in cost_matrix.indexed_iter() {
        if !cost.is_finite() {
            return Err(TrackingError::SolverFailure(format!(
                "cost ({row}, {col}) is not finite: {cost}"
            )));
        }
        let scaled = (*cost as f64 * COST_SCALE).round();
        if scaled.abs() > limit {
            return Err(TrackingError::SolverFailure(format!(
                "cost ({row}, {col}) = {cost} exceeds the solver range"
            )));
        }
        costs[[row, col]] = scaled as i64;
    }
    Ok(costs)
}

fn check_pairing(pairs: &[(usize, usize)], rows: usize, cols: usize) -> Result<()> {
    let mut used_rows = FixedBitSet::with_capacity(rows);
    let mut used_cols = FixedBitSet::with_capacity(cols);
    for (row, col) in pairs {
        if *row >= rows || *col >= cols || used_rows.put(*row) || used_cols.put(*col) {
            return Err(TrackingError::SolverFailure(format!(
                "solver produced an invalid pairing {pairs:?} for a {rows}x{cols} matrix"
            )));
        }
    }
    if pairs.len() != rows.min(cols) {
        return Err(TrackingError::SolverFailure(format!(
            "solver assigned {} pairs for a {rows}x{cols} matrix",
            pairs.len()
        )));
    }
    Ok(())
}

fn canonicalize(costs: &Array2<i64>, pairs: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    let (rows, cols) = costs.dim();
    let n = rows.max(cols);
    // square the problem with zero-cost padding, padded indices come after the real ones
    let cost = |row: usize, col: usize| {
        if row < rows && col < cols {
            costs[[row, col]]
        } else {
            0
        }
    };

    // complete the optimal pairing to an optimal permutation of the padded matrix
    let mut assignment = Assignment {
        col_of: vec![usize::MAX; n],
        row_of: vec![usize::MAX; n],
    };
    for (row, col) in pairs {
        assignment.assign(row, col);
    }
    let free_cols = (0..n)
        .filter(|col| assignment.row_of[*col] == usize::MAX)
        .collect::<Vec<_>>();
    let free_rows = (0..n)
        .filter(|row| assignment.col_of[*row] == usize::MAX)
        .collect::<Vec<_>>();
    free_rows
        .into_iter()
        .zip(free_cols)
        .for_each(|(row, col)| assignment.assign(row, col));

    // column duals by shortest paths over the alternating graph, the pairing being optimal there is no negative cycle
    let mut col_dual = vec![0i64; n];
    for _ in 0..=n {
        let mut changed = false;
        for row in 0..n {
            let from = assignment.col_of[row];
            let base = col_dual[from] - cost(row, from);
            for col in 0..n {
                let candidate = base + cost(row, col);
                if candidate < col_dual[col] {
                    col_dual[col] = candidate;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    let row_dual = (0..n)
        .map(|row| cost(row, assignment.col_of[row]) - col_dual[assignment.col_of[row]])
        .collect::<Vec<_>>();

    // an assignment is optimal exactly when it only uses edges of zero reduced cost
    let tight = |row: usize, col: usize| cost(row, col) - row_dual[row] - col_dual[col] == 0;

    // walk rows in order, each takes the lowest column that still admits an optimal completion
    let mut fixed = FixedBitSet::with_capacity(n);
    for row in 0..n {
        let current = assignment.col_of[row];
        for col in 0..current {
            let owner = assignment.row_of[col];
            if !tight(row, col) || fixed.contains(owner) {
                continue;
            }
            let mut blocked = fixed.clone();
            blocked.insert(row);
            if assignment.reroute(owner, current, &tight, &mut blocked) {
                assignment.assign(row, col);
                break;
            }
        }
        fixed.insert(row);
    }

    (0..rows)
        .filter(|row| assignment.col_of[*row] < cols)
        .map(|row| (row, assignment.col_of[row]))
        .collect()
}

/// A permutation of a square matrix, indexed both ways.
struct Assignment {
    col_of: Vec<usize>,
    row_of: Vec<usize>,
}

impl Assignment {
    fn assign(&mut self, row: usize, col: usize) {
        self.col_of[row] = col;
        self.row_of[col] = row;
    }

    /// Move `row` off its column along zero reduced cost edges until `target` is taken, never touching `blocked` rows.
    fn reroute(
        &mut self,
        row: usize,
        target: usize,
        tight: &dyn Fn(usize, usize) -> bool,
        blocked: &mut FixedBitSet,
    ) -> bool {
        blocked.insert(row);
        for col in 0..self.col_of.len() {
            if col == self.col_of[row] || !tight(row, col) {
                continue;
            }
            if col == target {
                self.assign(row, col);
                return true;
            }
            let owner = self.row_of[col];
            if !blocked.contains(owner) && self.reroute(owner, target, tight, blocked) {
                self.assign(row, col);
                return true;
            }
        }
        false
    }
}

/// An accepted association between a track and a detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    track_idx: usize,
    detection_idx: usize,
    distance: f32,
}

impl Match {
    /// Return a new Match
    ///
    /// # Parameters
    ///
    /// * `track_idx`: The match track index.
    /// * `detection_idx`: The match detection index.
    /// * `distance`: Match cost.
    pub fn new(track_idx: usize, detection_idx: usize, distance: f32) -> Match {
        Match {
            track_idx,
            detection_idx,
            distance,
        }
    }

    /// Return the track index of the match
    pub fn track_idx(&self) -> usize {
        self.track_idx
    }

    /// Return the detection index of the match
    pub fn detection_idx(&self) -> usize {
        self.detection_idx
    }

    /// Return the distance of the match
    pub fn distance(&self) -> f32 {
        self.distance
    }
}

/// The outcome of one association.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matching {
    /// Accepted pairs ordered by track index.
    pub matches: Vec<Match>,
    /// Track indices without an accepted detection, ascending.
    pub unmatched_tracks: Vec<usize>,
    /// Detection indices without an accepted track, ascending.
    pub unmatched_detections: Vec<usize>,
}

/// Solve linear assignment problem.
///
/// # Parameters
///
/// * `solver`: The assignment solver.
/// * `cost_matrix`: The NxM dimensional cost matrix, where element (i, j) is the association cost between the i-th track and the j-th detection.
/// * `max_distance`: Gating threshold. Solved pairs with cost larger than this value are rejected and both sides reported as unmatched.
///
/// # Returns
///
/// The matched pairs, the unmatched track indices and the unmatched detection indices. Each track and each detection appears in exactly one of them.
/// When the matrix has no rows or no columns the solver is not invoked.
pub fn min_cost_matching(
    solver: &dyn AssignmentSolver,
    cost_matrix: &Array2<f32>,
    max_distance: f32,
) -> Result<Matching> {
    let (rows, cols) = cost_matrix.dim();
    if rows == 0 || cols == 0 {
        return Ok(Matching {
            matches: vec![],
            unmatched_tracks: (0..rows).collect(),
            unmatched_detections: (0..cols).collect(),
        });
    }

    let pairs = solver.solve(cost_matrix.view())?;
    check_pairing(&pairs, rows, cols)?;

    let mut matched_tracks = FixedBitSet::with_capacity(rows);
    let mut matched_detections = FixedBitSet::with_capacity(cols);
    let mut matches = Vec::with_capacity(pairs.len());

    for (row, col) in pairs {
        let distance = cost_matrix[[row, col]];
        if distance > max_distance {
            tracing::debug!(
                track_idx = row,
                detection_idx = col,
                distance,
                max_distance,
                "rejected assignment beyond distance gate"
            );
        } else {
            matched_tracks.insert(row);
            matched_detections.insert(col);
            matches.push(Match::new(row, col, distance));
        }
    }
    matches.sort_by_key(|m| m.track_idx);

    Ok(Matching {
        matches,
        unmatched_tracks: (0..rows).filter(|row| !matched_tracks.contains(*row)).collect(),
        unmatched_detections: (0..cols)
            .filter(|col| !matched_detections.contains(*col))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use crate::*;
    use anyhow::Result;
    use itertools::Itertools;
    use ndarray::*;
    use rand::prelude::*;
    use rand_pcg::Pcg32;

    /// Minimal total cost over every one-to-one assignment of the smaller side.
    fn brute_force_min_cost(cost_matrix: &Array2<f32>) -> f32 {
        let (rows, cols) = cost_matrix.dim();
        if rows <= cols {
            (0..cols)
                .permutations(rows)
                .map(|assignment| {
                    assignment
                        .iter()
                        .enumerate()
                        .map(|(row, col)| cost_matrix[[row, *col]])
                        .sum::<f32>()
                })
                .fold(f32::MAX, f32::min)
        } else {
            brute_force_min_cost(&cost_matrix.t().to_owned())
        }
    }

    fn random_matrix(rng: &mut Pcg32, rows: usize, cols: usize) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |_| rng.gen_range(0.0f32..100.0))
    }

    struct PanickingSolver;

    impl AssignmentSolver for PanickingSolver {
        fn solve(&self, _: ArrayView2<f32>) -> Result<Vec<(usize, usize)>, TrackingError> {
            panic!("solver must not be invoked")
        }
    }

    struct BrokenSolver;

    impl AssignmentSolver for BrokenSolver {
        fn solve(&self, _: ArrayView2<f32>) -> Result<Vec<(usize, usize)>, TrackingError> {
            Ok(vec![(0, 0), (1, 0)])
        }
    }

    #[test]
    fn min_cost_matching() -> Result<()> {
        let cost_matrix = arr2::<f32, _>(&[
            [14.1, 0.0, 0.7],
            [12.7, 1.4, 0.7],
            [14.1, 28.3, 27.6],
        ]);

        let matching = linear_assignment::min_cost_matching(&HungarianSolver, &cost_matrix, 5.0)?;

        assert_eq!(
            matching.matches,
            vec![Match::new(0, 1, 0.0), Match::new(1, 2, 0.7)]
        );
        assert_eq!(matching.unmatched_tracks, vec![2]);
        assert_eq!(matching.unmatched_detections, vec![0]);

        Ok(())
    }

    #[test]
    fn globally_optimal_not_greedy() -> Result<()> {
        // greedy would take (0, 0) at cost 1 and be forced into (1, 1) at cost 10
        let cost_matrix = arr2::<f32, _>(&[[1.0, 2.0], [2.0, 10.0]]);

        let pairs = HungarianSolver.solve(cost_matrix.view())?;

        assert_eq!(pairs, vec![(0, 1), (1, 0)]);

        Ok(())
    }

    #[test]
    fn matches_brute_force() -> Result<()> {
        let mut rng = Pcg32::seed_from_u64(0);

        for (rows, cols) in [(1, 1), (2, 3), (3, 3), (3, 2), (4, 4), (3, 5), (5, 3)] {
            for _ in 0..25 {
                let cost_matrix = random_matrix(&mut rng, rows, cols);
                let pairs = HungarianSolver.solve(cost_matrix.view())?;

                assert_eq!(pairs.len(), rows.min(cols));
                let total = pairs
                    .iter()
                    .map(|(row, col)| cost_matrix[[*row, *col]])
                    .sum::<f32>();
                let optimum = brute_force_min_cost(&cost_matrix);
                assert!(
                    (total - optimum).abs() < 1e-2,
                    "{total} != {optimum} for {cost_matrix:?}"
                );
            }
        }

        Ok(())
    }

    #[test]
    fn partitions_are_disjoint_and_exhaustive() -> Result<()> {
        let mut rng = Pcg32::seed_from_u64(7);

        for (rows, cols) in [(1, 4), (3, 3), (4, 2), (6, 5)] {
            for _ in 0..25 {
                let cost_matrix = random_matrix(&mut rng, rows, cols);
                let max_distance = rng.gen_range(0.0f32..100.0);
                let matching = linear_assignment::min_cost_matching(
                    &HungarianSolver,
                    &cost_matrix,
                    max_distance,
                )?;

                let mut tracks = matching
                    .matches
                    .iter()
                    .map(|m| m.track_idx())
                    .chain(matching.unmatched_tracks.iter().copied())
                    .collect::<Vec<_>>();
                tracks.sort_unstable();
                assert_eq!(tracks, (0..rows).collect::<Vec<_>>());

                let mut detections = matching
                    .matches
                    .iter()
                    .map(|m| m.detection_idx())
                    .chain(matching.unmatched_detections.iter().copied())
                    .collect::<Vec<_>>();
                detections.sort_unstable();
                assert_eq!(detections, (0..cols).collect::<Vec<_>>());

                assert!(matching
                    .matches
                    .iter()
                    .all(|m| m.distance() <= max_distance));
            }
        }

        Ok(())
    }

    #[test]
    fn gate_demotes_both_sides() -> Result<()> {
        let cost_matrix = arr2::<f32, _>(&[[3.0, 50.0], [50.0, 30.0]]);

        let matching = linear_assignment::min_cost_matching(&HungarianSolver, &cost_matrix, 20.0)?;

        assert_eq!(matching.matches, vec![Match::new(0, 0, 3.0)]);
        assert_eq!(matching.unmatched_tracks, vec![1]);
        assert_eq!(matching.unmatched_detections, vec![1]);

        Ok(())
    }

    #[test]
    fn gate_is_inclusive() -> Result<()> {
        let cost_matrix = arr2::<f32, _>(&[[20.0]]);

        let matching = linear_assignment::min_cost_matching(&HungarianSolver, &cost_matrix, 20.0)?;

        assert_eq!(matching.matches, vec![Match::new(0, 0, 20.0)]);

        Ok(())
    }

    #[test]
    fn ties_prefer_lower_indices() -> Result<()> {
        let square = arr2::<f32, _>(&[[1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(HungarianSolver.solve(square.view())?, vec![(0, 0), (1, 1)]);

        let uniform = Array2::<f32>::from_elem((3, 3), 4.0);
        assert_eq!(
            HungarianSolver.solve(uniform.view())?,
            vec![(0, 0), (1, 1), (2, 2)]
        );

        let wide = arr2::<f32, _>(&[[5.0, 5.0, 5.0]]);
        assert_eq!(HungarianSolver.solve(wide.view())?, vec![(0, 0)]);

        let tall = arr2::<f32, _>(&[[5.0], [5.0], [5.0]]);
        assert_eq!(HungarianSolver.solve(tall.view())?, vec![(0, 0)]);

        // equal-cost swap between two tracks while a third is fixed
        let mixed = arr2::<f32, _>(&[[2.0, 2.0, 9.0], [2.0, 2.0, 9.0], [9.0, 9.0, 0.0]]);
        assert_eq!(
            HungarianSolver.solve(mixed.view())?,
            vec![(0, 0), (1, 1), (2, 2)]
        );

        Ok(())
    }

    /// Lexicographically smallest minimal-cost assignment of the zero-padded square matrix, by exhaustive search.
    fn brute_force_lowest_assignment(cost_matrix: &Array2<f32>) -> Vec<(usize, usize)> {
        let (rows, cols) = cost_matrix.dim();
        let n = rows.max(cols);
        let cost = |row: usize, col: usize| {
            if row < rows && col < cols {
                cost_matrix[[row, col]] as i64
            } else {
                0
            }
        };

        let best = (0..n)
            .permutations(n)
            .map(|assignment| {
                let total = assignment
                    .iter()
                    .enumerate()
                    .map(|(row, col)| cost(row, *col))
                    .sum::<i64>();
                (total, assignment)
            })
            .min()
            .map(|(_, assignment)| assignment)
            .unwrap_or_default();

        best.into_iter()
            .enumerate()
            .filter(|(row, col)| *row < rows && *col < cols)
            .collect()
    }

    #[test]
    fn ties_resolved_across_rotations() {
        // every rotation of the diagonal costs 0, only cycling all three pairs reaches the identity
        let costs = arr2::<i64, _>(&[[0, 0, 9], [9, 0, 0], [0, 9, 0]]);

        let pairs = super::canonicalize(&costs, vec![(0, 1), (1, 2), (2, 0)]);

        assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn ties_match_lowest_optimal_assignment() -> Result<()> {
        let mut rng = Pcg32::seed_from_u64(11);

        for (rows, cols) in [(4, 4), (3, 4), (4, 3), (2, 5), (5, 2)] {
            for _ in 0..400 {
                let cost_matrix =
                    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(0..3) as f32);

                assert_eq!(
                    HungarianSolver.solve(cost_matrix.view())?,
                    brute_force_lowest_assignment(&cost_matrix),
                    "{cost_matrix:?}"
                );
            }
        }

        Ok(())
    }

    #[test]
    fn deterministic() -> Result<()> {
        let mut rng = Pcg32::seed_from_u64(3);
        let cost_matrix = random_matrix(&mut rng, 6, 6).mapv(|v| v.round());

        let first = HungarianSolver.solve(cost_matrix.view())?;
        for _ in 0..10 {
            assert_eq!(HungarianSolver.solve(cost_matrix.view())?, first);
        }

        Ok(())
    }

    #[test]
    fn empty_skips_solver() -> Result<()> {
        let matching = linear_assignment::min_cost_matching(
            &PanickingSolver,
            &Array2::<f32>::zeros((0, 3)),
            1.0,
        )?;
        assert!(matching.matches.is_empty());
        assert!(matching.unmatched_tracks.is_empty());
        assert_eq!(matching.unmatched_detections, vec![0, 1, 2]);

        let matching = linear_assignment::min_cost_matching(
            &PanickingSolver,
            &Array2::<f32>::zeros((2, 0)),
            1.0,
        )?;
        assert_eq!(matching.unmatched_tracks, vec![0, 1]);
        assert!(matching.unmatched_detections.is_empty());

        Ok(())
    }

    #[test]
    fn non_finite_cost_fails() {
        let cost_matrix = arr2::<f32, _>(&[[1.0, f32::NAN]]);
        assert!(matches!(
            HungarianSolver.solve(cost_matrix.view()),
            Err(TrackingError::SolverFailure(_))
        ));

        let cost_matrix = arr2::<f32, _>(&[[f32::INFINITY]]);
        assert!(matches!(
            linear_assignment::min_cost_matching(&HungarianSolver, &cost_matrix, 1.0),
            Err(TrackingError::SolverFailure(_))
        ));
    }

    #[test]
    fn invalid_pairing_fails() {
        let cost_matrix = arr2::<f32, _>(&[[1.0, 2.0], [3.0, 4.0]]);
        assert!(matches!(
            linear_assignment::min_cost_matching(&BrokenSolver, &cost_matrix, 10.0),
            Err(TrackingError::SolverFailure(_))
        ));
    }
}
