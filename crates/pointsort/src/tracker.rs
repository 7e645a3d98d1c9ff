use crate::*;
use rayon::prelude::*;
use std::sync::Arc;

/// This is the multi-target tracker.
///
/// Each call to [`TrackRegistry::track`] runs one cycle: associate the detections with the predicted track positions, update matched
/// tracks, spawn tracks for unmatched detections, age unmatched tracks, report and prune. The estimator variant, the assignment solver and
/// the color source are injected, so the cycle itself never depends on which of them is used.
///
/// # Examples
///
/// ```
/// use pointsort::{Detection, TrackRegistry};
///
/// // instantiate tracker with default parameters
/// let mut tracker = TrackRegistry::default();
///
/// // feed the detections of each frame
/// tracker.track(&[Detection::new(0.0, 100.0)]).unwrap();
/// let reports = tracker.track(&[Detection::new(1.0, 101.0)]).unwrap();
///
/// for report in reports {
///     println!("{} {:?} {:?}", report.id, report.position, report.color);
/// }
/// ```
pub struct TrackRegistry {
    /// Association and lifecycle parameters.
    config: TrackerConfig,
    /// Creates the estimator of every new track.
    factory: Box<dyn EstimatorFactory>,
    /// Solves the assignment between tracks and detections.
    solver: Box<dyn AssignmentSolver>,
    /// Builds the association cost matrix.
    distance_metric: DistanceMetricFn,
    /// Assigns display colors to new tracks.
    palette: Box<dyn PaletteSource>,
    /// The live tracks, in creation order.
    tracks: Vec<Track>,
    /// Used to allocate identifiers to new tracks.
    next_id: usize,
    /// Number of completed cycles.
    frame_count: usize,
    /// Set once a cycle fails after it started mutating tracks.
    failure: Option<String>,
}

impl std::fmt::Debug for TrackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackRegistry")
            .field("config", &self.config)
            .field("tracks", &self.tracks)
            .field("next_id", &self.next_id)
            .field("frame_count", &self.frame_count)
            .field("failure", &self.failure)
            .finish()
    }
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::from_parts(
            TrackerConfig::default(),
            Box::<LinearMotionFactory>::default(),
            Box::<CyclicPalette>::default(),
        )
    }
}

impl TrackRegistry {
    /// Returns a new TrackRegistry
    ///
    /// # Parameters
    ///
    /// * `config`: Association and lifecycle parameters.
    /// * `factory`: Creates the estimator of each new track.
    /// * `palette`: Source of track colors.
    pub fn new(
        config: TrackerConfig,
        factory: Box<dyn EstimatorFactory>,
        palette: Box<dyn PaletteSource>,
    ) -> Result<TrackRegistry> {
        config.validate()?;
        Ok(Self::from_parts(config, factory, palette))
    }

    /// Returns a new TrackRegistry using constant velocity Kalman filters.
    pub fn linear(
        config: TrackerConfig,
        motion_config: &LinearMotionConfig,
    ) -> Result<TrackRegistry> {
        Self::new(
            config,
            Box::new(LinearMotionFactory::new(motion_config)?),
            Box::<CyclicPalette>::default(),
        )
    }

    /// Returns a new TrackRegistry using history-bucketed extrapolation models.
    pub fn adaptive(
        config: TrackerConfig,
        adaptive_config: &AdaptiveConfig,
        predictor: Arc<dyn Predictor>,
    ) -> Result<TrackRegistry> {
        Self::new(
            config,
            Box::new(AdaptiveFactory::new(adaptive_config, predictor)?),
            Box::<CyclicPalette>::default(),
        )
    }

    fn from_parts(
        config: TrackerConfig,
        factory: Box<dyn EstimatorFactory>,
        palette: Box<dyn PaletteSource>,
    ) -> TrackRegistry {
        TrackRegistry {
            config,
            factory,
            solver: Box::new(HungarianSolver),
            distance_metric: distance::euclidean_distance_cost(),
            palette,
            tracks: vec![],
            next_id: 1,
            frame_count: 0,
            failure: None,
        }
    }

    /// Set the assignment solver
    pub fn with_solver(&mut self, solver: Box<dyn AssignmentSolver>) -> &mut Self {
        self.solver = solver;
        self
    }

    /// Set the distance metric
    pub fn with_distance_metric(&mut self, distance_metric: DistanceMetricFn) -> &mut Self {
        self.distance_metric = distance_metric;
        self
    }

    /// Return the config
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Return the live tracks
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Return the number of completed cycles
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Returns true once a cycle failed part way and the session can no longer be used.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Perform association, measurement update and track management for one frame.
    ///
    /// # Parameters
    ///
    /// * `detections`: The detections of the current frame. Their order only affects tie-breaking.
    ///
    /// # Returns
    ///
    /// The reportable tracks in creation order, evaluated before expired tracks are removed.
    ///
    /// Errors raised while building the cost matrix or solving the assignment leave every track untouched.
    /// An error raised after tracks started changing fails the whole session and every later call returns `SessionFailed`.
    pub fn track(&mut self, detections: &[Detection]) -> Result<Vec<TrackReport>> {
        if let Some(reason) = &self.failure {
            return Err(TrackingError::SessionFailed(reason.clone()));
        }

        // Step 1
        // Build the cost matrix between predicted track positions and detections.
        let positions = self
            .tracks
            .par_iter()
            .map(Track::position)
            .collect::<Result<Vec<_>>>()?;
        let cost_matrix = (self.distance_metric)(&positions, detections)?;
        let expected = (positions.len(), detections.len());
        if cost_matrix.dim() != expected {
            return Err(TrackingError::ShapeMismatch {
                expected,
                found: cost_matrix.dim(),
            });
        }

        // Step 2
        // Solve the assignment and apply the distance gate.
        let matching = linear_assignment::min_cost_matching(
            self.solver.as_ref(),
            &cost_matrix,
            self.config.distance_gate,
        )?;

        match self.apply(detections, matching) {
            Ok(reports) => Ok(reports),
            Err(err) => {
                tracing::error!(frame = self.frame_count, error = %err, "tracking cycle failed");
                self.failure = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn apply(&mut self, detections: &[Detection], matching: Matching) -> Result<Vec<TrackReport>> {
        let Matching {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching;
        self.frame_count += 1;

        tracing::trace!(
            frame = self.frame_count,
            matched = matches.len(),
            unmatched_tracks = unmatched_tracks.len(),
            unmatched_detections = unmatched_detections.len(),
            "associated detections"
        );

        // Step 3
        // Update matched tracks with their detection.
        for m in &matches {
            self.tracks[m.track_idx()].mark_matched(detections[m.detection_idx()])?;
        }

        // Step 4
        // Initialize new tracks from unmatched detections.
        for detection_idx in &unmatched_detections {
            self.initiate_track(detections[*detection_idx])?;
        }

        // Step 5
        // Age unmatched tracks.
        for track_idx in &unmatched_tracks {
            self.tracks[*track_idx].mark_missed()?;
        }

        // Step 6
        // Collect reportable tracks before pruning.
        let (min_hits, max_age) = (self.config.min_hits, self.config.max_age);
        let reports = self
            .tracks
            .iter()
            .filter(|track| track.is_reportable(min_hits, max_age))
            .map(Track::report)
            .collect::<Result<Vec<_>>>()?;

        // Step 7
        // Remove any tracks that have been missed for more than max_age cycles.
        let (live, expired): (Vec<Track>, Vec<Track>) = std::mem::take(&mut self.tracks)
            .into_iter()
            .partition(|track| !track.is_expired(max_age));
        expired.iter().for_each(|track| {
            tracing::debug!(
                track_id = track.track_id(),
                hits = track.hits(),
                age = track.age(),
                "removed expired track"
            );
        });
        self.tracks = live;

        Ok(reports)
    }

    fn initiate_track(&mut self, detection: Detection) -> Result<()> {
        let estimator = self.factory.create(&detection)?;
        let color = self.palette.next_color();
        let track = Track::new(self.next_id, detection, estimator, color);
        tracing::debug!(
            track_id = self.next_id,
            x = detection.x(),
            y = detection.y(),
            "initiated track"
        );
        self.tracks.push(track);
        self.next_id += 1;
        Ok(())
    }

    /// Predict future trajectories without changing any track.
    ///
    /// # Parameters
    ///
    /// * `horizon`: Number of future cycles to predict.
    /// * `min_age`: Only tracks that have existed for at least this many cycles are forecast.
    ///
    /// # Returns
    ///
    /// One forecast per reportable track old enough, in creation order.
    pub fn forecast(&self, horizon: usize, min_age: usize) -> Result<Vec<Forecast>> {
        let (min_hits, max_age) = (self.config.min_hits, self.config.max_age);
        self.tracks
            .iter()
            .filter(|track| track.age() >= min_age && track.is_reportable(min_hits, max_age))
            .map(|track| track.forecast(horizon))
            .collect()
    }
}
