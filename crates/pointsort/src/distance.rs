use crate::*;
use ndarray::*;
use rayon::prelude::*;
use std::sync::Arc;

/// Builds the NxM association cost matrix between N predicted track positions and M detections.
pub type DistanceMetricFn =
    Arc<dyn Fn(&[Detection], &[Detection]) -> Result<Array2<f32>> + Send + Sync>;

/// Compute the Euclidean distance between one position and a set of candidates.
///
/// # Parameters
///
/// * `position`: A predicted track position.
/// * `candidates`: The detections of the current frame.
///
/// # Returns
///
/// The distance between `position` and each candidate, in candidate order.
pub fn euclidean_distance(position: &Detection, candidates: &[Detection]) -> Array1<f32> {
    candidates
        .iter()
        .map(|candidate| position.distance(candidate))
        .collect()
}

/// Euclidean distance metric.
///
/// # Parameters
///
/// * `positions`: The predicted positions of the live tracks.
/// * `detections`: The detections of the current frame.
///
/// # Returns
///
/// A cost matrix of shape `positions.len(), detections.len()` where entry (i, j) is the distance between `positions[i]` and `detections[j]`.
/// Rows are computed in parallel and assembled in track order so the result does not depend on scheduling.
/// If either side is empty the matrix is empty.
pub fn euclidean_distance_cost() -> DistanceMetricFn {
    Arc::new(
        |positions: &[Detection], detections: &[Detection]| -> Result<Array2<f32>> {
            let shape = (positions.len(), detections.len());
            if positions.is_empty() || detections.is_empty() {
                return Ok(Array2::zeros(shape));
            }

            let costs = positions
                .par_iter()
                .flat_map_iter(|position| euclidean_distance(position, detections))
                .collect::<Vec<f32>>();
            let found = costs.len();

            Array2::from_shape_vec(shape, costs).map_err(|_| TrackingError::DimensionMismatch {
                expected: shape.0 * shape.1,
                found,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use crate::*;
    use anyhow::Result;
    use assert_approx_eq::assert_approx_eq;
    use ndarray::*;

    #[test]
    fn euclidean_distance() {
        let distances = distance::euclidean_distance(
            &Detection::new(0.0, 0.0),
            &[Detection::new(3.0, 4.0), Detection::new(0.0, -2.0)],
        );
        assert_eq!(distances, arr1::<f32>(&[5.0, 2.0]));
    }

    #[test]
    fn euclidean_distance_cost() -> Result<()> {
        let cost_matrix = distance::euclidean_distance_cost()(
            &[Detection::new(0.0, 0.0), Detection::new(10.0, 10.0)],
            &[
                Detection::new(0.0, 1.0),
                Detection::new(10.0, 13.0),
                Detection::new(6.0, 8.0),
            ],
        )?;

        let expected = arr2::<f32, _>(&[[1.0, 16.40122, 10.0], [13.453624, 3.0, 4.472136]]);
        assert_eq!(cost_matrix.dim(), expected.dim());
        cost_matrix
            .iter()
            .zip(expected.iter())
            .for_each(|(actual, expected)| assert_approx_eq!(actual, expected, 1e-4));
        assert!(cost_matrix.iter().all(|cost| *cost >= 0.0));

        Ok(())
    }

    #[test]
    fn empty() -> Result<()> {
        let metric = distance::euclidean_distance_cost();

        assert_eq!(metric(&[], &[Detection::new(1.0, 1.0)])?.dim(), (0, 1));
        assert_eq!(metric(&[Detection::new(1.0, 1.0)], &[])?.dim(), (1, 0));

        Ok(())
    }
}
