use crate::{LinearMotionConfig, Result, TrackingError};
use ndarray::*;

/// Dimension of the state vector `(x, vx, y, vy)`.
pub const STATE_DIM: usize = 4;
/// Dimension of the measurement vector `(x, y)`.
pub const MEASUREMENT_DIM: usize = 2;

/**
A constant velocity Kalman filter for tracking points in image space.

The 4-dimensional state space:
    x, vx, y, vy
contains the point position (x, y) and its velocity, interleaved per axis.

Object motion follows a constant velocity model with a unit time step. The position (x, y) is taken as direct observation of the state space (linear observation model).
*/
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f32>,
    update_mat: Array2<f32>,
    initial_cov: Array2<f32>,
    process_cov: Array2<f32>,
    observation_cov: Array2<f32>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(&LinearMotionConfig::default())
    }
}

impl KalmanFilter {
    /// Returns a new KalmanFilter
    ///
    /// # Parameters
    ///
    /// * `config`: Noise parameters shared by every track of the session.
    pub fn new(config: &LinearMotionConfig) -> KalmanFilter {
        let dt = 1.0f32;

        let mut motion_mat = Array2::<f32>::eye(STATE_DIM);
        motion_mat[[0, 1]] = dt;
        motion_mat[[2, 3]] = dt;

        let mut update_mat = Array2::<f32>::zeros((MEASUREMENT_DIM, STATE_DIM));
        update_mat[[0, 0]] = 1.0;
        update_mat[[1, 2]] = 1.0;

        // discrete white noise acceleration, one block per axis
        let block = arr2::<f32, _>(&[
            [dt.powi(4) / 4.0, dt.powi(3) / 2.0],
            [dt.powi(3) / 2.0, dt.powi(2)],
        ]) * config.process_noise_variance;
        let mut process_cov = Array2::<f32>::zeros((STATE_DIM, STATE_DIM));
        process_cov.slice_mut(s![0..2, 0..2]).assign(&block);
        process_cov.slice_mut(s![2..4, 2..4]).assign(&block);

        KalmanFilter {
            motion_mat,
            update_mat,
            initial_cov: Array2::<f32>::eye(STATE_DIM) * config.state_noise,
            process_cov,
            observation_cov: Array2::<f32>::eye(MEASUREMENT_DIM)
                * (config.state_noise * config.observation_noise_scale),
        }
    }

    /// Create a state distribution from an unassociated measurement.
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the new track:
    /// - The mean vector (4 dimensional).
    /// - The covariance matrix (4x4 dimensional).
    ///
    /// Unobserved velocities are initialized to 0 mean.
    pub fn initiate(&self, measurement: &Array1<f32>) -> Result<(Array1<f32>, Array2<f32>)> {
        check_dimension(MEASUREMENT_DIM, measurement.len())?;
        let mean = arr1::<f32>(&[measurement[0], 0.0, measurement[1], 0.0]);
        Ok((mean, self.initial_cov.clone()))
    }

    /// Run Kalman filter prediction step.
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the predicted state:
    /// - The mean vector (4 dimensional).
    /// - The covariance matrix (4x4 dimensional).
    pub fn predict(
        &self,
        mean: &Array1<f32>,
        covariance: &Array2<f32>,
    ) -> Result<(Array1<f32>, Array2<f32>)> {
        check_state(mean, covariance)?;
        let mean = self.motion_mat.dot(mean);
        let covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + &self.process_cov;
        Ok((mean, covariance))
    }

    /// Project state distribution to measurement space.
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the given state estimate:
    /// - The projected mean (2 dimensional).
    /// - The innovation covariance (2x2 dimensional).
    pub fn project(
        &self,
        mean: &Array1<f32>,
        covariance: &Array2<f32>,
    ) -> Result<(Array1<f32>, Array2<f32>)> {
        check_state(mean, covariance)?;
        let mean = self.update_mat.dot(mean);
        let covariance =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + &self.observation_cov;
        Ok((mean, covariance))
    }

    /// Run Kalman filter correction step.
    ///
    /// # Parameters
    ///
    /// - `mean`: The state's mean vector (4 dimensional array).
    /// - `covariance`: The state's covariance matrix (4x4 dimensional).
    /// - `measurement`: The 2 dimensional measurement vector (x, y).
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the measurement-corrected state distribution:
    /// - The mean vector (4 dimensional).
    /// - The covariance matrix (4x4 dimensional).
    pub fn update(
        &self,
        mean: &Array1<f32>,
        covariance: &Array2<f32>,
        measurement: &Array1<f32>,
    ) -> Result<(Array1<f32>, Array2<f32>)> {
        check_dimension(MEASUREMENT_DIM, measurement.len())?;
        let (projected_mean, projected_cov) = self.project(mean, covariance)?;

        let kalman_gain = covariance
            .dot(&self.update_mat.t())
            .dot(&invert_2x2(&projected_cov)?);

        let innovation = measurement - &projected_mean;
        let new_mean = mean + &kalman_gain.dot(&innovation);

        // Joseph form keeps the covariance symmetric positive definite
        let residual = Array2::<f32>::eye(STATE_DIM) - kalman_gain.dot(&self.update_mat);
        let new_covariance = residual.dot(covariance).dot(&residual.t())
            + kalman_gain.dot(&self.observation_cov).dot(&kalman_gain.t());

        Ok((new_mean, new_covariance))
    }
}

fn check_dimension(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(TrackingError::DimensionMismatch { expected, found })
    }
}

fn check_state(mean: &Array1<f32>, covariance: &Array2<f32>) -> Result<()> {
    check_dimension(STATE_DIM, mean.len())?;
    check_dimension(STATE_DIM, covariance.nrows())?;
    check_dimension(STATE_DIM, covariance.ncols())
}

fn invert_2x2(matrix: &Array2<f32>) -> Result<Array2<f32>> {
    let (a, b, c, d) = (
        matrix[[0, 0]],
        matrix[[0, 1]],
        matrix[[1, 0]],
        matrix[[1, 1]],
    );
    let determinant = a * d - b * c;
    if !determinant.is_finite() || determinant.abs() <= f32::EPSILON {
        return Err(TrackingError::SingularInnovation);
    }
    Ok(arr2::<f32, _>(&[[d, -b], [-c, a]]) / determinant)
}
