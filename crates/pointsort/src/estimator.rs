use crate::*;
use ndarray::*;
use std::fmt::Debug;
use std::sync::Arc;

/// A recursive estimate of one track's position.
///
/// The tracker only talks to this trait, so the assignment and lifecycle logic is the same for every variant.
pub trait StateEstimator: Debug + Send + Sync {
    /// Advance the estimate by one time step without an observation. May be called any number of times.
    fn predict(&mut self) -> Result<()>;

    /// Incorporate one real observation.
    fn update(&mut self, detection: &Detection) -> Result<()>;

    /// The position used to associate this estimate with the detections of the next cycle.
    fn position(&self) -> Result<Detection>;

    /// The position reported to consumers of the tracker.
    fn reported_position(&self) -> Result<Detection> {
        self.position()
    }

    /// Roll a copy of the estimate forward `steps` cycles without observations, returning the reported position after each step.
    fn forecast(&self, steps: usize) -> Result<Vec<Detection>>;
}

/// Creates the estimator of a newly spawned track.
pub trait EstimatorFactory: Send + Sync {
    fn create(&self, detection: &Detection) -> Result<Box<dyn StateEstimator>>;
}

/// Constant velocity Kalman filter estimate over `(x, vx, y, vy)`.
#[derive(Debug, Clone)]
pub struct LinearMotionEstimator {
    kf: Arc<KalmanFilter>,
    /// Mean vector of the state distribution.
    mean: Array1<f32>,
    /// Covariance matrix of the state distribution.
    covariance: Array2<f32>,
}

impl LinearMotionEstimator {
    /// Returns a new LinearMotionEstimator positioned at `detection` with zero velocity.
    ///
    /// A single prediction is applied immediately so that the position seen by the next association is a predicted one.
    pub fn new(kf: Arc<KalmanFilter>, detection: &Detection) -> Result<LinearMotionEstimator> {
        let (mean, covariance) = kf.initiate(&detection.to_xy())?;
        let mut estimator = LinearMotionEstimator {
            kf,
            mean,
            covariance,
        };
        estimator.predict()?;
        Ok(estimator)
    }

    /// Return the mean of the state distribution
    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    /// Return the covariance of the state distribution
    pub fn covariance(&self) -> &Array2<f32> {
        &self.covariance
    }

    /// Returns the estimated velocity `(vx, vy)`.
    pub fn velocity(&self) -> (f32, f32) {
        (self.mean[1], self.mean[3])
    }
}

impl StateEstimator for LinearMotionEstimator {
    fn predict(&mut self) -> Result<()> {
        (self.mean, self.covariance) = self.kf.predict(&self.mean, &self.covariance)?;
        Ok(())
    }

    fn update(&mut self, detection: &Detection) -> Result<()> {
        let (mean, covariance) = self.kf.predict(&self.mean, &self.covariance)?;
        (self.mean, self.covariance) = self.kf.update(&mean, &covariance, &detection.to_xy())?;
        Ok(())
    }

    fn position(&self) -> Result<Detection> {
        Ok(Detection::new(self.mean[0], self.mean[2]))
    }

    fn forecast(&self, steps: usize) -> Result<Vec<Detection>> {
        let mut estimator = self.clone();
        (0..steps)
            .map(|_| {
                estimator.predict()?;
                estimator.reported_position()
            })
            .collect()
    }
}

/// Creates LinearMotionEstimators sharing one Kalman filter model.
#[derive(Debug, Clone)]
pub struct LinearMotionFactory {
    kf: Arc<KalmanFilter>,
}

impl Default for LinearMotionFactory {
    fn default() -> Self {
        LinearMotionFactory {
            kf: Arc::new(KalmanFilter::default()),
        }
    }
}

impl LinearMotionFactory {
    /// Returns a new LinearMotionFactory
    ///
    /// # Parameters
    ///
    /// * `config`: Noise parameters applied to every track created by this factory.
    pub fn new(config: &LinearMotionConfig) -> Result<LinearMotionFactory> {
        config.validate()?;
        Ok(LinearMotionFactory {
            kf: Arc::new(KalmanFilter::new(config)),
        })
    }
}

impl EstimatorFactory for LinearMotionFactory {
    fn create(&self, detection: &Detection) -> Result<Box<dyn StateEstimator>> {
        Ok(Box::new(LinearMotionEstimator::new(
            self.kf.clone(),
            detection,
        )?))
    }
}
