use crate::*;
use std::sync::Arc;

/// An extrapolation model for one history bucket.
///
/// `window` holds the most recent `bucket_length` positions of a track, oldest first. The model returns the position expected at the next cycle.
/// How models are trained, stored or loaded is up to the implementor.
pub trait Predictor: Send + Sync {
    fn extrapolate(&self, window: &[Detection], bucket_length: usize)
        -> anyhow::Result<Detection>;
}

/// Fits an ordinary least squares line per axis over the window and evaluates it one step past the end.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquaresPredictor;

impl Predictor for LeastSquaresPredictor {
    fn extrapolate(
        &self,
        window: &[Detection],
        _bucket_length: usize,
    ) -> anyhow::Result<Detection> {
        match window {
            [] => anyhow::bail!("cannot extrapolate from an empty window"),
            [only] => Ok(*only),
            _ => {
                let n = window.len() as f64;
                let mean_t = (n - 1.0) / 2.0;
                let mean_x = window.iter().map(|p| p.x() as f64).sum::<f64>() / n;
                let mean_y = window.iter().map(|p| p.y() as f64).sum::<f64>() / n;

                let (mut var_t, mut cov_x, mut cov_y) = (0.0, 0.0, 0.0);
                for (t, point) in window.iter().enumerate() {
                    let dt = t as f64 - mean_t;
                    var_t += dt * dt;
                    cov_x += dt * (point.x() as f64 - mean_x);
                    cov_y += dt * (point.y() as f64 - mean_y);
                }

                let next_t = n - mean_t;
                Ok(Detection::new(
                    (mean_x + cov_x / var_t * next_t) as f32,
                    (mean_y + cov_y / var_t * next_t) as f32,
                ))
            }
        }
    }
}

/// History driven estimate that delegates extrapolation to a per-bucket model.
///
/// The full history of the track is kept. Missed cycles append the extrapolated position, so a track that keeps missing extrapolates
/// from its own synthetic history until a real detection is appended again.
#[derive(Clone)]
pub struct AdaptivePredictor {
    predictor: Arc<dyn Predictor>,
    bucket_lengths: Arc<[usize]>,
    history: Vec<Detection>,
}

impl std::fmt::Debug for AdaptivePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptivePredictor")
            .field("bucket_lengths", &self.bucket_lengths)
            .field("history", &self.history)
            .finish()
    }
}

impl AdaptivePredictor {
    /// Returns a new AdaptivePredictor whose history holds the single `detection`.
    pub fn new(
        predictor: Arc<dyn Predictor>,
        bucket_lengths: Arc<[usize]>,
        detection: &Detection,
    ) -> AdaptivePredictor {
        AdaptivePredictor {
            predictor,
            bucket_lengths,
            history: vec![*detection],
        }
    }

    /// Return the history of the estimate, real and extrapolated, in arrival order
    pub fn history(&self) -> &[Detection] {
        &self.history
    }

    /// Returns the largest configured bucket not longer than `length`.
    pub fn select_bucket(&self, length: usize) -> Result<usize> {
        self.bucket_lengths
            .iter()
            .rev()
            .find(|bucket| **bucket <= length)
            .copied()
            .ok_or(TrackingError::UnknownBucket { length })
    }

    fn extrapolate(&self) -> Result<Detection> {
        match self.history.as_slice() {
            [] => Err(TrackingError::UnknownBucket { length: 0 }),
            [only] => Ok(*only),
            history => {
                let bucket = self.select_bucket(history.len())?;
                let window = &history[history.len() - bucket..];
                let next = self
                    .predictor
                    .extrapolate(window, bucket)
                    .map_err(TrackingError::Predictor)?;
                if next.is_finite() {
                    Ok(next)
                } else {
                    Err(TrackingError::Predictor(anyhow::anyhow!(
                        "bucket {bucket} extrapolated a non-finite position {next:?}"
                    )))
                }
            }
        }
    }
}

impl StateEstimator for AdaptivePredictor {
    fn predict(&mut self) -> Result<()> {
        let next = self.extrapolate()?;
        self.history.push(next);
        Ok(())
    }

    fn update(&mut self, detection: &Detection) -> Result<()> {
        self.history.push(*detection);
        Ok(())
    }

    fn position(&self) -> Result<Detection> {
        self.extrapolate()
    }

    fn reported_position(&self) -> Result<Detection> {
        self.history
            .last()
            .copied()
            .ok_or(TrackingError::UnknownBucket { length: 0 })
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

/// Creates AdaptivePredictors sharing one model set and bucket list.
#[derive(Clone)]
pub struct AdaptiveFactory {
    predictor: Arc<dyn Predictor>,
    bucket_lengths: Arc<[usize]>,
}

impl AdaptiveFactory {
    /// Returns a new AdaptiveFactory
    ///
    /// # Parameters
    ///
    /// * `config`: History buckets. Validated here so that a bad bucket list fails at session setup.
    /// * `predictor`: The extrapolation models.
    pub fn new(config: &AdaptiveConfig, predictor: Arc<dyn Predictor>) -> Result<AdaptiveFactory> {
        config.validate()?;
        Ok(AdaptiveFactory {
            predictor,
            bucket_lengths: config.bucket_lengths.clone().into(),
        })
    }
}

impl EstimatorFactory for AdaptiveFactory {
    fn create(&self, detection: &Detection) -> Result<Box<dyn StateEstimator>> {
        Ok(Box::new(AdaptivePredictor::new(
            self.predictor.clone(),
            self.bucket_lengths.clone(),
            detection,
        )))
    }
}
