use crate::{Result, TrackingError};
use serde::{Deserialize, Serialize};

/// Default history lengths, one extrapolation model per length.
pub const DEFAULT_BUCKET_LENGTHS: [usize; 6] = [2, 4, 8, 16, 32, 64];

/// Association and lifecycle parameters shared by every estimator variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum Euclidean distance between a track's predicted position and a detection for the pair to be accepted.
    #[serde(alias = "iou_threshold")]
    pub distance_gate: f32,
    /// Maximum number of consecutive misses before a track is deleted.
    pub max_age: usize,
    /// Number of matched cycles before a track is reported.
    pub min_hits: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            distance_gate: 20.0,
            max_age: 4,
            min_hits: 1,
        }
    }
}

impl TrackerConfig {
    /// Set distance_gate
    pub fn with_distance_gate(&mut self, distance_gate: f32) -> &mut Self {
        self.distance_gate = distance_gate;
        self
    }

    /// Set max_age
    pub fn with_max_age(&mut self, max_age: usize) -> &mut Self {
        self.max_age = max_age;
        self
    }

    /// Set min_hits
    pub fn with_min_hits(&mut self, min_hits: usize) -> &mut Self {
        self.min_hits = min_hits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.distance_gate.is_finite() || self.distance_gate < 0.0 {
            return Err(TrackingError::InvalidConfig(format!(
                "distance_gate must be a finite non-negative number, got {}",
                self.distance_gate
            )));
        }
        Ok(())
    }
}

/// Noise parameters of the constant velocity Kalman filter, applied uniformly to every track of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearMotionConfig {
    /// Scale of the initial state covariance. Also scales the observation noise.
    pub state_noise: f32,
    /// Observation noise relative to `state_noise`.
    pub observation_noise_scale: f32,
    /// Variance of the white noise acceleration driving the process noise.
    pub process_noise_variance: f32,
}

impl Default for LinearMotionConfig {
    fn default() -> Self {
        LinearMotionConfig {
            state_noise: 1.0,
            observation_noise_scale: 1.0,
            process_noise_variance: 1.0,
        }
    }
}

impl LinearMotionConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("state_noise", self.state_noise),
            ("observation_noise_scale", self.observation_noise_scale),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackingError::InvalidConfig(format!(
                    "{name} must be a finite positive number, got {value}"
                )));
            }
        }
        if !self.process_noise_variance.is_finite() || self.process_noise_variance < 0.0 {
            return Err(TrackingError::InvalidConfig(format!(
                "process_noise_variance must be a finite non-negative number, got {}",
                self.process_noise_variance
            )));
        }
        Ok(())
    }
}

/// History buckets of the adaptive predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Strictly ascending history lengths. The first must be 1 or 2 so that every history longer than one point is covered.
    pub bucket_lengths: Vec<usize>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        AdaptiveConfig {
            bucket_lengths: DEFAULT_BUCKET_LENGTHS.to_vec(),
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<()> {
        match self.bucket_lengths.first() {
            None => {
                return Err(TrackingError::InvalidConfig(
                    "bucket_lengths must not be empty".to_string(),
                ))
            }
            Some(first) if *first != 1 && *first != 2 => {
                return Err(TrackingError::InvalidConfig(format!(
                    "bucket_lengths must start at 1 or 2, got {first}"
                )))
            }
            Some(_) => {}
        }
        if self.bucket_lengths.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(TrackingError::InvalidConfig(format!(
                "bucket_lengths must be strictly ascending, got {:?}",
                self.bucket_lengths
            )));
        }
        Ok(())
    }
}
