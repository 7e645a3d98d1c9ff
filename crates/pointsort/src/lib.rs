//! Online multi-target tracking of 2D points.
//!
//! Every frame the [`TrackRegistry`] associates detections with live tracks by optimal assignment over a Euclidean cost matrix,
//! updates each track's [`StateEstimator`], and manages the tentative, confirmed and expired track lifecycle.
//!
//! ```
//! use pointsort::{Detection, LinearMotionConfig, TrackRegistry, TrackerConfig};
//!
//! let mut config = TrackerConfig::default();
//! config.with_max_age(4).with_min_hits(1);
//! let mut tracker = TrackRegistry::linear(config, &LinearMotionConfig::default()).unwrap();
//!
//! for frame in 0..5 {
//!     let reports = tracker.track(&[Detection::new(frame as f32, 100.0)]).unwrap();
//!     assert_eq!(reports.len(), usize::from(frame > 0));
//! }
//! ```

mod adaptive;
mod config;
mod detection;
pub mod distance;
mod error;
mod estimator;
mod kalman_filter;
pub mod linear_assignment;
mod palette;
mod track;
mod tracker;

pub use adaptive::{AdaptiveFactory, AdaptivePredictor, LeastSquaresPredictor, Predictor};
pub use config::{AdaptiveConfig, LinearMotionConfig, TrackerConfig, DEFAULT_BUCKET_LENGTHS};
pub use detection::Detection;
pub use distance::DistanceMetricFn;
pub use error::{Result, TrackingError};
pub use estimator::{EstimatorFactory, LinearMotionEstimator, LinearMotionFactory, StateEstimator};
pub use kalman_filter::KalmanFilter;
pub use linear_assignment::{AssignmentSolver, HungarianSolver, Match, Matching};
pub use palette::{Color, CyclicPalette, PaletteSource, DEFAULT_PALETTE};
pub use track::{Forecast, Track, TrackReport, TrackState};
pub use tracker::TrackRegistry;
