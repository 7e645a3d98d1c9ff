mod utils;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pointsort::{
    AdaptiveConfig, LeastSquaresPredictor, LinearMotionConfig, TrackRegistry, TrackerConfig,
    DEFAULT_BUCKET_LENGTHS,
};
use std::{fs::File, path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;
use utils::*;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Estimator {
    /// Constant velocity Kalman filter
    Linear,
    /// History bucketed least squares extrapolation
    Adaptive,
}

/// Track points from a CSV of per-frame detections
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The input path, a CSV with header frame,x,y
    #[arg(short, long)]
    input: PathBuf,

    /// The output path, a CSV with header frame,id,x,y,r,g,b
    #[arg(short, long)]
    output: PathBuf,

    /// The state estimator of each track
    #[arg(short, long, value_enum, default_value_t = Estimator::Linear)]
    estimator: Estimator,

    /// The maximum distance between a predicted position and a detection
    #[arg(long, default_value_t = 20.0)]
    distance_gate: f32,

    /// The maximum number of consecutive missed frames before a track is deleted
    #[arg(long, default_value_t = 4)]
    max_age: usize,

    /// The number of matched frames before a track is reported
    #[arg(long, default_value_t = 1)]
    min_hits: usize,

    /// Scale of the initial state covariance
    #[arg(long, default_value_t = 1.0)]
    state_noise: f32,

    /// Observation noise relative to the state noise
    #[arg(long, default_value_t = 1.0)]
    observation_noise_scale: f32,

    /// Variance of the acceleration noise
    #[arg(long, default_value_t = 1.0)]
    process_noise_variance: f32,

    /// History bucket lengths of the adaptive estimator
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_BUCKET_LENGTHS)]
    bucket_lengths: Vec<usize>,

    /// Forecast this many frames past the last frame
    #[arg(long, requires = "forecast_output")]
    forecast: Option<usize>,

    /// The forecast path, a CSV with header id,step,x,y
    #[arg(long)]
    forecast_output: Option<PathBuf>,

    /// Reject inputs where consecutive frame numbers are further apart than this
    #[arg(long, default_value_t = 10_000)]
    max_frame_gap: u32,

    /// Only forecast tracks that have existed for at least this many frames
    #[arg(long, default_value_t = 3)]
    min_age: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = TrackerConfig {
        distance_gate: args.distance_gate,
        max_age: args.max_age,
        min_hits: args.min_hits,
    };
    let mut tracker = match args.estimator {
        Estimator::Linear => TrackRegistry::linear(
            config,
            &LinearMotionConfig {
                state_noise: args.state_noise,
                observation_noise_scale: args.observation_noise_scale,
                process_noise_variance: args.process_noise_variance,
            },
        )?,
        Estimator::Adaptive => TrackRegistry::adaptive(
            config,
            &AdaptiveConfig {
                bucket_lengths: args.bucket_lengths.clone(),
            },
            Arc::new(LeastSquaresPredictor),
        )?,
    };

    let input = File::open(&args.input)
        .with_context(|| format!("cannot open {}", args.input.display()))?;
    let frames = frame_processing::read_frames(input, args.max_frame_gap)?;
    tracing::info!(frames = frames.len(), estimator = ?args.estimator, "tracking");

    let results = frames
        .iter()
        .map(|(frame, detections)| {
            let reports = tracker
                .track(detections)
                .with_context(|| format!("frame {frame}"))?;
            tracing::debug!(frame, tracks = reports.len(), "processed frame");
            Ok((*frame, reports))
        })
        .collect::<Result<Vec<_>>>()?;

    frame_processing::write_tracks(File::create(&args.output)?, &results)?;

    if let (Some(horizon), Some(path)) = (args.forecast, &args.forecast_output) {
        let forecasts = tracker.forecast(horizon, args.min_age)?;
        frame_processing::write_forecasts(File::create(path)?, &forecasts)?;
    }

    tracing::info!(
        frames = tracker.frame_count(),
        live_tracks = tracker.tracks().len(),
        "finished"
    );

    Ok(())
}
