use std::hash::{Hash, Hasher};

use crate::*;
use serde::Serialize;

/// Enumeration type for the single target track state:
///
/// - Newly created tracks are `Tentative` until they have been matched `min_hits` times.
/// - Then, the track state is `Confirmed` and the track is reported.
/// - Tracks that missed more than `max_age` consecutive cycles are `Expired` and removed at the end of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Expired,
}

/// What consumers of the tracker see of a reportable track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackReport {
    pub id: usize,
    pub position: Detection,
    pub color: Color,
}

/// Future positions of a track, one per forecast step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub id: usize,
    pub color: Color,
    pub positions: Vec<Detection>,
}

/// A single target track. Only the `TrackRegistry` mutates tracks.
pub struct Track {
    /// A unique track identifier.
    track_id: usize,
    /// The position estimate owned by this track.
    estimator: Box<dyn StateEstimator>,
    /// Every detection matched to this track, in arrival order, starting with the one that created it.
    history: Vec<Detection>,
    /// Total number of matched cycles.
    hits: usize,
    /// Number of consecutive cycles without a match.
    misses: usize,
    /// Total number of cycles since creation, including the creation cycle.
    age: usize,
    /// Display color.
    color: Color,
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("track_id", &self.track_id)
            .field("estimator", &self.estimator)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .field("age", &self.age)
            .field("color", &self.color)
            .finish()
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.track_id == other.track_id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.track_id.hash(state);
    }
}

impl Track {
    /// Returns a new Track
    ///
    /// # Parameters
    ///
    /// * `track_id`: A unique track identifier.
    /// * `detection`: The detection this track originates from.
    /// * `estimator`: The estimator initialised from `detection`.
    /// * `color`: Display color.
    pub fn new(
        track_id: usize,
        detection: Detection,
        estimator: Box<dyn StateEstimator>,
        color: Color,
    ) -> Track {
        Track {
            track_id,
            estimator,
            history: vec![detection],
            hits: 0,
            misses: 0,
            age: 1,
            color,
        }
    }

    /// Return the identifier of the track
    pub fn track_id(&self) -> usize {
        self.track_id
    }

    /// Return the estimator of the track
    pub fn estimator(&self) -> &dyn StateEstimator {
        self.estimator.as_ref()
    }

    /// Return the detections matched to the track
    pub fn history(&self) -> &[Detection] {
        &self.history
    }

    /// Return the number of matched cycles
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Return the number of consecutive missed cycles
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Return the number of cycles since creation
    pub fn age(&self) -> usize {
        self.age
    }

    /// Return the color of the track
    pub fn color(&self) -> Color {
        self.color
    }

    /// Returns the TrackState of the track for the given thresholds.
    pub fn state(&self, min_hits: usize, max_age: usize) -> TrackState {
        if self.is_expired(max_age) {
            TrackState::Expired
        } else if self.hits >= min_hits {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        }
    }

    /// Returns true if the track should be reported.
    pub fn is_reportable(&self, min_hits: usize, max_age: usize) -> bool {
        self.hits >= min_hits && self.misses <= max_age
    }

    /// Returns true if the track should be removed.
    pub fn is_expired(&self, max_age: usize) -> bool {
        self.misses > max_age
    }

    /// The position used to associate the track with the next detections.
    pub fn position(&self) -> Result<Detection> {
        self.estimator.position()
    }

    /// Returns the TrackReport of the track.
    pub fn report(&self) -> Result<TrackReport> {
        Ok(TrackReport {
            id: self.track_id,
            position: self.estimator.reported_position()?,
            color: self.color,
        })
    }

    /// Returns the next `steps` positions of the track assuming no further detections.
    pub fn forecast(&self, steps: usize) -> Result<Forecast> {
        Ok(Forecast {
            id: self.track_id,
            color: self.color,
            positions: self.estimator.forecast(steps)?,
        })
    }

    /// Incorporate a matched detection.
    pub(crate) fn mark_matched(&mut self, detection: Detection) -> Result<()> {
        self.estimator.update(&detection)?;
        self.history.push(detection);
        self.hits += 1;
        self.misses = 0;
        self.age += 1;
        Ok(())
    }

    /// Mark this track as missed for one cycle.
    pub(crate) fn mark_missed(&mut self) -> Result<()> {
        self.estimator.predict()?;
        self.misses += 1;
        self.age += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use anyhow::Result;

    fn track() -> Result<Track> {
        let detection = Detection::new(0.0, 100.0);
        let estimator = LinearMotionFactory::default().create(&detection)?;
        Ok(Track::new(1, detection, estimator, Color::new(1, 2, 3)))
    }

    #[test]
    fn new_track_is_tentative() -> Result<()> {
        let track = track()?;

        assert_eq!(track.hits(), 0);
        assert_eq!(track.misses(), 0);
        assert_eq!(track.age(), 1);
        assert_eq!(track.history(), &[Detection::new(0.0, 100.0)]);
        assert_eq!(track.state(1, 4), TrackState::Tentative);
        assert!(!track.is_reportable(1, 4));
        assert!(track.is_reportable(0, 4));

        Ok(())
    }

    #[test]
    fn matched_resets_misses() -> Result<()> {
        let mut track = track()?;

        track.mark_missed()?;
        track.mark_missed()?;
        assert_eq!(track.misses(), 2);

        track.mark_matched(Detection::new(1.0, 101.0))?;
        assert_eq!(track.misses(), 0);
        assert_eq!(track.hits(), 1);
        assert_eq!(track.age(), 4);
        assert_eq!(track.history().len(), 2);
        assert_eq!(track.state(1, 4), TrackState::Confirmed);

        Ok(())
    }

    #[test]
    fn expires_after_max_age_misses() -> Result<()> {
        let mut track = track()?;
        track.mark_matched(Detection::new(0.0, 100.0))?;

        for _ in 0..4 {
            track.mark_missed()?;
            assert!(!track.is_expired(4));
            assert!(track.is_reportable(1, 4));
        }

        track.mark_missed()?;
        assert!(track.is_expired(4));
        assert!(!track.is_reportable(1, 4));
        assert_eq!(track.state(1, 4), TrackState::Expired);

        Ok(())
    }

    #[test]
    fn report() -> Result<()> {
        let track = track()?;
        let report = track.report()?;

        assert_eq!(report.id, 1);
        assert_eq!(report.position, Detection::new(0.0, 100.0));
        assert_eq!(report.color, Color::new(1, 2, 3));

        Ok(())
    }
}
