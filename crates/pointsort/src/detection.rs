use crate::{Result, TrackingError};
use ndarray::*;
use serde::{Deserialize, Serialize};

/// Detection represents a single point observation in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Horizontal coordinate.
    x: f32,
    /// Vertical coordinate.
    y: f32,
}

impl Detection {
    /// Returns a new Detection
    ///
    /// # Parameters
    ///
    /// * `x`: Horizontal coordinate.
    /// * `y`: Vertical coordinate.
    pub fn new(x: f32, y: f32) -> Detection {
        Detection { x, y }
    }

    /// Returns the x of the detection
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Returns the y of the detection
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Returns the detection as a measurement vector `(x, y)`.
    pub fn to_xy(&self) -> Array1<f32> {
        arr1::<f32>(&[self.x, self.y])
    }

    /// Returns the Euclidean distance between two detections.
    pub fn distance(&self, other: &Detection) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns true if both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl TryFrom<&[f32]> for Detection {
    type Error = TrackingError;

    fn try_from(values: &[f32]) -> Result<Self> {
        match values {
            [x, y] => Ok(Detection::new(*x, *y)),
            _ => Err(TrackingError::DimensionMismatch {
                expected: 2,
                found: values.len(),
            }),
        }
    }
}

impl TryFrom<ArrayView1<'_, f32>> for Detection {
    type Error = TrackingError;

    fn try_from(values: ArrayView1<'_, f32>) -> Result<Self> {
        match values.len() {
            2 => Ok(Detection::new(values[0], values[1])),
            found => Err(TrackingError::DimensionMismatch { expected: 2, found }),
        }
    }
}
