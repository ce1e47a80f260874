use tracing::warn;

use super::{Exercise, ExerciseKind, Reading};
use crate::config::RotationConfig;
use crate::error::TrackError;
use crate::geometry::{angle_deg, angle_delta};
use crate::landmark::{Hand, HandLandmark, LandmarkSnapshot};

/// Wrist direction (wrist -> middle knuckle) in degrees.
pub fn wrist_angle(hand: &Hand) -> Result<f32, TrackError> {
    let wrist = hand.get(HandLandmark::Wrist)?;
    let knuckle = hand.get(HandLandmark::MiddleMcp)?;
    Ok(angle_deg(wrist.xy(), knuckle.xy()))
}

/// Counts wrist rotation gestures from frame-to-frame angle jumps.
#[derive(Debug, Clone)]
pub struct RotationTracker {
    /// A jump larger than this counts a rotation (degrees)
    trigger_deg: f32,
    /// A jump smaller than this ends the gesture (degrees)
    settle_deg: f32,
    previous_angle: Option<f32>,
    count: u32,
    /// Set after counting, cleared once the wrist settles
    rotated_once: bool,
}

impl RotationTracker {
    pub fn new(trigger_deg: f32, settle_deg: f32) -> Self {
        Self {
            trigger_deg,
            settle_deg,
            previous_angle: None,
            count: 0,
            rotated_once: false,
        }
    }

    pub fn from_config(config: &RotationConfig) -> Self {
        Self::new(config.trigger_degrees, config.settle_degrees)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn rotated_once(&self) -> bool {
        self.rotated_once
    }

    pub fn previous_angle(&self) -> Option<f32> {
        self.previous_angle
    }

    /// Apply one wrist angle measurement.
    pub fn observe(&mut self, angle: f32) {
        if let Some(prev) = self.previous_angle {
            let diff = angle_delta(prev, angle).abs();
            if diff > self.trigger_deg && !self.rotated_once {
                self.count += 1;
                self.rotated_once = true;
            } else if diff < self.settle_deg {
                self.rotated_once = false;
            }
        }
        self.previous_angle = Some(angle);
    }
}

impl Default for RotationTracker {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}

impl Exercise for RotationTracker {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::WristRotation
    }

    fn ingest(&mut self, snapshot: Option<&LandmarkSnapshot>) -> Reading {
        if let Some(snapshot) = snapshot {
            for hand in &snapshot.hands {
                match wrist_angle(hand) {
                    Ok(angle) => self.observe(angle),
                    Err(e) => warn!("rotation: skipping hand: {e}"),
                }
            }
        }

        Reading {
            count: self.count,
            ..Reading::default()
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.trigger_deg, self.settle_deg);
    }
}
