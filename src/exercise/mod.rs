//! Per-exercise state machines.
//!
//! Each tracker owns only the fields it needs across frames and is driven
//! one snapshot at a time through [`Exercise::ingest`]. Nothing here knows
//! about frame sources, timers or delivery.

pub mod arm_raise;
pub mod open_close;
pub mod rotation;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ExerciseConfig;
use crate::error::TrackError;
use crate::landmark::LandmarkSnapshot;

pub use arm_raise::{ArmRaiseMode, ArmRaiseTracker, ReferencePoint, TrackedPoint};
pub use open_close::{HandState, OpenCloseTracker};
pub use rotation::RotationTracker;

/// Exercise selector used by control messages and feed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseKind {
    OpenClose,
    WristRotation,
    ArmRaise,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 3] = [Self::OpenClose, Self::WristRotation, Self::ArmRaise];

    /// Short name used by the web client (`start_<name>` / `stop_<name>`).
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenClose => "openclose",
            Self::WristRotation => "rotation",
            Self::ArmRaise => "joinhands",
        }
    }

    /// Event name the web client listens on for this exercise's feed.
    pub fn feed_event(self) -> &'static str {
        match self {
            Self::OpenClose => "video_feed",
            Self::WristRotation => "rotation_feed",
            Self::ArmRaise => "joinhands_feed",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExerciseKind {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "openclose" | "open_close" => Ok(Self::OpenClose),
            "rotation" | "wrist_rotation" => Ok(Self::WristRotation),
            "joinhands" | "join_hands" | "arm_raise" => Ok(Self::ArmRaise),
            _ => Err(TrackError::UnknownExercise(s.to_string())),
        }
    }
}

/// Per-frame tracker output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Repetitions, open/close cycles or rotations so far.
    pub count: u32,
    /// Proximity accuracy in percent; 0 outside the exercise's precondition.
    pub accuracy: f32,
    /// Human-readable state, e.g. the classified hand state.
    pub label: Option<String>,
    /// Current hold in seconds (hold mode only).
    pub hold_secs: Option<f32>,
    /// Longest hold of the session in seconds (hold mode only).
    pub max_hold_secs: Option<f32>,
}

/// Shared capability of all exercise state machines.
pub trait Exercise {
    fn kind(&self) -> ExerciseKind;

    /// Advance by one frame. `None` means the oracle detected nothing.
    fn ingest(&mut self, snapshot: Option<&LandmarkSnapshot>) -> Reading;

    /// Back to the initial state of a fresh session.
    fn reset(&mut self);
}

/// The state of the one active session.
#[derive(Debug, Clone)]
pub enum ExerciseState {
    OpenClose(OpenCloseTracker),
    WristRotation(RotationTracker),
    ArmRaise(ArmRaiseTracker),
}

impl ExerciseState {
    pub fn new(kind: ExerciseKind, config: &ExerciseConfig) -> Self {
        match kind {
            ExerciseKind::OpenClose => Self::OpenClose(OpenCloseTracker::new()),
            ExerciseKind::WristRotation => {
                Self::WristRotation(RotationTracker::from_config(&config.rotation))
            }
            ExerciseKind::ArmRaise => {
                Self::ArmRaise(ArmRaiseTracker::from_config(&config.arm_raise))
            }
        }
    }

    fn inner(&mut self) -> &mut dyn Exercise {
        match self {
            Self::OpenClose(t) => t,
            Self::WristRotation(t) => t,
            Self::ArmRaise(t) => t,
        }
    }
}

impl Exercise for ExerciseState {
    fn kind(&self) -> ExerciseKind {
        match self {
            Self::OpenClose(_) => ExerciseKind::OpenClose,
            Self::WristRotation(_) => ExerciseKind::WristRotation,
            Self::ArmRaise(_) => ExerciseKind::ArmRaise,
        }
    }

    fn ingest(&mut self, snapshot: Option<&LandmarkSnapshot>) -> Reading {
        self.inner().ingest(snapshot)
    }

    fn reset(&mut self) {
        self.inner().reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("openclose".parse::<ExerciseKind>(), Ok(ExerciseKind::OpenClose));
        assert_eq!("Wrist-Rotation".parse::<ExerciseKind>(), Ok(ExerciseKind::WristRotation));
        assert_eq!("joinhands".parse::<ExerciseKind>(), Ok(ExerciseKind::ArmRaise));
        assert_eq!("arm_raise".parse::<ExerciseKind>(), Ok(ExerciseKind::ArmRaise));
        assert_eq!(
            "squat".parse::<ExerciseKind>(),
            Err(TrackError::UnknownExercise("squat".to_string()))
        );
    }

    #[test]
    fn test_name_round_trips_through_parse() {
        for kind in ExerciseKind::ALL {
            assert_eq!(kind.name().parse::<ExerciseKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_feed_event_names() {
        assert_eq!(ExerciseKind::OpenClose.feed_event(), "video_feed");
        assert_eq!(ExerciseKind::WristRotation.feed_event(), "rotation_feed");
        assert_eq!(ExerciseKind::ArmRaise.feed_event(), "joinhands_feed");
    }

    #[test]
    fn test_state_kind_matches_request() {
        let config = ExerciseConfig::default();
        for kind in ExerciseKind::ALL {
            assert_eq!(ExerciseState::new(kind, &config).kind(), kind);
        }
    }

    #[test]
    fn test_state_no_detection_is_neutral() {
        let config = ExerciseConfig::default();
        for kind in ExerciseKind::ALL {
            let mut state = ExerciseState::new(kind, &config);
            let reading = state.ingest(None);
            assert_eq!(reading.count, 0);
            assert_eq!(reading.accuracy, 0.0);
        }
    }
}
