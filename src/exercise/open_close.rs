use std::fmt;

use tracing::warn;

use super::{Exercise, ExerciseKind, Reading};
use crate::error::TrackError;
use crate::landmark::{Hand, HandLandmark, LandmarkSnapshot};

pub const NO_HAND_LABEL: &str = "No Hand";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandState {
    Unknown,
    FullyOpen,
    FullyClosed,
    HalfClosed,
}

impl HandState {
    /// Classify from the number of curled fingers (thumb excluded).
    pub fn from_curled(curled: usize) -> Self {
        match curled {
            0 => Self::FullyOpen,
            n if n >= HandLandmark::FINGERTIPS.len() => Self::FullyClosed,
            _ => Self::HalfClosed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::FullyOpen => "Fully Open",
            Self::FullyClosed => "Fully Closed",
            Self::HalfClosed => "Half Closed",
        }
    }
}

impl fmt::Display for HandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of fingertips lying below (greater y than) their PIP joint.
pub fn curled_fingers(hand: &Hand) -> Result<usize, TrackError> {
    let mut curled = 0;
    for tip in HandLandmark::FINGERTIPS {
        let Some(pip) = tip.pip_of() else { continue };
        if hand.get(tip)?.y > hand.get(pip)?.y {
            curled += 1;
        }
    }
    Ok(curled)
}

/// Counts full close -> open cycles of the hand.
#[derive(Debug, Clone)]
pub struct OpenCloseTracker {
    previous: HandState,
    count: u32,
}

impl OpenCloseTracker {
    pub fn new() -> Self {
        Self {
            previous: HandState::Unknown,
            count: 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn previous(&self) -> HandState {
        self.previous
    }

    /// Apply one classified hand state. Only the immediately preceding
    /// state matters: FullyClosed followed directly by FullyOpen counts.
    pub fn observe(&mut self, state: HandState) {
        if self.previous == HandState::FullyClosed && state == HandState::FullyOpen {
            self.count += 1;
        }
        self.previous = state;
    }

    fn reading(&self, label: &str) -> Reading {
        Reading {
            count: self.count,
            accuracy: 0.0,
            label: Some(label.to_string()),
            hold_secs: None,
            max_hold_secs: None,
        }
    }
}

impl Default for OpenCloseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Exercise for OpenCloseTracker {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::OpenClose
    }

    fn ingest(&mut self, snapshot: Option<&LandmarkSnapshot>) -> Reading {
        let hands = snapshot.map(|s| s.hands.as_slice()).unwrap_or_default();

        // Hands are applied in detection order; with two hands the last
        // one decides the transition.
        let mut label = None;
        for hand in hands {
            match curled_fingers(hand) {
                Ok(curled) => {
                    let state = HandState::from_curled(curled);
                    self.observe(state);
                    label = Some(state.label());
                }
                Err(e) => warn!("open/close: skipping hand: {e}"),
            }
        }

        self.reading(label.unwrap_or(NO_HAND_LABEL))
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}
