//! Domain errors of the tracking core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    #[error("landmark {index} missing: snapshot has {len} points")]
    MissingLandmark { index: usize, len: usize },

    #[error("landmark {index} has non-finite coordinates")]
    NonFiniteCoordinate { index: usize },

    #[error("unknown exercise: {0}")]
    UnknownExercise(String),

    #[error("recording exhausted after {0} frames")]
    RecordingExhausted(u64),

    #[error("recording is empty")]
    EmptyRecording,
}
