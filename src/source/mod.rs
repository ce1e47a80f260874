//! Frame acquisition and landmark detection seams.
//!
//! The camera and the pose/hand estimator are external collaborators; the
//! session loop only sees these two traits.

pub mod replay;

use anyhow::Result;

use crate::landmark::LandmarkSnapshot;

pub use replay::{run_to_end, JsonOracle, ReplayCamera};

/// One captured frame. `data` is opaque to the session loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Monotonic per source, starting at 1
    pub id: u64,
    pub data: Vec<u8>,
}

pub trait FrameSource: Send {
    /// Read the next frame. Errors are transient: the caller skips the tick
    /// and tries again.
    fn read_frame(&mut self) -> Result<Frame>;
}

pub trait LandmarkOracle: Send {
    /// `Ok(None)` when nothing was detected in the frame.
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSnapshot>>;
}
