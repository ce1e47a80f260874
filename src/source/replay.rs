//! Recorded landmark playback.
//!
//! A recording is a JSON-lines file: one [`LandmarkSnapshot`] per line, or
//! `null` for a frame without detection. [`ReplayCamera`] serves the lines
//! as frame payloads and [`JsonOracle`] decodes them back.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{Frame, FrameSource, LandmarkOracle};
use crate::error::TrackError;
use crate::exercise::Exercise;
use crate::landmark::LandmarkSnapshot;
use crate::protocol::FeedEvent;

pub struct ReplayCamera {
    lines: Vec<Vec<u8>>,
    cursor: usize,
    next_id: u64,
    looping: bool,
}

impl ReplayCamera {
    pub fn new(lines: Vec<Vec<u8>>, looping: bool) -> Result<Self> {
        if lines.is_empty() {
            return Err(TrackError::EmptyRecording.into());
        }
        Ok(Self {
            lines,
            cursor: 0,
            next_id: 1,
            looping,
        })
    }

    /// Load a JSON-lines recording. Blank lines are ignored.
    pub fn load<P: AsRef<Path>>(path: P, looping: bool) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read recording {}", path.display()))?;
        let lines: Vec<Vec<u8>> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.as_bytes().to_vec())
            .collect();
        info!("recording {}: {} frames", path.display(), lines.len());
        Self::new(lines, looping)
    }

    /// Build a recording in memory.
    pub fn from_snapshots(snapshots: &[Option<LandmarkSnapshot>], looping: bool) -> Result<Self> {
        let lines = snapshots
            .iter()
            .map(serde_json::to_vec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(lines, looping)
    }
}

impl FrameSource for ReplayCamera {
    fn read_frame(&mut self) -> Result<Frame> {
        if self.cursor >= self.lines.len() {
            if !self.looping {
                return Err(TrackError::RecordingExhausted(self.next_id - 1).into());
            }
            self.cursor = 0;
        }
        let data = self.lines[self.cursor].clone();
        self.cursor += 1;

        let id = self.next_id;
        self.next_id += 1;
        Ok(Frame { id, data })
    }
}

/// Decodes landmark snapshots carried as JSON in the frame payload.
#[derive(Debug, Default)]
pub struct JsonOracle;

impl JsonOracle {
    pub fn new() -> Self {
        Self
    }
}

impl LandmarkOracle for JsonOracle {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSnapshot>> {
        let snapshot: Option<LandmarkSnapshot> = serde_json::from_slice(&frame.data)
            .with_context(|| format!("frame {}: invalid landmark payload", frame.id))?;
        Ok(snapshot)
    }
}

/// Run `exercise` over a non-looping recording as fast as frames can be
/// read, handing every feed event to `on_event`. Frames the oracle cannot
/// decode count as no detection. Returns the number of frames processed.
pub fn run_to_end<E: Exercise + ?Sized>(
    camera: &mut ReplayCamera,
    oracle: &mut dyn LandmarkOracle,
    exercise: &mut E,
    mut on_event: impl FnMut(FeedEvent),
) -> Result<u64> {
    let mut frames = 0;
    loop {
        let frame = match camera.read_frame() {
            Ok(frame) => frame,
            Err(e) => match e.downcast_ref::<TrackError>() {
                Some(TrackError::RecordingExhausted(_)) => return Ok(frames),
                _ => return Err(e),
            },
        };

        let snapshot = oracle.detect(&frame).unwrap_or_else(|e| {
            warn!("detection failed on frame {}: {e:#}", frame.id);
            None
        });
        let reading = exercise.ingest(snapshot.as_ref());
        on_event(FeedEvent::new(exercise.kind(), frame.id, reading));
        frames += 1;
    }
}
