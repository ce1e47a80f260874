use serde::Deserialize;
use tracing::warn;

use super::{Exercise, ExerciseKind, Reading};
use crate::config::ArmRaiseConfig;
use crate::error::TrackError;
use crate::geometry::accuracy;
use crate::landmark::{LandmarkSnapshot, Pose, PoseLandmark};

/// Repetition counting or hold timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmRaiseMode {
    Reps,
    Hold,
}

/// Height the hands must rise above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePoint {
    Nose,
    /// Mean of both ears
    Ears,
}

/// Which pair of landmarks stands for the hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedPoint {
    Wrist,
    /// Index fingertips
    Index,
}

impl TrackedPoint {
    fn landmarks(self) -> (PoseLandmark, PoseLandmark) {
        match self {
            Self::Wrist => (PoseLandmark::LeftWrist, PoseLandmark::RightWrist),
            Self::Index => (PoseLandmark::LeftIndex, PoseLandmark::RightIndex),
        }
    }
}

/// Per-frame measurements the state machine runs on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaiseSignal {
    pub left: [f32; 2],
    pub right: [f32; 2],
    /// Mean y of the tracked points
    pub avg_y: f32,
    /// Threshold y; smaller y is higher on screen
    pub reference_y: f32,
}

impl RaiseSignal {
    pub fn is_raised(&self) -> bool {
        self.avg_y < self.reference_y
    }
}

/// Arm raise + join hands.
///
/// Rep mode: Lowered -> Raised when the hands pass above the reference,
/// Raised -> Lowered once they drop below `reference + margin`. The rep
/// counts only if the hands were close enough together while raised.
///
/// Hold mode: counts consecutive raised frames.
#[derive(Debug, Clone)]
pub struct ArmRaiseTracker {
    mode: ArmRaiseMode,
    reference: ReferencePoint,
    tracked: TrackedPoint,
    reference_offset: f32,
    margin: f32,
    accuracy_scale: f32,
    min_rep_accuracy: f32,
    assumed_fps: f32,
    raised: bool,
    accuracy: f32,
    /// Accuracy of the latest raised frame in the current raise
    raised_accuracy: f32,
    count: u32,
    hold_ticks: u32,
    max_hold_ticks: u32,
}

impl ArmRaiseTracker {
    pub fn from_config(config: &ArmRaiseConfig) -> Self {
        Self {
            mode: config.mode,
            reference: config.reference,
            tracked: config.tracked_point,
            reference_offset: config.reference_offset,
            margin: config.margin,
            accuracy_scale: config.accuracy_scale,
            min_rep_accuracy: config.min_rep_accuracy,
            assumed_fps: config.assumed_fps,
            raised: false,
            accuracy: 0.0,
            raised_accuracy: 0.0,
            count: 0,
            hold_ticks: 0,
            max_hold_ticks: 0,
        }
    }

    pub fn mode(&self) -> ArmRaiseMode {
        self.mode
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn accuracy(&self) -> f32 {
        self.accuracy
    }

    pub fn hold_ticks(&self) -> u32 {
        self.hold_ticks
    }

    pub fn max_hold_ticks(&self) -> u32 {
        self.max_hold_ticks
    }

    pub fn hold_secs(&self) -> f32 {
        self.ticks_to_secs(self.hold_ticks)
    }

    pub fn max_hold_secs(&self) -> f32 {
        self.ticks_to_secs(self.max_hold_ticks)
    }

    fn ticks_to_secs(&self, ticks: u32) -> f32 {
        ticks as f32 / self.assumed_fps
    }

    pub fn measure(&self, pose: &Pose) -> Result<RaiseSignal, TrackError> {
        let (l, r) = self.tracked.landmarks();
        let left = pose.get(l)?.xy();
        let right = pose.get(r)?.xy();

        let base_y = match self.reference {
            ReferencePoint::Nose => pose.get(PoseLandmark::Nose)?.y,
            ReferencePoint::Ears => {
                let left_ear = pose.get(PoseLandmark::LeftEar)?;
                let right_ear = pose.get(PoseLandmark::RightEar)?;
                (left_ear.y + right_ear.y) / 2.0
            }
        };

        Ok(RaiseSignal {
            left,
            right,
            avg_y: (left[1] + right[1]) / 2.0,
            reference_y: base_y + self.reference_offset,
        })
    }

    /// Advance by one frame of measurements, `None` when nothing usable
    /// was detected.
    pub fn observe(&mut self, signal: Option<RaiseSignal>) {
        let Some(signal) = signal else {
            // Lost detection: neutral accuracy and the hold breaks, but a
            // raise in progress is not resolved.
            self.accuracy = 0.0;
            if self.mode == ArmRaiseMode::Hold {
                self.hold_ticks = 0;
                self.raised = false;
            }
            return;
        };

        let above = signal.is_raised();
        self.accuracy = if above {
            accuracy(signal.left, signal.right, self.accuracy_scale)
        } else {
            0.0
        };

        match self.mode {
            ArmRaiseMode::Reps => {
                if above {
                    self.raised = true;
                    self.raised_accuracy = self.accuracy;
                } else if self.raised && signal.avg_y > signal.reference_y + self.margin {
                    if self.raised_accuracy >= self.min_rep_accuracy {
                        self.count += 1;
                    }
                    self.raised = false;
                    self.raised_accuracy = 0.0;
                }
            }
            ArmRaiseMode::Hold => {
                self.raised = above;
                if above {
                    self.hold_ticks += 1;
                    self.max_hold_ticks = self.max_hold_ticks.max(self.hold_ticks);
                } else {
                    self.hold_ticks = 0;
                }
            }
        }
    }

    fn reading(&self) -> Reading {
        match self.mode {
            ArmRaiseMode::Reps => Reading {
                count: self.count,
                accuracy: self.accuracy,
                ..Reading::default()
            },
            ArmRaiseMode::Hold => Reading {
                count: self.hold_ticks,
                accuracy: self.accuracy,
                label: None,
                hold_secs: Some(self.hold_secs()),
                max_hold_secs: Some(self.max_hold_secs()),
            },
        }
    }
}

impl Default for ArmRaiseTracker {
    fn default() -> Self {
        Self::from_config(&ArmRaiseConfig::default())
    }
}

impl Exercise for ArmRaiseTracker {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::ArmRaise
    }

    fn ingest(&mut self, snapshot: Option<&LandmarkSnapshot>) -> Reading {
        let signal = match snapshot.and_then(|s| s.pose.as_ref()) {
            Some(pose) => match self.measure(pose) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    warn!("arm raise: unusable pose: {e}");
                    None
                }
            },
            None => None,
        };
        self.observe(signal);
        self.reading()
    }

    fn reset(&mut self) {
        self.raised = false;
        self.accuracy = 0.0;
        self.raised_accuracy = 0.0;
        self.count = 0;
        self.hold_ticks = 0;
        self.max_hold_ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::Keypoint;

    const NOSE_Y: f32 = 0.3;

    fn make_pose(left_wrist: (f32, f32), right_wrist: (f32, f32)) -> Pose {
        let mut pose = Pose::blank();
        pose.set(PoseLandmark::Nose, Keypoint::at(0.5, NOSE_Y));
        pose.set(PoseLandmark::LeftEar, Keypoint::at(0.45, 0.28));
        pose.set(PoseLandmark::RightEar, Keypoint::at(0.55, 0.32));
        pose.set(PoseLandmark::LeftWrist, Keypoint::at(left_wrist.0, left_wrist.1));
        pose.set(PoseLandmark::RightWrist, Keypoint::at(right_wrist.0, right_wrist.1));
        pose
    }

    fn frame(pose: Pose) -> LandmarkSnapshot {
        LandmarkSnapshot::with_pose(pose)
    }

    fn reps_tracker() -> ArmRaiseTracker {
        ArmRaiseTracker::default()
    }

    fn hold_tracker() -> ArmRaiseTracker {
        ArmRaiseTracker::from_config(&ArmRaiseConfig {
            mode: ArmRaiseMode::Hold,
            ..ArmRaiseConfig::default()
        })
    }

    // Wrists above the nose, 0.02 apart -> accuracy 92
    fn raised_close() -> LandmarkSnapshot {
        frame(make_pose((0.49, 0.2), (0.51, 0.2)))
    }

    // Wrists above the nose, 0.1 apart -> accuracy 60
    fn raised_apart() -> LandmarkSnapshot {
        frame(make_pose((0.45, 0.2), (0.55, 0.2)))
    }

    // Wrists well below nose + 0.15
    fn lowered() -> LandmarkSnapshot {
        frame(make_pose((0.3, 0.6), (0.7, 0.6)))
    }

    #[test]
    fn test_rep_counted_with_good_accuracy() {
        let mut t = reps_tracker();
        let up = t.ingest(Some(&raised_close()));
        assert!((up.accuracy - 92.0).abs() < 0.01);
        assert!(t.is_raised());

        let down = t.ingest(Some(&lowered()));
        assert_eq!(down.count, 1);
        assert_eq!(down.accuracy, 0.0);
        assert!(!t.is_raised());
    }

    #[test]
    fn test_rep_rejected_with_poor_accuracy() {
        let mut t = reps_tracker();
        let up = t.ingest(Some(&raised_apart()));
        assert!((up.accuracy - 60.0).abs() < 0.01);
        t.ingest(Some(&lowered()));
        assert_eq!(t.count(), 0);
        assert!(!t.is_raised());
    }

    #[test]
    fn test_hysteresis_band_does_not_lower() {
        let mut t = reps_tracker();
        t.ingest(Some(&raised_close()));
        // Below the nose but inside the 0.15 margin
        t.ingest(Some(&frame(make_pose((0.49, 0.4), (0.51, 0.4)))));
        assert!(t.is_raised());
        assert_eq!(t.count(), 0);
        t.ingest(Some(&lowered()));
        assert_eq!(t.count(), 1);
    }

    #[test]
    fn test_accuracy_zero_when_not_raised() {
        let mut t = reps_tracker();
        // Hands touching but at chest height
        let reading = t.ingest(Some(&frame(make_pose((0.5, 0.5), (0.5, 0.5)))));
        assert_eq!(reading.accuracy, 0.0);
    }

    #[test]
    fn test_lost_detection_does_not_resolve_rep() {
        let mut t = reps_tracker();
        t.ingest(Some(&raised_close()));
        let reading = t.ingest(None);
        assert_eq!(reading.accuracy, 0.0);
        assert!(t.is_raised());
        assert_eq!(t.count(), 0);
        // The raise resolves on the next clear lowering.
        t.ingest(Some(&lowered()));
        assert_eq!(t.count(), 1);
    }

    #[test]
    fn test_multiple_reps() {
        let mut t = reps_tracker();
        for _ in 0..3 {
            t.ingest(Some(&raised_close()));
            t.ingest(Some(&raised_close()));
            t.ingest(Some(&lowered()));
        }
        assert_eq!(t.count(), 3);
    }

    #[test]
    fn test_ear_reference_with_index_tips() {
        let mut t = ArmRaiseTracker::from_config(&ArmRaiseConfig {
            reference: ReferencePoint::Ears,
            tracked_point: TrackedPoint::Index,
            margin: 0.08,
            ..ArmRaiseConfig::default()
        });
        let mut pose = Pose::blank();
        pose.set(PoseLandmark::LeftEar, Keypoint::at(0.45, 0.28));
        pose.set(PoseLandmark::RightEar, Keypoint::at(0.55, 0.32));
        pose.set(PoseLandmark::LeftIndex, Keypoint::at(0.5, 0.25));
        pose.set(PoseLandmark::RightIndex, Keypoint::at(0.5, 0.25));
        let signal = t.measure(&pose).unwrap();
        assert!((signal.reference_y - 0.3).abs() < 1e-6);
        assert!(signal.is_raised());

        assert_eq!(t.ingest(Some(&frame(pose))).accuracy, 100.0);

        let mut low = Pose::blank();
        low.set(PoseLandmark::LeftEar, Keypoint::at(0.45, 0.28));
        low.set(PoseLandmark::RightEar, Keypoint::at(0.55, 0.32));
        low.set(PoseLandmark::LeftIndex, Keypoint::at(0.4, 0.4));
        low.set(PoseLandmark::RightIndex, Keypoint::at(0.6, 0.4));
        t.ingest(Some(&frame(low)));
        assert_eq!(t.count(), 1);
    }

    #[test]
    fn test_hold_three_seconds() {
        let mut t = hold_tracker();
        let mut reading = Reading::default();
        for _ in 0..90 {
            reading = t.ingest(Some(&raised_close()));
        }
        assert_eq!(t.max_hold_ticks(), 90);
        assert_eq!(reading.hold_secs, Some(3.0));
        assert_eq!(reading.max_hold_secs, Some(3.0));
    }

    #[test]
    fn test_hold_resets_but_keeps_max() {
        let mut t = hold_tracker();
        for _ in 0..45 {
            t.ingest(Some(&raised_close()));
        }
        let reading = t.ingest(Some(&lowered()));
        assert_eq!(t.hold_ticks(), 0);
        assert_eq!(reading.hold_secs, Some(0.0));
        assert_eq!(reading.max_hold_secs, Some(1.5));

        for _ in 0..15 {
            t.ingest(Some(&raised_close()));
        }
        assert_eq!(t.hold_ticks(), 15);
        assert_eq!(t.max_hold_ticks(), 45);
    }

    #[test]
    fn test_hold_breaks_on_lost_detection() {
        let mut t = hold_tracker();
        for _ in 0..10 {
            t.ingest(Some(&raised_close()));
        }
        t.ingest(None);
        assert_eq!(t.hold_ticks(), 0);
        assert_eq!(t.max_hold_ticks(), 10);
    }

    #[test]
    fn test_missing_pose_is_no_detection() {
        let mut t = reps_tracker();
        t.ingest(Some(&raised_close()));
        let reading = t.ingest(Some(&LandmarkSnapshot::default()));
        assert_eq!(reading.accuracy, 0.0);
        assert!(t.is_raised());

        let truncated = frame(Pose::new(vec![Keypoint::at(0.5, 0.3); 10]));
        let reading = t.ingest(Some(&truncated));
        assert_eq!(reading.accuracy, 0.0);
        assert!(t.is_raised());
    }

    #[test]
    fn test_reset() {
        let mut t = hold_tracker();
        for _ in 0..5 {
            t.ingest(Some(&raised_close()));
        }
        t.reset();
        assert_eq!(t.hold_ticks(), 0);
        assert_eq!(t.max_hold_ticks(), 0);
        assert_eq!(t.accuracy(), 0.0);
        assert_eq!(t.mode(), ArmRaiseMode::Hold);
    }
}
