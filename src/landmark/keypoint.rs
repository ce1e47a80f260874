use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// MediaPipe pose topology (33 points). Only the joints the exercises read
/// are named; the rest are addressed by raw index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEye = 2,
    RightEye = 5,
    LeftEar = 7,
    RightEar = 8,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftIndex = 19,
    RightIndex = 20,
    LeftHip = 23,
    RightHip = 24,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;
}

/// MediaPipe hand topology (21 points).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmark {
    pub const COUNT: usize = 21;

    /// Index, middle, ring and pinky tips. The thumb is excluded from curl
    /// classification.
    pub const FINGERTIPS: [HandLandmark; 4] = [
        HandLandmark::IndexTip,
        HandLandmark::MiddleTip,
        HandLandmark::RingTip,
        HandLandmark::PinkyTip,
    ];

    /// The joint two steps closer to the palm (PIP for a fingertip).
    pub fn pip_of(self) -> Option<Self> {
        match self {
            Self::IndexTip => Some(Self::IndexPip),
            Self::MiddleTip => Some(Self::MiddlePip),
            Self::RingTip => Some(Self::RingPip),
            Self::PinkyTip => Some(Self::PinkyPip),
            _ => None,
        }
    }
}

/// Single landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Normalized X (0.0..1.0)
    pub x: f32,
    /// Normalized Y (0.0..1.0), grows downward
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, z: 0.0, confidence }
    }

    pub fn at(x: f32, y: f32) -> Self {
        Self::new(x, y, 1.0)
    }

    pub fn xy(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            confidence: 0.0,
        }
    }
}

fn lookup(points: &[Keypoint], index: usize) -> Result<&Keypoint, TrackError> {
    let kp = points.get(index).ok_or(TrackError::MissingLandmark {
        index,
        len: points.len(),
    })?;
    if !kp.is_finite() {
        return Err(TrackError::NonFiniteCoordinate { index });
    }
    Ok(kp)
}

/// Body pose for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    /// All 33 points at the origin with zero confidence.
    pub fn blank() -> Self {
        Self::new(vec![Keypoint::default(); PoseLandmark::COUNT])
    }

    pub fn get(&self, index: PoseLandmark) -> Result<&Keypoint, TrackError> {
        lookup(&self.keypoints, index as usize)
    }

    pub fn set(&mut self, index: PoseLandmark, kp: Keypoint) {
        let i = index as usize;
        if self.keypoints.len() <= i {
            self.keypoints.resize(i + 1, Keypoint::default());
        }
        self.keypoints[i] = kp;
    }
}

/// One detected hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    pub landmarks: Vec<Keypoint>,
    #[serde(default)]
    pub handedness: Option<String>,
}

impl Hand {
    pub fn new(landmarks: Vec<Keypoint>) -> Self {
        Self {
            landmarks,
            handedness: None,
        }
    }

    pub fn blank() -> Self {
        Self::new(vec![Keypoint::default(); HandLandmark::COUNT])
    }

    pub fn get(&self, index: HandLandmark) -> Result<&Keypoint, TrackError> {
        lookup(&self.landmarks, index as usize)
    }

    pub fn set(&mut self, index: HandLandmark, kp: Keypoint) {
        let i = index as usize;
        if self.landmarks.len() <= i {
            self.landmarks.resize(i + 1, Keypoint::default());
        }
        self.landmarks[i] = kp;
    }
}

/// Everything the oracle found in one frame. Frames without any detection
/// are represented as `None` by the caller, not as an empty snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSnapshot {
    #[serde(default)]
    pub pose: Option<Pose>,
    #[serde(default)]
    pub hands: Vec<Hand>,
}

impl LandmarkSnapshot {
    pub fn with_pose(pose: Pose) -> Self {
        Self {
            pose: Some(pose),
            hands: Vec::new(),
        }
    }

    pub fn with_hands(hands: Vec<Hand>) -> Self {
        Self { pose: None, hands }
    }
}
