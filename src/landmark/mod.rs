pub mod keypoint;

pub use keypoint::{Hand, HandLandmark, Keypoint, LandmarkSnapshot, Pose, PoseLandmark};
