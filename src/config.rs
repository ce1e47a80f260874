use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::exercise::{ArmRaiseMode, ReferencePoint, TrackedPoint};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub exercise: ExerciseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Feed/control listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Session loop rate
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// Feed events buffered per subscriber before it starts lagging
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

fn default_listen_addr() -> String { "0.0.0.0:5000".to_string() }
fn default_target_fps() -> u32 { 30 }
fn default_feed_capacity() -> usize { 64 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            target_fps: default_target_fps(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Landmark recording (JSON lines)
    #[serde(default = "default_recording")]
    pub recording: String,
    /// Restart from the first frame when the recording ends
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,
}

fn default_recording() -> String { "recordings/session.jsonl".to_string() }
fn default_loop_playback() -> bool { true }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            recording: default_recording(),
            loop_playback: default_loop_playback(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_dir() -> String { "logs".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: default_log_dir() }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExerciseConfig {
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub arm_raise: ArmRaiseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RotationConfig {
    /// Angle jump (degrees/frame) that counts a rotation
    #[serde(default = "default_trigger_degrees")]
    pub trigger_degrees: f32,
    /// Angle jump below which the wrist is considered settled
    #[serde(default = "default_settle_degrees")]
    pub settle_degrees: f32,
}

fn default_trigger_degrees() -> f32 { 30.0 }
fn default_settle_degrees() -> f32 { 10.0 }

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            trigger_degrees: default_trigger_degrees(),
            settle_degrees: default_settle_degrees(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArmRaiseConfig {
    #[serde(default = "default_mode")]
    pub mode: ArmRaiseMode,
    #[serde(default = "default_reference")]
    pub reference: ReferencePoint,
    #[serde(default = "default_tracked_point")]
    pub tracked_point: TrackedPoint,
    /// Added to the reference y (normalized units)
    #[serde(default)]
    pub reference_offset: f32,
    /// Hysteresis below the reference before a raise counts as lowered
    #[serde(default = "default_margin")]
    pub margin: f32,
    /// Hand distance at which accuracy reaches 0
    #[serde(default = "default_accuracy_scale")]
    pub accuracy_scale: f32,
    /// Minimum accuracy (%) for a repetition to count
    #[serde(default = "default_min_rep_accuracy")]
    pub min_rep_accuracy: f32,
    /// Frame rate used to convert hold ticks to seconds
    #[serde(default = "default_assumed_fps")]
    pub assumed_fps: f32,
}

fn default_mode() -> ArmRaiseMode { ArmRaiseMode::Reps }
fn default_reference() -> ReferencePoint { ReferencePoint::Nose }
fn default_tracked_point() -> TrackedPoint { TrackedPoint::Wrist }
fn default_margin() -> f32 { 0.15 }
fn default_accuracy_scale() -> f32 { 0.25 }
fn default_min_rep_accuracy() -> f32 { 80.0 }
fn default_assumed_fps() -> f32 { 30.0 }

impl Default for ArmRaiseConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            reference: default_reference(),
            tracked_point: default_tracked_point(),
            reference_offset: 0.0,
            margin: default_margin(),
            accuracy_scale: default_accuracy_scale(),
            min_rep_accuracy: default_min_rep_accuracy(),
            assumed_fps: default_assumed_fps(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Reject values the trackers cannot turn into finite readings.
    pub fn validate(&self) -> Result<()> {
        let rotation = &self.exercise.rotation;
        if rotation.settle_degrees > rotation.trigger_degrees {
            bail!(
                "rotation.settle_degrees ({}) exceeds trigger_degrees ({})",
                rotation.settle_degrees,
                rotation.trigger_degrees
            );
        }

        let arm = &self.exercise.arm_raise;
        if arm.accuracy_scale.is_nan() || arm.accuracy_scale <= 0.0 {
            bail!("arm_raise.accuracy_scale must be positive, got {}", arm.accuracy_scale);
        }
        if arm.assumed_fps.is_nan() || arm.assumed_fps <= 0.0 {
            bail!("arm_raise.assumed_fps must be positive, got {}", arm.assumed_fps);
        }
        if arm.margin.is_nan() || arm.margin < 0.0 {
            bail!("arm_raise.margin must not be negative, got {}", arm.margin);
        }
        Ok(())
    }

    /// Like [`Config::load`], falling back to defaults on any error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("using default config: {e:#}");
                Self::default()
            }
        }
    }
}
