//! # Configuration Module
//!
//! Runtime settings for capture, pitch estimation and loop pacing. Every
//! field has a default matching the standard guitar tuner setup, so a config
//! file only needs to name the values it changes.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the tuner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub capture: CaptureConfig,
    pub pitch: PitchConfig,
    #[serde(rename = "loop")]
    pub processing: LoopConfig,
}

/// Audio capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Requested sample rate in Hz. The device may settle on a nearby rate.
    pub sample_rate: u32,
    /// Requested channel count. Multi-channel input is down-mixed to mono.
    pub channels: u16,
    /// Samples per analysis buffer.
    pub buffer_size: usize,
    /// How long a buffer read may block before it counts as a transient fault.
    pub read_timeout_ms: u64,
    /// Number of complete buffers queued between the device and the loop.
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            buffer_size: 4096,
            read_timeout_ms: 500,
            queue_depth: 4,
        }
    }
}

impl CaptureConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Pitch estimator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// RMS level below which a buffer is treated as silence.
    pub noise_threshold: f32,
    /// Lowest frequency accepted as a guitar fundamental.
    pub min_frequency: f32,
    /// Highest frequency accepted as a guitar fundamental.
    pub max_frequency: f32,
    /// Normalize the correlation by the window's own autocorrelation before
    /// refining the peak. Removes the sharp bias the Hann envelope introduces.
    pub compensate_window_bias: bool,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 0.02,
            min_frequency: 60.0,
            max_frequency: 500.0,
            compensate_window_bias: true,
        }
    }
}

/// Processing loop pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Wait between polls while the capture source is inactive.
    pub idle_retry_ms: u64,
    /// Delay after each voiced reading.
    pub pacing_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            idle_retry_ms: 100,
            pacing_ms: 50,
        }
    }
}

impl LoopConfig {
    pub fn idle_retry(&self) -> Duration {
        Duration::from_millis(self.idle_retry_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl TunerConfig {
    /// Loads a configuration from a JSON file and validates it.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: TunerConfig = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings the estimator and capture rely on.
    pub fn validate(&self) -> Result<()> {
        if self.capture.sample_rate == 0 {
            bail!("sample_rate must be positive");
        }
        if self.capture.channels == 0 {
            bail!("channels must be positive");
        }
        if self.capture.buffer_size < 4 {
            bail!("buffer_size must be at least 4, got {}", self.capture.buffer_size);
        }
        if self.capture.queue_depth == 0 {
            bail!("queue_depth must be positive");
        }
        let pitch = &self.pitch;
        if !(pitch.min_frequency > 0.0 && pitch.min_frequency < pitch.max_frequency) {
            bail!(
                "frequency range {}..{} Hz is empty or non-positive",
                pitch.min_frequency,
                pitch.max_frequency
            );
        }
        if !(pitch.noise_threshold >= 0.0) {
            bail!("noise_threshold must be non-negative");
        }
        Ok(())
    }
}
