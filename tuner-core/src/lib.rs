// tuner-core/src/lib.rs

//! The core logic for the guitar tuner.
//! This crate is responsible for audio capture, pitch detection, string
//! selection and cent calculations. It is completely headless
//! and contains no GUI code.

pub mod audio;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod fft;
pub mod pitch;
pub mod processing;
pub mod tuning;

pub use config::TunerConfig;
pub use error::{FrameError, TunerError};
pub use evaluation::{TuningEvaluation, TuningState};
pub use processing::{CaptureSource, ReadingObserver, TargetSelector, Tuner};
pub use tuning::{GUITAR_STRINGS, ReferenceNote, TuningMode};

/// Note name carried by silence readings.
pub const SILENCE: &str = "Silence";

/// One reading emitted by the processing loop.
///
/// Inactive readings (silence) carry zero frequency and cents.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningReading {
    /// The detected frequency in Hz.
    pub frequency: f32,
    /// The deviation from the target string in cents.
    pub cents: f32,
    /// The target string's name, or "Silence".
    pub note_name: String,
    /// False for silence.
    pub is_active: bool,
}

impl TuningReading {
    pub fn silence() -> Self {
        Self {
            frequency: 0.0,
            cents: 0.0,
            note_name: SILENCE.to_string(),
            is_active: false,
        }
    }

    /// State and meter position for an active reading.
    pub fn evaluation(&self) -> Option<TuningEvaluation> {
        self.is_active.then(|| TuningEvaluation::from_cents(self.cents))
    }
}
