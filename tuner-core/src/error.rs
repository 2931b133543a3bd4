//! # Error Types
//!
//! Typed faults for the tuner core. Per-buffer faults ([`FrameError`]) are
//! handled inside the processing loop and never reach the caller; control
//! surface misuse is reported as a [`TunerError`]. Startup failures (device
//! open, config loading) are carried as `anyhow::Error`.

/// A fault confined to a single audio buffer.
///
/// The processing loop discards every variant and moves on to the next buffer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// The capture source failed to deliver a buffer (timeout, disconnected stream).
    #[error("capture read failed: {0}")]
    Capture(String),
    /// The buffer does not match the estimator's configured frame size.
    #[error("buffer has {actual} samples, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    /// The autocorrelation never rises after lag 0.
    #[error("no autocorrelation peak after the initial slope")]
    NoPeak,
    /// The estimate falls outside the plausible guitar range.
    #[error("detected frequency {0:.2} Hz is outside the plausible range")]
    OutOfRange(f32),
}

/// Errors returned by the tuner's control surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TunerError {
    #[error("unknown string name: {0:?}")]
    UnknownString(String),
}
