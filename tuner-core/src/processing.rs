//! # Processing Loop Module
//!
//! Runs the tuner pipeline on a dedicated thread:
//! capture -> pitch estimation -> target resolution -> evaluation -> observer.
//!
//! ## Architecture
//! - **Loop thread**: owns the capture source for its whole lifetime
//! - **Control**: the tuning mode is shared through a [`TargetSelector`]
//! - **Shutdown**: a crossbeam channel; stopping joins the thread after it has
//!   stopped and closed the capture

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use log::{debug, info, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::TuningReading;
use crate::config::{CaptureConfig, LoopConfig, TunerConfig};
use crate::error::{FrameError, TunerError};
use crate::evaluation::evaluate;
use crate::pitch::PitchEstimator;
use crate::tuning::{TuningMode, resolve_target};

/// A source of fixed-size mono sample buffers.
///
/// Opening is up to the implementor; the loop only reads, polls and releases.
pub trait CaptureSource {
    /// Sample rate of the delivered buffers in Hz.
    fn sample_rate(&self) -> u32;
    /// Whether a read can currently deliver data.
    fn is_active(&self) -> bool;
    /// Blocks until the next buffer is available.
    ///
    /// Overflow is never an error; failures here are transient and the loop
    /// skips the iteration.
    fn read_buffer(&mut self) -> Result<Vec<f32>, FrameError>;
    /// Stops delivering data.
    fn stop(&mut self) -> Result<()>;
    /// Releases the underlying device.
    fn close(&mut self);
}

/// Receives every reading the loop emits, on the loop thread.
///
/// Implementations must return quickly.
pub trait ReadingObserver {
    fn on_reading(&mut self, reading: TuningReading);
}

impl<F> ReadingObserver for F
where
    F: FnMut(TuningReading),
{
    fn on_reading(&mut self, reading: TuningReading) {
        self(reading)
    }
}

impl ReadingObserver for Sender<TuningReading> {
    fn on_reading(&mut self, reading: TuningReading) {
        match self.try_send(reading) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Reading channel full; dropping reading"),
            Err(TrySendError::Disconnected(_)) => trace!("Reading channel closed"),
        }
    }
}

/// The tuning mode shared between the control surface and the loop.
///
/// Cloning yields another handle to the same cell.
#[derive(Debug, Clone, Default)]
pub struct TargetSelector {
    mode: Arc<Mutex<TuningMode>>,
}

impl TargetSelector {
    pub fn new(mode: TuningMode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
        }
    }

    pub fn get(&self) -> TuningMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, mode: TuningMode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    /// Applies a selector value: "Auto" or a string name.
    ///
    /// Unknown names leave the current mode untouched.
    pub fn select(&self, selection: &str) -> Result<TuningMode, TunerError> {
        let mode = TuningMode::from_selection(selection)
            .ok_or_else(|| TunerError::UnknownString(selection.to_string()))?;
        self.set(mode);
        Ok(mode)
    }
}

/// Runs one buffer through the whole pipeline.
///
/// Unvoiced buffers give the silence reading. Voiced buffers are measured
/// against the target `mode` resolves to.
pub fn process_buffer(
    estimator: &PitchEstimator,
    samples: &[f32],
    mode: &TuningMode,
) -> Result<TuningReading, FrameError> {
    let detection = estimator.estimate(samples)?;
    if !detection.is_voiced {
        return Ok(TuningReading::silence());
    }

    let target = resolve_target(detection.frequency, mode);
    let evaluation = evaluate(detection.frequency, &target);
    Ok(TuningReading {
        frequency: detection.frequency,
        cents: evaluation.cents,
        note_name: target.note_name.to_string(),
        is_active: true,
    })
}

/// State owned by the loop thread.
struct ProcessingLoop<C, O> {
    capture: C,
    observer: O,
    estimator: PitchEstimator,
    target: TargetSelector,
    timing: LoopConfig,
    shutdown_rx: Receiver<()>,
}

impl<C: CaptureSource, O: ReadingObserver> ProcessingLoop<C, O> {
    fn run(mut self) {
        info!(
            "Processing loop started ({} Hz, {} samples per buffer)",
            self.estimator.sample_rate(),
            self.estimator.buffer_size()
        );

        while !self.stop_requested() {
            // Per-iteration faults, panics included, never end the loop.
            let pause = match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(pause)) => pause,
                Ok(Err(e)) => {
                    debug!("Skipping buffer: {}", e);
                    None
                }
                Err(_) => {
                    warn!("Analysis panicked; skipping buffer");
                    None
                }
            };

            if let Some(duration) = pause {
                if self.wait(duration) {
                    break;
                }
            }
        }

        info!("Processing loop stopping; releasing capture");
        if let Err(e) = self.capture.stop() {
            warn!("Error stopping capture: {}", e);
        }
        self.capture.close();
    }

    /// One iteration. Returns how long to pause before the next one.
    fn step(&mut self) -> Result<Option<Duration>, FrameError> {
        if !self.capture.is_active() {
            return Ok(Some(self.timing.idle_retry()));
        }

        let buffer = self.capture.read_buffer()?;
        let mode = self.target.get();
        let reading = process_buffer(&self.estimator, &buffer, &mode)?;

        if reading.is_active {
            trace!(
                "{:.2} Hz -> {} ({:+.1} cents)",
                reading.frequency, reading.note_name, reading.cents
            );
            self.observer.on_reading(reading);
            Ok(Some(self.timing.pacing()))
        } else {
            self.observer.on_reading(reading);
            Ok(None)
        }
    }

    fn stop_requested(&self) -> bool {
        !matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleeps for `duration` unless a stop arrives first. Returns true on stop.
    fn wait(&self, duration: Duration) -> bool {
        !matches!(
            self.shutdown_rx.recv_timeout(duration),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

/// Handle to a running tuner.
///
/// Dropping the handle stops the loop and waits for it to finish.
#[derive(Debug)]
pub struct Tuner {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
    target: TargetSelector,
    sample_rate: u32,
}

impl Tuner {
    /// Opens the capture on a new processing thread and starts the loop.
    ///
    /// `open_capture` runs on the processing thread, so the capture type does
    /// not need to be `Send`. Its failure is the one error this returns; once
    /// running, per-buffer faults are handled inside the loop.
    pub fn start<C, F, O>(config: &TunerConfig, open_capture: F, observer: O) -> Result<Self>
    where
        C: CaptureSource + 'static,
        F: FnOnce(&CaptureConfig) -> Result<C> + Send + 'static,
        O: ReadingObserver + Send + 'static,
    {
        config.validate()?;

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32>>(1);
        let target = TargetSelector::default();
        let loop_target = target.clone();
        let config = config.clone();

        let thread_handle = thread::Builder::new()
            .name("tuner-processing".into())
            .spawn(move || {
                let capture = match open_capture(&config.capture) {
                    Ok(capture) => capture,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let estimator = PitchEstimator::new(
                    capture.sample_rate(),
                    config.capture.buffer_size,
                    &config.pitch,
                );
                let _ = ready_tx.send(Ok(capture.sample_rate()));

                ProcessingLoop {
                    capture,
                    observer,
                    estimator,
                    target: loop_target,
                    timing: config.processing,
                    shutdown_rx,
                }
                .run();
            })
            .context("failed to spawn processing thread")?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Self {
                shutdown_tx,
                thread_handle: Some(thread_handle),
                target,
                sample_rate,
            }),
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e.context("failed to open audio capture"))
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(anyhow!("processing thread exited before the capture was opened"))
            }
        }
    }

    /// Sets the comparison target: "Auto" or one of the six string names.
    pub fn set_manual_target(&self, selection: &str) -> Result<(), TunerError> {
        let mode = self.target.select(selection)?;
        info!("Tuning mode set to {}", mode);
        Ok(())
    }

    pub fn tuning_mode(&self) -> TuningMode {
        self.target.get()
    }

    /// Another handle to the shared tuning mode.
    pub fn target_selector(&self) -> TargetSelector {
        self.target.clone()
    }

    /// Sample rate the capture settled on.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the loop, releases the capture and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = self.shutdown_tx.try_send(());
            if handle.join().is_err() {
                warn!("Processing thread panicked during shutdown");
            }
            info!("Processing thread finished");
        }
    }
}

impl Drop for Tuner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PitchConfig;

    #[test]
    fn selector_round_trip() {
        let selector = TargetSelector::default();
        assert_eq!(selector.get(), TuningMode::Auto);

        let mode = selector.select("D3").unwrap();
        assert_eq!(mode.label(), "D3");
        assert_eq!(selector.clone().get(), mode);

        assert_eq!(
            selector.select("Z9"),
            Err(TunerError::UnknownString("Z9".into()))
        );
        assert_eq!(selector.get().label(), "D3");

        selector.select("Auto").unwrap();
        assert_eq!(selector.get(), TuningMode::Auto);
    }

    #[test]
    fn selector_is_shared_across_threads() {
        let selector = TargetSelector::default();
        let writer = selector.clone();
        thread::spawn(move || writer.select("E4").unwrap())
            .join()
            .unwrap();
        assert_eq!(selector.get().label(), "E4");
    }

    #[test]
    fn process_buffer_pipeline() {
        let estimator = PitchEstimator::new(44_100, 4096, &PitchConfig::default());
        let samples: Vec<f32> = (0..4096)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 110.0 * i as f32 / 44_100.0).sin())
            .collect();

        let reading = process_buffer(&estimator, &samples, &TuningMode::Auto).unwrap();
        assert!(reading.is_active);
        assert_eq!(reading.note_name, "A2");
        assert!(reading.cents.abs() < 1.0);

        let silence = process_buffer(&estimator, &vec![0.0; 4096], &TuningMode::Auto).unwrap();
        assert_eq!(silence, TuningReading::silence());
    }
}
