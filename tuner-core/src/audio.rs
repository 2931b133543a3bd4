//! # Audio Capture Module
//!
//! This module captures live audio from the default input device using CPAL
//! (Cross-Platform Audio Library) and hands the processing loop fixed-size
//! buffers of mono `f32` samples through the [`CaptureSource`] contract.
//!
//! ## Features
//! - Automatic input device and format selection
//! - Down-mixing of multi-channel devices to mono
//! - Bounded frame queue: when the loop falls behind, new frames are dropped
//!   instead of reported as an overflow error

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::CaptureConfig;
use crate::error::FrameError;
use crate::processing::CaptureSource;

/// Live capture from the host's default input device.
pub struct CpalCapture {
    stream: Option<cpal::Stream>,
    frames: Receiver<Vec<f32>>,
    sample_rate: u32,
    read_timeout: Duration,
    playing: bool,
    device_lost: Arc<AtomicBool>,
}

impl CpalCapture {
    /// Opens and starts an input stream on the default input device.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks the f32 configuration closest to the requested channels and rate
    /// 3. Starts a stream whose callback slices the input into buffers of
    ///    `config.buffer_size` mono samples
    ///
    /// # Returns
    /// * `Ok(capture)` - A playing capture source
    /// * `Err(e)` - No device, no usable format, or the stream failed to start
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported = find_supported_config(configs, config.sample_rate, config.channels)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let sample_rate = config.sample_rate.clamp(
            supported.min_sample_rate().0,
            supported.max_sample_rate().0,
        );
        let stream_config: cpal::StreamConfig =
            supported.with_sample_rate(cpal::SampleRate(sample_rate)).into();
        let channels = stream_config.channels as usize;

        info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(config.queue_depth);
        let mut framer = Framer::new(config.buffer_size, channels, frame_tx);

        let device_lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&device_lost);
        let err_fn = move |err: cpal::StreamError| {
            warn!("An error occurred on the audio stream: {}", err);
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                lost_flag.store(true, Ordering::Relaxed);
            }
        };

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| framer.push(data),
            err_fn,
            None,
        )?;

        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            frames: frame_rx,
            sample_rate,
            read_timeout: config.read_timeout(),
            playing: true,
            device_lost,
        })
    }
}

impl CaptureSource for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        self.playing && self.stream.is_some() && !self.device_lost.load(Ordering::Relaxed)
    }

    fn read_buffer(&mut self) -> Result<Vec<f32>, FrameError> {
        self.frames
            .recv_timeout(self.read_timeout)
            .map_err(|e| FrameError::Capture(e.to_string()))
    }

    fn stop(&mut self) -> Result<()> {
        self.playing = false;
        if let Some(stream) = &self.stream {
            stream.pause()?;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.playing = false;
        if self.stream.take().is_some() {
            info!("Audio input stream closed");
        }
    }
}

/// Accumulates interleaved device data into fixed-size mono buffers.
struct Framer {
    buffer_size: usize,
    channels: usize,
    pending: Vec<f32>,
    sender: Sender<Vec<f32>>,
}

impl Framer {
    fn new(buffer_size: usize, channels: usize, sender: Sender<Vec<f32>>) -> Self {
        Self {
            buffer_size,
            channels: channels.max(1),
            pending: Vec::with_capacity(buffer_size * 2),
            sender,
        }
    }

    fn push(&mut self, data: &[f32]) {
        if self.channels == 1 {
            self.pending.extend_from_slice(data);
        } else {
            self.pending.extend(downmix(data, self.channels));
        }

        while self.pending.len() >= self.buffer_size {
            let frame: Vec<f32> = self.pending.drain(..self.buffer_size).collect();
            // A full queue means the loop is behind; drop the frame.
            let _ = self.sender.try_send(frame);
        }
    }
}

/// Averages interleaved frames of `channels` samples into mono.
fn downmix(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    data.chunks_exact(channels)
        .map(move |frame| frame.iter().sum::<f32>() / channels as f32)
}

/// Ranks a device configuration; lower is better.
///
/// Exact channel matches come first, then fewer channels, then the smallest
/// distance between the supported rate range and the requested rate.
fn config_rank(
    channels: u16,
    min_rate: u32,
    max_rate: u32,
    target_rate: u32,
    target_channels: u16,
) -> (bool, u16, u32) {
    let rate_distance = if (min_rate..=max_rate).contains(&target_rate) {
        0
    } else {
        min_rate.abs_diff(target_rate).min(max_rate.abs_diff(target_rate))
    };
    (channels != target_channels, channels, rate_distance)
}

/// Finds the best supported f32 input configuration for the request.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
    target_channels: u16,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            config_rank(
                c.channels(),
                c.min_sample_rate().0,
                c.max_sample_rate().0,
                target_rate,
                target_channels,
            )
        })
}
