//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a single plucked string
//! from one buffer of mono samples.
//!
//! ## Pipeline
//! 1. RMS volume gate (silence is a valid, unvoiced result)
//! 2. Hann window
//! 3. Autocorrelation (non-negative lags)
//! 4. Skip the slope around lag 0, take the highest peak after it
//! 5. Parabolic interpolation for sub-sample accuracy
//! 6. Range check against the guitar's fundamental range

use crate::config::PitchConfig;
use crate::error::FrameError;
use crate::fft::{Autocorrelator, apply_window, hann_window};

/// Window autocorrelation values below this fraction of lag 0 are not used
/// for bias compensation.
const MIN_WINDOW_CORRELATION: f32 = 1e-3;

/// Outcome of pitch estimation for one buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    /// Estimated fundamental in Hz; zero when `is_voiced` is false.
    pub frequency: f32,
    pub is_voiced: bool,
}

impl DetectionResult {
    pub fn silence() -> Self {
        Self {
            frequency: 0.0,
            is_voiced: false,
        }
    }

    pub fn voiced(frequency: f32) -> Self {
        Self {
            frequency,
            is_voiced: true,
        }
    }
}

/// Root-mean-square level of a buffer.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Autocorrelation pitch estimator for fixed-size buffers.
///
/// The window, FFT plans and the window's own autocorrelation are computed
/// once; [`PitchEstimator::estimate`] takes `&self` and keeps no state
/// between buffers.
#[derive(Debug)]
pub struct PitchEstimator {
    sample_rate: u32,
    config: PitchConfig,
    window: Vec<f32>,
    autocorrelator: Autocorrelator,
    window_correlation: Vec<f32>,
}

impl PitchEstimator {
    pub fn new(sample_rate: u32, buffer_size: usize, config: &PitchConfig) -> Self {
        let window = hann_window(buffer_size);
        let autocorrelator = Autocorrelator::new(buffer_size);
        let window_correlation = autocorrelator.autocorrelate(&window);
        Self {
            sample_rate,
            config: config.clone(),
            window,
            autocorrelator,
            window_correlation,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.window.len()
    }

    /// Estimates the fundamental frequency of `samples`.
    ///
    /// # Returns
    /// * `Ok(DetectionResult)` - voiced with a frequency, or unvoiced (silence)
    /// * `Err(FrameError::NoPeak)` - the correlation never rises after lag 0
    /// * `Err(FrameError::OutOfRange)` - the estimate is not a guitar fundamental
    /// * `Err(FrameError::BufferSize)` - wrong number of samples
    pub fn estimate(&self, samples: &[f32]) -> Result<DetectionResult, FrameError> {
        if samples.len() != self.buffer_size() {
            return Err(FrameError::BufferSize {
                expected: self.buffer_size(),
                actual: samples.len(),
            });
        }

        // --- Volume gate ---
        if rms(samples) < self.config.noise_threshold {
            return Ok(DetectionResult::silence());
        }

        let mut windowed = samples.to_vec();
        apply_window(&mut windowed, &self.window);
        let correlation = self.autocorrelator.autocorrelate(&windowed);

        let peak = find_period_peak(&correlation).ok_or(FrameError::NoPeak)?;
        let interior = peak > 0 && peak + 1 < correlation.len();
        let lag = if self.config.compensate_window_bias && interior {
            self.compensated_lag(&correlation, peak)
        } else {
            refine_peak(&correlation, peak)
        };

        let frequency = self.sample_rate as f32 / lag;
        if !(frequency.is_finite()
            && frequency >= self.config.min_frequency
            && frequency <= self.config.max_frequency)
        {
            return Err(FrameError::OutOfRange(frequency));
        }

        Ok(DetectionResult::voiced(frequency))
    }

    /// Refines `peak` on the correlation divided by the window's autocorrelation.
    ///
    /// The Hann envelope decays with lag and drags the raw maximum towards
    /// shorter lags. Dividing it out leaves a flat-topped periodic curve; the
    /// peak is walked uphill on that curve before interpolation.
    fn compensated_lag(&self, correlation: &[f32], peak: usize) -> f32 {
        let floor = self.window_correlation[0] * MIN_WINDOW_CORRELATION;
        let normalized: Vec<f32> = correlation
            .iter()
            .zip(&self.window_correlation)
            .map(|(&c, &w)| if w > floor { c / w } else { 0.0 })
            .collect();

        let mut lag = peak;
        while lag + 1 < normalized.len() && normalized[lag + 1] > normalized[lag] {
            lag += 1;
        }
        while lag > 0 && normalized[lag - 1] > normalized[lag] {
            lag -= 1;
        }
        refine_peak(&normalized, lag)
    }
}

/// Finds the period peak of a non-negative-lag autocorrelation.
///
/// Skips the initial downward slope from lag 0 (the first index where the
/// first difference turns positive) and returns the first index of the
/// maximum from there on. `None` if the correlation never rises.
pub fn find_period_peak(correlation: &[f32]) -> Option<usize> {
    let start = correlation.windows(2).position(|w| w[1] - w[0] > 0.0)?;
    let (offset, _) = correlation[start..].iter().enumerate().fold(
        (0, f32::NEG_INFINITY),
        |(best_i, best_v), (i, &v)| if v > best_v { (i, v) } else { (best_i, best_v) },
    );
    Some(start + offset)
}

/// Parabolic interpolation of the peak at `peak`.
///
/// Falls back to the integer lag on a boundary peak, a flat neighborhood
/// (zero denominator) or a non-finite shift.
pub fn refine_peak(values: &[f32], peak: usize) -> f32 {
    if peak == 0 || peak + 1 >= values.len() {
        return peak as f32;
    }
    let alpha = values[peak - 1];
    let beta = values[peak];
    let gamma = values[peak + 1];
    let denominator = alpha - 2.0 * beta + gamma;
    if denominator == 0.0 {
        return peak as f32;
    }
    let shift = (alpha - gamma) / (2.0 * denominator);
    if shift.is_finite() {
        peak as f32 + shift
    } else {
        peak as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;
    const BUFFER_SIZE: usize = 4096;

    fn sine(freq: f32, amplitude: f32, phase: f32) -> Vec<f32> {
        (0..BUFFER_SIZE)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq * t + phase).sin()
            })
            .collect()
    }

    /// A plucked-string-like tone: fundamental plus two overtones.
    fn string_tone(freq: f32) -> Vec<f32> {
        let tau = 2.0 * std::f32::consts::PI;
        (0..BUFFER_SIZE)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                0.4 * (tau * freq * t + 1.7).sin()
                    + 0.2 * (tau * 2.0 * freq * t).sin()
                    + 0.12 * (tau * 3.0 * freq * t + 1.0).sin()
            })
            .collect()
    }

    fn estimator() -> PitchEstimator {
        PitchEstimator::new(SAMPLE_RATE, BUFFER_SIZE, &PitchConfig::default())
    }

    fn cents_between(a: f32, b: f32) -> f32 {
        1200.0 * (a / b).log2()
    }

    #[test]
    fn sine_frequencies_across_the_range() {
        let estimator = estimator();
        for freq in [65.0, 82.41, 110.0, 146.83, 196.0, 246.94, 329.63, 440.0, 495.0] {
            let result = estimator.estimate(&sine(freq, 0.5, 0.3)).unwrap();
            assert!(result.is_voiced);
            assert!(
                (result.frequency - freq).abs() < 0.25,
                "expected {freq}, got {}",
                result.frequency
            );
            assert!(cents_between(result.frequency, freq).abs() < 1.0);
        }
    }

    #[test]
    fn overtones_do_not_shift_the_fundamental() {
        let estimator = estimator();
        for freq in [82.41, 146.83, 246.94] {
            let result = estimator.estimate(&string_tone(freq)).unwrap();
            assert!((result.frequency - freq).abs() < 0.25, "{freq}: {}", result.frequency);
        }
    }

    #[test]
    fn uncompensated_estimate_stays_within_a_hertz() {
        let config = PitchConfig {
            compensate_window_bias: false,
            ..PitchConfig::default()
        };
        let estimator = PitchEstimator::new(SAMPLE_RATE, BUFFER_SIZE, &config);
        let result = estimator.estimate(&sine(110.0, 0.5, 0.3)).unwrap();
        assert!(result.is_voiced);
        assert!((result.frequency - 110.0).abs() < 1.0);
        // The raw windowed correlation reads slightly sharp.
        assert!(result.frequency > 110.0);
    }

    #[test]
    fn silence_is_unvoiced() {
        let estimator = estimator();
        assert_eq!(
            estimator.estimate(&vec![0.0; BUFFER_SIZE]),
            Ok(DetectionResult::silence())
        );
        // RMS of a 0.02 amplitude sine is about 0.014.
        let quiet = estimator.estimate(&sine(110.0, 0.02, 0.0)).unwrap();
        assert!(!quiet.is_voiced);
        assert_eq!(quiet.frequency, 0.0);
    }

    #[test]
    fn quiet_noise_is_unvoiced() {
        let mut state: u32 = 0x1234_5678;
        let noise: Vec<f32> = (0..BUFFER_SIZE)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32 * 2.0 - 1.0) * 0.03
            })
            .collect();
        assert!(rms(&noise) < 0.02);
        assert!(!estimator().estimate(&noise).unwrap().is_voiced);
    }

    #[test]
    fn out_of_range_pitch_is_rejected() {
        let estimator = estimator();
        match estimator.estimate(&sine(1000.0, 0.5, 0.0)) {
            Err(FrameError::OutOfRange(freq)) => assert!(freq > 500.0),
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn dc_offset_yields_no_detection() {
        let result = estimator().estimate(&vec![0.5; BUFFER_SIZE]);
        assert!(result.is_err(), "got {result:?}");
    }

    #[test]
    fn wrong_buffer_size_is_reported() {
        assert_eq!(
            estimator().estimate(&[0.1; 16]),
            Err(FrameError::BufferSize {
                expected: BUFFER_SIZE,
                actual: 16
            })
        );
    }

    #[test]
    fn period_peak_skips_the_initial_slope() {
        assert_eq!(find_period_peak(&[5.0, 3.0, 1.0, 2.0, 4.0, 3.0]), Some(4));
        assert_eq!(find_period_peak(&[5.0, 1.0, 3.0, 3.0]), Some(2));
        assert_eq!(find_period_peak(&[5.0, 4.0, 3.0, 2.0, 1.0]), None);
        assert_eq!(find_period_peak(&[1.0]), None);
    }

    #[test]
    fn parabolic_refinement() {
        assert_eq!(refine_peak(&[1.0, 2.0, 1.0], 1), 1.0);
        assert!((refine_peak(&[1.0, 3.0, 2.0], 1) - 7.0 / 6.0).abs() < 1e-6);
        // Flat neighborhood: zero denominator.
        assert_eq!(refine_peak(&[1.0, 1.0, 1.0], 1), 1.0);
        // Boundary peaks stay on the integer lag.
        assert_eq!(refine_peak(&[1.0, 2.0, 3.0], 2), 2.0);
        assert_eq!(refine_peak(&[3.0, 2.0], 0), 0.0);
    }
}
