//! # Fast Fourier Transform (FFT) Module
//!
//! Windowing and FFT-based autocorrelation for the pitch estimator.
//!
//! ## Features
//! - Symmetric Hann window
//! - Linear (non-circular) autocorrelation via RustFFT, with plans built once

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Builds a symmetric Hann window of length `len`.
///
/// The window tapers to zero at both ends, which keeps the buffer edges from
/// dominating the correlation.
pub fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let n_minus_1 = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Multiplies `buffer` by `window` sample by sample.
pub fn apply_window(buffer: &mut [f32], window: &[f32]) {
    for (sample, w) in buffer.iter_mut().zip(window) {
        *sample *= w;
    }
}

/// Computes autocorrelations of fixed-length signals.
///
/// The signal is zero-padded to a power of two of at least `2 * len - 1`
/// samples so the result equals the direct time-domain sum
/// `r[k] = sum_j x[j] * x[j + k]` for every lag `k` in `0..len`.
pub struct Autocorrelator {
    len: usize,
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Autocorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autocorrelator")
            .field("len", &self.len)
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl Autocorrelator {
    pub fn new(len: usize) -> Self {
        let fft_size = (2 * len).saturating_sub(1).max(1).next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            len,
            fft_size,
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
        }
    }

    /// Returns the non-negative lags `0..len` of the autocorrelation of `signal`.
    ///
    /// Samples beyond `len` are ignored; a shorter signal is zero-extended.
    pub fn autocorrelate(&self, signal: &[f32]) -> Vec<f32> {
        let zero = Complex::new(0.0, 0.0);
        let mut buffer: Vec<Complex<f32>> = signal
            .iter()
            .take(self.len)
            .map(|&sample| Complex::new(sample, 0.0))
            .chain(std::iter::repeat(zero))
            .take(self.fft_size)
            .collect();

        // Power spectrum, then back to the lag domain.
        self.forward.process(&mut buffer);
        for bin in buffer.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        buffer.iter().take(self.len).map(|c| c.re * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn autocorr_direct(signal: &[f32]) -> Vec<f32> {
        (0..signal.len())
            .map(|lag| {
                signal
                    .iter()
                    .zip(&signal[lag..])
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    #[test]
    fn matches_direct_sum() {
        // conv(a, fliplr(a)) for a = 1..8, non-negative half.
        let signal: Vec<f32> = (1..=8).map(|v| v as f32).collect();
        let result = Autocorrelator::new(signal.len()).autocorrelate(&signal);
        let expected = [204.0, 168.0, 133.0, 100.0, 70.0, 44.0, 23.0, 8.0];
        assert_eq!(result.len(), expected.len());
        for (value, reference) in result.iter().zip(expected) {
            assert!((value - reference).abs() < 1e-3, "{value} != {reference}");
        }
    }

    #[test]
    fn no_circular_wrap_for_odd_lengths() {
        let signal = [0.3, -1.2, 0.7, 2.0, -0.4, 0.9, -1.1];
        let result = Autocorrelator::new(signal.len()).autocorrelate(&signal);
        for (value, reference) in result.iter().zip(autocorr_direct(&signal)) {
            assert!((value - reference).abs() < 1e-4);
        }
    }

    #[test]
    fn hann_window_shape() {
        let window = hann_window(9);
        assert!(window[0].abs() < 1e-7);
        assert!(window[8].abs() < 1e-7);
        assert!((window[4] - 1.0).abs() < 1e-6);
        assert!((window[2] - window[6]).abs() < 1e-6);
    }

    #[test]
    fn apply_window_scales_in_place() {
        let mut buffer = vec![2.0; 5];
        apply_window(&mut buffer, &hann_window(5));
        assert!(buffer[0].abs() < 1e-7);
        assert!((buffer[2] - 2.0).abs() < 1e-6);
    }
}
