//! # Tuning Evaluation Module
//!
//! Turns a detected frequency and its target into a cent deviation, a
//! discrete flat / in-tune / sharp state and a meter position.

use crate::tuning::TuningTarget;

/// Cent deviation covered by each half of the meter.
/// The meter shows deviations from -50 to +50 cents.
pub const METER_RANGE: f32 = 50.0;

/// Deviations strictly inside this many cents count as in tune.
pub const PERFECT_TOLERANCE: f32 = 5.0;

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// Returns 0 when the ratio is undefined (non-positive or non-finite input).
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    let ratio = freq / target_freq;
    if !(ratio.is_finite() && ratio > 0.0) {
        return 0.0;
    }
    let cents = 1200.0 * ratio.log2();
    if cents.is_finite() { cents } else { 0.0 }
}

/// Maps a cent deviation onto 0..1 for a meter; -50 is 0, +50 is 1.
pub fn display_position(cents: f32) -> f32 {
    ((cents + METER_RANGE) / (2.0 * METER_RANGE)).clamp(0.0, 1.0)
}

/// Coarse tuning verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningState {
    Perfect,
    Flat,
    Sharp,
}

impl TuningState {
    pub fn from_cents(cents: f32) -> Self {
        if cents.abs() < PERFECT_TOLERANCE {
            TuningState::Perfect
        } else if cents < 0.0 {
            TuningState::Flat
        } else {
            TuningState::Sharp
        }
    }

    /// Instruction shown to the player.
    pub fn guidance(&self) -> &'static str {
        match self {
            TuningState::Perfect => "PERFECT",
            TuningState::Flat => "Too Flat (Tune Up)",
            TuningState::Sharp => "Too Sharp (Tune Down)",
        }
    }
}

/// Everything the presentation needs to show one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningEvaluation {
    pub cents: f32,
    pub state: TuningState,
    pub display: f32,
}

impl TuningEvaluation {
    pub fn from_cents(cents: f32) -> Self {
        Self {
            cents,
            state: TuningState::from_cents(cents),
            display: display_position(cents),
        }
    }
}

/// Evaluates a detected frequency against its target.
pub fn evaluate(freq: f32, target: &TuningTarget) -> TuningEvaluation {
    TuningEvaluation::from_cents(calculate_cents_deviation(freq, target.frequency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{GUITAR_STRINGS, TuningMode, resolve_target};

    #[test]
    fn exact_match_is_perfect() {
        for note in GUITAR_STRINGS {
            let target = resolve_target(note.frequency, &TuningMode::Auto);
            let eval = evaluate(note.frequency, &target);
            assert_eq!(eval.cents, 0.0);
            assert_eq!(eval.state, TuningState::Perfect);
            assert_eq!(eval.display, 0.5);
        }
    }

    #[test]
    fn octave_is_1200_cents() {
        assert!((calculate_cents_deviation(220.0, 110.0) - 1200.0).abs() < 1e-3);
        assert!((calculate_cents_deviation(55.0, 110.0) + 1200.0).abs() < 1e-3);
    }

    #[test]
    fn undefined_ratio_yields_zero() {
        assert_eq!(calculate_cents_deviation(110.0, 0.0), 0.0);
        assert_eq!(calculate_cents_deviation(0.0, 110.0), 0.0);
        assert_eq!(calculate_cents_deviation(-110.0, 110.0), 0.0);
        assert_eq!(calculate_cents_deviation(f32::NAN, 110.0), 0.0);
    }

    #[test]
    fn display_position_clamps_and_centers() {
        assert_eq!(display_position(-100.0), 0.0);
        assert_eq!(display_position(-50.0), 0.0);
        assert_eq!(display_position(0.0), 0.5);
        assert_eq!(display_position(50.0), 1.0);
        assert_eq!(display_position(100.0), 1.0);
        assert!((display_position(25.0) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn display_position_is_monotonic() {
        let mut previous = display_position(-200.0);
        for step in -200..=200 {
            let current = display_position(step as f32);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn state_boundaries() {
        assert_eq!(TuningState::from_cents(0.0), TuningState::Perfect);
        assert_eq!(TuningState::from_cents(4.99), TuningState::Perfect);
        assert_eq!(TuningState::from_cents(-4.99), TuningState::Perfect);
        assert_eq!(TuningState::from_cents(-5.0), TuningState::Flat);
        assert_eq!(TuningState::from_cents(5.0), TuningState::Sharp);
        assert_eq!(TuningState::from_cents(-30.0).guidance(), "Too Flat (Tune Up)");
    }

    #[test]
    fn slightly_sharp_a2() {
        let target = resolve_target(113.0, &TuningMode::Auto);
        assert_eq!(target.note_name, "A2");
        let eval = evaluate(113.0, &target);
        let expected = 1200.0 * (113.0f32 / 110.0).log2();
        assert!((eval.cents - expected).abs() < 1e-3);
        assert!((eval.cents - 46.58).abs() < 0.05);
        assert_eq!(eval.state, TuningState::Sharp);
        assert!((eval.display - (eval.cents + 50.0) / 100.0).abs() < 1e-6);
    }
}
