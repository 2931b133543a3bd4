//! # Guitar Tuning Module
//!
//! This module holds the reference table for standard guitar tuning and the
//! logic that picks which string a detected pitch is compared against.
//!
//! ## Features
//! - Six-string standard tuning (E2 A2 D3 G3 B3 E4)
//! - Name lookups for manual string selection
//! - Nearest-string search with a deterministic tie-break
//! - Auto / Manual tuning modes

use std::fmt;

/// A single open string and its target frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceNote {
    /// Note name (e.g., "E2", "A2")
    pub name: &'static str,
    /// Frequency in Hz
    pub frequency: f32,
}

impl fmt::Display for ReferenceNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Standard tuning, lowest string first.
///
/// Iteration order is the canonical order: frequencies strictly increase and
/// the nearest-string search resolves ties in favor of earlier entries.
pub static GUITAR_STRINGS: [ReferenceNote; 6] = [
    ReferenceNote {
        name: "E2",
        frequency: 82.41,
    },
    ReferenceNote {
        name: "A2",
        frequency: 110.00,
    },
    ReferenceNote {
        name: "D3",
        frequency: 146.83,
    },
    ReferenceNote {
        name: "G3",
        frequency: 196.00,
    },
    ReferenceNote {
        name: "B3",
        frequency: 246.94,
    },
    ReferenceNote {
        name: "E4",
        frequency: 329.63,
    },
];

/// Selector value that clears the manual override.
pub const AUTO: &str = "Auto";

/// String names in canonical order, for selection lists.
pub fn string_names() -> impl Iterator<Item = &'static str> {
    GUITAR_STRINGS.iter().map(|note| note.name)
}

/// Looks up a string by its exact name.
pub fn find_string(name: &str) -> Option<ReferenceNote> {
    GUITAR_STRINGS.iter().find(|note| note.name == name).copied()
}

/// How the comparison target is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TuningMode {
    /// Compare against whichever string is closest to the detected pitch.
    #[default]
    Auto,
    /// Compare against the selected string no matter what is played.
    Manual(ReferenceNote),
}

impl TuningMode {
    /// Parses a selector value: "Auto" or one of the six string names.
    pub fn from_selection(selection: &str) -> Option<Self> {
        if selection == AUTO {
            Some(TuningMode::Auto)
        } else {
            find_string(selection).map(TuningMode::Manual)
        }
    }

    /// The selector value for this mode.
    pub fn label(&self) -> &'static str {
        match self {
            TuningMode::Auto => AUTO,
            TuningMode::Manual(note) => note.name,
        }
    }
}

impl fmt::Display for TuningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The string a reading is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningTarget {
    pub frequency: f32,
    pub note_name: &'static str,
}

impl From<ReferenceNote> for TuningTarget {
    fn from(note: ReferenceNote) -> Self {
        Self {
            frequency: note.frequency,
            note_name: note.name,
        }
    }
}

/// Picks the comparison target for a detected frequency.
///
/// Manual mode always returns the selected string. Auto mode returns the
/// string whose reference frequency is closest to `freq`.
pub fn resolve_target(freq: f32, mode: &TuningMode) -> TuningTarget {
    match mode {
        TuningMode::Manual(note) => (*note).into(),
        TuningMode::Auto => nearest_in(&GUITAR_STRINGS, freq).into(),
    }
}

/// Finds the closest note in `notes`; on equal distance the earlier note wins.
///
/// Empty tables are rejected at compile time.
fn nearest_in<const N: usize>(notes: &[ReferenceNote; N], freq: f32) -> ReferenceNote {
    const { assert!(N > 0, "reference table must not be empty") };
    notes[1..].iter().fold(notes[0], |best, note| {
        if (note.frequency - freq).abs() < (best.frequency - freq).abs() {
            *note
        } else {
            best
        }
    })
}
