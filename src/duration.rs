//! # Duration Quantizer
//!
//! Maps a held time in seconds plus a tempo onto one of nine notated
//! duration symbols.
//!
//! ## Buckets
//! The elapsed time is first converted to beats (`seconds / (60 / bpm)`), then
//! the first bucket whose upper bound exceeds it wins:
//!
//! ```text
//! beats < 0.29  sixteenth        0.25
//! beats < 0.38  eighth triplet   1/3
//! beats < 0.62  eighth           0.5
//! beats < 0.88  quarter triplet  2/3
//! beats < 1.30  quarter          1
//! beats < 1.75  dotted quarter   1.5
//! beats < 2.50  half             2
//! beats < 3.50  dotted half      3
//! otherwise     whole            4
//! ```
//!
//! The triplet buckets are deliberately narrow so that slightly sloppy
//! straight eighths and quarters are not read as triplets.
//!
//! ## Example
//! ```rust
//! use scribe::{quantize, DurationSymbol, Tempo};
//!
//! let tempo = Tempo::new(120.0)?; // 0.5 seconds per beat
//! assert_eq!(quantize(0.30, tempo), DurationSymbol::Eighth);
//! assert_eq!(quantize(2.0, tempo), DurationSymbol::Whole);
//! # Ok::<(), scribe::ScribeError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScribeError;

/// Upper bounds (exclusive, in beats) of every bucket but the last.
const BUCKETS: [(f64, DurationSymbol); 8] = [
    (0.29, DurationSymbol::Sixteenth),
    (0.38, DurationSymbol::EighthTriplet),
    (0.62, DurationSymbol::Eighth),
    (0.88, DurationSymbol::QuarterTriplet),
    (1.30, DurationSymbol::Quarter),
    (1.75, DurationSymbol::DottedQuarter),
    (2.50, DurationSymbol::Half),
    (3.50, DurationSymbol::DottedHalf),
];

/// Notated duration of a transcribed note, shortest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DurationSymbol {
    Sixteenth,
    EighthTriplet,
    Eighth,
    QuarterTriplet,
    Quarter,
    DottedQuarter,
    Half,
    DottedHalf,
    Whole,
}

impl DurationSymbol {
    /// All symbols in bucket order.
    pub const ALL: [DurationSymbol; 9] = [
        DurationSymbol::Sixteenth,
        DurationSymbol::EighthTriplet,
        DurationSymbol::Eighth,
        DurationSymbol::QuarterTriplet,
        DurationSymbol::Quarter,
        DurationSymbol::DottedQuarter,
        DurationSymbol::Half,
        DurationSymbol::DottedHalf,
        DurationSymbol::Whole,
    ];

    /// Beats occupied in a 4/4 measure (quarter note = 1 beat)
    pub fn beat_value(&self) -> f64 {
        match self {
            DurationSymbol::Whole => 4.0,
            DurationSymbol::DottedHalf => 3.0,
            DurationSymbol::Half => 2.0,
            DurationSymbol::DottedQuarter => 1.5,
            DurationSymbol::Quarter => 1.0,
            DurationSymbol::QuarterTriplet => 2.0 / 3.0,
            DurationSymbol::Eighth => 0.5,
            DurationSymbol::EighthTriplet => 1.0 / 3.0,
            DurationSymbol::Sixteenth => 0.25,
        }
    }

    /// Position in bucket order, 0 for the shortest symbol.
    pub fn bucket_index(&self) -> usize {
        *self as usize
    }

    pub fn is_dotted(&self) -> bool {
        matches!(self, DurationSymbol::DottedHalf | DurationSymbol::DottedQuarter)
    }

    pub fn is_triplet(&self) -> bool {
        matches!(self, DurationSymbol::QuarterTriplet | DurationSymbol::EighthTriplet)
    }
}

impl fmt::Display for DurationSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DurationSymbol::Sixteenth => "sixteenth",
            DurationSymbol::EighthTriplet => "eighth-triplet",
            DurationSymbol::Eighth => "eighth",
            DurationSymbol::QuarterTriplet => "quarter-triplet",
            DurationSymbol::Quarter => "quarter",
            DurationSymbol::DottedQuarter => "dotted-quarter",
            DurationSymbol::Half => "half",
            DurationSymbol::DottedHalf => "dotted-half",
            DurationSymbol::Whole => "whole",
        };
        f.write_str(name)
    }
}

/// Tempo in quarter-note beats per minute. Always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tempo(f64);

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self, ScribeError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(ScribeError::InvalidArgument(format!(
                "bpm must be a positive number, got {}",
                bpm
            )));
        }
        Ok(Self(bpm))
    }

    pub fn bpm(&self) -> f64 {
        self.0
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.0
    }

    /// Convert a span of seconds to beats at this tempo
    pub fn beats(&self, seconds: f64) -> f64 {
        seconds / self.seconds_per_beat()
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(100.0)
    }
}

impl TryFrom<f64> for Tempo {
    type Error = ScribeError;

    fn try_from(bpm: f64) -> Result<Self, Self::Error> {
        Tempo::new(bpm)
    }
}

impl From<Tempo> for f64 {
    fn from(tempo: Tempo) -> f64 {
        tempo.0
    }
}

/// Quantize a held time to a duration symbol.
///
/// Negative or NaN elapsed times (timestamps from a reordered transport) are
/// treated as zero.
pub fn quantize(elapsed_seconds: f64, tempo: Tempo) -> DurationSymbol {
    let elapsed = if elapsed_seconds > 0.0 { elapsed_seconds } else { 0.0 };
    let beats = tempo.beats(elapsed);

    BUCKETS
        .iter()
        .find(|(upper, _)| beats < *upper)
        .map(|(_, symbol)| *symbol)
        .unwrap_or(DurationSymbol::Whole)
}

/// Quantize with a raw bpm, rejecting `bpm <= 0`.
pub fn quantize_bpm(elapsed_seconds: f64, bpm: f64) -> Result<DurationSymbol, ScribeError> {
    Ok(quantize(elapsed_seconds, Tempo::new(bpm)?))
}
