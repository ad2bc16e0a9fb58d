//! # Measure Packer
//!
//! Turns the committed notes and the held-pitch snapshot into a [`Score`].
//!
//! ## Pipeline
//! 1. [`build_sequence`] - order committed notes, merge chords, append one
//!    provisional note per held pitch
//! 2. [`pack_measures`] - greedy left-to-right fill of 4-beat measures, then
//!    pad with empty placeholder measures to a multiple of the batch size
//! 3. [`crate::layout::layout`] - widths, positions, clef and time signature
//!
//! [`pack`] runs all three. It reads no clock and keeps no state, so the same
//! inputs always give the same score.
//!
//! ## Example
//! ```rust
//! use scribe::{pack, GlyphEstimator, LayoutOptions, SequenceOptions, Tempo};
//!
//! let score = pack(
//!     &[],
//!     &[],
//!     Tempo::new(100.0)?,
//!     0.0,
//!     &SequenceOptions::default(),
//!     &LayoutOptions::default(),
//!     &GlyphEstimator::default(),
//! );
//! assert_eq!(score.measures.len(), 4); // one batch of placeholders
//! # Ok::<(), scribe::ScribeError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::duration::{quantize, Tempo};
use crate::layout::{layout, LayoutOptions, NotationRenderer, Score};
use crate::note::{HeldPitch, NotatedNote};

/// Beats in one 4/4 measure
pub const BEATS_PER_MEASURE: f64 = 4.0;

/// Slack allowed when summing beat values (triplets do not sum exactly)
pub const CAPACITY_TOLERANCE: f64 = 0.01;

/// Ordering of committed notes in the packed sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteOrder {
    /// Reading order: by onset time, release order among equal onsets
    #[default]
    Onset,
    /// Log order: by release time
    Release,
}

/// How the note sequence is assembled before packing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceOptions {
    pub order: NoteOrder,
    /// Notes whose onsets lie within this many seconds and share a duration
    /// are merged into a chord. Zero disables merging.
    pub chord_window: f64,
}

/// A group of consecutive notes filling at most one 4/4 bar
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Measure {
    pub notes: Vec<NotatedNote>,
}

impl Measure {
    /// Total beats of all notes in the measure
    pub fn beats(&self) -> f64 {
        self.notes.iter().map(|n| n.beat_value()).sum()
    }

    /// Empty measure used only to keep the layout width stable
    pub fn is_placeholder(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn has_provisional(&self) -> bool {
        self.notes.iter().any(|n| n.is_provisional)
    }
}

/// Assemble the ordered note sequence: committed notes first, then one
/// provisional note per held pitch.
pub fn build_sequence(
    committed: &[NotatedNote],
    held: &[HeldPitch],
    tempo: Tempo,
    now: f64,
    options: &SequenceOptions,
) -> Vec<NotatedNote> {
    let mut settled: Vec<NotatedNote> = committed.to_vec();
    if options.order == NoteOrder::Onset {
        // Stable, so notes sharing an onset keep their release order
        settled.sort_by(|a, b| a.onset.total_cmp(&b.onset));
    }

    let mut held: Vec<&HeldPitch> = held.iter().collect();
    held.sort_by(|a, b| {
        a.onset_time
            .total_cmp(&b.onset_time)
            .then(a.pitch_id.cmp(&b.pitch_id))
    });
    let live: Vec<NotatedNote> = held
        .into_iter()
        .map(|h| NotatedNote::provisional(h, quantize(now - h.onset_time, tempo)))
        .collect();

    let mut sequence = merge_chords(settled, options.chord_window);
    sequence.extend(merge_chords(live, options.chord_window));
    sequence
}

/// Merge runs of notes that start together into chords.
fn merge_chords(notes: Vec<NotatedNote>, window: f64) -> Vec<NotatedNote> {
    if window <= 0.0 {
        return notes;
    }

    let mut merged: Vec<NotatedNote> = Vec::with_capacity(notes.len());
    for note in notes {
        match merged.last_mut() {
            Some(chord)
                if chord.duration == note.duration
                    && (note.onset - chord.onset).abs() <= window =>
            {
                for pitch in &note.pitches {
                    chord.add_pitch(pitch);
                }
            }
            _ => merged.push(note),
        }
    }
    merged
}

/// Greedily fill measures left to right.
///
/// A note that would push the running sum past the capacity closes the
/// current measure and opens the next one. Notes are never reordered and
/// never split across a bar line. The result is padded with empty measures to
/// a multiple of `batch_size`; an empty sequence gives one full batch of
/// placeholders.
pub fn pack_measures(notes: &[NotatedNote], batch_size: usize) -> Vec<Measure> {
    let mut measures: Vec<Measure> = Vec::new();
    let mut current = Measure::default();
    let mut current_beats = 0.0;

    for note in notes {
        let value = note.beat_value();
        if !current.notes.is_empty()
            && current_beats + value > BEATS_PER_MEASURE + CAPACITY_TOLERANCE
        {
            measures.push(std::mem::take(&mut current));
            current_beats = 0.0;
        }
        current.notes.push(note.clone());
        current_beats += value;
    }
    if !current.notes.is_empty() {
        measures.push(current);
    }

    let batch = batch_size.max(1);
    let total = measures.len().max(1).div_ceil(batch) * batch;
    measures.resize_with(total, Measure::default);
    measures
}

/// Build the full score from the log, the held snapshot, tempo and time.
pub fn pack<R: NotationRenderer + ?Sized>(
    committed: &[NotatedNote],
    held: &[HeldPitch],
    tempo: Tempo,
    now: f64,
    sequence: &SequenceOptions,
    options: &LayoutOptions,
    renderer: &R,
) -> Score {
    let notes = build_sequence(committed, held, tempo, now, sequence);
    let measures = pack_measures(&notes, options.batch_size);
    layout(measures, tempo, options, renderer)
}
