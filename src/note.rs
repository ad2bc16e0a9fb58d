//! Note types shared by the tracker, the packer and the session payload.

use serde::{Deserialize, Serialize};

use crate::duration::DurationSymbol;

/// A pitch that is currently sounding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldPitch {
    pub pitch_id: i32,
    pub onset_time: f64,
    pub label: String,
}

/// A note in notated form: one or more pitches sharing one duration symbol.
///
/// Committed notes come from the note log and never change. Provisional notes
/// are previews of held pitches, rebuilt on every layout pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotatedNote {
    pub id: String,
    pub pitches: Vec<String>,
    pub duration: DurationSymbol,
    #[serde(default)]
    pub is_provisional: bool,
    /// Onset time in seconds of the earliest pitch
    #[serde(default)]
    pub onset: f64,
}

impl NotatedNote {
    pub fn committed(id: String, label: &str, duration: DurationSymbol, onset: f64) -> Self {
        Self {
            id,
            pitches: vec![label.to_string()],
            duration,
            is_provisional: false,
            onset,
        }
    }

    pub fn provisional(held: &HeldPitch, duration: DurationSymbol) -> Self {
        Self {
            id: format!("live-{}", held.pitch_id),
            pitches: vec![held.label.clone()],
            duration,
            is_provisional: true,
            onset: held.onset_time,
        }
    }

    /// Beats occupied in the measure, always derived from the duration symbol
    pub fn beat_value(&self) -> f64 {
        self.duration.beat_value()
    }

    /// Add a pitch, keeping the set free of duplicates
    pub fn add_pitch(&mut self, label: &str) {
        if !self.pitches.iter().any(|p| p == label) {
            self.pitches.push(label.to_string());
        }
    }

    pub fn has_accidental(&self) -> bool {
        self.pitches.iter().any(|p| label_has_accidental(p))
    }
}

/// Whether a pitch label such as `C#4`, `Bb3` or `f#/5` carries an accidental.
///
/// The first character is the letter name, so a leading `b` is B natural.
pub fn label_has_accidental(label: &str) -> bool {
    let mut chars = label.chars();
    if chars.next().is_none() {
        return false;
    }
    matches!(chars.next(), Some('#') | Some('b'))
}
