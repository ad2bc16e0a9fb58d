//! # Active Note Tracker
//!
//! Per-pitch state machine turning onset/release pairs into committed notes.
//!
//! ```text
//!          onset                    release
//!   Idle ─────────▶ Active{onset} ─────────▶ Idle   (+ one note in the log)
//!                     │    ▲
//!                     └────┘ onset again: see RetriggerPolicy
//! ```
//!
//! A release for a pitch that is not held is dropped without error: lossy or
//! reordered transports produce them routinely.
//!
//! The tracker owns the held-pitch map. The [`NoteLog`] is owned by the caller
//! and passed in, so the tracker never holds the committed history itself.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::duration::{quantize, DurationSymbol, Tempo};
use crate::note::{HeldPitch, NotatedNote};

/// What to do when an onset arrives for a pitch that is already held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetriggerPolicy {
    /// Overwrite the onset time and label, emitting nothing
    #[default]
    Restart,
    /// Keep the original onset, drop the new one
    Ignore,
    /// Commit the running hold at the retrigger time, then start a new hold
    Split,
}

/// Append-only sequence of committed notes, in release order
#[derive(Debug, Clone, Default)]
pub struct NoteLog {
    notes: Vec<NotatedNote>,
    ids: HashSet<String>,
    counter: u64,
}

impl NoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a log from previously committed notes.
    ///
    /// Provisional flags are cleared; a saved preview is not a committed note.
    /// A blank or repeated id is replaced with a fresh one, keeping the first
    /// note that used it.
    pub fn from_notes(notes: Vec<NotatedNote>) -> Self {
        let mut log = Self::new();
        let mut reissue = Vec::new();
        for (index, mut note) in notes.into_iter().enumerate() {
            note.is_provisional = false;
            if note.id.trim().is_empty() || !log.ids.insert(note.id.clone()) {
                reissue.push(index);
            }
            log.notes.push(note);
        }
        log.counter = log.notes.len() as u64;

        for index in reissue {
            let id = log.next_id();
            warn!(previous = %log.notes[index].id, id = %id, "duplicate note id reissued");
            log.ids.insert(id.clone());
            log.notes[index].id = id;
        }
        log
    }

    fn next_id(&mut self) -> String {
        loop {
            self.counter += 1;
            let id = format!("note-{}", self.counter);
            if !self.ids.contains(&id) {
                return id;
            }
        }
    }

    /// Append a freshly committed single-pitch note
    pub fn append(
        &mut self,
        label: &str,
        duration: DurationSymbol,
        onset: f64,
    ) -> &NotatedNote {
        let id = self.next_id();
        self.ids.insert(id.clone());
        self.notes.push(NotatedNote::committed(id, label, duration, onset));
        &self.notes[self.notes.len() - 1]
    }

    pub fn notes(&self) -> &[NotatedNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.ids.clear();
        self.counter = 0;
    }
}

/// Held pitches keyed by pitch id
#[derive(Debug, Clone, Default)]
pub struct ActiveNoteTracker {
    held: BTreeMap<i32, HeldPitch>,
    policy: RetriggerPolicy,
}

impl ActiveNoteTracker {
    pub fn new(policy: RetriggerPolicy) -> Self {
        Self {
            held: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> RetriggerPolicy {
        self.policy
    }

    /// Start holding a pitch.
    ///
    /// Returns `true` when the onset committed a note, which only happens for a
    /// retrigger under [`RetriggerPolicy::Split`].
    pub fn onset(
        &mut self,
        pitch_id: i32,
        label: &str,
        timestamp: f64,
        tempo: Tempo,
        log: &mut NoteLog,
    ) -> bool {
        let mut committed = false;

        if let Some(existing) = self.held.get(&pitch_id) {
            match self.policy {
                RetriggerPolicy::Ignore => {
                    debug!(pitch_id, "retrigger ignored, pitch already held");
                    return false;
                }
                RetriggerPolicy::Restart => {
                    debug!(pitch_id, previous_onset = existing.onset_time, "retrigger restarts hold");
                }
                RetriggerPolicy::Split => {
                    let existing = existing.clone();
                    commit(&existing, timestamp, tempo, log);
                    committed = true;
                }
            }
        }

        self.held.insert(
            pitch_id,
            HeldPitch {
                pitch_id,
                onset_time: timestamp,
                label: label.to_string(),
            },
        );
        committed
    }

    /// Stop holding a pitch and commit it to the log.
    ///
    /// Returns the committed note, or `None` for an unmatched release.
    pub fn release<'a>(
        &mut self,
        pitch_id: i32,
        timestamp: f64,
        tempo: Tempo,
        log: &'a mut NoteLog,
    ) -> Option<&'a NotatedNote> {
        match self.held.remove(&pitch_id) {
            Some(held) => Some(commit(&held, timestamp, tempo, log)),
            None => {
                debug!(pitch_id, timestamp, "release without matching onset dropped");
                None
            }
        }
    }

    /// Commit every pitch held for longer than `timeout` seconds, as if it
    /// had been released at `onset + timeout`. Returns how many were evicted.
    pub fn evict_stale(&mut self, now: f64, timeout: f64, tempo: Tempo, log: &mut NoteLog) -> usize {
        let stale: Vec<i32> = self
            .held
            .values()
            .filter(|h| now - h.onset_time > timeout)
            .map(|h| h.pitch_id)
            .collect();

        for pitch_id in &stale {
            if let Some(held) = self.held.remove(pitch_id) {
                warn!(
                    pitch_id = held.pitch_id,
                    label = %held.label,
                    held_for = now - held.onset_time,
                    "no release within hold timeout, committing"
                );
                commit(&held, held.onset_time + timeout, tempo, log);
            }
        }
        stale.len()
    }

    /// Abandon every held pitch without committing anything
    pub fn reset(&mut self) -> Vec<HeldPitch> {
        let abandoned: Vec<HeldPitch> = std::mem::take(&mut self.held).into_values().collect();
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "abandoned held pitches");
        }
        abandoned
    }

    /// Held pitches ordered by onset time, ties broken by pitch id
    pub fn snapshot(&self) -> Vec<HeldPitch> {
        let mut held: Vec<HeldPitch> = self.held.values().cloned().collect();
        held.sort_by(|a, b| {
            a.onset_time
                .total_cmp(&b.onset_time)
                .then(a.pitch_id.cmp(&b.pitch_id))
        });
        held
    }

    pub fn is_held(&self, pitch_id: i32) -> bool {
        self.held.contains_key(&pitch_id)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn is_idle(&self) -> bool {
        self.held.is_empty()
    }
}

fn commit<'a>(held: &HeldPitch, released_at: f64, tempo: Tempo, log: &'a mut NoteLog) -> &'a NotatedNote {
    let elapsed = released_at - held.onset_time;
    let duration = quantize(elapsed, tempo);
    debug!(
        pitch_id = held.pitch_id,
        label = %held.label,
        seconds = elapsed,
        bpm = tempo.bpm(),
        beats = tempo.beats(elapsed.max(0.0)),
        result = %duration,
        "note committed"
    );
    log.append(&held.label, duration, held.onset_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempo(bpm: f64) -> Tempo {
        Tempo::new(bpm).unwrap()
    }

    #[test]
    fn test_onset_release_round_trip() {
        let mut tracker = ActiveNoteTracker::default();
        let mut log = NoteLog::new();
        let t = tempo(120.0);

        tracker.onset(60, "C4", 10.0, t, &mut log);
        assert!(tracker.is_held(60));

        let note = tracker.release(60, 10.30, t, &mut log).unwrap();
        assert_eq!(note.duration, DurationSymbol::Eighth);
        assert_eq!(note.pitches, vec!["C4"]);
        assert!(!note.is_provisional);

        assert_eq!(log.len(), 1);
        assert!(!tracker.is_held(60));
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_unmatched_release_is_noop() {
        let mut tracker = ActiveNoteTracker::default();
        let mut log = NoteLog::new();
        assert!(tracker.release(64, 1.0, tempo(100.0), &mut log).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_double_release_commits_once() {
        let mut tracker = ActiveNoteTracker::default();
        let mut log = NoteLog::new();
        let t = tempo(60.0);
        tracker.onset(60, "C4", 0.0, t, &mut log);
        assert!(tracker.release(60, 1.0, t, &mut log).is_some());
        assert!(tracker.release(60, 1.1, t, &mut log).is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_retrigger_restart_overwrites_onset() {
        let mut tracker = ActiveNoteTracker::new(RetriggerPolicy::Restart);
        let mut log = NoteLog::new();
        let t = tempo(60.0);

        tracker.onset(62, "D4", 0.0, t, &mut log);
        assert!(!tracker.onset(62, "D4", 2.0, t, &mut log));
        assert!(log.is_empty());

        // 1 second since the restart = quarter, not the 3 seconds since the first onset
        let note = tracker.release(62, 3.0, t, &mut log).unwrap();
        assert_eq!(note.duration, DurationSymbol::Quarter);
    }

    #[test]
    fn test_retrigger_ignore_keeps_first_onset() {
        let mut tracker = ActiveNoteTracker::new(RetriggerPolicy::Ignore);
        let mut log = NoteLog::new();
        let t = tempo(60.0);

        tracker.onset(62, "D4", 0.0, t, &mut log);
        tracker.onset(62, "D4", 2.0, t, &mut log);
        let note = tracker.release(62, 3.0, t, &mut log).unwrap();
        assert_eq!(note.duration, DurationSymbol::DottedHalf);
    }

    #[test]
    fn test_retrigger_split_emits_two_notes() {
        let mut tracker = ActiveNoteTracker::new(RetriggerPolicy::Split);
        let mut log = NoteLog::new();
        let t = tempo(60.0);

        tracker.onset(62, "D4", 0.0, t, &mut log);
        assert!(tracker.onset(62, "D4", 2.0, t, &mut log));
        tracker.release(62, 3.0, t, &mut log);

        let durations: Vec<DurationSymbol> = log.notes().iter().map(|n| n.duration).collect();
        assert_eq!(durations, vec![DurationSymbol::Half, DurationSymbol::Quarter]);
    }

    #[test]
    fn test_evict_stale_commits_at_timeout() {
        let mut tracker = ActiveNoteTracker::default();
        let mut log = NoteLog::new();
        let t = tempo(60.0);

        tracker.onset(60, "C4", 0.0, t, &mut log);
        tracker.onset(64, "E4", 9.5, t, &mut log);

        assert_eq!(tracker.evict_stale(10.5, 10.0, t, &mut log), 1);
        assert!(!tracker.is_held(60));
        assert!(tracker.is_held(64));
        assert_eq!(log.notes()[0].duration, DurationSymbol::Whole);
    }

    #[test]
    fn test_reset_abandons_without_commit() {
        let mut tracker = ActiveNoteTracker::default();
        let mut log = NoteLog::new();
        tracker.onset(60, "C4", 0.0, tempo(90.0), &mut log);
        tracker.onset(67, "G4", 0.1, tempo(90.0), &mut log);

        let abandoned = tracker.reset();
        assert_eq!(abandoned.len(), 2);
        assert!(tracker.is_idle());
        assert!(log.is_empty());
    }

    #[test]
    fn test_snapshot_order() {
        let mut tracker = ActiveNoteTracker::default();
        let mut log = NoteLog::new();
        let t = tempo(90.0);
        tracker.onset(72, "C5", 1.0, t, &mut log);
        tracker.onset(60, "C4", 2.0, t, &mut log);
        tracker.onset(64, "E4", 1.0, t, &mut log);

        let ids: Vec<i32> = tracker.snapshot().iter().map(|h| h.pitch_id).collect();
        assert_eq!(ids, vec![64, 72, 60]);
    }

    #[test]
    fn test_log_ids_unique_after_restore() {
        let mut log = NoteLog::new();
        log.append("C4", DurationSymbol::Quarter, 0.0);
        log.append("D4", DurationSymbol::Quarter, 1.0);

        let mut restored = NoteLog::from_notes(log.notes().to_vec());
        let id = restored.append("E4", DurationSymbol::Half, 2.0).id.clone();
        let mut ids: Vec<&str> = restored.notes().iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert_eq!(id, "note-3");
    }

    #[test]
    fn test_restore_reissues_duplicate_ids() {
        let notes = vec![
            NotatedNote::committed("note-1".to_string(), "C4", DurationSymbol::Quarter, 0.0),
            NotatedNote::committed("note-1".to_string(), "D4", DurationSymbol::Quarter, 1.0),
            NotatedNote::committed(String::new(), "E4", DurationSymbol::Half, 2.0),
        ];
        let mut log = NoteLog::from_notes(notes);

        let ids: Vec<String> = log.notes().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids[0], "note-1");
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(ids.iter().all(|id| !id.is_empty()));
        assert_eq!(log.notes()[1].pitches, vec!["D4"]);

        let fresh = log.append("F4", DurationSymbol::Eighth, 4.0).id.clone();
        assert!(!ids.contains(&fresh));
    }
}
