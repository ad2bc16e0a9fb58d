//! # Transcriber
//!
//! The single owner of all mutable state: the held-pitch tracker, the
//! committed note log, the tempo and the layout timer. Every mutation goes
//! through `&mut self`, so events, ticks and tempo changes are serialized by
//! construction.
//!
//! The score is pulled, not pushed: call [`Transcriber::score`] after a
//! mutation, or use [`Transcriber::tick`] from a timer loop.
//!
//! ## Example
//! ```rust
//! use scribe::{DurationSymbol, Transcriber, TranscriberConfig};
//!
//! let mut transcriber = Transcriber::new(TranscriberConfig::default());
//! transcriber.set_tempo(120.0)?;
//! transcriber.onset(60, "C4", 0.0);
//! transcriber.release(60, 0.30);
//!
//! assert_eq!(transcriber.committed_notes()[0].duration, DurationSymbol::Eighth);
//! let score = transcriber.score(0.30);
//! assert_eq!(score.measures.len(), 4);
//! # Ok::<(), scribe::ScribeError>(())
//! ```

use tracing::{info, warn};

use crate::config::TranscriberConfig;
use crate::duration::Tempo;
use crate::error::ScribeError;
use crate::event::{decode_payload, PitchEvent};
use crate::layout::{GlyphEstimator, NotationRenderer, Score};
use crate::note::{HeldPitch, NotatedNote};
use crate::packer::pack;
use crate::scheduler::LayoutScheduler;
use crate::session::SessionPayload;
use crate::tracker::{ActiveNoteTracker, NoteLog};

pub struct Transcriber<R: NotationRenderer = GlyphEstimator> {
    config: TranscriberConfig,
    tempo: Tempo,
    tracker: ActiveNoteTracker,
    log: NoteLog,
    scheduler: LayoutScheduler,
    renderer: R,
}

impl Transcriber<GlyphEstimator> {
    /// Transcriber measuring notes with the built-in width estimate
    pub fn new(config: TranscriberConfig) -> Self {
        Self::with_renderer(config, GlyphEstimator::default())
    }
}

impl<R: NotationRenderer> Transcriber<R> {
    pub fn with_renderer(config: TranscriberConfig, renderer: R) -> Self {
        Self {
            tempo: config.tempo,
            tracker: ActiveNoteTracker::new(config.retrigger),
            log: NoteLog::new(),
            scheduler: LayoutScheduler::new(config.tick_interval),
            config,
            renderer,
        }
    }

    /// Restore from a saved session. Nothing is held afterwards.
    pub fn from_payload(config: TranscriberConfig, renderer: R, payload: SessionPayload) -> Self {
        let mut transcriber = Self::with_renderer(config, renderer);
        transcriber.tempo = payload.tempo;
        transcriber.log = NoteLog::from_notes(payload.notes);
        transcriber
    }

    pub fn to_payload(&self) -> SessionPayload {
        SessionPayload {
            tempo: self.tempo,
            notes: self.log.notes().to_vec(),
        }
    }

    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Change the tempo. Rejects `bpm <= 0`, keeping the previous tempo.
    ///
    /// Committed notes keep their symbols; only held and future notes are
    /// quantized at the new tempo.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), ScribeError> {
        let tempo = Tempo::new(bpm)?;
        info!(from = self.tempo.bpm(), to = bpm, "tempo changed");
        self.tempo = tempo;
        Ok(())
    }

    pub fn onset(&mut self, pitch_id: i32, label: &str, timestamp: f64) {
        self.evict_stale(timestamp);
        self.tracker
            .onset(pitch_id, label, timestamp, self.tempo, &mut self.log);
        self.scheduler.sync(!self.tracker.is_idle(), timestamp);
    }

    /// Release a held pitch. Returns `true` if a note was committed.
    pub fn release(&mut self, pitch_id: i32, timestamp: f64) -> bool {
        self.evict_stale(timestamp);
        let committed = self
            .tracker
            .release(pitch_id, timestamp, self.tempo, &mut self.log)
            .is_some();
        self.scheduler.sync(!self.tracker.is_idle(), timestamp);
        committed
    }

    /// Abandon all held pitches without committing them
    pub fn reset(&mut self, timestamp: f64) {
        self.tracker.reset();
        self.scheduler.sync(false, timestamp);
    }

    /// Empty the log and drop held pitches
    pub fn clear(&mut self, timestamp: f64) {
        self.reset(timestamp);
        self.log.clear();
        info!("score cleared");
    }

    pub fn apply(&mut self, event: &PitchEvent) {
        match event {
            PitchEvent::Onset {
                pitch_id,
                label,
                timestamp,
            } => self.onset(*pitch_id, label, *timestamp),
            PitchEvent::Release {
                pitch_id,
                timestamp,
            } => {
                self.release(*pitch_id, *timestamp);
            }
            PitchEvent::Reset { timestamp } => self.reset(*timestamp),
        }
    }

    /// Decode a raw payload and apply its events in order.
    ///
    /// A malformed payload changes nothing; it is logged and returned as an
    /// error for the caller to count or ignore.
    pub fn handle_payload(&mut self, payload: &str, received_at: f64) -> Result<usize, ScribeError> {
        let events = decode_payload(payload, received_at).map_err(|e| {
            warn!(error = %e, "dropping malformed payload");
            e
        })?;
        for event in &events {
            self.apply(event);
        }
        Ok(events.len())
    }

    /// Timer entry point. Returns a fresh score when a live refresh is due.
    pub fn tick(&mut self, now: f64) -> Option<Score> {
        self.evict_stale(now);
        self.scheduler.sync(!self.tracker.is_idle(), now);
        if self.scheduler.poll(now) {
            Some(self.score(now))
        } else {
            None
        }
    }

    /// Current score, previewing held pitches as of `now`
    pub fn score(&self, now: f64) -> Score {
        pack(
            self.log.notes(),
            &self.tracker.snapshot(),
            self.tempo,
            now,
            &self.config.sequence,
            &self.config.layout,
            &self.renderer,
        )
    }

    pub fn committed_notes(&self) -> &[NotatedNote] {
        self.log.notes()
    }

    pub fn held_pitches(&self) -> Vec<HeldPitch> {
        self.tracker.snapshot()
    }

    pub fn is_holding(&self) -> bool {
        !self.tracker.is_idle()
    }

    pub fn scheduler(&self) -> &LayoutScheduler {
        &self.scheduler
    }

    fn evict_stale(&mut self, now: f64) {
        if let Some(timeout) = self.config.hold_timeout {
            self.tracker
                .evict_stale(now, timeout, self.tempo, &mut self.log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::DurationSymbol;

    fn transcriber() -> Transcriber {
        Transcriber::new(TranscriberConfig::default())
    }

    #[test]
    fn test_set_tempo_rejects_non_positive() {
        let mut t = transcriber();
        t.set_tempo(120.0).unwrap();
        assert!(matches!(t.set_tempo(0.0), Err(ScribeError::InvalidArgument(_))));
        assert!(t.set_tempo(-60.0).is_err());
        assert_eq!(t.tempo().bpm(), 120.0);
    }

    #[test]
    fn test_timer_follows_held_state() {
        let mut t = transcriber();
        assert!(!t.scheduler().is_running());

        t.onset(60, "C4", 0.0);
        t.onset(64, "E4", 0.05);
        assert!(t.scheduler().is_running());

        t.release(60, 0.5);
        assert!(t.scheduler().is_running());

        t.release(64, 0.6);
        assert!(!t.scheduler().is_running());
        assert!(t.tick(10.0).is_none());
    }

    #[test]
    fn test_tick_grows_provisional_note() {
        let mut t = transcriber();
        t.set_tempo(60.0).unwrap();
        t.onset(60, "C4", 0.0);

        let early = t.tick(0.1).expect("tick due at 100ms");
        let note = &early.measures[0].measure.notes[0];
        assert!(note.is_provisional);
        assert_eq!(note.duration, DurationSymbol::Sixteenth);

        assert!(t.tick(0.15).is_none());

        let later = t.tick(2.0).expect("tick due");
        assert_eq!(later.measures[0].measure.notes[0].duration, DurationSymbol::Half);
    }

    #[test]
    fn test_malformed_payload_changes_nothing() {
        let mut t = transcriber();
        assert!(t.handle_payload("{oops", 0.0).is_err());
        assert!(t.committed_notes().is_empty());
        assert!(!t.is_holding());
    }

    #[test]
    fn test_handle_payload_applies_batch() {
        let mut t = transcriber();
        t.set_tempo(120.0).unwrap();
        let applied = t
            .handle_payload(
                r#"{"events": [
                    {"kind": "onset", "pitchId": 60, "label": "C4", "timestamp": 0.0},
                    {"kind": "release", "pitchId": 60, "timestamp": 0.5},
                    {"kind": "release", "pitchId": 99, "timestamp": 0.6}
                ]}"#,
                0.0,
            )
            .unwrap();
        assert_eq!(applied, 3);
        assert_eq!(t.committed_notes().len(), 1);
        assert_eq!(t.committed_notes()[0].duration, DurationSymbol::Quarter);
    }

    #[test]
    fn test_hold_timeout_evicts_on_tick() {
        let mut config = TranscriberConfig::default();
        config.hold_timeout = Some(5.0);
        let mut t = Transcriber::new(config);
        t.onset(60, "C4", 0.0);

        t.tick(6.0);
        assert!(!t.is_holding());
        assert_eq!(t.committed_notes().len(), 1);
        assert!(!t.scheduler().is_running());
    }

    #[test]
    fn test_reset_abandons_and_stops_timer() {
        let mut t = transcriber();
        t.onset(60, "C4", 0.0);
        t.apply(&PitchEvent::Reset { timestamp: 0.2 });
        assert!(!t.is_holding());
        assert!(t.committed_notes().is_empty());
        assert!(!t.scheduler().is_running());
    }

    #[test]
    fn test_payload_round_trip_restores_log() {
        let mut t = transcriber();
        t.onset(60, "C4", 0.0);
        t.release(60, 0.6);
        t.onset(62, "D4", 0.7);

        let payload = t.to_payload();
        assert_eq!(payload.notes.len(), 1);

        let restored = Transcriber::from_payload(
            TranscriberConfig::default(),
            GlyphEstimator::default(),
            payload,
        );
        assert_eq!(restored.committed_notes(), t.committed_notes());
        assert!(!restored.is_holding());
        assert_eq!(restored.score(1.0).note_count(), 1);
    }

    #[test]
    fn test_clear() {
        let mut t = transcriber();
        t.onset(60, "C4", 0.0);
        t.release(60, 0.6);
        t.onset(62, "D4", 0.7);
        t.clear(0.8);

        assert!(t.committed_notes().is_empty());
        assert!(!t.is_holding());
        assert_eq!(t.score(1.0).placeholder_count(), 4);
    }
}
