//! # Live Loop
//!
//! Drives a [`Transcriber`] from a channel of raw event payloads.
//!
//! The loop runs on one thread and is the only code touching the
//! transcriber. It blocks on the channel, but never past the layout timer's
//! next deadline, so held notes keep growing on screen while the detector is
//! silent. A fresh score is published after every applied payload and every
//! timer tick. The loop ends when every sender has been dropped, and hands
//! the transcriber back for saving.
//!
//! Event timestamps are rebased onto the loop clock before they reach the
//! transcriber. The first event fixes the offset between the two time bases;
//! later events keep their spacing. Hold timeouts and timer ticks therefore
//! compare like with like, whatever origin the event source counts from.

use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::event::{decode_payload, PitchEvent};
use crate::layout::{NotationRenderer, Score};
use crate::transcriber::Transcriber;

/// Source of the current time, in seconds
pub trait Clock {
    fn now(&self) -> f64;
}

/// Seconds elapsed since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Offset from the event source's time base to the clock's
#[derive(Debug, Default)]
struct TimeBase {
    offset: Option<f64>,
}

impl TimeBase {
    /// `now` expressed in the source's time base
    fn source_time(&self, now: f64) -> f64 {
        now - self.offset.unwrap_or(0.0)
    }

    fn rebase(&mut self, event: &mut PitchEvent, now: f64) {
        let at = event.timestamp();
        let offset = *self.offset.get_or_insert_with(|| {
            debug!(source = at, clock = now, "event time base aligned to clock");
            now - at
        });
        event.set_timestamp(at + offset);
    }
}

/// Run until the channel disconnects
pub fn run<R, C, F>(
    mut transcriber: Transcriber<R>,
    payloads: &Receiver<String>,
    clock: &C,
    mut publish: F,
) -> Transcriber<R>
where
    R: NotationRenderer,
    C: Clock + ?Sized,
    F: FnMut(&Score),
{
    info!("live transcription started");
    let mut time_base = TimeBase::default();
    loop {
        if let Some(score) = transcriber.tick(clock.now()) {
            publish(&score);
        }

        let received = match transcriber.scheduler().time_until_tick(clock.now()) {
            Some(wait) => payloads.recv_timeout(wait),
            None => payloads
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(payload) => {
                let now = clock.now();
                match decode_payload(&payload, time_base.source_time(now)) {
                    Ok(mut events) => {
                        for event in &mut events {
                            time_base.rebase(event, now);
                            transcriber.apply(event);
                        }
                        debug!(count = events.len(), "payload applied");
                        publish(&transcriber.score(now));
                    }
                    Err(e) => warn!(error = %e, "dropping malformed payload"),
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(
        notes = transcriber.committed_notes().len(),
        "event source disconnected, live transcription stopped"
    );
    transcriber
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranscriberConfig;
    use crate::duration::DurationSymbol;
    use crossbeam::channel::unbounded;
    use std::cell::Cell;
    use std::thread;
    use std::time::Duration;

    /// Advances by a fixed step on every reading
    struct SteppingClock {
        now: Cell<f64>,
        step: f64,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> f64 {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    #[test]
    fn test_drains_channel_and_returns_on_disconnect() {
        let (tx, rx) = unbounded();
        tx.send(r#"{"kind": "onset", "pitchId": 60, "label": "C4", "timestamp": 0.0}"#.to_string())
            .unwrap();
        tx.send("garbage".to_string()).unwrap();
        tx.send(r#"{"kind": "release", "pitchId": 60, "timestamp": 1.0}"#.to_string())
            .unwrap();
        drop(tx);

        let clock = SteppingClock {
            now: Cell::new(0.0),
            step: 0.01,
        };
        let mut published = 0;
        let mut transcriber = Transcriber::new(TranscriberConfig::default());
        transcriber.set_tempo(60.0).unwrap();

        let transcriber = run(transcriber, &rx, &clock, |_| published += 1);

        assert_eq!(transcriber.committed_notes().len(), 1);
        assert_eq!(
            transcriber.committed_notes()[0].duration,
            DurationSymbol::Quarter
        );
        assert!(!transcriber.is_holding());
        // two valid payloads, the malformed one publishes nothing
        assert!(published >= 2);
    }

    #[test]
    fn test_source_time_base_differs_from_clock() {
        let (tx, rx) = unbounded();
        tx.send(r#"{"kind": "onset", "pitchId": 60, "label": "C4", "timestamp": 12.5}"#.to_string())
            .unwrap();
        tx.send(r#"{"kind": "onset", "pitchId": 64, "label": "E4", "timestamp": 13.0}"#.to_string())
            .unwrap();
        tx.send(r#"{"kind": "release", "pitchId": 64, "timestamp": 14.0}"#.to_string())
            .unwrap();
        drop(tx);

        let clock = SteppingClock {
            now: Cell::new(100.0),
            step: 0.01,
        };
        let mut transcriber = Transcriber::new(TranscriberConfig::default());
        transcriber.set_tempo(60.0).unwrap();

        let transcriber = run(transcriber, &rx, &clock, |_| {});

        // C4 is still held: nothing evicted by the hold timeout
        assert!(transcriber.is_holding());
        let held = transcriber.held_pitches();
        assert_eq!(held.len(), 1);
        assert!(held[0].onset_time >= 100.0);

        let notes = transcriber.committed_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitches, vec!["E4"]);
        assert_eq!(notes[0].duration, DurationSymbol::Quarter);
    }

    #[test]
    fn test_out_of_range_timestamp_does_not_stop_loop() {
        let (tx, rx) = unbounded();
        tx.send(r#"{"kind": "onset", "pitchId": 61, "label": "C#4", "timestamp": 1e20}"#.to_string())
            .unwrap();
        tx.send(r#"{"kind": "onset", "pitchId": 60, "label": "C4", "timestamp": 0.0}"#.to_string())
            .unwrap();
        tx.send(r#"{"kind": "release", "pitchId": 60, "timestamp": 1.0}"#.to_string())
            .unwrap();
        drop(tx);

        let clock = SteppingClock {
            now: Cell::new(0.0),
            step: 0.01,
        };
        let mut transcriber = Transcriber::new(TranscriberConfig::default());
        transcriber.set_tempo(60.0).unwrap();

        let transcriber = run(transcriber, &rx, &clock, |_| {});

        assert!(!transcriber.is_holding());
        assert_eq!(transcriber.committed_notes().len(), 1);
        assert_eq!(transcriber.committed_notes()[0].pitches, vec!["C4"]);
    }

    #[test]
    fn test_ticks_while_holding() {
        let (tx, rx) = unbounded();
        let sender = thread::spawn(move || {
            tx.send(r#"{"type": "note_on", "midi": 67, "note": "G4"}"#.to_string())
                .unwrap();
            thread::sleep(Duration::from_millis(350));
            tx.send(r#"{"type": "note_off", "midi": 67}"#.to_string())
                .unwrap();
        });

        let mut live_previews = 0;
        let transcriber = run(
            Transcriber::new(TranscriberConfig::default()),
            &rx,
            &SystemClock::new(),
            |score| {
                if score
                    .measures
                    .iter()
                    .any(|m| m.measure.has_provisional())
                {
                    live_previews += 1;
                }
            },
        );
        sender.join().unwrap();

        assert!(live_previews >= 2, "got {} live previews", live_previews);
        assert_eq!(transcriber.committed_notes().len(), 1);
        assert!(!transcriber.scheduler().is_running());
    }
}
