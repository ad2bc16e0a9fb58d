//! # Layout Scheduler
//!
//! A single repeating timer that asks for a fresh layout while any pitch is
//! held, so the provisional notes visibly grow. It is the only source of
//! time-driven recomputation; everything else is driven by events.
//!
//! The timer does not run by itself. The owner calls [`LayoutScheduler::sync`]
//! after every state change (start when something is held, cancel when
//! nothing is) and [`LayoutScheduler::poll`] whenever it wakes up.

use std::time::Duration;
use tracing::debug;

/// Default time between live layout refreshes
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutScheduler {
    interval: Duration,
    next_tick: Option<f64>,
}

impl Default for LayoutScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl LayoutScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start or cancel the timer to match the held-pitch state.
    ///
    /// Starting an already running timer keeps its current deadline.
    pub fn sync(&mut self, holding: bool, now: f64) {
        match (holding, self.next_tick) {
            (true, None) => {
                self.next_tick = Some(now + self.interval.as_secs_f64());
                debug!(now, "layout timer started");
            }
            (false, Some(_)) => {
                self.next_tick = None;
                debug!(now, "layout timer cancelled");
            }
            _ => {}
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Time of the next tick, if the timer is running
    pub fn deadline(&self) -> Option<f64> {
        self.next_tick
    }

    /// Wait until the next tick, zero if it is already due.
    ///
    /// A deadline too far away to fit in a `Duration` saturates to
    /// `Duration::MAX`.
    pub fn time_until_tick(&self, now: f64) -> Option<Duration> {
        self.next_tick.map(|tick| {
            Duration::try_from_secs_f64((tick - now).max(0.0)).unwrap_or(Duration::MAX)
        })
    }

    /// Returns `true` when a tick is due, and schedules the following one.
    ///
    /// Missed ticks are not replayed: after a long stall the next tick is one
    /// interval from `now`.
    pub fn poll(&mut self, now: f64) -> bool {
        let Some(tick) = self.next_tick else {
            return false;
        };
        if now < tick {
            return false;
        }

        let interval = self.interval.as_secs_f64();
        let mut next = tick + interval;
        if next <= now {
            next = now + interval;
        }
        self.next_tick = Some(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_until_holding() {
        let mut scheduler = LayoutScheduler::default();
        assert!(!scheduler.is_running());
        assert!(!scheduler.poll(100.0));

        scheduler.sync(false, 0.0);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_ticks_at_interval() {
        let mut scheduler = LayoutScheduler::new(Duration::from_millis(100));
        scheduler.sync(true, 1.0);
        assert_eq!(scheduler.deadline(), Some(1.1));

        assert!(!scheduler.poll(1.05));
        assert!(scheduler.poll(1.1));
        assert!((scheduler.deadline().unwrap() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_sync_keeps_running_deadline() {
        let mut scheduler = LayoutScheduler::new(Duration::from_millis(100));
        scheduler.sync(true, 1.0);
        scheduler.sync(true, 1.05);
        assert_eq!(scheduler.deadline(), Some(1.1));
    }

    #[test]
    fn test_cancel_is_immediate() {
        let mut scheduler = LayoutScheduler::new(Duration::from_millis(100));
        scheduler.sync(true, 0.0);
        scheduler.sync(false, 0.05);
        assert!(!scheduler.is_running());
        assert!(!scheduler.poll(5.0));
        assert_eq!(scheduler.time_until_tick(5.0), None);
    }

    #[test]
    fn test_stall_does_not_replay_missed_ticks() {
        let mut scheduler = LayoutScheduler::new(Duration::from_millis(100));
        scheduler.sync(true, 0.0);
        assert!(scheduler.poll(2.0));
        assert!(!scheduler.poll(2.05));
        assert!(scheduler.poll(2.1));
    }

    #[test]
    fn test_time_until_tick_clamps() {
        let mut scheduler = LayoutScheduler::new(Duration::from_millis(250));
        scheduler.sync(true, 0.0);
        assert_eq!(scheduler.time_until_tick(0.0), Some(Duration::from_millis(250)));
        assert_eq!(scheduler.time_until_tick(1.0), Some(Duration::ZERO));
    }

    #[test]
    fn test_time_until_far_deadline_saturates() {
        let mut scheduler = LayoutScheduler::default();
        scheduler.sync(true, 1e20);
        assert_eq!(scheduler.time_until_tick(0.0), Some(Duration::MAX));
        assert_eq!(scheduler.time_until_tick(f64::NEG_INFINITY), Some(Duration::MAX));
    }
}
