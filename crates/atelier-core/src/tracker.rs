//! Per-block time tracking.
//!
//! A block's timer is a two-state machine driven by wall-clock timestamps
//! the caller passes in:
//!
//! ```text
//! Idle -> Running (start: tracking_started_at := now)
//! Running -> Idle (stop: actual_hours += elapsed / 60)
//! ```
//!
//! Starting an already-running timer keeps the original anchor, so elapsed
//! time is never double-counted. Stopping is the only point at which
//! `actual_hours` changes. Timers on distinct blocks are independent; the
//! engine does not enforce a single running timer per account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::CapacityBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Idle,
    Running,
}

/// Summary of a completed tracking interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStopped {
    pub elapsed_minutes: i64,
    /// The block's accumulated actual hours after this stop.
    pub actual_hours: f64,
}

impl CapacityBlock {
    pub fn tracking_state(&self) -> TrackingState {
        if self.tracking_started_at.is_some() {
            TrackingState::Running
        } else {
            TrackingState::Idle
        }
    }

    /// Start the timer. Returns `true` when a new interval actually started;
    /// starting while running is a no-op that keeps the original anchor.
    pub fn start_tracking(&mut self, now: DateTime<Utc>) -> bool {
        if self.tracking_started_at.is_some() {
            return false;
        }
        self.tracking_started_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Minutes elapsed on the running timer as of `now`, zero when idle.
    pub fn elapsed_minutes_at(&self, now: DateTime<Utc>) -> i64 {
        match self.tracking_started_at {
            Some(started) => (now - started).num_minutes().max(0),
            None => 0,
        }
    }

    /// Stop the timer, folding the elapsed interval into `actual_hours`.
    /// Stopping while idle is a no-op and returns `None`.
    pub fn stop_tracking(&mut self, now: DateTime<Utc>) -> Option<TrackingStopped> {
        let elapsed = self.elapsed_minutes_at(now);
        self.tracking_started_at.take()?;
        Some(self.apply_elapsed(elapsed, now))
    }

    /// Stop the timer with a caller-supplied elapsed duration, as the outer
    /// API does. Negative input is clamped to zero.
    pub fn stop_tracking_with_elapsed(
        &mut self,
        elapsed_minutes: i64,
        now: DateTime<Utc>,
    ) -> Option<TrackingStopped> {
        self.tracking_started_at.take()?;
        Some(self.apply_elapsed(elapsed_minutes.max(0), now))
    }

    fn apply_elapsed(&mut self, elapsed_minutes: i64, now: DateTime<Utc>) -> TrackingStopped {
        let hours = elapsed_minutes as f64 / 60.0;
        let total = self.actual_hours.unwrap_or(0.0) + hours;
        self.actual_hours = Some(total);
        self.updated_at = now;
        TrackingStopped {
            elapsed_minutes,
            actual_hours: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::BlockType;
    use chrono::Duration;

    fn block() -> CapacityBlock {
        CapacityBlock::new("tracked work", BlockType::Manual, 2.0)
    }

    #[test]
    fn start_stop_accumulates_hours() {
        let mut block = block();
        let start = Utc::now();
        assert_eq!(block.tracking_state(), TrackingState::Idle);

        assert!(block.start_tracking(start));
        assert_eq!(block.tracking_state(), TrackingState::Running);

        let stopped = block.stop_tracking(start + Duration::minutes(90)).unwrap();
        assert_eq!(stopped.elapsed_minutes, 90);
        assert_eq!(stopped.actual_hours, 1.5);
        assert_eq!(block.actual_hours, Some(1.5));
        assert_eq!(block.tracking_state(), TrackingState::Idle);
    }

    #[test]
    fn second_start_keeps_original_anchor() {
        let mut block = block();
        let start = Utc::now();

        assert!(block.start_tracking(start));
        // A second start ten minutes in must not move the anchor.
        assert!(!block.start_tracking(start + Duration::minutes(10)));
        assert_eq!(block.tracking_started_at, Some(start));

        let stopped = block.stop_tracking(start + Duration::minutes(30)).unwrap();
        assert_eq!(stopped.elapsed_minutes, 30);
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut block = block();
        assert!(block.stop_tracking(Utc::now()).is_none());
        assert_eq!(block.actual_hours, None);
    }

    #[test]
    fn stops_add_up_across_intervals() {
        let mut block = block();
        let t0 = Utc::now();

        block.start_tracking(t0);
        block.stop_tracking(t0 + Duration::minutes(60));
        block.start_tracking(t0 + Duration::minutes(120));
        let stopped = block
            .stop_tracking(t0 + Duration::minutes(150))
            .unwrap();

        assert_eq!(stopped.actual_hours, 1.5);
    }

    #[test]
    fn explicit_elapsed_overrides_wall_clock() {
        let mut block = block();
        let t0 = Utc::now();

        block.start_tracking(t0);
        let stopped = block
            .stop_tracking_with_elapsed(45, t0 + Duration::minutes(5))
            .unwrap();
        assert_eq!(stopped.elapsed_minutes, 45);
        assert_eq!(block.actual_hours, Some(0.75));
    }

    #[test]
    fn negative_elapsed_clamps_to_zero() {
        let mut block = block();
        let t0 = Utc::now();

        block.start_tracking(t0);
        // Clock skew: stop timestamp earlier than the anchor.
        let stopped = block.stop_tracking(t0 - Duration::minutes(10)).unwrap();
        assert_eq!(stopped.elapsed_minutes, 0);
        assert_eq!(block.actual_hours, Some(0.0));
    }

    #[test]
    fn timers_on_distinct_blocks_are_independent() {
        let mut a = block();
        let mut b = block();
        let t0 = Utc::now();

        a.start_tracking(t0);
        b.start_tracking(t0);
        assert_eq!(a.tracking_state(), TrackingState::Running);
        assert_eq!(b.tracking_state(), TrackingState::Running);

        a.stop_tracking(t0 + Duration::minutes(30));
        assert_eq!(b.tracking_state(), TrackingState::Running);
    }
}
