//! Scheduling policy and drain throttle.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// When a drain runs relative to `invalidate`.
///
/// The crate carries no ambient event loop, so the deferred policies hand
/// the decision to an explicit pump: under `Microtask` the drain runs at the
/// next [`App::flush`](crate::App::flush) after the current call stack
/// unwinds; under `Frame` at the next [`App::tick`](crate::App::tick),
/// throttled to `max_ups` drains per second. `Sync` drains inside
/// `invalidate` itself, in the caller's stack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheduling {
    Sync,
    Microtask,
    #[default]
    Frame,
}

/// Drain gate: coalesces invalidations per policy and applies the frame
/// throttle.
#[derive(Debug)]
pub(crate) struct Scheduler {
    policy: Scheduling,
    min_interval: Duration,
    pending: bool,
    last_drain: Option<Instant>,
    /// Loop mode: every tick drains, mutations or not.
    run_loop: bool,
}

impl Scheduler {
    pub fn new(policy: Scheduling, max_ups: u32, run_loop: bool) -> Self {
        let max_ups = max_ups.max(1);
        Self {
            policy,
            min_interval: Duration::from_secs(1) / max_ups,
            pending: false,
            last_drain: None,
            run_loop,
        }
    }

    pub fn policy(&self) -> Scheduling {
        self.policy
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Note an invalidation. Returns `true` when the caller must drain now
    /// (sync policy); deferred policies coalesce into the pending flag.
    pub fn invalidate(&mut self) -> bool {
        self.pending = true;
        self.policy == Scheduling::Sync
    }

    /// Microtask pump: drain whenever anything is pending.
    pub fn should_flush(&self) -> bool {
        self.pending
    }

    /// Frame pump: drain when pending (or looping) and the throttle slot is
    /// open. Invalidations arriving inside a closed slot stay pending and
    /// coalesce into the next open tick.
    pub fn should_tick(&self, now: Instant) -> bool {
        (self.pending || self.run_loop) && self.slot_open(now)
    }

    fn slot_open(&self, now: Instant) -> bool {
        self.last_drain
            .map_or(true, |last| now.duration_since(last) >= self.min_interval)
    }

    /// A drain is starting: consume the pending flag. Invalidations made
    /// while the drain runs re-set it and land in the next drain.
    pub fn begin_drain(&mut self) {
        self.pending = false;
    }

    /// A drain finished: start the throttle slot.
    pub fn end_drain(&mut self, now: Instant) {
        self.last_drain = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_drains_immediately() {
        let mut s = Scheduler::new(Scheduling::Sync, 120, false);
        assert!(s.invalidate());
        assert!(s.invalidate());
    }

    #[test]
    fn deferred_policies_coalesce() {
        let mut s = Scheduler::new(Scheduling::Microtask, 120, false);
        assert!(!s.invalidate());
        assert!(!s.invalidate());
        assert!(s.should_flush());
        s.begin_drain();
        s.end_drain(Instant::now());
        assert!(!s.should_flush());
    }

    #[test]
    fn invalidation_during_a_drain_stays_pending() {
        let mut s = Scheduler::new(Scheduling::Microtask, 120, false);
        s.invalidate();
        s.begin_drain();
        // An executor mutates mid-drain.
        s.invalidate();
        s.end_drain(Instant::now());
        assert!(s.should_flush());
    }

    #[test]
    fn frame_ticks_respect_the_throttle() {
        let mut s = Scheduler::new(Scheduling::Frame, 120, false);
        let t0 = Instant::now();
        s.invalidate();
        assert!(s.should_tick(t0));
        s.begin_drain();
        s.end_drain(t0);
        s.invalidate();
        // Same instant: slot closed.
        assert!(!s.should_tick(t0));
        // One slot later it opens, and the invalidation is still pending.
        assert!(s.should_tick(t0 + Duration::from_millis(9)));
    }

    #[test]
    fn loop_mode_ticks_without_invalidations() {
        let s = Scheduler::new(Scheduling::Frame, 120, true);
        assert!(s.should_tick(Instant::now()));
    }
}
