//! Backend health state machine.
//!
//! # State Transitions
//! ```text
//! Alive → Dead: consecutive failures >= unhealthy_threshold
//! Dead → Alive: consecutive successes >= healthy_threshold
//! ```
//!
//! Counters reset on every transition, so a flapping backend has to build up
//! a full streak again before it changes state.

/// A liveness change decided by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameAlive,
    BecameDead,
}

/// Consecutive probe outcome counters for one backend.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful probe of a backend whose current liveness is `alive`.
    pub fn mark_success(&mut self, alive: bool, healthy_threshold: u32) -> Option<Transition> {
        self.consecutive_failures = 0;
        if alive {
            self.consecutive_successes = 0;
            return None;
        }

        self.consecutive_successes += 1;
        if self.consecutive_successes >= healthy_threshold {
            self.consecutive_successes = 0;
            return Some(Transition::BecameAlive);
        }
        None
    }

    /// Record a failed probe of a backend whose current liveness is `alive`.
    pub fn mark_failure(&mut self, alive: bool, unhealthy_threshold: u32) -> Option<Transition> {
        self.consecutive_successes = 0;
        if !alive {
            self.consecutive_failures = 0;
            return None;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= unhealthy_threshold {
            self.consecutive_failures = 0;
            return Some(Transition::BecameDead);
        }
        None
    }
}
