//! Deadline and state-count limits for a single exploration session.

use std::time::{Duration, Instant};

use super::state_space::AbortReason;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    max_states: usize,
    timeout_secs: u64,
    deadline: Option<Instant>,
}

impl Limits {
    /// `0` disables the respective limit.
    pub(crate) fn start(max_states: usize, timeout_secs: u64) -> Self {
        Self {
            max_states,
            timeout_secs,
            deadline: deadline_from_timeout_secs(timeout_secs),
        }
    }

    pub(crate) fn check(&self, states: usize) -> Option<AbortReason> {
        if self.max_states > 0 && states > self.max_states {
            return Some(AbortReason::StateLimit {
                limit: self.max_states,
            });
        }
        if deadline_exceeded(self.deadline) {
            return Some(AbortReason::Timeout {
                secs: self.timeout_secs,
            });
        }
        None
    }
}

pub(crate) fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    match deadline {
        Some(deadline) => Instant::now() >= deadline,
        None => false,
    }
}

fn timeout_duration(timeout_secs: u64) -> Option<Duration> {
    if timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(timeout_secs))
    }
}

pub(crate) fn deadline_from_timeout_secs(timeout_secs: u64) -> Option<Instant> {
    timeout_duration(timeout_secs).and_then(|t| Instant::now().checked_add(t))
}
