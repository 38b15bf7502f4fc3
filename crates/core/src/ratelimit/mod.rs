//! In-process admission gates.
//!
//! Both gates keep their state in a [`DashMap`](dashmap::DashMap) and are
//! lost on restart. Expired entries are swept opportunistically: each
//! `admit` call runs a sweep with a small probability instead of relying
//! on a timer.

pub mod cooldown;
pub mod window;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use cooldown::CooldownGate;
pub use window::WindowLimiter;

/// Result of an admission check. Rejection is an ordinary outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// Whole seconds until the key may be admitted again, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Admission::Admitted => 0,
            Admission::Rejected { retry_after } => {
                let secs = retry_after.as_secs();
                if retry_after.subsec_nanos() > 0 {
                    secs + 1
                } else {
                    secs
                }
            }
        }
    }
}

/// Key-based admission control with a fixed time window.
pub trait RateGate: Send + Sync {
    fn admit(&self, key: &str, now: DateTime<Utc>) -> Admission;

    /// Drop entries whose window has passed.
    fn sweep(&self, now: DateTime<Utc>);

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decides whether a given `admit` call should also sweep.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SweepPolicy {
    probability: f64,
}

impl SweepPolicy {
    pub(crate) fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub(crate) fn should_sweep(&self) -> bool {
        if self.probability <= 0.0 {
            return false;
        }
        if self.probability >= 1.0 {
            return true;
        }
        rand::random::<f64>() < self.probability
    }
}

/// Convert the non-negative part of a chrono duration to std.
pub(crate) fn remaining(delta: chrono::Duration) -> Duration {
    delta.to_std().unwrap_or(Duration::ZERO)
}
