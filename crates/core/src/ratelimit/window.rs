use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{remaining, Admission, RateGate, SweepPolicy};

#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u32,
    resets_at: DateTime<Utc>,
}

/// Counting gate: up to `max_requests` admissions per key per window.
#[derive(Debug)]
pub struct WindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, WindowState>,
    sweep: SweepPolicy,
}

impl WindowLimiter {
    pub fn new(max_requests: u32, window: Duration, sweep_probability: f64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            windows: DashMap::new(),
            sweep: SweepPolicy::new(sweep_probability),
        }
    }

    fn fresh(&self, now: DateTime<Utc>) -> WindowState {
        WindowState {
            count: 1,
            resets_at: now + self.window,
        }
    }
}

impl RateGate for WindowLimiter {
    fn admit(&self, key: &str, now: DateTime<Utc>) -> Admission {
        if self.sweep.should_sweep() {
            self.sweep(now);
        }

        match self.windows.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(self.fresh(now));
                Admission::Admitted
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                if now >= state.resets_at {
                    *state = self.fresh(now);
                    Admission::Admitted
                } else if state.count < self.max_requests {
                    state.count += 1;
                    Admission::Admitted
                } else {
                    Admission::Rejected {
                        retry_after: remaining(state.resets_at - now),
                    }
                }
            }
        }
    }

    fn sweep(&self, now: DateTime<Utc>) {
        self.windows.retain(|_, state| now < state.resets_at);
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}
