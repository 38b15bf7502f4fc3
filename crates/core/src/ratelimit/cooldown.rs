use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{remaining, Admission, RateGate, SweepPolicy};

/// Binary gate: exactly one admission per key per cooldown.
///
/// Used for view counting, where a page refresh inside the cooldown must
/// not count again.
#[derive(Debug)]
pub struct CooldownGate {
    cooldown: Duration,
    last_admitted: DashMap<String, DateTime<Utc>>,
    sweep: SweepPolicy,
}

impl CooldownGate {
    pub fn new(cooldown: Duration, sweep_probability: f64) -> Self {
        Self {
            cooldown,
            last_admitted: DashMap::new(),
            sweep: SweepPolicy::new(sweep_probability),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl RateGate for CooldownGate {
    fn admit(&self, key: &str, now: DateTime<Utc>) -> Admission {
        if self.sweep.should_sweep() {
            self.sweep(now);
        }

        match self.last_admitted.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                Admission::Admitted
            }
            Entry::Occupied(mut slot) => {
                let elapsed = now - *slot.get();
                if elapsed > self.cooldown {
                    slot.insert(now);
                    Admission::Admitted
                } else {
                    Admission::Rejected {
                        retry_after: remaining(self.cooldown - elapsed),
                    }
                }
            }
        }
    }

    fn sweep(&self, now: DateTime<Utc>) {
        let before = self.last_admitted.len();
        self.last_admitted
            .retain(|_, admitted_at| now - *admitted_at <= self.cooldown);
        let removed = before.saturating_sub(self.last_admitted.len());
        if removed > 0 {
            tracing::debug!(removed, "swept expired cooldown entries");
        }
    }

    fn len(&self) -> usize {
        self.last_admitted.len()
    }
}
