// Flag memory - remembers which messages already got a notice, for a while.
//
// Webhook providers deliver the same underlying incident several ways (the
// native flag event, our own heuristic on the new-message event, an AI queue
// item), and sometimes all at once. This store is what keeps that down to a
// single notice per message id per TTL window.
//
// Entries are never deleted explicitly. An expired entry is dropped the next
// time someone looks it up, or by `purge_expired` if a sweeper is running.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Default window during which a message id stays "recently flagged".
pub const DEFAULT_FLAG_TTL_SECS: i64 = 5 * 60;

/// Source of "now". Swapped for a manual clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct FlagMemory {
    /// Message id -> when the first notice for it was dispatched
    entries: DashMap<String, DateTime<Utc>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FlagMemory {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    fn is_fresh(&self, flagged_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(flagged_at) <= self.ttl
    }

    /// True if `id` got a notice within the TTL window.
    ///
    /// An expired entry is removed on the way out.
    pub fn was_recently_flagged(&self, id: &str) -> bool {
        let now = self.clock.now();
        if self
            .entries
            .remove_if(id, |_, flagged_at| !self.is_fresh(*flagged_at, now))
            .is_some()
        {
            return false;
        }
        self.entries.contains_key(id)
    }

    /// Record `id` as flagged now, replacing any earlier timestamp.
    #[allow(dead_code)]
    pub fn remember(&self, id: &str) {
        self.entries.insert(id.to_string(), self.clock.now());
    }

    /// Check-and-remember as one step.
    ///
    /// Returns true for exactly one caller per id per window: the entry is
    /// held under the shard lock between the check and the insert, so two
    /// tasks racing on the same id cannot both win.
    pub fn claim(&self, id: &str) -> bool {
        let now = self.clock.now();
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if self.is_fresh(*entry.get(), now) {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, flagged_at| {
            let keep = self.is_fresh(*flagged_at, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of resident entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FlagMemory {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_FLAG_TTL_SECS))
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Utc::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
