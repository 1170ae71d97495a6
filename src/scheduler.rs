use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

/// Scheduled-trigger facility: at most one pending fire time per trigger
/// name. Scheduling and cancellation are fire-and-forget.
pub trait Scheduler: Send + Sync {
    fn is_pending(&self, trigger: &str) -> bool;

    fn schedule_once(&self, trigger: &str, at: DateTime<Utc>);

    fn cancel(&self, trigger: &str);
}

/// In-process trigger table. Clones share the same entries.
///
/// The table only records fire times; something has to drive it. A
/// [`Worker`](crate::Worker) polls [`CronTable::fire_due`] and runs the
/// matching callback.
#[derive(Clone, Default)]
pub struct CronTable {
    entries: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl CronTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_scheduled(&self, trigger: &str) -> Option<DateTime<Utc>> {
        self.entries().get(trigger).copied()
    }

    /// Removes and reports a due entry.
    ///
    /// The entry is consumed before the caller runs the trigger's callback,
    /// so the callback can re-arm the same trigger.
    pub fn fire_due(&self, trigger: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries();

        match entries.get(trigger) {
            Some(at) if *at <= now => {
                entries.remove(trigger);
                true
            }
            _ => false,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // every update leaves the map consistent, so a poisoned lock still
        // holds usable state
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for CronTable {
    fn is_pending(&self, trigger: &str) -> bool {
        self.entries().contains_key(trigger)
    }

    fn schedule_once(&self, trigger: &str, at: DateTime<Utc>) {
        self.entries().insert(trigger.to_string(), at);
    }

    fn cancel(&self, trigger: &str) {
        self.entries().remove(trigger);
    }
}
