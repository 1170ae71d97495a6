use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::SumpError;
use crate::queue::{JobQueue, DRAIN_TRIGGER};
use crate::scheduler::Scheduler;
use crate::store::OptionStore;

pub const VERSION_OPTION: &str = "sump_version";
pub const SETTINGS_OPTION: &str = "sump_settings";

/// Host-application settings persisted in the option store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub enabled: bool,
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: true,
            debug_mode: false,
        }
    }
}

impl Settings {
    /// An absent record loads as the defaults.
    pub fn load(store: &impl OptionStore) -> Result<Self, SumpError> {
        match store.load(SETTINGS_OPTION)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Settings::default()),
        }
    }

    pub fn save(&self, store: &impl OptionStore) -> Result<(), SumpError> {
        let bytes = serde_json::to_vec(self)?;
        store.save(SETTINGS_OPTION, &bytes)?;

        Ok(())
    }
}

/// Records the running version and seeds default settings on first
/// install. Existing settings are left untouched.
pub fn activate(store: &impl OptionStore) -> Result<(), SumpError> {
    let version = serde_json::to_vec(env!("CARGO_PKG_VERSION"))?;
    store.save(VERSION_OPTION, &version)?;

    if store.load(SETTINGS_OPTION)?.is_none() {
        Settings::default().save(store)?;
    }

    Ok(())
}

/// Cancels the pending drain and drops cached state. Queued jobs stay
/// persisted; the next push arms the drain again.
pub fn deactivate<S>(scheduler: &impl Scheduler, cache: &Cache<S>) -> Result<(), SumpError>
where
    S: OptionStore,
{
    scheduler.cancel(DRAIN_TRIGGER);
    cache.flush()?;

    Ok(())
}

/// Removes every record this crate owns: the queue, cached state, settings,
/// and the recorded version.
pub fn uninstall<S, C>(
    queue: &JobQueue<S, C>,
    cache: &Cache<S>,
    store: &S,
) -> Result<(), SumpError>
where
    S: OptionStore,
    C: Scheduler,
{
    queue.clear()?;
    cache.flush()?;
    store.remove(SETTINGS_OPTION)?;
    store.remove(VERSION_OPTION)?;

    Ok(())
}

#[cfg(test)]
mod lifecycle_tests {
    use serde_json::json;

    use super::*;
    use crate::handler::HandlerRegistry;
    use crate::scheduler::CronTable;
    use crate::store::MemoryStore;

    fn fixtures(
        store: &MemoryStore,
        cron: &CronTable,
    ) -> (JobQueue<MemoryStore, CronTable>, Cache<MemoryStore>) {
        let queue = JobQueue::builder()
            .store(store.clone())
            .scheduler(cron.clone())
            .registry(HandlerRegistry::new())
            .build();
        let cache = Cache::builder().store(store.clone()).build();

        (queue, cache)
    }

    #[test]
    fn activate_seeds_defaults_on_first_install() {
        let store = MemoryStore::new();

        activate(&store).unwrap();

        assert!(store.load(VERSION_OPTION).unwrap().is_some());
        assert_eq!(Settings::default(), Settings::load(&store).unwrap());
    }

    #[test]
    fn activate_preserves_existing_settings() {
        let store = MemoryStore::new();

        let settings = Settings {
            enabled: false,
            debug_mode: true,
        };
        settings.save(&store).unwrap();

        activate(&store).unwrap();

        assert_eq!(settings, Settings::load(&store).unwrap());
    }

    #[test]
    fn deactivate_cancels_the_drain_but_keeps_queued_jobs() {
        let store = MemoryStore::new();
        let cron = CronTable::new();
        let (queue, cache) = fixtures(&store, &cron);

        queue
            .push("send_welcome_email", json!({}).as_object().cloned().unwrap())
            .unwrap();
        cache.set("greeting", json!("hello")).unwrap();

        deactivate(&cron, &cache).unwrap();

        assert!(!cron.is_pending(DRAIN_TRIGGER));
        assert_eq!(1, queue.pending_jobs().unwrap().len());
        assert!(!cache.has("greeting").unwrap());
    }

    #[test]
    fn uninstall_sweeps_every_record() {
        let store = MemoryStore::new();
        let cron = CronTable::new();
        let (queue, cache) = fixtures(&store, &cron);

        activate(&store).unwrap();
        queue
            .push("send_welcome_email", json!({}).as_object().cloned().unwrap())
            .unwrap();
        cache.set("greeting", json!("hello")).unwrap();

        uninstall(&queue, &cache, &store).unwrap();

        assert!(store.keys("sump_").unwrap().is_empty());
        assert!(!cron.is_pending(DRAIN_TRIGGER));
    }

    #[test]
    fn uninstall_from_a_clean_state_is_fine() {
        let store = MemoryStore::new();
        let cron = CronTable::new();
        let (queue, cache) = fixtures(&store, &cron);

        uninstall(&queue, &cache, &store).unwrap();

        assert!(store.keys("sump_").unwrap().is_empty());
    }
}
