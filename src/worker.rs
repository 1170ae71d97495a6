use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::{error, info};
use typed_builder::TypedBuilder;

use crate::error::SumpError;
use crate::queue::{JobQueue, QueueError, DRAIN_TRIGGER};
use crate::scheduler::CronTable;
use crate::store::OptionStore;

/// Drives a [`CronTable`]-scheduled queue: polls for a due drain trigger
/// and runs the drain on the queue's behalf.
///
/// Drain failures end up here, not in application code; they are logged and
/// the loop keeps going.
#[derive(Clone, TypedBuilder)]
pub struct Worker<S>
where
    S: OptionStore + Clone + Send + Sync + 'static,
{
    #[builder(setter(into))]
    pub queue: JobQueue<S, CronTable>,
    #[builder(setter(into))]
    pub cron: CronTable,
    #[builder(default = Duration::from_secs(1))]
    pub check_period: Duration,
}

impl<S> Worker<S>
where
    S: OptionStore + Clone + Send + Sync + 'static,
{
    /// Runs one poll: fires the drain trigger if it is due and drains one
    /// job. A no-op when nothing is due.
    pub fn tick(&self) -> Result<(), QueueError> {
        if self.cron.fire_due(DRAIN_TRIGGER, Utc::now()) {
            self.queue.drain()
        } else {
            Ok(())
        }
    }

    /// Spawns the polling loop on a named thread.
    pub fn start(self) -> Result<(), SumpError> {
        info!("starting worker thread");

        let builder = thread::Builder::new().name("sump_worker".to_string());
        builder.spawn(move || self.run_loop())?;

        Ok(())
    }

    fn run_loop(&self) {
        loop {
            if let Err(err) = self.tick() {
                error!("failed to drain the queue: {:?}", err);
            }

            thread::sleep(self.check_period);
        }
    }
}

#[cfg(test)]
mod worker_tests {
    use std::sync::{Arc, Mutex};

    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use crate::handler::{HandlerError, HandlerRegistry, JobHandler, Payload};
    use crate::scheduler::Scheduler;
    use crate::store::MemoryStore;

    #[derive(Clone, Default)]
    struct RecordingHandler {
        calls: Arc<Mutex<Vec<Payload>>>,
    }

    impl JobHandler for RecordingHandler {
        fn handle(&self, payload: &Payload) -> Result<(), HandlerError> {
            self.calls.lock().unwrap().push(payload.clone());

            Ok(())
        }
    }

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn tick_is_a_no_op_until_the_trigger_is_due() {
        let store = MemoryStore::new();
        let cron = CronTable::new();

        let handler = RecordingHandler::default();
        let calls = handler.calls.clone();

        let mut registry = HandlerRegistry::new();
        registry.register("send_welcome_email", handler);

        let queue = JobQueue::builder()
            .store(store.clone())
            .scheduler(cron.clone())
            .registry(registry)
            .build();

        let worker: Worker<MemoryStore> = Worker::builder()
            .queue(queue.clone())
            .cron(cron.clone())
            .build();

        queue
            .push("send_welcome_email", payload(json!({ "user_id": 42 })))
            .unwrap();

        // armed for the future, so nothing happens yet
        worker.tick().unwrap();
        assert!(calls.lock().unwrap().is_empty());
        assert!(cron.is_pending(DRAIN_TRIGGER));

        cron.schedule_once(DRAIN_TRIGGER, Utc::now() - Duration::seconds(1));
        worker.tick().unwrap();

        assert_eq!(vec![payload(json!({ "user_id": 42 }))], *calls.lock().unwrap());
        assert!(queue.pending_jobs().unwrap().is_empty());
        assert!(!cron.is_pending(DRAIN_TRIGGER));
    }

    #[test]
    fn consecutive_due_ticks_drain_the_whole_queue() {
        let store = MemoryStore::new();
        let cron = CronTable::new();

        let handler = RecordingHandler::default();
        let calls = handler.calls.clone();

        let mut registry = HandlerRegistry::new();
        registry.register("send_welcome_email", handler);

        let queue = JobQueue::builder()
            .store(store.clone())
            .scheduler(cron.clone())
            .registry(registry)
            .build();

        let worker: Worker<MemoryStore> = Worker::builder()
            .queue(queue.clone())
            .cron(cron.clone())
            .build();

        queue
            .push("send_welcome_email", payload(json!({ "user_id": 42 })))
            .unwrap();
        queue
            .push("send_welcome_email", payload(json!({ "user_id": 43 })))
            .unwrap();

        for _ in 0..2 {
            cron.schedule_once(DRAIN_TRIGGER, Utc::now() - Duration::seconds(1));
            worker.tick().unwrap();
        }

        assert_eq!(
            vec![
                payload(json!({ "user_id": 42 })),
                payload(json!({ "user_id": 43 })),
            ],
            *calls.lock().unwrap()
        );
        assert!(queue.pending_jobs().unwrap().is_empty());
        assert!(!cron.is_pending(DRAIN_TRIGGER));
    }
}
