use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::handler::{HandlerError, HandlerRegistry, Payload};
use crate::scheduler::Scheduler;
use crate::store::{OptionStore, StoreError};

/// Store key the queue is persisted under.
pub const QUEUE_OPTION: &str = "sump_queue";

/// Trigger name used to arm queue draining.
pub const DRAIN_TRIGGER: &str = "sump_process_queue";

/// How far in the future a drain is armed when a job is pushed.
pub const DEFAULT_DRAIN_DELAY_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("corrupt queue record")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// A unit of deferred work, persisted until it is popped for execution.
///
/// The id is carried for traceability only; the queue never looks a job up
/// by it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub handler: String,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

/// Append-only FIFO queue of deferred jobs, persisted as a single record in
/// the option store and drained one job per trigger fire.
///
/// The persisted record is the sole source of truth; no queue state survives
/// in memory across calls. Draining pops a job and persists the shortened
/// queue *before* the handler runs, so delivery is at most once: a handler
/// failure or a crash mid-execution loses that job rather than redelivering
/// it.
#[derive(Clone, TypedBuilder)]
pub struct JobQueue<S, C>
where
    S: OptionStore,
    C: Scheduler,
{
    #[builder(setter(into))]
    store: S,
    #[builder(setter(into))]
    scheduler: C,
    #[builder(setter(into))]
    registry: Arc<HandlerRegistry>,
    #[builder(default = Duration::seconds(DEFAULT_DRAIN_DELAY_SECS))]
    drain_delay: Duration,
}

impl<S, C> JobQueue<S, C>
where
    S: OptionStore,
    C: Scheduler,
{
    /// Appends a job to the persisted queue and makes sure a drain is
    /// armed.
    ///
    /// If persisting fails the error is propagated and the job is not
    /// enqueued; no trigger is armed either.
    pub fn push(&self, handler: impl Into<String>, payload: Payload) -> Result<(), QueueError> {
        let job = Job {
            id: Uuid::new_v4(),
            handler: handler.into(),
            payload,
            created_at: Utc::now(),
        };

        let mut jobs = self.load_jobs()?;
        jobs.push(job);
        self.save_jobs(&jobs)?;

        self.ensure_drain_scheduled();

        Ok(())
    }

    /// Pops and executes the oldest job. Invoked by the trigger mechanism,
    /// not by application code.
    ///
    /// An unresolvable handler id discards the job with a logged
    /// diagnostic. A handler failure propagates without the remaining
    /// queue being re-armed; the next `push` arms it again.
    pub fn drain(&self) -> Result<(), QueueError> {
        let mut jobs = self.load_jobs()?;

        if jobs.is_empty() {
            return Ok(());
        }

        let job = jobs.remove(0);
        // once the shortened queue is saved the job is gone, even if
        // execution fails below
        self.save_jobs(&jobs)?;

        match self.registry.resolve(&job.handler) {
            Ok(handler) => handler.handle(&job.payload)?,
            Err(err) => error!("discarding job {}: {}", job.id, err),
        }

        if !jobs.is_empty() {
            self.ensure_drain_scheduled();
        }

        Ok(())
    }

    /// Removes the persisted queue entirely and cancels any pending drain.
    pub fn clear(&self) -> Result<(), QueueError> {
        self.store.remove(QUEUE_OPTION)?;
        self.scheduler.cancel(DRAIN_TRIGGER);

        Ok(())
    }

    /// The jobs currently persisted, oldest first.
    pub fn pending_jobs(&self) -> Result<Vec<Job>, QueueError> {
        self.load_jobs()
    }

    fn load_jobs(&self) -> Result<Vec<Job>, QueueError> {
        match self.store.load(QUEUE_OPTION)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_jobs(&self, jobs: &[Job]) -> Result<(), QueueError> {
        let bytes = serde_json::to_vec(jobs)?;
        self.store.save(QUEUE_OPTION, &bytes)?;

        Ok(())
    }

    fn ensure_drain_scheduled(&self) {
        if !self.scheduler.is_pending(DRAIN_TRIGGER) {
            self.scheduler
                .schedule_once(DRAIN_TRIGGER, Utc::now() + self.drain_delay);
        }
    }
}
