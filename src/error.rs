use std::io::Error as IoError;

use thiserror::Error;

use crate::cache::CacheError;
use crate::queue::QueueError;
use crate::store::StoreError;

/// Crate-level error for callers driving several components at once,
/// e.g. the lifecycle functions and [`Worker::start`](crate::Worker::start).
#[derive(Debug, Error)]
pub enum SumpError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("corrupt persisted record")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to spawn a worker thread")]
    WorkerThreadCreationFailed {
        #[from]
        source: IoError,
    },
}
