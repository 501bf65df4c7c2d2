//! Error types for the job engine.
//!
//! The taxonomy here covers misuse of the scheduling surface (enqueueing a
//! job twice, dequeueing a job that was never enqueued) and store-level
//! failures. Worker execution failures are deliberately *not* represented:
//! they travel as [`anyhow::Error`] through the retry protocol and the
//! processor loop, since they belong to the application, not the store.

use thiserror::Error;

use crate::job::JobId;

/// A specialized Result type for job engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the scheduling and store layers.
#[derive(Debug, Error)]
pub enum Error {
    /// `enqueue` was called on a job that is already in a store.
    #[error("job {0} is already enqueued")]
    AlreadyEnqueued(JobId),

    /// `dequeue` was called on a job that is not in any store.
    #[error("job has not been enqueued")]
    NotEnqueued,

    /// A job reached the store without an assigned id. Store-level
    /// `enqueue` must only ever be invoked through `Job::enqueue`.
    #[error("job reached the store without an assigned id")]
    MissingId,

    /// The store holds no job with this id.
    #[error("no job {0} in store")]
    NotFound(JobId),

    /// No worker was registered under this name.
    #[error("no worker registered under '{0}'")]
    UnknownWorker(String),

    /// No store is bound for this worker and no default store is set.
    #[error("no job store bound for worker '{0}'")]
    NoStoreBound(String),

    /// The store a job was bound to has been dropped.
    #[error("the job's store has been dropped")]
    StoreDropped,

    /// A job payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A processor thread could not be spawned.
    #[error("failed to spawn processor thread: {0}")]
    Spawn(#[from] std::io::Error),
}
