//! The fetch-execute loop.

use std::sync::Arc;

use crate::registry::Registry;
use crate::store::JobStore;

/// A single blocking fetch-execute loop bound to one store.
///
/// Each processor runs on one thread: it pulls the next due job and executes
/// it synchronously, retries included, before fetching again. A worker error
/// that survives the retry protocol is *not* swallowed here - it terminates
/// the loop and is returned to whoever owns the thread, since the worker
/// already had its say on retrying.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    registry: Arc<Registry>,
}

impl JobProcessor {
    /// Create a processor over the given store and registry.
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    /// Run until the store reports no more deliverable jobs.
    ///
    /// With a waiting store this blocks until the store pauses; with a
    /// non-waiting store it returns as soon as a fetch comes back empty.
    pub fn run(&self) -> anyhow::Result<()> {
        while let Some(job) = self.store.fetch() {
            tracing::debug!(
                job_id = ?job.id(),
                worker = job.worker_id(),
                "executing job"
            );
            if let Err(error) = job.perform(&self.registry) {
                tracing::error!(
                    job_id = ?job.id(),
                    worker = job.worker_id(),
                    error = %error,
                    "job failed, processor terminating"
                );
                return Err(error);
            }
        }
        tracing::debug!("no deliverable jobs, processor exiting");
        Ok(())
    }
}
