//! The worker capability: executing a job's payload and deciding on retry.

use serde_json::Value;

/// A type that can execute scheduled work.
///
/// Implementors supply the execution logic in [`perform`](Self::perform) and
/// may override [`retry_decision`](Self::retry_decision) to retry transient
/// failures. The default is to never retry.
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Mailer;
///
/// impl Worker for Mailer {
///     fn name(&self) -> &'static str {
///         "mailer"
///     }
///
///     fn perform(&self, args: &[Value]) -> anyhow::Result<Value> {
///         send(args)?;
///         Ok(Value::Null)
///     }
///
///     fn retry_decision(&self, attempt: u32, _error: &anyhow::Error) -> bool {
///         attempt < 3
///     }
/// }
/// ```
pub trait Worker: Send + Sync {
    /// The identifier jobs are tagged with to reach this worker.
    fn name(&self) -> &'static str;

    /// Execute the work. Errors are routed through
    /// [`retry_decision`](Self::retry_decision) before propagating.
    fn perform(&self, args: &[Value]) -> anyhow::Result<Value>;

    /// Whether to retry after the given failed attempt (1-indexed).
    ///
    /// Returning `true` indefinitely retries forever; that is the caller's
    /// prerogative, not a store concern.
    fn retry_decision(&self, _attempt: u32, _error: &anyhow::Error) -> bool {
        false
    }
}

/// Run a worker synchronously on the calling thread, applying its retry
/// decisions.
///
/// The attempt counter starts at 1. After each failure the worker is asked
/// whether to retry; the same instance and arguments are reused until it
/// either succeeds or declines, at which point the original error
/// propagates.
pub fn perform_sync(worker: &dyn Worker, args: &[Value]) -> anyhow::Result<Value> {
    let mut attempt: u32 = 1;
    loop {
        match worker.perform(args) {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !worker.retry_decision(attempt, &error) {
                    return Err(error);
                }
                tracing::warn!(
                    worker = worker.name(),
                    attempt,
                    error = %error,
                    "attempt failed, retrying"
                );
                attempt += 1;
            }
        }
    }
}
