//! Threaded server: a pool of processor threads with shared pause control.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};

use crate::config::{ConfigUpdate, FetchConfig};
use crate::error::Result;
use crate::processor::JobProcessor;
use crate::registry::Registry;
use crate::store::JobStore;

/// Runs `num_threads` fetch-execute loops against one shared store.
///
/// The server owns its own fetch configuration, independent of the store's;
/// it is copied onto the store when [`start`](Self::start) is called, so
/// changes made after `start` only take effect on a restart.
///
/// Delivery is controlled through the store's pause boundary:
/// [`halt`](Self::halt) stops delivery of jobs scheduled from now on,
/// [`resume`](Self::resume) reopens the gate, and
/// [`resume_until`](Self::resume_until) opens it up to a future cutoff.
pub struct ThreadedServer {
    num_threads: usize,
    store: Arc<dyn JobStore>,
    registry: Arc<Registry>,
    config: FetchConfig,
}

impl ThreadedServer {
    /// Create a server with the default fetch configuration.
    pub fn new(num_threads: usize, store: Arc<dyn JobStore>, registry: Arc<Registry>) -> Self {
        Self {
            num_threads,
            store,
            registry,
            config: FetchConfig::default(),
        }
    }

    /// Merge a configuration update; effective at the next [`start`](Self::start).
    pub fn configure(&mut self, update: ConfigUpdate) -> &mut Self {
        self.config.apply(update);
        self
    }

    /// The server's current fetch configuration.
    pub fn config(&self) -> FetchConfig {
        self.config
    }

    /// Spawn the processor threads.
    ///
    /// Each thread runs a fresh [`JobProcessor`] against the shared store.
    /// In the waiting configuration the threads run until the store is
    /// paused past its remaining jobs; join the returned handle to wait for
    /// them.
    pub fn start(&self) -> Result<ServerHandle> {
        self.store.configure(self.config.into());
        tracing::info!(
            threads = self.num_threads,
            wait = self.config.wait,
            "starting job server"
        );

        let mut threads = Vec::with_capacity(self.num_threads);
        for index in 0..self.num_threads {
            let store = Arc::clone(&self.store);
            let registry = Arc::clone(&self.registry);
            let handle = thread::Builder::new()
                .name(format!("job-worker-{index}"))
                .spawn(move || JobProcessor::new(store, registry).run())?;
            threads.push(handle);
        }
        Ok(ServerHandle { threads })
    }

    /// Stop delivery of jobs scheduled at or after `at`.
    pub fn halt_at(&self, at: DateTime<Utc>) -> &Self {
        tracing::info!(boundary = %at, "halting job delivery");
        self.store.pause_at(Some(at));
        self
    }

    /// Stop delivery of jobs scheduled from now on.
    pub fn halt(&self) -> &Self {
        self.halt_at(Utc::now())
    }

    /// Remove the pause boundary entirely.
    pub fn resume(&self) -> &Self {
        tracing::info!("resuming job delivery");
        self.store.pause_at(None);
        self
    }

    /// Resume delivery, but only for jobs scheduled before `at`.
    pub fn resume_until(&self, at: DateTime<Utc>) -> &Self {
        self.resume();
        self.halt_at(at)
    }
}

/// Handle over a started server's threads.
pub struct ServerHandle {
    threads: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl ServerHandle {
    /// Number of processor threads still owned by this handle.
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Wait for every processor thread to finish and collect each outcome.
    ///
    /// A processor that died on a worker error yields that error; a panicked
    /// thread is reported as an error as well. Crashed processors are not
    /// restarted - a single failing job with no retry permanently shrinks
    /// the pool by one thread until the server is started again.
    pub fn join(self) -> Vec<anyhow::Result<()>> {
        self.threads
            .into_iter()
            .map(|thread| match thread.join() {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow::anyhow!("processor thread panicked")),
            })
            .collect()
    }
}
