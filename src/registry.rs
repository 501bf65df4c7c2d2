//! Worker registration and store bindings.
//!
//! A [`Registry`] resolves a job's worker identifier to an executable
//! [`Worker`] and decides which store a worker's jobs land in: each worker
//! may carry its own binding, falling back to a single default store.
//! [`global`] exposes the process-wide instance most programs use; tests
//! and embedders can run any number of independent registries.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::job::Job;
use crate::store::JobStore;
use crate::worker::{self, Worker};

type WorkerFactory = Box<dyn Fn() -> Box<dyn Worker> + Send + Sync>;

#[derive(Default)]
struct Entry {
    factory: Option<WorkerFactory>,
    store: Option<Arc<dyn JobStore>>,
}

/// Maps worker names to factories and store bindings.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    workers: HashMap<String, Entry>,
    default_store: Option<Arc<dyn JobStore>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker type constructible via `Default`.
    pub fn register<W>(&self)
    where
        W: Worker + Default + 'static,
    {
        let name = W::default().name();
        self.register_with(name, || Box::new(W::default()));
    }

    /// Register a worker under `name` with an explicit factory.
    ///
    /// A fresh instance is constructed for every execution; retries within
    /// one execution reuse the same instance.
    pub fn register_with<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        inner.workers.entry(name.to_string()).or_default().factory = Some(Box::new(factory));
        tracing::debug!(worker = name, "worker registered");
    }

    /// Bind `name`'s jobs to a specific store, overriding the default.
    pub fn bind_store(&self, name: &str, store: Arc<dyn JobStore>) {
        let mut inner = self.inner.write();
        inner.workers.entry(name.to_string()).or_default().store = Some(store);
        tracing::debug!(worker = name, "store bound");
    }

    /// Set the store used by workers without a binding of their own.
    pub fn set_default_store(&self, store: Arc<dyn JobStore>) {
        self.inner.write().default_store = Some(store);
    }

    /// The process-wide default store, if one has been set.
    pub fn default_store(&self) -> Option<Arc<dyn JobStore>> {
        self.inner.read().default_store.clone()
    }

    /// The store `name`'s jobs are routed to: the worker's own binding if it
    /// has one, otherwise the default store.
    pub fn resolve_store(&self, name: &str) -> Result<Arc<dyn JobStore>> {
        let inner = self.inner.read();
        inner
            .workers
            .get(name)
            .and_then(|entry| entry.store.clone())
            .or_else(|| inner.default_store.clone())
            .ok_or_else(|| Error::NoStoreBound(name.to_string()))
    }

    /// Construct the worker registered under `name`.
    pub fn resolve_worker(&self, name: &str) -> Result<Box<dyn Worker>> {
        let inner = self.inner.read();
        inner
            .workers
            .get(name)
            .and_then(|entry| entry.factory.as_ref())
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownWorker(name.to_string()))
    }

    /// Enqueue a job for `W` scheduled for now.
    pub fn schedule_now<W>(&self, args: Option<Vec<Value>>) -> Result<Job>
    where
        W: Worker + Default + 'static,
    {
        self.schedule_at::<W>(Utc::now(), args)
    }

    /// Enqueue a job for `W` scheduled for an absolute time.
    pub fn schedule_at<W>(&self, at: DateTime<Utc>, args: Option<Vec<Value>>) -> Result<Job>
    where
        W: Worker + Default + 'static,
    {
        let name = W::default().name();
        let store = self.resolve_store(name)?;
        let mut job = Job::new(name, args, &store).with_start_at(at);
        job.enqueue()?;
        Ok(job)
    }

    /// Enqueue a job for `W` scheduled `delay` from now.
    pub fn schedule_in<W>(&self, delay: Duration, args: Option<Vec<Value>>) -> Result<Job>
    where
        W: Worker + Default + 'static,
    {
        self.schedule_at::<W>(Utc::now() + delay, args)
    }

    /// Execute `W` synchronously on the calling thread, applying its retry
    /// decisions, and return whatever `perform` returns.
    pub fn perform_now<W>(&self, args: &[Value]) -> anyhow::Result<Value>
    where
        W: Worker + Default,
    {
        worker::perform_sync(&W::default(), args)
    }
}

/// The process-wide registry.
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::default)
}
