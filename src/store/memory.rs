//! In-memory job store.
//!
//! A single mutex guards the schedule heap, the pause boundary, the id
//! counter, and the fetch configuration together, so pause reads are always
//! consistent with queue mutations. Critical sections are short: the
//! blocking `fetch` sleeps between polls with the lock released, and job
//! execution never happens under the lock.

use std::thread;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::heap::ScheduleHeap;
use super::JobStore;
use crate::config::{ConfigUpdate, FetchConfig};
use crate::error::{Error, Result};
use crate::job::{Job, JobId};

/// The in-process [`JobStore`] implementation.
pub struct InMemoryJobStore {
    state: Mutex<State>,
}

struct State {
    schedule: ScheduleHeap,
    pause_starting_at: Option<DateTime<Utc>>,
    last_id: u64,
    config: FetchConfig,
}

impl State {
    /// Pop the minimum job if it is due and not withheld by the boundary.
    fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Job> {
        let head = self.schedule.peek()?;
        if head.start_at() > now {
            return None;
        }
        if let Some(boundary) = self.pause_starting_at {
            if head.start_at() >= boundary {
                return None;
            }
        }
        self.schedule.pop()
    }

    /// Whether the pause boundary has passed.
    fn paused_before(&self, now: DateTime<Utc>) -> bool {
        self.pause_starting_at.is_some_and(|boundary| boundary <= now)
    }
}

impl InMemoryJobStore {
    /// Create an empty store with the default fetch configuration.
    pub fn new() -> Self {
        Self::with_config(FetchConfig::default())
    }

    /// Create an empty store with an explicit fetch configuration.
    pub fn with_config(config: FetchConfig) -> Self {
        Self {
            state: Mutex::new(State {
                schedule: ScheduleHeap::new(),
                pause_starting_at: None,
                last_id: 0,
                config,
            }),
        }
    }

    /// Pop the next due job without blocking.
    ///
    /// This is the non-blocking core of [`JobStore::fetch`]: peek the
    /// minimum-key job, pop it if it is eligible, otherwise leave it be.
    pub fn fetch_next(&self) -> Option<Job> {
        let now = Utc::now();
        self.state.lock().pop_due(now)
    }

    /// A sorted copy of the queued jobs, earliest first.
    pub fn snapshot(&self) -> Vec<Job> {
        let state = self.state.lock();
        let mut jobs: Vec<Job> = state.schedule.iter().cloned().collect();
        jobs.sort_by_key(|job| (job.start_at(), job.id()));
        jobs
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<()> {
        let id = job.id().ok_or(Error::MissingId)?;
        let mut state = self.state.lock();
        if state.schedule.contains(id) {
            return Err(Error::AlreadyEnqueued(id));
        }
        tracing::debug!(
            job_id = %id,
            worker = job.worker_id(),
            start_at = %job.start_at(),
            "job enqueued"
        );
        state.schedule.push(id, job);
        Ok(())
    }

    fn dequeue(&self, job: &Job) -> Result<()> {
        let id = job.id().ok_or(Error::MissingId)?;
        let mut state = self.state.lock();
        state.schedule.remove(id).ok_or(Error::NotFound(id))?;
        tracing::debug!(job_id = %id, worker = job.worker_id(), "job dequeued");
        Ok(())
    }

    fn pause_at(&self, at: Option<DateTime<Utc>>) {
        let mut state = self.state.lock();
        state.pause_starting_at = at;
        match at {
            Some(boundary) => tracing::debug!(%boundary, "pause boundary set"),
            None => tracing::debug!("pause boundary removed"),
        }
    }

    fn pause_starting_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().pause_starting_at
    }

    fn fetch(&self) -> Option<Job> {
        loop {
            let now = Utc::now();
            let (job, config, paused) = {
                let mut state = self.state.lock();
                let job = state.pop_due(now);
                (job, state.config, state.paused_before(now))
            };

            if let Some(job) = job {
                tracing::debug!(
                    job_id = ?job.id(),
                    worker = job.worker_id(),
                    "job fetched"
                );
                return Some(job);
            }
            // Pause wins over wait: once the boundary has passed, a waiting
            // fetch reports empty instead of sleeping forever.
            if !config.wait || paused {
                return None;
            }
            thread::sleep(config.wait_delay);
        }
    }

    fn size(&self) -> usize {
        self.state.lock().schedule.len()
    }

    fn next_id(&self) -> JobId {
        let mut state = self.state.lock();
        state.last_id += 1;
        JobId(state.last_id)
    }

    fn configure(&self, update: ConfigUpdate) {
        self.state.lock().config.apply(update);
    }

    fn config(&self) -> FetchConfig {
        self.state.lock().config
    }
}
