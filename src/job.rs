//! Job definitions and the wire record.
//!
//! A [`Job`] couples a worker identity with its arguments, a millisecond-
//! precision start time, and the store it is bound to. The id is assigned by
//! the store at enqueue time and cleared again at dequeue time, so a job
//! carries an id exactly while it sits in a store.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::store::JobStore;
use crate::worker;

/// Store-assigned job identifier.
///
/// Ids are handed out by `JobStore::next_id` in strictly increasing order
/// and never reused for the life of a store, which makes them the tie-break
/// key among jobs scheduled for the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scheduled unit of work.
pub struct Job {
    worker_id: String,
    args: Option<Vec<Value>>,
    start_at: DateTime<Utc>,
    id: Option<JobId>,
    store: Weak<dyn JobStore>,
}

impl Job {
    /// Create a job bound to `store`, scheduled for now.
    ///
    /// The start time is rounded to millisecond precision; use
    /// [`with_start_at`](Self::with_start_at) to schedule for another time.
    pub fn new<S>(worker_id: impl Into<String>, args: Option<Vec<Value>>, store: &Arc<S>) -> Self
    where
        S: JobStore + ?Sized + bind::IntoWeakStore + 'static,
    {
        let store: Weak<dyn JobStore> = store.into_weak_store();
        Self {
            worker_id: worker_id.into(),
            args,
            start_at: round_to_millis(Utc::now()),
            id: None,
            store,
        }
    }

    /// Set the start time, rounded to millisecond precision.
    pub fn with_start_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_at = round_to_millis(at);
        self
    }

    /// The identifier this job's worker is registered under.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// The job's arguments, if any.
    pub fn args(&self) -> Option<&[Value]> {
        self.args.as_deref()
    }

    /// When the job becomes due, at millisecond precision.
    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    /// The store-assigned id. `Some` exactly while the job is enqueued.
    pub fn id(&self) -> Option<JobId> {
        self.id
    }

    /// The store this job is bound to, if it is still alive.
    pub fn store(&self) -> Option<Arc<dyn JobStore>> {
        self.store.upgrade()
    }

    /// Hand this job to its store.
    ///
    /// Requests a fresh id from the store, then inserts the job. Fails with
    /// [`Error::AlreadyEnqueued`] when the job already carries an id.
    pub fn enqueue(&mut self) -> Result<()> {
        if let Some(id) = self.id {
            return Err(Error::AlreadyEnqueued(id));
        }
        let store = self.store.upgrade().ok_or(Error::StoreDropped)?;
        self.id = Some(store.next_id());
        if let Err(error) = store.enqueue(self.clone()) {
            self.id = None;
            return Err(error);
        }
        Ok(())
    }

    /// Remove this job from its store and clear the id.
    ///
    /// Fails with [`Error::NotEnqueued`] when the job carries no id.
    pub fn dequeue(&mut self) -> Result<()> {
        if self.id.is_none() {
            return Err(Error::NotEnqueued);
        }
        let store = self.store.upgrade().ok_or(Error::StoreDropped)?;
        store.dequeue(self)?;
        self.id = None;
        Ok(())
    }

    /// Execute this job synchronously on the calling thread.
    ///
    /// Resolves the worker through `registry` and runs the retry protocol;
    /// once the worker declines to retry, the original error propagates.
    pub fn perform(&self, registry: &Registry) -> anyhow::Result<Value> {
        let worker = registry.resolve_worker(&self.worker_id)?;
        worker::perform_sync(worker.as_ref(), self.args.as_deref().unwrap_or_default())
    }

    /// Encode this job as its wire record.
    pub fn record(&self) -> Result<JobRecord> {
        Ok(JobRecord {
            worker_id: self.worker_id.clone(),
            args_json: serde_json::to_string(&self.args)?,
            start_at: self.start_at,
            uuid: self.id,
        })
    }

    /// Reconstruct a job from its wire record.
    ///
    /// The store binding is not part of the wire form; it is re-derived
    /// from the worker id through `registry`.
    pub fn from_record(record: JobRecord, registry: &Registry) -> Result<Self> {
        let store = registry.resolve_store(&record.worker_id)?;
        let args = serde_json::from_str(&record.args_json)?;
        Ok(Self {
            worker_id: record.worker_id,
            args,
            start_at: round_to_millis(record.start_at),
            id: record.uuid,
            store: Arc::downgrade(&store),
        })
    }
}

/// Coerce an `Arc` handle to a `Weak<dyn JobStore>` whether the concrete
/// store type is known (the common case) or already erased to `dyn JobStore`
/// (as when the registry hands back a resolved store). A sealed helper so a
/// single `Job::new` can accept both without an extra call-site coercion.
mod bind {
    use super::*;

    pub trait IntoWeakStore {
        fn into_weak_store(self: &Arc<Self>) -> Weak<dyn JobStore>;
    }

    impl<S: JobStore + 'static> IntoWeakStore for S {
        fn into_weak_store(self: &Arc<Self>) -> Weak<dyn JobStore> {
            let weak = Arc::downgrade(self);
            weak
        }
    }

    impl IntoWeakStore for dyn JobStore {
        fn into_weak_store(self: &Arc<Self>) -> Weak<dyn JobStore> {
            Arc::downgrade(self)
        }
    }
}

impl Clone for Job {
    fn clone(&self) -> Self {
        Self {
            worker_id: self.worker_id.clone(),
            args: self.args.clone(),
            start_at: self.start_at,
            id: self.id,
            store: self.store.clone(),
        }
    }
}

// Store identity is deliberately excluded: two jobs are the same unit of
// work regardless of which store instance they are bound to.
impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.worker_id == other.worker_id
            && self.args == other.args
            && self.start_at == other.start_at
            && self.id == other.id
    }
}

impl Eq for Job {}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("worker_id", &self.worker_id)
            .field("args", &self.args)
            .field("start_at", &self.start_at)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The serialized form of a [`Job`], for persistence or transport.
///
/// `start_at` is carried as an ISO-8601 timestamp with nine fractional
/// digits; `args_json` is the JSON encoding of the argument array (the
/// literal `null` when the job has no arguments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub worker_id: String,
    pub args_json: String,
    #[serde(with = "rfc3339_nanos")]
    pub start_at: DateTime<Utc>,
    pub uuid: Option<JobId>,
}

/// Round half-up to millisecond precision.
///
/// Values at the representable extremes pass through unchanged.
fn round_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    let micros = at.timestamp_micros();
    let millis = micros.div_euclid(1000) + i64::from(micros.rem_euclid(1000) >= 500);
    DateTime::from_timestamp_millis(millis).unwrap_or(at)
}

mod rfc3339_nanos {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryJobStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn store() -> Arc<InMemoryJobStore> {
        Arc::new(InMemoryJobStore::new())
    }

    fn at_millis(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn start_at_defaults_to_now_at_millisecond_precision() {
        let before = Utc::now();
        let job = Job::new("mailer", None, &store());
        let after = Utc::now();

        assert_eq!(job.start_at().timestamp_subsec_micros() % 1000, 0);
        assert!(job.start_at() >= round_to_millis(before) - chrono::Duration::milliseconds(1));
        assert!(job.start_at() <= round_to_millis(after) + chrono::Duration::milliseconds(1));
    }

    #[test]
    fn start_at_rounds_half_up() {
        let micros = Utc.timestamp_opt(1, 123_456_000).unwrap();
        let job = Job::new("mailer", None, &store()).with_start_at(micros);
        assert_eq!(job.start_at(), Utc.timestamp_opt(1, 123_000_000).unwrap());

        let micros = Utc.timestamp_opt(1, 123_500_000).unwrap();
        let job = Job::new("mailer", None, &store()).with_start_at(micros);
        assert_eq!(job.start_at(), Utc.timestamp_opt(1, 124_000_000).unwrap());
    }

    #[test]
    fn equality_covers_payload_time_and_id() {
        let store = store();
        let at = at_millis(1_000);
        let job = Job::new("mailer", Some(vec![json!(1)]), &store).with_start_at(at);

        let same = Job::new("mailer", Some(vec![json!(1)]), &store).with_start_at(at);
        assert_eq!(job, same);

        let different_worker = Job::new("pruner", Some(vec![json!(1)]), &store).with_start_at(at);
        assert_ne!(job, different_worker);

        let different_args = Job::new("mailer", Some(vec![json!(2)]), &store).with_start_at(at);
        assert_ne!(job, different_args);

        let nil_args = Job::new("mailer", None, &store).with_start_at(at);
        assert_ne!(job, nil_args);

        let different_time = Job::new("mailer", Some(vec![json!(1)]), &store).with_start_at(at_millis(2_000));
        assert_ne!(job, different_time);
    }

    #[test]
    fn equality_ignores_store_identity() {
        let at = at_millis(5_000);
        let a = Job::new("mailer", None, &store()).with_start_at(at);
        let b = Job::new("mailer", None, &store()).with_start_at(at);
        assert_eq!(a, b);
    }

    #[test]
    fn equality_with_nil_args_on_both_sides() {
        let store = store();
        let at = at_millis(5_000);
        let a = Job::new("mailer", None, &store).with_start_at(at);
        let b = Job::new("mailer", None, &store).with_start_at(at);
        assert_eq!(a, b);
    }

    #[test]
    fn enqueue_assigns_id_and_dequeue_clears_it() {
        let store = store();
        let mut job = Job::new("mailer", None, &store).with_start_at(at_millis(0));

        assert!(job.id().is_none());
        job.enqueue().unwrap();
        assert_eq!(job.id(), Some(JobId(1)));
        assert_eq!(store.size(), 1);

        job.dequeue().unwrap();
        assert!(job.id().is_none());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn enqueue_twice_fails() {
        let store = store();
        let mut job = Job::new("mailer", None, &store);
        job.enqueue().unwrap();
        assert!(matches!(job.enqueue(), Err(Error::AlreadyEnqueued(JobId(1)))));
    }

    #[test]
    fn dequeue_without_enqueue_fails() {
        let mut job = Job::new("mailer", None, &store());
        assert!(matches!(job.dequeue(), Err(Error::NotEnqueued)));
    }

    #[test]
    fn enqueue_after_store_dropped_fails() {
        let store = store();
        let mut job = Job::new("mailer", None, &store);
        drop(store);
        assert!(matches!(job.enqueue(), Err(Error::StoreDropped)));
    }

    #[test]
    fn store_handle_upgrades_only_while_the_store_is_alive() {
        let store = store();
        let job = Job::new("mailer", None, &store);
        assert!(job.store().is_some());

        drop(store);
        assert!(job.store().is_none());
    }

    #[test]
    fn record_round_trips() {
        let registry = Registry::new();
        let store = store();
        registry.bind_store("mailer", store.clone());

        let mut job = Job::new("mailer", Some(vec![json!("a"), json!(7)]), &store)
            .with_start_at(at_millis(1_234));
        job.enqueue().unwrap();

        let record = job.record().unwrap();
        assert_eq!(record.worker_id, "mailer");
        assert_eq!(record.args_json, r#"["a",7]"#);
        assert_eq!(record.uuid, Some(JobId(1)));

        let decoded = Job::from_record(record, &registry).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn record_round_trips_nil_args() {
        let registry = Registry::new();
        let store = store();
        registry.bind_store("mailer", store.clone());

        let job = Job::new("mailer", None, &store).with_start_at(at_millis(42));
        let record = job.record().unwrap();
        assert_eq!(record.args_json, "null");

        let decoded = Job::from_record(record, &registry).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn record_json_round_trips_with_nanosecond_timestamps() {
        let registry = Registry::new();
        let store = store();
        registry.bind_store("mailer", store.clone());

        let job = Job::new("mailer", Some(vec![json!(null)]), &store).with_start_at(at_millis(1_699_999_999_123));
        let record = job.record().unwrap();

        let raw = serde_json::to_string(&record).unwrap();
        assert!(raw.contains(".123000000Z"));

        let parsed: JobRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(Job::from_record(parsed, &registry).unwrap(), job);
    }

    #[test]
    fn from_record_without_binding_fails() {
        let registry = Registry::new();
        let record = JobRecord {
            worker_id: "nobody".into(),
            args_json: "null".into(),
            start_at: at_millis(0),
            uuid: None,
        };
        assert!(matches!(
            Job::from_record(record, &registry),
            Err(Error::NoStoreBound(_))
        ));
    }
}
