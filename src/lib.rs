//! # deferq
//!
//! A delayed/background job engine: jobs carry a worker identity, JSON
//! arguments, and a millisecond-precision start time; a pool of worker
//! threads pulls due jobs earliest-first from a shared store and executes
//! them with per-worker retry policy.
//!
//! ## Architecture
//!
//! - **Job**: a scheduled unit of work with a store-assigned id
//! - **JobStore**: thread-safe, time-ordered holding area with a movable
//!   pause boundary gating delivery
//! - **Worker**: the execution capability, including the retry decision
//! - **Registry**: worker-name resolution and per-worker store bindings
//! - **JobProcessor**: one blocking fetch-execute loop per thread
//! - **ThreadedServer**: N processor threads with shared pause/resume
//!   control
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deferq::prelude::*;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Mailer;
//!
//! impl Worker for Mailer {
//!     fn name(&self) -> &'static str { "mailer" }
//!
//!     fn perform(&self, args: &[Value]) -> anyhow::Result<Value> {
//!         // send the mail...
//!         Ok(Value::Null)
//!     }
//!
//!     fn retry_decision(&self, attempt: u32, _error: &anyhow::Error) -> bool {
//!         attempt < 3
//!     }
//! }
//!
//! let registry = Arc::new(Registry::new());
//! registry.register::<Mailer>();
//! registry.set_default_store(Arc::new(InMemoryJobStore::new()));
//!
//! registry.schedule_in::<Mailer>(std::time::Duration::from_secs(30), Some(vec![json!("hi")]))?;
//!
//! let store = registry.default_store().unwrap();
//! let server = ThreadedServer::new(4, store, registry);
//! let handle = server.start()?;
//! // ... later:
//! server.halt();
//! handle.join();
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod processor;
pub mod registry;
pub mod server;
pub mod store;
pub mod worker;

pub use error::{Error, Result};

/// Re-export of the commonly used types.
pub mod prelude {
    pub use crate::config::{ConfigUpdate, FetchConfig};
    pub use crate::error::{Error, Result};
    pub use crate::job::{Job, JobId, JobRecord};
    pub use crate::processor::JobProcessor;
    pub use crate::registry::{self, Registry};
    pub use crate::server::{ServerHandle, ThreadedServer};
    pub use crate::store::{InMemoryJobStore, JobStore};
    pub use crate::worker::{perform_sync, Worker};
}
