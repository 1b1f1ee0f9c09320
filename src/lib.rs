//! Provision batch-compute resources, submit jobs against them and track the
//! jobs until every one of them is terminal.
//!
//! The entry point is [`Synchronizer`]: `initialize` → `monitor` → `submit`*
//! → `signal_drain` → `await_termination`.

pub mod batch;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod jobspec;
pub mod provision;
pub mod sync;

pub use batch::{BatchClient, BatchError, BatchService};
pub use config::SyncConfig;
pub use error::SyncError;
pub use jobspec::JobSpec;
pub use sync::{Job, JobId, JobState, MonitorExit, Synchronizer, TerminationSummary};
