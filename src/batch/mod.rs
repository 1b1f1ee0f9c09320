pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

use serde_json::Value;

pub use client::BatchClient;
pub use error::BatchError;
pub use types::{RemoteJobStatus, RemoteResource, ResourceHandle};

use crate::descriptor::ResourceKind;
use crate::jobspec::JobSpec;

/// The operations the engine needs from a remote batch-compute service.
///
/// [`BatchClient`] talks to the real HTTP API; tests substitute an in-memory
/// fake.
pub trait BatchService: Send + Sync {
    /// Look up a resource by kind and name. `Ok(None)` when it does not exist.
    fn describe_resource(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> impl Future<Output = Result<Option<RemoteResource>, BatchError>> + Send;

    /// Issue the create call for a resource. Returns
    /// [`BatchError::AlreadyExists`] when the name is taken.
    fn create_resource(
        &self,
        kind: ResourceKind,
        spec: &Value,
    ) -> impl Future<Output = Result<ResourceHandle, BatchError>> + Send;

    /// Submit one job and return the remote job id.
    fn submit_job(
        &self,
        queue: &ResourceHandle,
        definition: &ResourceHandle,
        spec: &JobSpec,
    ) -> impl Future<Output = Result<String, BatchError>> + Send;

    /// Current remote status of a job.
    fn describe_job(
        &self,
        remote_id: &str,
    ) -> impl Future<Output = Result<RemoteJobStatus, BatchError>> + Send;
}
