use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::batch::BatchError;
use crate::descriptor::ResourceKind;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Malformed descriptor {}: {reason}", path.display())]
    MalformedDescriptor { path: PathBuf, reason: String },

    #[error("{kind} {name} did not become usable within {}s", waited.as_secs())]
    ProvisioningTimeout {
        kind: ResourceKind,
        name: String,
        waited: Duration,
    },

    #[error("Failed to provision {kind} {name}: {source}")]
    Provisioning {
        kind: ResourceKind,
        name: String,
        #[source]
        source: BatchError,
    },

    #[error("Resources are not provisioned. Call `initialize` first.")]
    NotInitialized,

    #[error("Resources are already provisioned")]
    AlreadyInitialized,

    #[error("Drain was signalled, no more jobs are accepted")]
    Draining,

    #[error("Monitor was never started. Call `monitor` first.")]
    MonitorNotStarted,

    #[error("Monitor was shut down before all jobs finished")]
    ShutDown,

    #[error("Monitor stopped unexpectedly before all jobs finished")]
    MonitorAborted,

    #[error("Invalid job spec file {}: {reason}", path.display())]
    JobSpec { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_the_resource() {
        let err = SyncError::ProvisioningTimeout {
            kind: ResourceKind::JobQueue,
            name: "run1-jq".into(),
            waited: Duration::from_secs(300),
        };
        assert_eq!(
            err.to_string(),
            "job queue run1-jq did not become usable within 300s"
        );
    }

    #[test]
    fn malformed_display_includes_path() {
        let err = SyncError::MalformedDescriptor {
            path: PathBuf::from("/tmp/ce.json"),
            reason: "expected value at line 1 column 1".into(),
        };
        assert!(err.to_string().contains("/tmp/ce.json"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
