//! JSON resource descriptors for the compute environment, job queue and job
//! definition.
//!
//! Descriptor files carry the body of the matching create call. The loader
//! stamps the prefixed resource name into that body so that every resource of
//! one run is namespaced by the same prefix.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// The closed set of resources a run provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ComputeEnvironment,
    JobQueue,
    JobDefinition,
}

impl ResourceKind {
    /// Suffix appended to the run prefix to build the resource name.
    pub fn suffix(self) -> &'static str {
        match self {
            ResourceKind::ComputeEnvironment => "ce",
            ResourceKind::JobQueue => "jq",
            ResourceKind::JobDefinition => "jd",
        }
    }

    /// Field of the create request that holds the resource name.
    pub fn name_field(self) -> &'static str {
        match self {
            ResourceKind::ComputeEnvironment => "computeEnvironmentName",
            ResourceKind::JobQueue => "jobQueueName",
            ResourceKind::JobDefinition => "jobDefinitionName",
        }
    }

    pub fn resource_name(self, prefix: &str) -> String {
        format!("{prefix}-{}", self.suffix())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ComputeEnvironment => write!(f, "compute environment"),
            ResourceKind::JobQueue => write!(f, "job queue"),
            ResourceKind::JobDefinition => write!(f, "job definition"),
        }
    }
}

/// A parsed descriptor, immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: String,
    pub raw_spec: Value,
}

impl ResourceDescriptor {
    /// Build a descriptor from an in-memory document. The document must be a
    /// JSON object; its name field is replaced with `<prefix>-<suffix>`.
    pub fn from_value(kind: ResourceKind, prefix: &str, value: Value) -> Result<Self, String> {
        let Value::Object(mut body) = value else {
            return Err(format!("{kind} descriptor must be a JSON object"));
        };
        let name = kind.resource_name(prefix);
        body.insert(kind.name_field().to_string(), Value::String(name.clone()));
        Ok(Self {
            kind,
            name,
            raw_spec: Value::Object(body),
        })
    }

    /// Parse a descriptor file.
    pub fn load(path: &Path, kind: ResourceKind, prefix: &str) -> Result<Self, SyncError> {
        let malformed = |reason: String| SyncError::MalformedDescriptor {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| malformed(e.to_string()))?;
        Self::from_value(kind, prefix, value).map_err(malformed)
    }

    /// Job queue bound 1:1 to an already provisioned compute environment.
    pub fn derived_job_queue(prefix: &str, compute_environment_arn: &str) -> Self {
        let mut body = Map::new();
        body.insert("state".into(), Value::from("ENABLED"));
        body.insert("priority".into(), Value::from(1));
        body.insert(
            "computeEnvironmentOrder".into(),
            compute_environment_order(compute_environment_arn),
        );
        let kind = ResourceKind::JobQueue;
        let name = kind.resource_name(prefix);
        body.insert(kind.name_field().into(), Value::String(name.clone()));
        Self {
            kind,
            name,
            raw_spec: Value::Object(body),
        }
    }

    /// Bind a job queue to the given compute environment unless the
    /// descriptor already lists its own environments.
    pub fn bind_to_compute_environment(&self, compute_environment_arn: &str) -> Self {
        let mut bound = self.clone();
        if let Value::Object(body) = &mut bound.raw_spec
            && !body.contains_key("computeEnvironmentOrder")
        {
            body.insert(
                "computeEnvironmentOrder".into(),
                compute_environment_order(compute_environment_arn),
            );
        }
        bound
    }
}

fn compute_environment_order(arn: &str) -> Value {
    serde_json::json!([{ "order": 1, "computeEnvironment": arn }])
}

/// Locations of the descriptor files. The job queue is optional: when absent
/// one is derived from the compute environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPaths {
    pub compute_environment: PathBuf,
    pub job_definition: PathBuf,
    pub job_queue: Option<PathBuf>,
}

/// The descriptors of one run.
#[derive(Debug, Clone)]
pub struct ResourceDescriptors {
    pub compute_environment: ResourceDescriptor,
    pub job_definition: ResourceDescriptor,
    pub job_queue: Option<ResourceDescriptor>,
}

impl ResourceDescriptors {
    pub fn load(paths: &DescriptorPaths, prefix: &str) -> Result<Self, SyncError> {
        let compute_environment = ResourceDescriptor::load(
            &paths.compute_environment,
            ResourceKind::ComputeEnvironment,
            prefix,
        )?;
        let job_definition =
            ResourceDescriptor::load(&paths.job_definition, ResourceKind::JobDefinition, prefix)?;
        let job_queue = paths
            .job_queue
            .as_deref()
            .map(|path| ResourceDescriptor::load(path, ResourceKind::JobQueue, prefix))
            .transpose()?;
        Ok(Self {
            compute_environment,
            job_definition,
            job_queue,
        })
    }
}
