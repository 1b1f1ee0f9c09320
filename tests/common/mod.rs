#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batchsync::batch::{BatchError, BatchService, RemoteJobStatus, RemoteResource, ResourceHandle};
use batchsync::config::SyncConfig;
use batchsync::descriptor::{DescriptorPaths, ResourceKind};
use batchsync::JobSpec;
use serde_json::Value;
use tempfile::TempDir;

/// One scripted answer to a job status poll.
#[derive(Debug, Clone)]
pub enum Poll {
    Status(&'static str),
    Error,
    /// The service implementation panics.
    Panic,
    /// The request never completes.
    Hang,
}

#[derive(Default)]
struct FakeState {
    resources: HashMap<(ResourceKind, String), RemoteResource>,
    /// Describes left before a created resource turns usable.
    warming: HashMap<(ResourceKind, String), u32>,
    create_calls: Vec<(ResourceKind, Value)>,
    describe_calls: usize,
    describes_until_usable: u32,
    throttled_describes: u32,
    throttled_creates: u32,
    never_usable: bool,
    already_exists_on_create: bool,
    failing_submissions: HashSet<String>,
    scripts: HashMap<String, VecDeque<Poll>>,
    remote_jobs: HashMap<String, String>,
    submit_calls: Vec<Value>,
    status_calls: usize,
    next_id: u64,
}

/// In-memory batch service. Clones share state.
#[derive(Clone, Default)]
pub struct FakeBatch {
    state: Arc<Mutex<FakeState>>,
}

pub fn arn(kind: ResourceKind, name: &str) -> String {
    format!("arn:aws:batch:us-west-2:123456789012:{}/{name}", kind.suffix())
}

impl FakeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a usable resource.
    pub fn with_existing(self, kind: ResourceKind, name: &str) -> Self {
        self.state.lock().unwrap().resources.insert(
            (kind, name.to_string()),
            RemoteResource {
                handle: ResourceHandle {
                    kind,
                    name: name.to_string(),
                    arn: arn(kind, name),
                },
                status: "VALID".into(),
                usable: true,
            },
        );
        self
    }

    pub fn with_describes_until_usable(self, describes: u32) -> Self {
        self.state.lock().unwrap().describes_until_usable = describes;
        self
    }

    /// The next `describes` resource lookups answer HTTP 429.
    pub fn throttle_describes(self, describes: u32) -> Self {
        self.state.lock().unwrap().throttled_describes = describes;
        self
    }

    /// The next `creates` create calls answer HTTP 429.
    pub fn throttle_creates(self, creates: u32) -> Self {
        self.state.lock().unwrap().throttled_creates = creates;
        self
    }

    pub fn never_usable(self) -> Self {
        self.state.lock().unwrap().never_usable = true;
        self
    }

    pub fn already_exists_on_create(self) -> Self {
        self.state.lock().unwrap().already_exists_on_create = true;
        self
    }

    pub fn fail_submission(self, job_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_submissions
            .insert(job_name.to_string());
        self
    }

    /// Status answers for a job; the last one repeats forever.
    pub fn script(self, job_name: &str, polls: Vec<Poll>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(job_name.to_string(), polls.into());
        self
    }

    pub fn create_calls(&self) -> Vec<(ResourceKind, Value)> {
        self.state.lock().unwrap().create_calls.clone()
    }

    pub fn submit_calls(&self) -> Vec<Value> {
        self.state.lock().unwrap().submit_calls.clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.state.lock().unwrap().describe_calls
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }
}

impl BatchService for FakeBatch {
    async fn describe_resource(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<RemoteResource>, BatchError> {
        let mut state = self.state.lock().unwrap();
        state.describe_calls += 1;
        if state.throttled_describes > 0 {
            state.throttled_describes -= 1;
            return Err(BatchError::RateLimited { retry_after_ms: 1 });
        }
        let key = (kind, name.to_string());
        let never_usable = state.never_usable;
        if let Some(left) = state.warming.get_mut(&key) {
            if *left > 0 {
                *left -= 1;
            }
            let ready = *left == 0 && !never_usable;
            if let Some(resource) = state.resources.get_mut(&key) {
                resource.usable = ready;
                resource.status = if ready { "VALID" } else { "CREATING" }.into();
            }
        }
        Ok(state.resources.get(&key).cloned())
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        spec: &Value,
    ) -> Result<ResourceHandle, BatchError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls.push((kind, spec.clone()));
        if state.throttled_creates > 0 {
            state.throttled_creates -= 1;
            return Err(BatchError::RateLimited { retry_after_ms: 1 });
        }
        let name = spec[kind.name_field()]
            .as_str()
            .ok_or_else(|| BatchError::ApiError {
                status: 400,
                message: "missing name".into(),
            })?
            .to_string();
        let handle = ResourceHandle {
            kind,
            name: name.clone(),
            arn: arn(kind, &name),
        };
        state.resources.insert(
            (kind, name.clone()),
            RemoteResource {
                handle: handle.clone(),
                status: "CREATING".into(),
                usable: false,
            },
        );
        let warmup = state.describes_until_usable;
        state.warming.insert((kind, name.clone()), warmup);
        if state.already_exists_on_create {
            return Err(BatchError::AlreadyExists(format!("{name} already exists")));
        }
        Ok(handle)
    }

    async fn submit_job(
        &self,
        queue: &ResourceHandle,
        definition: &ResourceHandle,
        spec: &JobSpec,
    ) -> Result<String, BatchError> {
        let mut state = self.state.lock().unwrap();
        state
            .submit_calls
            .push(spec.submit_request(&queue.arn, &definition.arn));
        if state.failing_submissions.contains(&spec.name) {
            return Err(BatchError::ApiError {
                status: 400,
                message: format!("job queue {} is not enabled", queue.name),
            });
        }
        state.next_id += 1;
        let remote_id = format!("job-{:04}", state.next_id);
        state.remote_jobs.insert(remote_id.clone(), spec.name.clone());
        Ok(remote_id)
    }

    async fn describe_job(&self, remote_id: &str) -> Result<RemoteJobStatus, BatchError> {
        // Release the lock first so a panic does not poison it.
        let poll = {
            let mut state = self.state.lock().unwrap();
            state.status_calls += 1;
            let name = state
                .remote_jobs
                .get(remote_id)
                .cloned()
                .ok_or_else(|| BatchError::NotFound(remote_id.to_string()))?;
            match state.scripts.get_mut(&name) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => Some(Poll::Status("SUCCEEDED")),
            }
        };
        match poll {
            Some(Poll::Panic) => panic!("describe_job blew up for {remote_id}"),
            Some(Poll::Hang) => std::future::pending().await,
            Some(Poll::Status(status)) => Ok(RemoteJobStatus {
                status: status.to_string(),
                reason: (status == "FAILED").then(|| "Essential container exited".to_string()),
            }),
            Some(Poll::Error) | None => Err(BatchError::ApiError {
                status: 503,
                message: "service unavailable".into(),
            }),
        }
    }
}

/// Descriptor files in a temp dir.
pub struct Fixture {
    pub dir: TempDir,
    pub paths: DescriptorPaths,
}

impl Fixture {
    pub fn new(with_queue: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            path
        };
        let compute_environment = write(
            "ce.json",
            r#"{"type": "MANAGED", "computeResources": {"type": "EC2", "maxvCpus": 4}}"#,
        );
        let job_definition = write(
            "jd.json",
            r#"{"type": "container", "containerProperties": {"image": "busybox", "vcpus": 1, "memory": 128}}"#,
        );
        let job_queue = with_queue.then(|| write("jq.json", r#"{"state": "ENABLED", "priority": 10}"#));
        Self {
            paths: DescriptorPaths {
                compute_environment,
                job_definition,
                job_queue,
            },
            dir,
        }
    }

    pub fn config(&self, prefix: &str) -> SyncConfig {
        SyncConfig::new("123456789012", "us-west-2", prefix, self.paths.clone())
            .with_poll_interval(Duration::from_millis(5))
            .with_provision_timing(Duration::from_secs(2), Duration::from_millis(2))
    }

    pub fn path(&self, name: &str) -> std::path::PathBuf {
        Path::new(self.dir.path()).join(name)
    }
}

/// Upper bound for anything expected to finish promptly.
pub const DEADLINE: Duration = Duration::from_secs(5);
