//! Makes sure the compute environment, job queue and job definition of a run
//! exist remotely.
//!
//! Existing resources are reused as they are. Missing ones are created from
//! their descriptor and polled until the service reports them usable.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::batch::{BatchError, BatchService, ResourceHandle};
use crate::descriptor::{ResourceDescriptor, ResourceDescriptors};
use crate::error::SyncError;

/// Handles of the three provisioned resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedResources {
    pub compute_environment: ResourceHandle,
    pub job_queue: ResourceHandle,
    pub job_definition: ResourceHandle,
}

pub struct Provisioner<'a, S> {
    service: &'a S,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a, S: BatchService> Provisioner<'a, S> {
    pub fn new(service: &'a S, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            service,
            timeout,
            poll_interval,
        }
    }

    /// Provision all resources of a run.
    ///
    /// The job queue may reference the compute environment, so it is ensured
    /// after it. The job definition is independent and runs alongside.
    pub async fn provision(
        &self,
        descriptors: &ResourceDescriptors,
        prefix: &str,
    ) -> Result<ProvisionedResources, SyncError> {
        let environment_and_queue = async {
            let compute_environment = self.ensure(&descriptors.compute_environment).await?;
            let queue = match &descriptors.job_queue {
                Some(queue) => queue.bind_to_compute_environment(&compute_environment.arn),
                None => {
                    info!(
                        compute_environment = %compute_environment.name,
                        "no job queue descriptor, deriving one from the compute environment"
                    );
                    ResourceDescriptor::derived_job_queue(prefix, &compute_environment.arn)
                }
            };
            let job_queue = self.ensure(&queue).await?;
            Ok::<_, SyncError>((compute_environment, job_queue))
        };

        let ((compute_environment, job_queue), job_definition) =
            tokio::try_join!(environment_and_queue, self.ensure(&descriptors.job_definition))?;

        Ok(ProvisionedResources {
            compute_environment,
            job_queue,
            job_definition,
        })
    }

    /// Reuse the resource if it exists, create it otherwise.
    ///
    /// The provisioning timeout covers the whole call, including retries of
    /// throttled or failed requests.
    pub async fn ensure(&self, descriptor: &ResourceDescriptor) -> Result<ResourceHandle, SyncError> {
        let kind = descriptor.kind;
        let name = descriptor.name.as_str();
        let service = self.service;
        let window = Window::starting_now(self.timeout);

        match self
            .retrying(descriptor, window, move || service.describe_resource(kind, name))
            .await?
            .map_err(|e| provisioning_error(descriptor, e))?
        {
            Some(existing) if existing.usable => {
                info!(%kind, resource = %name, arn = %existing.handle.arn, "reusing existing resource");
                return Ok(existing.handle);
            }
            Some(existing) => {
                info!(%kind, resource = %name, status = %existing.status, "resource exists, waiting until usable");
                return self.wait_until_usable(descriptor, window).await;
            }
            None => {}
        }

        match self
            .retrying(descriptor, window, move || {
                service.create_resource(kind, &descriptor.raw_spec)
            })
            .await?
        {
            Ok(handle) => info!(%kind, resource = %name, arn = %handle.arn, "created resource"),
            Err(BatchError::AlreadyExists(message)) => {
                info!(%kind, resource = %name, %message, "resource was created concurrently, reusing it");
            }
            Err(e) => return Err(provisioning_error(descriptor, e)),
        }
        self.wait_until_usable(descriptor, window).await
    }

    async fn wait_until_usable(
        &self,
        descriptor: &ResourceDescriptor,
        window: Window,
    ) -> Result<ResourceHandle, SyncError> {
        let kind = descriptor.kind;
        let name = descriptor.name.as_str();
        let service = self.service;

        loop {
            match self
                .retrying(descriptor, window, move || service.describe_resource(kind, name))
                .await?
                .map_err(|e| provisioning_error(descriptor, e))?
            {
                Some(resource) if resource.usable => {
                    debug!(%kind, resource = %name, waited_ms = window.started.elapsed().as_millis() as u64, "resource is usable");
                    return Ok(resource.handle);
                }
                Some(resource) => debug!(%kind, resource = %name, status = %resource.status, "resource not usable yet"),
                None => debug!(%kind, resource = %name, "resource not visible yet"),
            }
            self.pause(descriptor, window, self.poll_interval).await?;
        }
    }

    /// Run `call` again while it fails with a rate limit or a network error.
    ///
    /// Any other outcome is handed back as is. Running past the window is a
    /// [`SyncError::ProvisioningTimeout`].
    async fn retrying<T, F, Fut>(
        &self,
        descriptor: &ResourceDescriptor,
        window: Window,
        mut call: F,
    ) -> Result<Result<T, BatchError>, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BatchError>>,
    {
        loop {
            let outcome = call().await;
            let delay = match &outcome {
                Err(e) => retry_delay(e, self.poll_interval),
                Ok(_) => None,
            };
            match (delay, outcome) {
                (Some(delay), Err(error)) => {
                    warn!(
                        kind = %descriptor.kind,
                        resource = %descriptor.name,
                        error = %error,
                        retry_in_ms = delay.as_millis() as u64,
                        "transient error, retrying"
                    );
                    self.pause(descriptor, window, delay).await?;
                }
                (_, outcome) => return Ok(outcome),
            }
        }
    }

    /// Sleep for `delay`, cut short by the end of the window.
    async fn pause(
        &self,
        descriptor: &ResourceDescriptor,
        window: Window,
        delay: Duration,
    ) -> Result<(), SyncError> {
        let now = Instant::now();
        if now >= window.deadline {
            return Err(SyncError::ProvisioningTimeout {
                kind: descriptor.kind,
                name: descriptor.name.clone(),
                waited: now - window.started,
            });
        }
        sleep(delay.min(window.deadline - now)).await;
        Ok(())
    }
}

/// Time budget of one `ensure` call.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    deadline: Instant,
}

impl Window {
    fn starting_now(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + timeout,
        }
    }
}

/// How long to wait before retrying after `error`, or `None` if retrying
/// cannot help. A rate limit waits at least as long as the service asked.
fn retry_delay(error: &BatchError, poll_interval: Duration) -> Option<Duration> {
    match error {
        BatchError::RateLimited { retry_after_ms } => {
            Some(poll_interval.max(Duration::from_millis(*retry_after_ms)))
        }
        BatchError::NetworkError(_) => Some(poll_interval),
        _ => None,
    }
}

fn provisioning_error(descriptor: &ResourceDescriptor, source: BatchError) -> SyncError {
    SyncError::Provisioning {
        kind: descriptor.kind,
        name: descriptor.name.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_waits_at_least_retry_after() {
        let poll = Duration::from_secs(5);
        let slow = BatchError::RateLimited {
            retry_after_ms: 12_000,
        };
        let fast = BatchError::RateLimited { retry_after_ms: 10 };
        assert_eq!(retry_delay(&slow, poll), Some(Duration::from_secs(12)));
        assert_eq!(retry_delay(&fast, poll), Some(poll));
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let poll = Duration::from_secs(5);
        assert_eq!(
            retry_delay(&BatchError::AlreadyExists("run1-ce".into()), poll),
            None
        );
        let api = BatchError::ApiError {
            status: 400,
            message: "bad request".into(),
        };
        assert_eq!(retry_delay(&api, poll), None);
    }
}
