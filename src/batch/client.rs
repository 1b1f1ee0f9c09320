use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::BatchError;
use super::types::{
    ApiErrorBody, CreateResourceResponse, DescribeComputeEnvironmentsResponse,
    DescribeJobDefinitionsResponse, DescribeJobQueuesResponse, DescribeJobsResponse,
    EnvironmentDetail, RemoteJobStatus, RemoteResource, ResourceHandle, SubmitJobResponse,
};
use super::BatchService;
use crate::descriptor::ResourceKind;
use crate::jobspec::JobSpec;

/// Regional endpoint of the batch service.
pub fn default_endpoint(region: &str) -> String {
    format!("https://batch.{region}.amazonaws.com")
}

/// HTTP client for the batch service REST-JSON API.
///
/// Requests are sent unsigned; point `base_url` at a signing proxy or a
/// gateway that already carries the caller's credentials.
pub struct BatchClient {
    client: Client,
    base_url: String,
}

impl BatchClient {
    pub fn new(region: &str) -> Result<Self, BatchError> {
        Self::with_base_url(default_endpoint(region))
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, BatchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B, R>(&self, operation: &str, body: &B) -> Result<R, BatchError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/v1/{operation}", self.base_url);
        tracing::trace!(%url, "batch request");
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(BatchError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let message = body.message.unwrap_or(text);
            if status.is_client_error() && message.to_lowercase().contains("already exists") {
                return Err(BatchError::AlreadyExists(message));
            }
            return Err(BatchError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<R>().await?;
        Ok(body)
    }

    fn environment_resource(kind: ResourceKind, detail: EnvironmentDetail) -> RemoteResource {
        let usable = detail.is_usable();
        RemoteResource {
            handle: ResourceHandle {
                kind,
                name: detail.name,
                arn: detail.arn,
            },
            status: detail.status.unwrap_or_default(),
            usable,
        }
    }
}

impl BatchService for BatchClient {
    async fn describe_resource(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<RemoteResource>, BatchError> {
        let found = match kind {
            ResourceKind::ComputeEnvironment => {
                let resp: DescribeComputeEnvironmentsResponse = self
                    .call(
                        "describecomputeenvironments",
                        &json!({ "computeEnvironments": [name] }),
                    )
                    .await?;
                resp.compute_environments
                    .into_iter()
                    .find(|ce| ce.name == name)
                    .map(|ce| Self::environment_resource(kind, ce))
            }
            ResourceKind::JobQueue => {
                let resp: DescribeJobQueuesResponse = self
                    .call("describejobqueues", &json!({ "jobQueues": [name] }))
                    .await?;
                resp.job_queues
                    .into_iter()
                    .find(|q| q.name == name)
                    .map(|q| Self::environment_resource(kind, q))
            }
            ResourceKind::JobDefinition => {
                let resp: DescribeJobDefinitionsResponse = self
                    .call(
                        "describejobdefinitions",
                        &json!({ "jobDefinitionName": name, "status": "ACTIVE" }),
                    )
                    .await?;
                resp.job_definitions
                    .into_iter()
                    .filter(|jd| jd.job_definition_name == name)
                    .filter(|jd| jd.status.as_deref().is_none_or(|s| s == "ACTIVE"))
                    .max_by_key(|jd| jd.revision)
                    .map(|jd| RemoteResource {
                        handle: ResourceHandle {
                            kind,
                            name: jd.job_definition_name,
                            arn: jd.job_definition_arn,
                        },
                        status: jd.status.unwrap_or_else(|| "ACTIVE".to_string()),
                        usable: true,
                    })
            }
        };
        Ok(found)
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        spec: &Value,
    ) -> Result<ResourceHandle, BatchError> {
        let operation = match kind {
            ResourceKind::ComputeEnvironment => "createcomputeenvironment",
            ResourceKind::JobQueue => "createjobqueue",
            ResourceKind::JobDefinition => "registerjobdefinition",
        };
        let resp: CreateResourceResponse = self.call(operation, spec).await?;
        Ok(ResourceHandle {
            kind,
            name: resp.name,
            arn: resp.arn,
        })
    }

    async fn submit_job(
        &self,
        queue: &ResourceHandle,
        definition: &ResourceHandle,
        spec: &JobSpec,
    ) -> Result<String, BatchError> {
        let body = spec.submit_request(&queue.arn, &definition.arn);
        let resp: SubmitJobResponse = self.call("submitjob", &body).await?;
        Ok(resp.job_id)
    }

    async fn describe_job(&self, remote_id: &str) -> Result<RemoteJobStatus, BatchError> {
        let resp: DescribeJobsResponse = self
            .call("describejobs", &json!({ "jobs": [remote_id] }))
            .await?;
        resp.jobs
            .into_iter()
            .find(|job| job.job_id == remote_id)
            .map(|job| RemoteJobStatus {
                status: job.status,
                reason: job.status_reason,
            })
            .ok_or_else(|| BatchError::NotFound(remote_id.to_string()))
    }
}
