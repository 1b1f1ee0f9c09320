//! Tipos de dados trocados com o serviço de batch.
//!
//! As structs de requisição e resposta seguem o formato REST-JSON da API do
//! AWS Batch (campos em camelCase). [`ResourceHandle`], [`RemoteResource`] e
//! [`RemoteJobStatus`] são as formas neutras usadas pelo restante do crate.

use serde::{Deserialize, Serialize};

use crate::descriptor::ResourceKind;

/// Referência a um recurso provisionado no serviço remoto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub name: String,
    pub arn: String,
}

/// Um recurso encontrado por uma consulta `describe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub handle: ResourceHandle,
    /// Status reportado pelo serviço (ex.: "CREATING", "VALID", "ACTIVE").
    pub status: String,
    /// Se o recurso já pode receber jobs.
    pub usable: bool,
}

/// Estado de um job segundo o serviço remoto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJobStatus {
    /// Token de status cru (ex.: "RUNNABLE", "SUCCEEDED").
    pub status: String,
    /// Motivo do status, quando o serviço informa um.
    pub reason: Option<String>,
}

/// Detalhe de um ambiente de computação ou fila de jobs.
///
/// Os dois tipos de recurso compartilham `status` + `state`; os nomes dos
/// campos de nome e ARN variam e são mapeados via `serde(alias)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDetail {
    #[serde(alias = "computeEnvironmentName", alias = "jobQueueName")]
    pub name: String,
    #[serde(alias = "computeEnvironmentArn", alias = "jobQueueArn")]
    pub arn: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl EnvironmentDetail {
    /// Utilizável quando validado e habilitado.
    pub fn is_usable(&self) -> bool {
        self.status.as_deref() == Some("VALID") && self.state.as_deref() == Some("ENABLED")
    }
}

/// Resposta de `describecomputeenvironments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeComputeEnvironmentsResponse {
    #[serde(default)]
    pub compute_environments: Vec<EnvironmentDetail>,
}

/// Resposta de `describejobqueues`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeJobQueuesResponse {
    #[serde(default)]
    pub job_queues: Vec<EnvironmentDetail>,
}

/// Detalhe de uma revisão de definição de job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinitionDetail {
    pub job_definition_name: String,
    pub job_definition_arn: String,
    pub revision: u32,
    #[serde(default)]
    pub status: Option<String>,
}

/// Resposta de `describejobdefinitions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeJobDefinitionsResponse {
    #[serde(default)]
    pub job_definitions: Vec<JobDefinitionDetail>,
}

/// Resposta das chamadas de criação (`createcomputeenvironment`,
/// `createjobqueue`, `registerjobdefinition`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceResponse {
    #[serde(
        alias = "computeEnvironmentName",
        alias = "jobQueueName",
        alias = "jobDefinitionName"
    )]
    pub name: String,
    #[serde(
        alias = "computeEnvironmentArn",
        alias = "jobQueueArn",
        alias = "jobDefinitionArn"
    )]
    pub arn: String,
}

/// Resposta de `submitjob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_name: String,
    pub job_id: String,
    #[serde(default)]
    pub job_arn: Option<String>,
}

/// Resumo de um job em `describejobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job_id: String,
    #[serde(default)]
    pub job_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub status_reason: Option<String>,
}

/// Resposta de `describejobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeJobsResponse {
    #[serde(default)]
    pub jobs: Vec<JobDetail>,
}

/// Corpo de erro devolvido pela API (`{"__type": ..., "message": ...}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_environment_deserialize_from_api_format() {
        let api_json = r#"{
            "computeEnvironments": [{
                "computeEnvironmentName": "run1-ce",
                "computeEnvironmentArn": "arn:aws:batch:us-west-2:1:compute-environment/run1-ce",
                "status": "VALID",
                "state": "ENABLED",
                "type": "MANAGED"
            }]
        }"#;
        let resp: DescribeComputeEnvironmentsResponse = serde_json::from_str(api_json).unwrap();
        let ce = &resp.compute_environments[0];
        assert_eq!(ce.name, "run1-ce");
        assert!(ce.arn.ends_with("compute-environment/run1-ce"));
        assert!(ce.is_usable());
    }

    #[test]
    fn queue_in_creation_is_not_usable() {
        let json = r#"{"jobQueueName": "q", "jobQueueArn": "arn:q", "status": "CREATING", "state": "ENABLED"}"#;
        let q: EnvironmentDetail = serde_json::from_str(json).unwrap();
        assert!(!q.is_usable());
    }

    #[test]
    fn disabled_environment_is_not_usable() {
        let json = r#"{"computeEnvironmentName": "c", "computeEnvironmentArn": "arn:c", "status": "VALID", "state": "DISABLED"}"#;
        let ce: EnvironmentDetail = serde_json::from_str(json).unwrap();
        assert!(!ce.is_usable());
    }

    #[test]
    fn create_response_accepts_any_resource_fields() {
        let jd: CreateResourceResponse = serde_json::from_str(
            r#"{"jobDefinitionName": "run1-jd", "jobDefinitionArn": "arn:jd:1", "revision": 1}"#,
        )
        .unwrap();
        assert_eq!(jd.name, "run1-jd");
        assert_eq!(jd.arn, "arn:jd:1");
    }

    #[test]
    fn describe_jobs_empty_list() {
        let resp: DescribeJobsResponse = serde_json::from_str(r#"{"jobs": []}"#).unwrap();
        assert!(resp.jobs.is_empty());
    }

    #[test]
    fn api_error_body_type_field_renames_correctly() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"__type": "ClientException", "message": "Object already exists"}"#,
        )
        .unwrap();
        assert_eq!(body.error_type.as_deref(), Some("ClientException"));
        assert_eq!(body.message.as_deref(), Some("Object already exists"));
    }
}
