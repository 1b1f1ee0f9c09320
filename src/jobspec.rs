//! Job-submission specs read from JSON files.
//!
//! A file holds a single job object, an array of them, or `{"jobs": [...]}`.
//! Each job needs a `jobName`; every other field is forwarded to the submit
//! call untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// One job to submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(rename = "jobName")]
    pub name: String,
    /// Remaining submit parameters (`parameters`, `containerOverrides`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobSpecFile {
    Wrapped { jobs: Vec<JobSpec> },
    Many(Vec<JobSpec>),
    One(JobSpec),
}

impl JobSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Map::new(),
        }
    }

    /// Body of the submit call against the given queue and definition.
    /// Queue and definition always override values from the file.
    pub fn submit_request(&self, queue_arn: &str, definition_arn: &str) -> Value {
        let mut body = self.fields.clone();
        body.insert("jobName".into(), Value::String(self.name.clone()));
        body.insert("jobQueue".into(), Value::String(queue_arn.to_string()));
        body.insert(
            "jobDefinition".into(),
            Value::String(definition_arn.to_string()),
        );
        Value::Object(body)
    }

    pub fn parse(contents: &str) -> Result<Vec<JobSpec>, serde_json::Error> {
        let file: JobSpecFile = serde_json::from_str(contents)?;
        Ok(match file {
            JobSpecFile::Wrapped { jobs } | JobSpecFile::Many(jobs) => jobs,
            JobSpecFile::One(job) => vec![job],
        })
    }

    /// Read every job from a spec file.
    pub fn load(path: &Path) -> Result<Vec<JobSpec>, SyncError> {
        let invalid = |reason: String| SyncError::JobSpec {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let jobs = Self::parse(&contents).map_err(|e| invalid(e.to_string()))?;
        if let Some(job) = jobs.iter().find(|job| job.name.trim().is_empty()) {
            return Err(invalid(format!("job with empty jobName: {:?}", job.fields)));
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_object() {
        let jobs = JobSpec::parse(r#"{"jobName": "hello", "parameters": {"x": "1"}}"#).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "hello");
        assert_eq!(jobs[0].fields["parameters"]["x"], "1");
    }

    #[test]
    fn parse_array_and_wrapped() {
        let jobs = JobSpec::parse(r#"[{"jobName": "a"}, {"jobName": "b"}]"#).unwrap();
        assert_eq!(jobs.len(), 2);

        let jobs = JobSpec::parse(r#"{"jobs": [{"jobName": "a"}]}"#).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "a");
    }

    #[test]
    fn parse_rejects_missing_name() {
        assert!(JobSpec::parse(r#"{"parameters": {}}"#).is_err());
    }

    #[test]
    fn submit_request_injects_queue_and_definition() {
        let mut spec = JobSpec::new("align");
        spec.fields.insert("jobQueue".into(), Value::from("ignored"));
        spec.fields.insert("timeout".into(), serde_json::json!({"attemptDurationSeconds": 60}));

        let body = spec.submit_request("arn:jq", "arn:jd");
        assert_eq!(body["jobName"], "align");
        assert_eq!(body["jobQueue"], "arn:jq");
        assert_eq!(body["jobDefinition"], "arn:jd");
        assert_eq!(body["timeout"]["attemptDurationSeconds"], 60);
    }

    #[test]
    fn load_rejects_blank_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, r#"[{"jobName": " "}]"#).unwrap();
        let err = JobSpec::load(&path).unwrap_err();
        assert!(matches!(err, SyncError::JobSpec { .. }));
    }
}
