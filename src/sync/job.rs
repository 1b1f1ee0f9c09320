use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobState;

/// Locally generated job identifier, unique per synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job tracked by the synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub local_id: JobId,
    /// Remote job id, set once submission succeeded.
    pub remote_id: Option<String>,
    pub name: String,
    /// ARN of the job queue the job was submitted to.
    pub queue: String,
    /// ARN of the job definition the job runs.
    pub definition: String,
    pub state: JobState,
    pub(crate) last_known: JobState,
    /// Why the job failed, if known (submission error or remote status reason).
    pub failure_reason: Option<String>,
    /// Error of the latest unresolved status poll.
    pub poll_error: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub terminal_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(name: String, queue: String, definition: String) -> Self {
        Self {
            local_id: JobId::new(),
            remote_id: None,
            name,
            queue,
            definition,
            state: JobState::Pending,
            last_known: JobState::Pending,
            failure_reason: None,
            poll_error: None,
            submitted_at: None,
            last_polled_at: None,
            terminal_at: None,
        }
    }

    /// Furthest state reached, ignoring any `Unknown` overlay.
    pub fn last_known(&self) -> JobState {
        self.last_known
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub(crate) fn mark_submitted(&mut self, remote_id: String, now: DateTime<Utc>) {
        self.remote_id = Some(remote_id);
        self.state = JobState::Submitted;
        self.last_known = JobState::Submitted;
        self.submitted_at = Some(now);
    }

    /// The remote submit call failed; the job is tracked as terminally failed.
    pub(crate) fn mark_submit_failed(&mut self, reason: String, now: DateTime<Utc>) {
        self.state = JobState::Failed;
        self.last_known = JobState::Failed;
        self.failure_reason = Some(reason);
        self.terminal_at = Some(now);
    }
}

/// Counts of tracked jobs per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationSummary {
    pub total: usize,
    pub submitted: usize,
    pub running: usize,
    pub unknown: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl TerminationSummary {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut summary = Self::default();
        for job in jobs {
            summary.total += 1;
            match job.state {
                JobState::Pending | JobState::Submitted => summary.submitted += 1,
                JobState::Running => summary.running += 1,
                JobState::Unknown => summary.unknown += 1,
                JobState::Succeeded => summary.succeeded += 1,
                JobState::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn terminal(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("align".into(), "arn:jq".into(), "arn:jd".into())
    }

    #[test]
    fn job_creation_defaults() {
        let job = job();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.last_known(), JobState::Pending);
        assert!(job.remote_id.is_none());
        assert!(job.submitted_at.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn local_ids_are_unique() {
        assert_ne!(job().local_id, job().local_id);
    }

    #[test]
    fn mark_submitted_records_remote_id() {
        let mut job = job();
        job.mark_submitted("abc-123".into(), Utc::now());
        assert_eq!(job.state, JobState::Submitted);
        assert_eq!(job.remote_id.as_deref(), Some("abc-123"));
        assert!(job.submitted_at.is_some());
    }

    #[test]
    fn failed_submission_is_terminal() {
        let mut job = job();
        job.mark_submit_failed("queue is disabled".into(), Utc::now());
        assert!(job.is_terminal());
        assert_eq!(job.state, JobState::Failed);
        assert!(job.remote_id.is_none());
        assert!(job.terminal_at.is_some());
        assert_eq!(job.failure_reason.as_deref(), Some("queue is disabled"));
    }

    #[test]
    fn summary_counts_states() {
        let mut ok = job();
        ok.mark_submitted("1".into(), Utc::now());
        ok.state = JobState::Succeeded;
        let mut bad = job();
        bad.mark_submit_failed("boom".into(), Utc::now());
        let mut lost = job();
        lost.mark_submitted("2".into(), Utc::now());
        lost.state = JobState::Unknown;

        let summary = TerminationSummary::from_jobs([&ok, &bad, &lost]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.terminal(), 2);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn job_serialization_roundtrip() {
        let job = job();
        let json = serde_json::to_string(&job).unwrap();
        let deserialized: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.local_id, job.local_id);
        assert_eq!(deserialized.name, "align");
        assert_eq!(deserialized.state, JobState::Pending);
    }
}
