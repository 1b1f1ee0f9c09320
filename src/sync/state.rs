use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::Job;

/// Local view of a job's lifecycle.
///
/// A job flows through: PENDING → SUBMITTED → (RUNNING) → SUCCEEDED | FAILED.
/// `Unknown` is shown while the latest status poll could not be resolved; the
/// furthest known state is kept aside and restored once a poll succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Submitted,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Position along the lifecycle. `Unknown` has no position.
    fn rank(self) -> Option<u8> {
        match self {
            JobState::Pending => Some(0),
            JobState::Submitted => Some(1),
            JobState::Running => Some(2),
            JobState::Succeeded | JobState::Failed => Some(3),
            JobState::Unknown => None,
        }
    }

    /// Map a remote status token. `None` for tokens outside the known
    /// vocabulary.
    pub fn from_remote(token: &str) -> Option<JobState> {
        match token {
            "SUBMITTED" | "PENDING" | "RUNNABLE" | "STARTING" => Some(JobState::Submitted),
            "RUNNING" => Some(JobState::Running),
            "SUCCEEDED" => Some(JobState::Succeeded),
            "FAILED" => Some(JobState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Submitted => write!(f, "SUBMITTED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Succeeded => write!(f, "SUCCEEDED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// The outcome of one status poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The remote service reported a recognised state.
    Reported {
        state: JobState,
        reason: Option<String>,
    },
    /// The poll failed or returned something that could not be mapped.
    Unresolved(String),
}

/// The effect an observation had on a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing visible changed.
    Unchanged,
    /// The job moved forward.
    Advanced { from: JobState, to: JobState },
    /// The job's state could not be resolved and is now `Unknown`.
    Lost { last_known: JobState, error: String },
    /// A poll succeeded again after one or more unresolved polls.
    Recovered { state: JobState },
}

/// Applies status observations to a `Job`.
pub struct StateMachine;

impl StateMachine {
    /// Fold one poll result into the job.
    ///
    /// - Terminal jobs never change.
    /// - An unresolved poll overlays `Unknown` but keeps the last known state.
    /// - A reported state is applied only if it moves the job forward;
    ///   backwards reports leave the furthest state in place.
    pub fn apply(job: &mut Job, observation: Observation, now: DateTime<Utc>) -> Transition {
        if job.last_known.is_terminal() {
            return Transition::Unchanged;
        }
        job.last_polled_at = Some(now);

        match observation {
            Observation::Unresolved(error) => {
                let was_unknown = job.state == JobState::Unknown;
                job.state = JobState::Unknown;
                job.poll_error = Some(error.clone());
                if was_unknown {
                    Transition::Unchanged
                } else {
                    Transition::Lost {
                        last_known: job.last_known,
                        error,
                    }
                }
            }
            Observation::Reported { state, reason } => {
                let was_unknown = job.state == JobState::Unknown;
                job.poll_error = None;

                let forward = match (state.rank(), job.last_known.rank()) {
                    (Some(new), Some(old)) => new > old,
                    _ => false,
                };
                if !forward {
                    job.state = job.last_known;
                    return if was_unknown {
                        Transition::Recovered {
                            state: job.last_known,
                        }
                    } else {
                        Transition::Unchanged
                    };
                }

                let from = job.last_known;
                job.last_known = state;
                job.state = state;
                if state.is_terminal() {
                    job.terminal_at = Some(now);
                    if state == JobState::Failed {
                        job.failure_reason = reason;
                    }
                }
                Transition::Advanced { from, to: state }
            }
        }
    }
}
