use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::state::{JobState, Observation, StateMachine, Transition};
use super::{MonitorExit, Shared};
use crate::batch::BatchService;

/// Publishes the exit reason when the monitor task ends, including when it
/// unwinds or is dropped mid-sweep.
struct ExitSignal<'a> {
    stopped: &'a watch::Sender<Option<MonitorExit>>,
}

impl ExitSignal<'_> {
    fn finish(self, exit: MonitorExit) {
        match exit {
            MonitorExit::Drained => info!("all jobs are terminal, status monitor stopped"),
            MonitorExit::Shutdown => warn!("status monitor stopped by shutdown"),
            MonitorExit::Aborted => {}
        }
        self.stopped.send_replace(Some(exit));
    }
}

impl Drop for ExitSignal<'_> {
    fn drop(&mut self) {
        let published = self.stopped.send_if_modified(|exit| {
            if exit.is_some() {
                return false;
            }
            *exit = Some(MonitorExit::Aborted);
            true
        });
        if published {
            error!("status monitor stopped unexpectedly");
        }
    }
}

/// Background status loop.
///
/// Sweeps every non-terminal job once, then sleeps `poll_interval` before the
/// next sweep. A drain signal cuts the sleep short. Stops after a sweep that
/// leaves the table drained, or as soon as shutdown is requested.
pub(crate) async fn run<S: BatchService>(shared: Arc<Shared<S>>, poll_interval: Duration) {
    let signal = ExitSignal {
        stopped: &shared.stopped,
    };
    let mut shutdown = shared.shutdown.subscribe();
    info!(poll_interval_secs = poll_interval.as_secs_f64(), "status monitor started");

    let exit = loop {
        if *shutdown.borrow() {
            break MonitorExit::Shutdown;
        }
        if !sweep(&shared, &mut shutdown).await {
            break MonitorExit::Shutdown;
        }

        if shared.lock_table().is_drained() {
            break MonitorExit::Drained;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shared.drain.notified() => debug!("drain signalled, sweeping early"),
            _ = shutdown.wait_for(|stop| *stop) => {}
        }
    };

    signal.finish(exit);
}

/// Poll every job that was non-terminal when the sweep started. Jobs inserted
/// meanwhile are picked up by the next sweep.
///
/// Returns `false` when shutdown interrupted the sweep.
async fn sweep<S: BatchService>(shared: &Shared<S>, shutdown: &mut watch::Receiver<bool>) -> bool {
    let pollable = shared.lock_table().pollable();
    debug!(jobs = pollable.len(), "status sweep");

    for (id, remote_id) in pollable {
        let result = tokio::select! {
            result = shared.service.describe_job(&remote_id) => result,
            _ = shutdown.wait_for(|stop| *stop) => return false,
        };
        let observation = match result {
            Ok(status) => match JobState::from_remote(&status.status) {
                Some(state) => Observation::Reported {
                    state,
                    reason: status.reason,
                },
                None => Observation::Unresolved(format!(
                    "unrecognised remote status {:?}",
                    status.status
                )),
            },
            Err(e) => Observation::Unresolved(e.to_string()),
        };

        let mut table = shared.lock_table();
        let Some(job) = table.get_mut(&id) else {
            continue;
        };
        match StateMachine::apply(job, observation, Utc::now()) {
            Transition::Unchanged => {}
            Transition::Advanced { from, to } if to.is_terminal() => {
                let reason = job.failure_reason.as_deref().unwrap_or("");
                info!(job_id = %id, %remote_id, name = %job.name, %from, state = %to, reason, "job finished");
            }
            Transition::Advanced { from, to } => {
                info!(job_id = %id, %remote_id, %from, state = %to, "job state changed");
            }
            Transition::Lost { last_known, error } => {
                warn!(job_id = %id, %remote_id, %last_known, %error, "job status unknown");
            }
            Transition::Recovered { state } => {
                info!(job_id = %id, %remote_id, %state, "job status recovered");
            }
        }
    }
    true
}
