//! The job-lifecycle engine.
//!
//! [`Synchronizer`] provisions the resources of a run, submits jobs against
//! them and tracks every job until it reaches a terminal state. Submissions
//! and the background status monitor share one job table behind a single
//! mutex; draining is a predicate over that table.

mod job;
mod monitor;
mod state;

pub use job::{Job, JobId, TerminationSummary};
pub use state::{JobState, Observation, StateMachine, Transition};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::Utc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::batch::BatchService;
use crate::config::SyncConfig;
use crate::descriptor::ResourceDescriptors;
use crate::error::SyncError;
use crate::jobspec::JobSpec;
use crate::provision::{ProvisionedResources, Provisioner};

/// Why the status monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Drain was signalled and every job reached a terminal state.
    Drained,
    /// `shutdown` forced the monitor off.
    Shutdown,
    /// The monitor task ended without reaching either of the above.
    Aborted,
}

/// Tracked jobs plus the drain bookkeeping, always read and written together.
#[derive(Debug, Default)]
pub(crate) struct JobTable {
    jobs: HashMap<JobId, Job>,
    order: Vec<JobId>,
    drain_requested: bool,
    /// Submissions that passed the drain check but are not inserted yet.
    in_flight: usize,
}

impl JobTable {
    fn insert(&mut self, job: Job) {
        self.order.push(job.local_id);
        self.jobs.insert(job.local_id, job);
    }

    fn snapshot(&self) -> Vec<Job> {
        self.order
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .cloned()
            .collect()
    }

    /// Ids of non-terminal jobs with their remote ids.
    pub(crate) fn pollable(&self) -> Vec<(JobId, String)> {
        self.order
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| !job.is_terminal())
            .filter_map(|job| job.remote_id.clone().map(|remote| (job.local_id, remote)))
            .collect()
    }

    pub(crate) fn get_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    /// No submission can still arrive and every tracked job is terminal.
    pub(crate) fn is_drained(&self) -> bool {
        self.drain_requested && self.in_flight == 0 && self.jobs.values().all(Job::is_terminal)
    }
}

struct Setup {
    config: SyncConfig,
    resources: ProvisionedResources,
}

pub(crate) struct Shared<S> {
    service: S,
    setup: OnceLock<Setup>,
    table: Mutex<JobTable>,
    shutdown: watch::Sender<bool>,
    /// Wakes a sleeping monitor once drain is requested.
    drain: Notify,
    stopped: watch::Sender<Option<MonitorExit>>,
}

impl<S> Shared<S> {
    pub(crate) fn lock_table(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases an in-flight slot, inserting the job if the submission finished.
struct Reservation<'a> {
    table: &'a Mutex<JobTable>,
    released: bool,
}

impl Reservation<'_> {
    fn commit(mut self, job: Job) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.insert(job);
        table.in_flight -= 1;
        self.released = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.released {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.in_flight -= 1;
        }
    }
}

/// Provisions resources, submits jobs and waits for them to finish.
pub struct Synchronizer<S> {
    shared: Arc<Shared<S>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl<S: BatchService + 'static> Synchronizer<S> {
    pub fn new(service: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                setup: OnceLock::new(),
                table: Mutex::new(JobTable::default()),
                shutdown: watch::Sender::new(false),
                drain: Notify::new(),
                stopped: watch::Sender::new(None),
            }),
            monitor: Mutex::new(None),
        }
    }

    /// Load the descriptors named in `config` and provision the resources.
    pub async fn initialize(&self, config: SyncConfig) -> Result<&ProvisionedResources, SyncError> {
        if self.shared.setup.get().is_some() {
            return Err(SyncError::AlreadyInitialized);
        }
        info!(
            account = %config.account,
            region = %config.region,
            prefix = %config.prefix,
            "provisioning batch resources"
        );

        let descriptors = ResourceDescriptors::load(&config.descriptors, &config.prefix)?;
        let provisioner = Provisioner::new(
            &self.shared.service,
            config.provision_timeout,
            config.provision_poll_interval,
        );
        let resources = provisioner.provision(&descriptors, &config.prefix).await?;
        info!(
            compute_environment = %resources.compute_environment.arn,
            job_queue = %resources.job_queue.arn,
            job_definition = %resources.job_definition.arn,
            "resources ready"
        );

        self.shared
            .setup
            .set(Setup { config, resources })
            .map_err(|_| SyncError::AlreadyInitialized)?;
        self.resources().ok_or(SyncError::NotInitialized)
    }

    pub fn resources(&self) -> Option<&ProvisionedResources> {
        self.shared.setup.get().map(|setup| &setup.resources)
    }

    pub fn config(&self) -> Option<&SyncConfig> {
        self.shared.setup.get().map(|setup| &setup.config)
    }

    /// Start the background status monitor. A second call is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn monitor(&self) -> Result<(), SyncError> {
        let setup = self.shared.setup.get().ok_or(SyncError::NotInitialized)?;
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            let shared = Arc::clone(&self.shared);
            let interval = setup.config.poll_interval;
            *slot = Some(tokio::spawn(monitor::run(shared, interval)));
        }
        Ok(())
    }

    /// Submit one job.
    ///
    /// A remote submission failure is not an error: the returned job is
    /// tracked with state `Failed` and the reason recorded.
    pub async fn submit(&self, spec: JobSpec) -> Result<Job, SyncError> {
        let setup = self.shared.setup.get().ok_or(SyncError::NotInitialized)?;
        let resources = &setup.resources;

        let reservation = {
            let mut table = self.shared.lock_table();
            if table.drain_requested {
                return Err(SyncError::Draining);
            }
            table.in_flight += 1;
            Reservation {
                table: &self.shared.table,
                released: false,
            }
        };

        let mut job = Job::new(
            spec.name.clone(),
            resources.job_queue.arn.clone(),
            resources.job_definition.arn.clone(),
        );
        match self
            .shared
            .service
            .submit_job(&resources.job_queue, &resources.job_definition, &spec)
            .await
        {
            Ok(remote_id) => {
                info!(job_id = %job.local_id, %remote_id, name = %job.name, "job submitted");
                job.mark_submitted(remote_id, Utc::now());
            }
            Err(e) => {
                warn!(job_id = %job.local_id, name = %job.name, error = %e, "job submission failed");
                job.mark_submit_failed(e.to_string(), Utc::now());
            }
        }

        reservation.commit(job.clone());
        Ok(job)
    }

    /// Stop accepting submissions. Idempotent.
    pub fn signal_drain(&self) {
        let mut table = self.shared.lock_table();
        if !table.drain_requested {
            table.drain_requested = true;
            info!(tracked = table.jobs.len(), "drain requested, no more submissions accepted");
            self.shared.drain.notify_one();
        }
    }

    /// Wait until the monitor stops because every job is terminal.
    ///
    /// Does not return before drain is signalled. Returns
    /// [`SyncError::ShutDown`] if `shutdown` stopped the monitor first and
    /// [`SyncError::MonitorAborted`] if the monitor task died.
    pub async fn await_termination(&self) -> Result<TerminationSummary, SyncError> {
        if !self.monitor_started() {
            return Err(SyncError::MonitorNotStarted);
        }
        let mut stopped = self.shared.stopped.subscribe();
        let exit = *stopped
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SyncError::ShutDown)?;
        match exit {
            Some(MonitorExit::Drained) => Ok(self.summary()),
            Some(MonitorExit::Aborted) => Err(SyncError::MonitorAborted),
            _ => Err(SyncError::ShutDown),
        }
    }

    /// Force the monitor to stop without waiting for terminal states.
    pub fn shutdown(&self) {
        if !self.shared.shutdown.send_replace(true) {
            info!("shutting down status monitor");
        }
    }

    /// Consistent copy of every tracked job, in submission order.
    pub fn jobs(&self) -> Vec<Job> {
        self.shared.lock_table().snapshot()
    }

    pub fn job(&self, id: &JobId) -> Option<Job> {
        self.shared.lock_table().jobs.get(id).cloned()
    }

    pub fn summary(&self) -> TerminationSummary {
        TerminationSummary::from_jobs(self.shared.lock_table().jobs.values())
    }

    /// How the monitor stopped, if it has.
    pub fn monitor_exit(&self) -> Option<MonitorExit> {
        *self.shared.stopped.borrow()
    }

    fn monitor_started(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<S> Drop for Synchronizer<S> {
    fn drop(&mut self) {
        self.shared.shutdown.send_replace(true);
    }
}
