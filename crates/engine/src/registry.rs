// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project mutual exclusion and the job state machine.
//!
//! Each project deployment directory has at most one non-terminal job. A
//! submission that finds the lock held is refused with `Busy`; there is no
//! queue. Accepted jobs run on a supervisor task whose drop guard always
//! releases the lock and resolves the job, even if the task panics or is
//! aborted.

use crate::broadcast::{AttachError, OutputBroadcaster, Subscription};
use crate::command::{build_plan, is_checkout, CommandPlan};
use crate::config::EngineConfig;
use crate::error::{CancelError, SubmitError};
use crate::runner::CommandRunner;
use berth_adapters::ProjectCatalog;
use berth_core::{
    Clock, CommandKind, FailureKind, Job, JobEvent, JobId, JobOutcome, JobState, ProjectName,
    ServiceName,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

/// Capacity of the job state-change channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A request to run one command against one project.
///
/// Names arrive unvalidated; [`ProjectJobRegistry::submit`] checks them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub project: String,
    pub command: CommandKind,
    pub service: Option<String>,
}

struct JobEntry {
    job: Job,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<JobId, JobEntry>,
    /// Deployment path -> holding job
    locks: HashMap<PathBuf, JobId>,
    /// Terminal jobs, oldest first
    history: VecDeque<JobId>,
    shutting_down: bool,
}

impl RegistryState {
    fn active_count(&self) -> usize {
        self.jobs.values().filter(|e| !e.job.is_terminal()).count()
    }
}

struct Shared<C: Clock> {
    state: Mutex<RegistryState>,
    catalog: Arc<dyn ProjectCatalog>,
    broadcaster: Arc<OutputBroadcaster<C>>,
    runner: CommandRunner<C>,
    events: broadcast::Sender<JobEvent>,
    idle: Notify,
    config: EngineConfig,
    clock: C,
}

impl<C: Clock> Shared<C> {
    fn emit(&self, job: &Job) {
        let _ = self.events.send(JobEvent {
            id: job.id.clone(),
            project: job.project.clone(),
            state: job.state,
            at_ms: self.clock.epoch_ms(),
        });
    }

    fn mark_running(&self, id: &JobId) {
        let snapshot = {
            let mut state = self.state.lock();
            let Some(entry) = state.jobs.get_mut(id) else {
                return;
            };
            if let Err(e) = entry.job.start(self.clock.epoch_ms()) {
                tracing::debug!(job_id = %id, error = %e, "job not started");
                return;
            }
            entry.job.clone()
        };
        tracing::info!(job_id = %id, project = %snapshot.project, "job running");
        self.emit(&snapshot);
    }

    /// Record the terminal outcome, release the project lock, end the stream.
    fn complete(&self, id: &JobId, outcome: JobOutcome) {
        let now = self.clock.epoch_ms();
        let snapshot = {
            let mut state = self.state.lock();
            let Some(entry) = state.jobs.get_mut(id) else {
                return;
            };
            if entry.job.is_terminal() {
                tracing::debug!(job_id = %id, state = %entry.job.state, "job already resolved");
                return;
            }
            if entry.job.state == JobState::Pending && outcome.state == JobState::Succeeded {
                let _ = entry.job.start(now);
            }
            if let Err(e) = entry.job.finish(&outcome, now) {
                tracing::error!(job_id = %id, error = %e, "job outcome rejected");
            }
            let job = entry.job.clone();

            if state.locks.get(&job.project_path) == Some(id) {
                state.locks.remove(&job.project_path);
            }
            state.history.push_back(id.clone());
            while state.history.len() > self.config.history_limit {
                if let Some(old) = state.history.pop_front() {
                    state.jobs.remove(&old);
                }
            }
            job
        };

        self.broadcaster.finish(id, &outcome);
        tracing::info!(
            job_id = %id,
            project = %snapshot.project,
            state = %snapshot.state,
            exit_code = ?snapshot.exit_code,
            "job finished",
        );
        self.emit(&snapshot);
        self.idle.notify_waiters();
    }
}

/// Resolves the job when the supervisor ends, however it ends.
struct SupervisorGuard<C: Clock> {
    shared: Arc<Shared<C>>,
    id: JobId,
    outcome: Option<JobOutcome>,
}

impl<C: Clock> Drop for SupervisorGuard<C> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            tracing::error!(job_id = %self.id, "supervisor ended without an outcome");
            JobOutcome::failed(FailureKind::Lost, None, Vec::new())
        });
        self.shared.complete(&self.id, outcome);
    }
}

/// Owns all jobs and project locks. Cheap to clone.
pub struct ProjectJobRegistry<C: Clock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for ProjectJobRegistry<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<C: Clock> ProjectJobRegistry<C> {
    pub fn new(config: EngineConfig, catalog: Arc<dyn ProjectCatalog>, clock: C) -> Self {
        let broadcaster = Arc::new(OutputBroadcaster::new(
            config.transcript,
            config.subscriber_queue,
            clock.clone(),
        ));
        let runner = CommandRunner::new(Arc::clone(&broadcaster), config.runner);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RegistryState::default()),
                catalog,
                broadcaster,
                runner,
                events,
                idle: Notify::new(),
                config,
                clock,
            }),
        }
    }

    /// Validate, take the project lock, and start the job.
    ///
    /// Returns as soon as the job is registered; the command runs on a
    /// supervisor task. The only blocking work is a stat of the deployment
    /// directory and, for redeploy, creating it under the local deploy root.
    pub fn submit(&self, request: SubmitRequest) -> Result<JobId, SubmitError> {
        let name = ProjectName::parse(request.project)?;
        let service = request.service.map(ServiceName::parse).transpose()?;

        let project = self
            .shared
            .catalog
            .resolve(&name)
            .map_err(|_| SubmitError::ProjectNotFound(name.to_string()))?;
        let plan = build_plan(
            request.command,
            service.as_ref(),
            &project,
            &self.shared.config.toolchain,
            is_checkout(&project.path),
        )?;
        if !project.path.is_dir() {
            if !request.command.creates_project_dir() {
                return Err(SubmitError::ProjectNotFound(name.to_string()));
            }
            std::fs::create_dir_all(&project.path)
                .map_err(|source| SubmitError::ProjectDir { path: project.path.clone(), source })?;
        }

        let (job, cancel) = {
            let mut state = self.shared.state.lock();
            if state.shutting_down {
                return Err(SubmitError::ShuttingDown);
            }
            if let Some(holder) = state.locks.get(&project.path) {
                let held = state.jobs.get(holder).is_some_and(|e| !e.job.is_terminal());
                if held {
                    tracing::info!(project = %name, holder = %holder, command = %request.command, "project busy");
                    return Err(SubmitError::Busy { project: name, holder: holder.clone() });
                }
            }

            let id = JobId::new();
            let job = Job::new(
                id.clone(),
                name,
                project.path.clone(),
                request.command,
                service,
                self.shared.clock.epoch_ms(),
            );
            let cancel = CancellationToken::new();
            state.locks.insert(project.path.clone(), id.clone());
            state.jobs.insert(id.clone(), JobEntry { job: job.clone(), cancel: cancel.clone() });
            self.shared.broadcaster.open(&id);
            (job, cancel)
        };

        tracing::info!(
            job_id = %job.id,
            project = %job.project,
            command = %job.command,
            service = ?job.service.as_ref().map(ServiceName::as_str),
            "job submitted",
        );
        self.shared.emit(&job);

        let id = job.id.clone();
        tokio::spawn(supervise(Arc::clone(&self.shared), job.id, plan, project.path, cancel));
        Ok(id)
    }

    /// Request cancellation. The supervisor resolves the job to `Cancelled`.
    pub fn cancel(&self, id: &JobId) -> Result<JobState, CancelError> {
        let state = self.shared.state.lock();
        let entry = state.jobs.get(id).ok_or_else(|| CancelError::NotFound(id.clone()))?;
        if entry.job.is_terminal() {
            return Err(CancelError::AlreadyFinished { id: id.clone(), state: entry.job.state });
        }
        tracing::info!(job_id = %id, state = %entry.job.state, "cancelling job");
        entry.cancel.cancel();
        Ok(entry.job.state)
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.shared.state.lock().jobs.get(id).map(|e| e.job.clone())
    }

    /// Known jobs, newest first, optionally for one project.
    pub fn list(&self, project: Option<&ProjectName>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .shared
            .state
            .lock()
            .jobs
            .values()
            .filter(|e| project.map_or(true, |p| &e.job.project == p))
            .map(|e| e.job.clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms).then_with(|| b.id.cmp(&a.id)));
        jobs
    }

    /// The non-terminal job currently holding `project`'s lock.
    pub fn holder(&self, project: &ProjectName) -> Option<JobId> {
        let state = self.shared.state.lock();
        state
            .locks
            .values()
            .find(|id| state.jobs.get(*id).is_some_and(|e| &e.job.project == project && !e.job.is_terminal()))
            .cloned()
    }

    pub fn attach(&self, id: &JobId, from_seq: u64) -> Result<Subscription, AttachError> {
        self.shared.broadcaster.attach(id, from_seq)
    }

    /// Job state transitions. Slow receivers miss events rather than block.
    pub fn subscribe_events(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active_count()
    }

    /// Refuse new work, cancel everything running, and wait up to `timeout`.
    ///
    /// Returns whether every job reached a terminal state in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let active = {
            let mut state = self.shared.state.lock();
            state.shutting_down = true;
            for entry in state.jobs.values().filter(|e| !e.job.is_terminal()) {
                entry.cancel.cancel();
            }
            state.active_count()
        };
        tracing::info!(active, "draining jobs");

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.idle.notified();
            if self.active_count() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let remaining = self.active_count();
                tracing::warn!(remaining, "drain timed out");
                return remaining == 0;
            }
        }
    }

    /// Discard expired transcripts of finished jobs.
    pub fn prune(&self, now_ms: u64) -> usize {
        self.shared.broadcaster.prune_expired(now_ms)
    }
}

async fn supervise<C: Clock>(
    shared: Arc<Shared<C>>,
    id: JobId,
    plan: CommandPlan,
    cwd: PathBuf,
    cancel: CancellationToken,
) {
    let mut guard = SupervisorGuard { shared: Arc::clone(&shared), id: id.clone(), outcome: None };
    let outcome = shared.runner.run(&id, &plan, &cwd, &cancel, || shared.mark_running(&id)).await;
    guard.outcome = Some(outcome);
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
