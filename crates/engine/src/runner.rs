// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs a command plan as host processes and streams their output.

use crate::broadcast::OutputBroadcaster;
use crate::command::{CommandPlan, Invocation};
use berth_core::{Clock, FailureKind, JobId, JobOutcome, StreamTag};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stderr fragments that mean the container engine itself is unreachable.
pub const ENGINE_UNREACHABLE: &[&str] =
    &["Cannot connect to the Docker daemon", "Is the docker daemon running", "error during connect"];

/// How long to wait for output pipes to drain after the process exits.
/// Background grandchildren can hold them open indefinitely.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest chunk published from one pipe read. Longer lines are split so a
/// single chunk always fits in one attach frame.
pub const MAX_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// SIGTERM to SIGKILL grace on cancellation
    pub grace: Duration,
    /// Stderr lines kept for the outcome
    pub stderr_tail: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { grace: Duration::from_secs(10), stderr_tail: 20 }
    }
}

/// Stderr bookkeeping shared with the reader task.
#[derive(Default)]
struct StderrState {
    tail: VecDeque<String>,
    unreachable: Option<String>,
}

/// Map a spawn error to a failure kind.
///
/// A missing or non-executable program means the toolchain is unavailable.
pub fn classify_spawn_error(program: &Path, err: &io::Error) -> FailureKind {
    let message = format!("failed to start {}: {err}", program.display());
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            FailureKind::Infrastructure { message }
        }
        _ => FailureKind::Spawn { message },
    }
}

/// Exit code with the shell convention for signals (`128 + signal`).
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().or_else(|| status.signal().map(|sig| 128 + sig)).unwrap_or(-1)
}

/// Spawns plan steps in sequence and publishes their output.
pub struct CommandRunner<C: Clock> {
    broadcaster: Arc<OutputBroadcaster<C>>,
    config: RunnerConfig,
}

impl<C: Clock> Clone for CommandRunner<C> {
    fn clone(&self) -> Self {
        Self { broadcaster: Arc::clone(&self.broadcaster), config: self.config }
    }
}

enum StepResult {
    Exited(i32),
    Cancelled(Option<i32>),
    SpawnFailed(FailureKind),
}

impl<C: Clock> CommandRunner<C> {
    pub fn new(broadcaster: Arc<OutputBroadcaster<C>>, config: RunnerConfig) -> Self {
        Self { broadcaster, config }
    }

    /// Run every step of `plan` in `cwd`.
    ///
    /// `on_start` fires once, right after the first process spawns. The
    /// returned outcome is always terminal; cancellation before the first
    /// spawn yields `Cancelled` without running anything.
    pub async fn run(
        &self,
        job: &JobId,
        plan: &CommandPlan,
        cwd: &Path,
        cancel: &CancellationToken,
        on_start: impl FnOnce(),
    ) -> JobOutcome {
        let mut on_start = Some(on_start);
        let stderr = Arc::new(Mutex::new(StderrState::default()));

        for (index, step) in plan.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return JobOutcome::cancelled(None);
            }
            self.broadcaster.publish(job, StreamTag::Sys, format!("$ {step}"));
            tracing::info!(job_id = %job, step = index + 1, command = %step, "running step");

            let result = self.run_step(job, step, cwd, cancel, &stderr, &mut on_start).await;
            let tail = || stderr.lock().tail.iter().cloned().collect::<Vec<_>>();
            match result {
                StepResult::Exited(0) => continue,
                StepResult::Exited(code) => {
                    let unreachable = stderr.lock().unreachable.clone();
                    let failure = match unreachable {
                        Some(message) => FailureKind::Infrastructure { message },
                        None => FailureKind::Process { exit_code: code },
                    };
                    tracing::info!(job_id = %job, exit_code = code, "step failed");
                    return JobOutcome::failed(failure, Some(code), tail());
                }
                StepResult::Cancelled(code) => {
                    tracing::info!(job_id = %job, exit_code = ?code, "step cancelled");
                    return JobOutcome::cancelled(code);
                }
                StepResult::SpawnFailed(failure) => {
                    if let FailureKind::Infrastructure { message } | FailureKind::Spawn { message } =
                        &failure
                    {
                        self.broadcaster.publish(job, StreamTag::Sys, message.clone());
                    }
                    tracing::warn!(job_id = %job, %failure, "step could not start");
                    return JobOutcome::failed(failure, None, tail());
                }
            }
        }
        JobOutcome::succeeded()
    }

    async fn run_step(
        &self,
        job: &JobId,
        step: &Invocation,
        cwd: &Path,
        cancel: &CancellationToken,
        stderr: &Arc<Mutex<StderrState>>,
        on_start: &mut Option<impl FnOnce()>,
    ) -> StepResult {
        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                // A missing cwd surfaces as NotFound too; it is not the toolchain.
                if !cwd.is_dir() {
                    return StepResult::SpawnFailed(FailureKind::Spawn {
                        message: format!("working directory {} is missing: {e}", cwd.display()),
                    });
                }
                return StepResult::SpawnFailed(classify_spawn_error(&step.program, &e));
            }
        };
        if let Some(f) = on_start.take() {
            f();
        }

        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(self.spawn_reader(job, out, StreamTag::Out, None));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(self.spawn_reader(
                job,
                err,
                StreamTag::Err,
                Some((Arc::clone(stderr), self.config.stderr_tail)),
            ));
        }

        let result = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => StepResult::Exited(exit_code(status)),
                Err(e) => {
                    tracing::error!(job_id = %job, error = %e, "failed to wait for process");
                    StepResult::Exited(-1)
                }
            },
            _ = cancel.cancelled() => {
                let status = terminate(&mut child, self.config.grace).await;
                StepResult::Cancelled(status.ok().map(exit_code))
            }
        };

        for reader in readers {
            let abort = reader.abort_handle();
            if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, reader).await.is_err() {
                tracing::debug!(job_id = %job, "output pipe still open after exit, detaching");
                abort.abort();
            }
        }
        result
    }

    fn spawn_reader<R>(
        &self,
        job: &JobId,
        pipe: R,
        tag: StreamTag,
        stderr: Option<(Arc<Mutex<StderrState>>, usize)>,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let broadcaster = Arc::clone(&self.broadcaster);
        let job = job.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(pipe);
            // Bytes of a multibyte character cut off at the chunk boundary
            let mut carry = Vec::new();
            loop {
                let mut buf = std::mem::take(&mut carry);
                let room = (MAX_CHUNK_BYTES - buf.len()) as u64;
                let read = match (&mut reader).take(room).read_until(b'\n', &mut buf).await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(job_id = %job, stream = %tag, error = %e, "output read failed");
                        break;
                    }
                };
                if read == 0 && buf.is_empty() {
                    break;
                }
                if read > 0 && buf.last() != Some(&b'\n') {
                    carry = split_incomplete_char(&mut buf);
                    if buf.is_empty() {
                        continue;
                    }
                }
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();

                if let Some((state, limit)) = &stderr {
                    let mut state = state.lock();
                    if state.unreachable.is_none()
                        && ENGINE_UNREACHABLE.iter().any(|m| line.contains(m))
                    {
                        state.unreachable = Some(line.clone());
                    }
                    state.tail.push_back(line.clone());
                    while state.tail.len() > *limit {
                        state.tail.pop_front();
                    }
                }
                broadcaster.publish(&job, tag, line);
            }
        })
    }
}

/// Split off a trailing partial UTF-8 sequence so it can start the next chunk.
fn split_incomplete_char(buf: &mut Vec<u8>) -> Vec<u8> {
    match std::str::from_utf8(buf) {
        Err(e) if e.error_len().is_none() => buf.split_off(e.valid_up_to()),
        _ => Vec::new(),
    }
}

/// SIGTERM the process group, then SIGKILL after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        let pgid = Pid::from_raw(pid as i32);
        let _ = killpg(pgid, Signal::SIGTERM);
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => {
                // Leader is gone; take any stragglers in its group with it.
                let _ = killpg(pgid, Signal::SIGKILL);
                return status;
            }
            Err(_) => {
                tracing::warn!(pid, "process ignored SIGTERM, sending SIGKILL");
                let _ = killpg(pgid, Signal::SIGKILL);
            }
        }
    }
    let _ = child.start_kill();
    child.wait().await
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
