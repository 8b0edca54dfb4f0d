// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::broadcast::TranscriptLimits;
use berth_core::{FakeClock, JobState, StreamEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

fn sh(script: &str) -> Invocation {
    Invocation { program: PathBuf::from("/bin/sh"), args: vec!["-c".into(), script.into()] }
}

fn plan(steps: Vec<Invocation>) -> CommandPlan {
    CommandPlan { steps }
}

struct Harness {
    runner: CommandRunner<FakeClock>,
    broadcaster: Arc<OutputBroadcaster<FakeClock>>,
    job: JobId,
    dir: tempfile::TempDir,
}

fn harness(config: RunnerConfig) -> Harness {
    harness_with_limits(TranscriptLimits::default(), config)
}

fn harness_with_limits(limits: TranscriptLimits, config: RunnerConfig) -> Harness {
    let broadcaster = Arc::new(OutputBroadcaster::new(limits, 1024, FakeClock::new()));
    let job = JobId::from_string("job-test");
    broadcaster.open(&job);
    Harness {
        runner: CommandRunner::new(Arc::clone(&broadcaster), config),
        broadcaster,
        job,
        dir: tempfile::tempdir().unwrap(),
    }
}

impl Harness {
    async fn run(&self, plan: &CommandPlan) -> JobOutcome {
        self.runner.run(&self.job, plan, self.dir.path(), &CancellationToken::new(), || {}).await
    }

    /// Transcript as `(tag, text)` pairs.
    async fn transcript(&self) -> Vec<(StreamTag, String)> {
        self.broadcaster.finish(&self.job, &JobOutcome::succeeded());
        let mut sub = self.broadcaster.attach(&self.job, 0).unwrap();
        let mut lines = Vec::new();
        while let Some(event) = sub.next().await {
            if let StreamEvent::Chunk(c) = event {
                lines.push((c.stream, c.text.clone()));
            }
        }
        lines
    }
}

#[tokio::test]
async fn streams_banner_stdout_and_stderr() {
    let h = harness(RunnerConfig::default());
    let outcome = h.run(&plan(vec![sh("echo hello; echo oops >&2")])).await;

    assert_eq!(outcome, JobOutcome::succeeded());
    let lines = h.transcript().await;
    assert_eq!(lines[0].0, StreamTag::Sys);
    assert!(lines[0].1.starts_with("$ sh -c"));
    assert!(lines.contains(&(StreamTag::Out, "hello".into())));
    assert!(lines.contains(&(StreamTag::Err, "oops".into())));
}

#[tokio::test]
async fn preserves_per_stream_order() {
    let h = harness(RunnerConfig::default());
    h.run(&plan(vec![sh("for i in 1 2 3 4 5 6 7 8 9 10; do echo $i; done")])).await;

    let out: Vec<String> = h
        .transcript()
        .await
        .into_iter()
        .filter(|(tag, _)| *tag == StreamTag::Out)
        .map(|(_, text)| text)
        .collect();
    assert_eq!(out, (1..=10).map(|i| i.to_string()).collect::<Vec<_>>());
}

#[tokio::test]
async fn exit_code_is_reported_verbatim() {
    let h = harness(RunnerConfig::default());
    let outcome = h.run(&plan(vec![sh("echo failing >&2; exit 7")])).await;

    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(outcome.exit_code, Some(7));
    assert_eq!(outcome.failure, Some(FailureKind::Process { exit_code: 7 }));
    assert_eq!(outcome.stderr_tail, vec!["failing".to_string()]);
}

#[tokio::test]
async fn signal_termination_uses_shell_convention() {
    let h = harness(RunnerConfig::default());
    let outcome = h.run(&plan(vec![sh("kill -9 $$")])).await;
    assert_eq!(outcome.exit_code, Some(137));
}

#[tokio::test]
async fn invalid_utf8_is_replaced() {
    let h = harness(RunnerConfig::default());
    h.run(&plan(vec![sh(r"printf 'ok\377\n'")])).await;

    let lines = h.transcript().await;
    assert!(lines.contains(&(StreamTag::Out, "ok\u{fffd}".into())));
}

#[tokio::test]
async fn first_failing_step_ends_the_plan() {
    let h = harness(RunnerConfig::default());
    let outcome = h
        .run(&plan(vec![sh("echo one"), sh("echo two; exit 3"), sh("echo three")]))
        .await;

    assert_eq!(outcome.exit_code, Some(3));
    let lines = h.transcript().await;
    let out: Vec<&str> =
        lines.iter().filter(|(t, _)| *t == StreamTag::Out).map(|(_, s)| s.as_str()).collect();
    assert_eq!(out, vec!["one", "two"]);
    assert_eq!(lines.iter().filter(|(t, _)| *t == StreamTag::Sys).count(), 2);
}

#[tokio::test]
async fn missing_program_is_infrastructure_failure() {
    let h = harness(RunnerConfig::default());
    let started = AtomicUsize::new(0);
    let step = Invocation { program: PathBuf::from("/nonexistent/docker"), args: vec!["ps".into()] };

    let outcome = h
        .runner
        .run(&h.job, &plan(vec![step]), h.dir.path(), &CancellationToken::new(), || {
            started.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    assert_eq!(outcome.state, JobState::Failed);
    assert!(matches!(outcome.failure, Some(FailureKind::Infrastructure { .. })));
    assert_eq!(outcome.exit_code, None);
    assert_eq!(started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_working_directory_is_spawn_failure() {
    let h = harness(RunnerConfig::default());
    let missing = h.dir.path().join("gone");
    let outcome = h
        .runner
        .run(&h.job, &plan(vec![sh("true")]), &missing, &CancellationToken::new(), || {})
        .await;
    assert!(matches!(outcome.failure, Some(FailureKind::Spawn { .. })));
}

#[tokio::test]
async fn unreachable_engine_is_infrastructure_failure() {
    let h = harness(RunnerConfig::default());
    let outcome = h
        .run(&plan(vec![sh(
            "echo 'Cannot connect to the Docker daemon at unix:///var/run/docker.sock.' >&2; exit 1",
        )]))
        .await;

    assert_eq!(outcome.exit_code, Some(1));
    match outcome.failure {
        Some(FailureKind::Infrastructure { message }) => assert!(message.contains("Cannot connect")),
        other => panic!("expected infrastructure failure, got {other:?}"),
    }
}

#[tokio::test]
async fn stderr_tail_is_bounded() {
    let h = harness(RunnerConfig { stderr_tail: 3, ..RunnerConfig::default() });
    let outcome = h.run(&plan(vec![sh("for i in 1 2 3 4 5; do echo e$i >&2; done; exit 1")])).await;
    assert_eq!(outcome.stderr_tail, vec!["e3", "e4", "e5"]);
}

#[tokio::test]
async fn cancel_escalates_when_term_is_ignored() {
    let h = harness(RunnerConfig { grace: Duration::from_millis(300), ..RunnerConfig::default() });
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let begun = Instant::now();
    let outcome = h
        .runner
        .run(&h.job, &plan(vec![sh("trap '' TERM; echo ready; sleep 30")]), h.dir.path(), &cancel, || {})
        .await;

    assert_eq!(outcome.state, JobState::Cancelled);
    assert_eq!(outcome.exit_code, Some(137));
    assert!(begun.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancel_before_first_step_spawns_nothing() {
    let h = harness(RunnerConfig::default());
    let marker = h.dir.path().join("ran");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .runner
        .run(
            &h.job,
            &plan(vec![sh(&format!("touch {}", marker.display()))]),
            h.dir.path(),
            &cancel,
            || {},
        )
        .await;

    assert_eq!(outcome, JobOutcome::cancelled(None));
    assert!(!marker.exists());
}

#[test]
fn spawn_error_classification() {
    let program = Path::new("docker");
    let not_found = io::Error::from(io::ErrorKind::NotFound);
    let denied = io::Error::from(io::ErrorKind::PermissionDenied);
    let other = io::Error::other("boom");

    assert!(matches!(classify_spawn_error(program, &not_found), FailureKind::Infrastructure { .. }));
    assert!(matches!(classify_spawn_error(program, &denied), FailureKind::Infrastructure { .. }));
    assert!(matches!(classify_spawn_error(program, &other), FailureKind::Spawn { .. }));
}

#[tokio::test]
async fn banner_masks_clone_url_credentials() {
    let h = harness(RunnerConfig::default());
    let mut step = sh("true");
    step.args.push("https://ghp_SECRET@github.com/acme/demo.git".into());
    let outcome = h.run(&plan(vec![step])).await;

    assert_eq!(outcome, JobOutcome::succeeded());
    let lines = h.transcript().await;
    assert!(lines[0].1.contains("https://***@github.com/acme/demo.git"));
    assert!(lines.iter().all(|(_, text)| !text.contains("ghp_SECRET")));
}

#[tokio::test]
async fn long_lines_are_split_into_bounded_chunks() {
    let limits = TranscriptLimits {
        max_chunks: 100_000,
        max_bytes: 64 * 1024 * 1024,
        ..TranscriptLimits::default()
    };
    let h = harness_with_limits(limits, RunnerConfig::default());
    let outcome =
        h.run(&plan(vec![sh("head -c 20000000 /dev/zero | tr '\\0' a; echo")])).await;

    assert_eq!(outcome, JobOutcome::succeeded());
    let out: Vec<String> = h
        .transcript()
        .await
        .into_iter()
        .filter(|(tag, _)| *tag == StreamTag::Out)
        .map(|(_, text)| text)
        .collect();
    assert!(out.len() > 1);
    assert!(out.iter().all(|text| text.len() <= MAX_CHUNK_BYTES));
    assert_eq!(out.iter().map(String::len).sum::<usize>(), 20_000_000);
}

#[tokio::test]
async fn split_chunks_keep_multibyte_characters_whole() {
    let h = harness(RunnerConfig::default());
    // 'é' is two bytes; an odd prefix puts a boundary inside one
    let script = format!(
        "printf 'x'; head -c {MAX_CHUNK_BYTES} /dev/zero | tr '\\0' a | sed 's/a/é/g'; echo"
    );
    h.run(&plan(vec![sh(&script)])).await;

    let out: String = h
        .transcript()
        .await
        .into_iter()
        .filter(|(tag, _)| *tag == StreamTag::Out)
        .map(|(_, text)| text)
        .collect();
    assert!(!out.contains('\u{FFFD}'));
    assert_eq!(out.chars().filter(|c| *c == 'é').count(), MAX_CHUNK_BYTES);
}
