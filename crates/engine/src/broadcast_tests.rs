// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use berth_core::FakeClock;
use proptest::prelude::*;

fn job(id: &str) -> JobId {
    JobId::from_string(id)
}

fn broadcaster(max_chunks: usize, queue: usize) -> (OutputBroadcaster<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let limits = TranscriptLimits { max_chunks, ..TranscriptLimits::default() };
    (OutputBroadcaster::new(limits, queue, clock.clone()), clock)
}

/// Drain a subscription until its final event.
async fn collect(sub: &mut Subscription) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = sub.next().await {
        events.push(event);
    }
    events
}

fn chunk_seqs(events: &[StreamEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk(c) => Some(c.seq),
            _ => None,
        })
        .collect()
}

#[test]
fn publish_assigns_sequence_from_one() {
    let (b, _) = broadcaster(100, 16);
    let id = job("job-1");
    b.open(&id);

    assert_eq!(b.publish(&id, StreamTag::Out, "a"), Some(1));
    assert_eq!(b.publish(&id, StreamTag::Err, "b"), Some(2));
    assert_eq!(b.last_seq(&id), Some(2));
}

#[test]
fn publish_to_unknown_or_finished_stream_is_ignored() {
    let (b, _) = broadcaster(100, 16);
    let id = job("job-1");
    assert_eq!(b.publish(&id, StreamTag::Out, "a"), None);

    b.open(&id);
    b.finish(&id, &JobOutcome::succeeded());
    assert_eq!(b.publish(&id, StreamTag::Out, "late"), None);
}

#[tokio::test]
async fn attach_mid_stream_has_no_gap_or_duplicate() {
    let (b, _) = broadcaster(100, 16);
    let id = job("job-1");
    b.open(&id);
    for line in ["1", "2", "3"] {
        b.publish(&id, StreamTag::Out, line);
    }

    let mut sub = b.attach(&id, 2).unwrap();
    b.publish(&id, StreamTag::Out, "4");
    b.publish(&id, StreamTag::Err, "5");
    b.finish(&id, &JobOutcome::succeeded());

    let events = collect(&mut sub).await;
    assert_eq!(chunk_seqs(&events), vec![2, 3, 4, 5]);
    assert_eq!(events.last(), Some(&StreamEvent::Finished(JobOutcome::succeeded())));
}

#[tokio::test]
async fn attach_to_evicted_range_reports_skip_first() {
    let (b, _) = broadcaster(3, 16);
    let id = job("job-1");
    b.open(&id);
    for i in 1..=5 {
        b.publish(&id, StreamTag::Out, i.to_string());
    }
    b.finish(&id, &JobOutcome::succeeded());

    let events = collect(&mut b.attach(&id, 0).unwrap()).await;
    assert_eq!(events[0], StreamEvent::Skipped { from: 1, to: 2 });
    assert_eq!(chunk_seqs(&events), vec![3, 4, 5]);
}

#[tokio::test]
async fn attach_after_finish_replays_and_ends() {
    let (b, _) = broadcaster(100, 16);
    let id = job("job-1");
    b.open(&id);
    b.publish(&id, StreamTag::Out, "only");
    let outcome = JobOutcome::failed(
        berth_core::FailureKind::Process { exit_code: 2 },
        Some(2),
        vec!["bad".into()],
    );
    b.finish(&id, &outcome);

    let events = collect(&mut b.attach(&id, 1).unwrap()).await;
    assert_eq!(chunk_seqs(&events), vec![1]);
    assert_eq!(events.last(), Some(&StreamEvent::Finished(outcome)));
    assert_eq!(b.subscriber_count(&id), 0);
}

#[tokio::test]
async fn slow_subscriber_is_closed_and_can_resume() {
    let (b, _) = broadcaster(100, 2);
    let id = job("job-1");
    b.open(&id);
    let mut slow = b.attach(&id, 0).unwrap();
    let mut fast = b.attach(&id, 0).unwrap();

    let mut fast_seen = Vec::new();
    for i in 1..=5 {
        b.publish(&id, StreamTag::Out, i.to_string());
        if let Some(StreamEvent::Chunk(c)) = fast.next().await {
            fast_seen.push(c.seq);
        }
    }
    assert_eq!(fast_seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(b.subscriber_count(&id), 1);

    let drained = collect(&mut slow).await;
    assert_eq!(chunk_seqs(&drained), vec![1, 2]);
    assert_eq!(drained.last(), Some(&StreamEvent::Lagged { resume_from: 3 }));

    let mut resumed = b.attach(&id, slow.resume_from()).unwrap();
    b.finish(&id, &JobOutcome::succeeded());
    assert_eq!(chunk_seqs(&collect(&mut resumed).await), vec![3, 4, 5]);
}

#[tokio::test]
async fn dropped_subscription_is_released_on_next_publish() {
    let (b, _) = broadcaster(100, 16);
    let id = job("job-1");
    b.open(&id);
    let sub = b.attach(&id, 0).unwrap();
    assert_eq!(b.subscriber_count(&id), 1);

    drop(sub);
    b.publish(&id, StreamTag::Out, "x");
    assert_eq!(b.subscriber_count(&id), 0);
}

#[test]
fn attach_unknown_job_is_not_found() {
    let (b, _) = broadcaster(100, 16);
    assert!(matches!(b.attach(&job("job-missing"), 0), Err(AttachError::NotFound(_))));
}

#[test]
fn byte_budget_evicts_oldest() {
    let clock = FakeClock::new();
    let one = OutputChunk { seq: 1, stream: StreamTag::Out, ts_ms: 0, text: "x".repeat(100) }.weight();
    let limits = TranscriptLimits { max_chunks: 100, max_bytes: one * 2, ..TranscriptLimits::default() };
    let b = OutputBroadcaster::new(limits, 16, clock);
    let id = job("job-1");
    b.open(&id);
    for _ in 0..4 {
        b.publish(&id, StreamTag::Out, "x".repeat(100));
    }
    let stream = b.stream(&id).unwrap();
    let s = stream.lock();
    assert_eq!(s.transcript.len(), 2);
    assert_eq!(s.oldest_seq(), 3);
}

#[test]
fn prune_removes_only_expired_finished_streams() {
    let (b, clock) = broadcaster(100, 16);
    let (done, running) = (job("job-done"), job("job-running"));
    b.open(&done);
    b.open(&running);
    b.finish(&done, &JobOutcome::succeeded());

    assert_eq!(b.prune_expired(clock.epoch_ms() + 1_000), 0);

    clock.advance(Duration::from_secs(601));
    assert_eq!(b.prune_expired(clock.epoch_ms()), 1);
    assert!(!b.contains(&done));
    assert!(b.contains(&running));
}

proptest! {
    #[test]
    fn subscriber_sees_strictly_increasing_contiguous_seqs(
        total in 1usize..60,
        attach_at in 0usize..60,
        from in 0u64..70,
        max_chunks in 1usize..40,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let (b, _) = broadcaster(max_chunks, 128);
            let id = job("job-p");
            b.open(&id);
            let mut sub = None;
            for i in 0..total {
                if i == attach_at.min(total - 1) {
                    sub = Some(b.attach(&id, from).unwrap());
                }
                b.publish(&id, StreamTag::Out, i.to_string());
            }
            b.finish(&id, &JobOutcome::succeeded());

            let mut sub = sub.unwrap();
            let events = collect(&mut sub).await;
            let seqs = chunk_seqs(&events);
            let first = from.max(1);
            if let Some(&head) = seqs.first() {
                prop_assert!(head >= first);
            }
            for pair in seqs.windows(2) {
                prop_assert_eq!(pair[1], pair[0] + 1);
            }
            if first <= total as u64 {
                prop_assert_eq!(seqs.last().copied(), Some(total as u64));
            }
            prop_assert!(matches!(events.last(), Some(StreamEvent::Finished(_))));
            Ok(())
        })?;
    }
}
