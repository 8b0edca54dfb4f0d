// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job output fan-out with bounded transcripts and replay.
//!
//! One producer per job publishes chunks; each viewer holds a
//! [`Subscription`] fed through its own bounded queue. Publishing never waits
//! on a viewer: a viewer whose queue is full is disconnected and told where
//! to resume. Attaching snapshots the transcript and registers the live
//! sender under the same lock, so replay and live delivery meet without a
//! gap or a duplicate.

use berth_core::{Clock, JobId, JobOutcome, OutputChunk, StreamEvent, StreamTag};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Bounds on one job's retained output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptLimits {
    pub max_chunks: usize,
    pub max_bytes: usize,
    /// How long a finished transcript stays attachable.
    pub retention: Duration,
}

impl Default for TranscriptLimits {
    fn default() -> Self {
        Self { max_chunks: 10_000, max_bytes: 16 * 1024 * 1024, retention: Duration::from_secs(600) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("no output stream for job {0}")]
    NotFound(JobId),
}

struct JobStream {
    transcript: VecDeque<Arc<OutputChunk>>,
    bytes: usize,
    next_seq: u64,
    subscribers: Vec<mpsc::Sender<StreamEvent>>,
    outcome: Option<JobOutcome>,
    finished_at_ms: Option<u64>,
}

impl JobStream {
    fn new() -> Self {
        Self {
            transcript: VecDeque::new(),
            bytes: 0,
            next_seq: 1,
            subscribers: Vec::new(),
            outcome: None,
            finished_at_ms: None,
        }
    }

    /// Oldest sequence number still replayable.
    fn oldest_seq(&self) -> u64 {
        self.transcript.front().map_or(self.next_seq, |c| c.seq)
    }

    fn retain(&mut self, chunk: Arc<OutputChunk>, limits: &TranscriptLimits) {
        self.bytes += chunk.weight();
        self.transcript.push_back(chunk);
        while self.transcript.len() > 1
            && (self.transcript.len() > limits.max_chunks || self.bytes > limits.max_bytes)
        {
            if let Some(evicted) = self.transcript.pop_front() {
                self.bytes = self.bytes.saturating_sub(evicted.weight());
            }
        }
    }
}

/// Registry of job output streams.
pub struct OutputBroadcaster<C: Clock> {
    streams: Mutex<HashMap<JobId, Arc<Mutex<JobStream>>>>,
    limits: TranscriptLimits,
    queue_capacity: usize,
    clock: C,
}

impl<C: Clock> OutputBroadcaster<C> {
    pub fn new(limits: TranscriptLimits, queue_capacity: usize, clock: C) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            limits: TranscriptLimits { max_chunks: limits.max_chunks.max(1), ..limits },
            queue_capacity: queue_capacity.max(1),
            clock,
        }
    }

    fn stream(&self, job: &JobId) -> Option<Arc<Mutex<JobStream>>> {
        self.streams.lock().get(job).cloned()
    }

    /// Register a stream for `job`. Reopening an existing stream is a no-op.
    pub fn open(&self, job: &JobId) {
        self.streams.lock().entry(job.clone()).or_insert_with(|| Arc::new(Mutex::new(JobStream::new())));
    }

    /// Append a line and offer it to every live subscriber.
    ///
    /// Returns the assigned sequence number, or `None` when the stream is
    /// unknown or already finished.
    pub fn publish(&self, job: &JobId, stream: StreamTag, text: impl Into<String>) -> Option<u64> {
        let handle = self.stream(job)?;
        let mut s = handle.lock();
        if s.outcome.is_some() {
            return None;
        }

        let seq = s.next_seq;
        s.next_seq += 1;
        let chunk = Arc::new(OutputChunk { seq, stream, ts_ms: self.clock.epoch_ms(), text: text.into() });
        s.retain(Arc::clone(&chunk), &self.limits);

        s.subscribers.retain(|tx| match tx.try_send(StreamEvent::Chunk(Arc::clone(&chunk))) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(job_id = %job, seq, "subscriber lagged, closing subscription");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        Some(seq)
    }

    /// End the stream with `outcome` and release every live sender.
    ///
    /// A subscriber whose queue cannot take the final event is closed; it
    /// receives `Lagged` and sees the outcome on reattach.
    pub fn finish(&self, job: &JobId, outcome: &JobOutcome) {
        let Some(handle) = self.stream(job) else {
            return;
        };
        let mut s = handle.lock();
        if s.outcome.is_some() {
            return;
        }
        s.outcome = Some(outcome.clone());
        s.finished_at_ms = Some(self.clock.epoch_ms());
        for tx in s.subscribers.drain(..) {
            let _ = tx.try_send(StreamEvent::Finished(outcome.clone()));
        }
    }

    /// Subscribe to `job` starting at sequence `from_seq` (0 or 1 = everything).
    pub fn attach(&self, job: &JobId, from_seq: u64) -> Result<Subscription, AttachError> {
        let handle = self.stream(job).ok_or_else(|| AttachError::NotFound(job.clone()))?;
        let mut s = handle.lock();

        let first = from_seq.max(1);
        let mut replay = VecDeque::new();
        let oldest = s.oldest_seq();
        if first < oldest {
            replay.push_back(StreamEvent::Skipped { from: first, to: oldest - 1 });
        }
        replay.extend(
            s.transcript.iter().filter(|c| c.seq >= first).map(|c| StreamEvent::Chunk(Arc::clone(c))),
        );

        let rx = match &s.outcome {
            Some(outcome) => {
                replay.push_back(StreamEvent::Finished(outcome.clone()));
                None
            }
            None => {
                let (tx, rx) = mpsc::channel(self.queue_capacity);
                s.subscribers.push(tx);
                Some(rx)
            }
        };

        Ok(Subscription { job: job.clone(), replay, rx, next_seq: first, done: false })
    }

    /// Drop finished transcripts older than the retention window.
    pub fn prune_expired(&self, now_ms: u64) -> usize {
        let retention_ms = self.limits.retention.as_millis() as u64;
        let mut streams = self.streams.lock();
        let before = streams.len();
        streams.retain(|job, handle| {
            let expired = handle
                .lock()
                .finished_at_ms
                .is_some_and(|at| now_ms.saturating_sub(at) >= retention_ms);
            if expired {
                tracing::debug!(job_id = %job, "pruned finished transcript");
            }
            !expired
        });
        before - streams.len()
    }

    /// Highest sequence number published so far (0 when none).
    #[cfg(test)]
    pub fn last_seq(&self, job: &JobId) -> Option<u64> {
        self.stream(job).map(|h| h.lock().next_seq - 1)
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, job: &JobId) -> usize {
        self.stream(job).map_or(0, |h| h.lock().subscribers.len())
    }

    #[cfg(test)]
    pub fn contains(&self, job: &JobId) -> bool {
        self.streams.lock().contains_key(job)
    }
}

/// A live viewer's handle on one job stream.
///
/// Yields replayed events first, then live ones, and ends after a final
/// event (`Finished` or `Lagged`). Dropping it detaches the viewer.
pub struct Subscription {
    job: JobId,
    replay: VecDeque<StreamEvent>,
    rx: Option<mpsc::Receiver<StreamEvent>>,
    /// Next sequence number this viewer expects.
    next_seq: u64,
    done: bool,
}

impl Subscription {
    pub fn job(&self) -> &JobId {
        &self.job
    }

    /// Sequence number to resume from after this subscription ends.
    pub fn resume_from(&self) -> u64 {
        self.next_seq
    }

    pub async fn next(&mut self) -> Option<StreamEvent> {
        loop {
            let event = match self.replay.pop_front() {
                Some(event) => event,
                None => {
                    if self.done {
                        return None;
                    }
                    let received = match self.rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => None,
                    };
                    match received {
                        Some(event) => event,
                        // Sender dropped without a final event: closed for lag.
                        None => StreamEvent::Lagged { resume_from: self.next_seq },
                    }
                }
            };

            match &event {
                StreamEvent::Chunk(chunk) => {
                    if chunk.seq < self.next_seq {
                        continue;
                    }
                    self.next_seq = chunk.seq + 1;
                }
                StreamEvent::Skipped { to, .. } => self.next_seq = to + 1,
                StreamEvent::Finished(_) | StreamEvent::Lagged { .. } => {
                    self.done = true;
                    self.rx = None;
                }
            }
            return Some(event);
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
