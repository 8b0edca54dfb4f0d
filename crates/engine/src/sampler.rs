// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic host telemetry collection.
//!
//! Runs on its own task for the daemon's lifetime, independent of job
//! activity. A failed reading skips that tick; the timer keeps going.

use berth_adapters::{HostProbe, HostReading};
use berth_core::{Clock, MetricSample, SamplerHealth};
use berth_storage::MetricsStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default sampling interval (5 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Bytes per second between two cumulative counter readings.
///
/// `None` when no time has passed or the counter went backwards.
pub fn byte_rate(previous: u64, current: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 || current < previous {
        return None;
    }
    Some((current - previous) as f64 / secs)
}

struct Baseline {
    at: Instant,
    rx: u64,
    tx: u64,
}

pub struct MetricsSampler<P: HostProbe, C: Clock> {
    probe: P,
    store: Arc<MetricsStore>,
    clock: C,
    baseline: Option<Baseline>,
    health: Arc<Mutex<SamplerHealth>>,
}

impl<P: HostProbe, C: Clock> MetricsSampler<P, C> {
    pub fn new(probe: P, store: Arc<MetricsStore>, clock: C) -> Self {
        Self { probe, store, clock, baseline: None, health: Arc::new(Mutex::new(SamplerHealth::default())) }
    }

    /// Shared health for status queries.
    pub fn health(&self) -> Arc<Mutex<SamplerHealth>> {
        Arc::clone(&self.health)
    }

    /// Take one reading and record it. Returns the sample, if one was produced.
    pub fn tick(&mut self) -> Option<MetricSample> {
        let reading = match self.probe.read() {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!(error = %e, "metrics reading failed, skipping sample");
                let mut health = self.health.lock();
                health.skipped += 1;
                health.last_error = Some(e.to_string());
                return None;
            }
        };

        let sample = self.sample_from(reading);
        if let Err(e) = self.store.record(sample) {
            tracing::warn!(error = %e, "failed to persist metrics sample");
            self.health.lock().last_error = Some(e.to_string());
        }

        let mut health = self.health.lock();
        health.samples += 1;
        health.last_sample_ms = Some(sample.ts_ms);
        Some(sample)
    }

    fn sample_from(&mut self, reading: HostReading) -> MetricSample {
        let now = self.clock.now();
        let (net_rx_rate, net_tx_rate) = match &self.baseline {
            Some(prev) => {
                let elapsed = now.saturating_duration_since(prev.at);
                (
                    byte_rate(prev.rx, reading.net_rx_bytes, elapsed),
                    byte_rate(prev.tx, reading.net_tx_bytes, elapsed),
                )
            }
            None => (None, None),
        };
        self.baseline = Some(Baseline { at: now, rx: reading.net_rx_bytes, tx: reading.net_tx_bytes });

        MetricSample {
            ts_ms: self.clock.epoch_ms(),
            cpu_pct: reading.cpu_pct,
            mem_pct: reading.mem_pct,
            disk_pct: reading.disk_pct,
            net_rx_rate,
            net_tx_rate,
        }
    }

    /// Run [`tick`](Self::tick) every `interval` until `shutdown` fires.
    ///
    /// The first tick runs immediately. Late ticks are delayed rather than
    /// bunched up. Each tick runs on the blocking pool, since the host read
    /// and the synced append both block.
    pub fn spawn(self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut sampler = self;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_ms = interval.as_millis() as u64, "metrics sampler started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let tick = tokio::task::spawn_blocking(move || {
                    sampler.tick();
                    sampler
                });
                match tick.await {
                    Ok(returned) => sampler = returned,
                    Err(e) => {
                        tracing::error!(error = %e, "metrics tick panicked, sampler stopped");
                        break;
                    }
                }
            }
            tracing::info!("metrics sampler stopped");
        })
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
