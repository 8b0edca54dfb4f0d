// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host telemetry samples and sampler health.

use serde::{Deserialize, Serialize};

/// One timestamped reading of host resource utilization.
///
/// Network rates are bytes per second since the previous reading; `None`
/// when no valid previous reading exists (first sample, counter reset).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub ts_ms: u64,
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub disk_pct: f64,
    pub net_rx_rate: Option<f64>,
    pub net_tx_rate: Option<f64>,
}

crate::builder! {
    pub struct MetricSampleBuilder => MetricSample {
        set {
            ts_ms: u64 = 1_000_000,
            cpu_pct: f64 = 10.0,
            mem_pct: f64 = 20.0,
            disk_pct: f64 = 30.0,
            net_rx_rate: Option<f64> = None,
            net_tx_rate: Option<f64> = None,
        }
    }
}

/// Sampler health exposed to status queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerHealth {
    /// Epoch ms of the last successful sample.
    pub last_sample_ms: Option<u64>,
    pub samples: u64,
    /// Ticks skipped because a reading failed.
    pub skipped: u64,
    pub last_error: Option<String>,
}
