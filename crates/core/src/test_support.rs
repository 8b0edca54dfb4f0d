// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{CommandKind, Job, JobId, ProjectName};
use std::path::PathBuf;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core types.
pub mod strategies {
    use crate::job::JobState;
    use crate::metrics::MetricSample;
    use proptest::prelude::*;

    pub fn arb_job_state() -> impl Strategy<Value = JobState> {
        prop_oneof![
            Just(JobState::Pending),
            Just(JobState::Running),
            Just(JobState::Succeeded),
            Just(JobState::Failed),
            Just(JobState::Cancelled),
        ]
    }

    /// Samples with strictly increasing timestamps, 1 ms to 10 s apart.
    pub fn arb_sample_series(max_len: usize) -> impl Strategy<Value = Vec<MetricSample>> {
        prop::collection::vec((1u64..10_000, 0.0f64..100.0, proptest::option::of(0.0f64..1e9)), 0..max_len)
            .prop_map(|steps| {
                let mut ts = 1_000_000u64;
                steps
                    .into_iter()
                    .map(|(gap, pct, rate)| {
                        ts += gap;
                        MetricSample {
                            ts_ms: ts,
                            cpu_pct: pct,
                            mem_pct: 100.0 - pct,
                            disk_pct: pct / 2.0,
                            net_rx_rate: rate,
                            net_tx_rate: rate.map(|r| r / 2.0),
                        }
                    })
                    .collect()
            })
    }
}

// ── Factories ───────────────────────────────────────────────────────────

#[allow(clippy::panic)]
pub fn project(name: &str) -> ProjectName {
    match ProjectName::parse(name) {
        Ok(name) => name,
        Err(e) => panic!("test project name {name:?} is invalid: {e}"),
    }
}

pub fn pending_job(id: &str, project_name: &str, command: CommandKind) -> Job {
    Job::new(
        JobId::from_string(id),
        project(project_name),
        PathBuf::from("/var/deploy").join(project_name),
        command,
        None,
        1_000_000,
    )
}
