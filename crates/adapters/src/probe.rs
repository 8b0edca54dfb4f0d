// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host resource probe.
//!
//! The sampler turns successive readings into [`berth_core::MetricSample`]s;
//! the probe only reports instantaneous utilization and cumulative counters.

use std::path::{Path, PathBuf};
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};
use thiserror::Error;

/// Errors from reading host resources
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("no mounted disk contains {}", .0.display())]
    NoDisk(PathBuf),
    #[error("total memory reported as zero")]
    NoMemory,
    #[error("probe unavailable: {0}")]
    Unavailable(String),
}

/// One instantaneous reading of the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostReading {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    /// Utilization of the volume holding the deploy root
    pub disk_pct: f64,
    /// Cumulative bytes received over non-loopback interfaces
    pub net_rx_bytes: u64,
    /// Cumulative bytes transmitted over non-loopback interfaces
    pub net_tx_bytes: u64,
}

/// Source of host readings. Called from a single sampler task.
pub trait HostProbe: Send + 'static {
    fn read(&mut self) -> Result<HostReading, ProbeError>;
}

/// Percentage of `used` in `total`, clamped to 0..=100.
pub fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Index of the mount point that is the longest prefix of `target`.
pub fn best_mount<'a>(target: &Path, mounts: impl IntoIterator<Item = &'a Path>) -> Option<usize> {
    mounts
        .into_iter()
        .enumerate()
        .filter(|(_, mount)| target.starts_with(mount))
        .max_by_key(|(_, mount)| mount.components().count())
        .map(|(index, _)| index)
}

pub fn is_loopback(interface: &str) -> bool {
    interface == "lo" || interface.starts_with("lo0") || interface.starts_with("loopback")
}

/// Probe backed by `sysinfo`.
pub struct SysinfoProbe {
    system: System,
    deploy_root: PathBuf,
}

impl SysinfoProbe {
    pub fn new(deploy_root: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_disks_list();
        system.refresh_networks_list();
        Self { system, deploy_root: deploy_root.into() }
    }

    fn disk_pct(&mut self) -> Result<f64, ProbeError> {
        self.system.refresh_disks_list();
        self.system.refresh_disks();
        let disks = self.system.disks();
        let index = best_mount(&self.deploy_root, disks.iter().map(|d| d.mount_point()))
            .ok_or_else(|| ProbeError::NoDisk(self.deploy_root.clone()))?;
        let disk = &disks[index];
        let total = disk.total_space();
        Ok(percent(total.saturating_sub(disk.available_space()), total))
    }
}

impl HostProbe for SysinfoProbe {
    fn read(&mut self) -> Result<HostReading, ProbeError> {
        self.system.refresh_cpu();
        let cpu_pct = f64::from(self.system.global_cpu_info().cpu_usage()).clamp(0.0, 100.0);

        self.system.refresh_memory();
        let total_mem = self.system.total_memory();
        if total_mem == 0 {
            return Err(ProbeError::NoMemory);
        }
        let mem_pct = percent(self.system.used_memory(), total_mem);

        let disk_pct = self.disk_pct()?;

        self.system.refresh_networks_list();
        self.system.refresh_networks();
        let (mut rx, mut tx) = (0u64, 0u64);
        for (name, data) in self.system.networks().iter() {
            if is_loopback(name) {
                continue;
            }
            rx = rx.saturating_add(data.total_received());
            tx = tx.saturating_add(data.total_transmitted());
        }

        Ok(HostReading { cpu_pct, mem_pct, disk_pct, net_rx_bytes: rx, net_tx_bytes: tx })
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{HostProbe, HostReading, ProbeError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted probe: returns queued results in order, then repeats the last
    /// reading (or fails once the queue held only errors).
    #[derive(Clone, Default)]
    pub struct FakeProbe {
        inner: Arc<Mutex<FakeProbeState>>,
    }

    #[derive(Default)]
    struct FakeProbeState {
        queue: VecDeque<Result<HostReading, ProbeError>>,
        last: Option<HostReading>,
        reads: usize,
    }

    impl FakeProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, result: Result<HostReading, ProbeError>) {
            self.inner.lock().queue.push_back(result);
        }

        /// Queue a reading with fixed percentages and the given counters.
        pub fn push_counters(&self, rx: u64, tx: u64) {
            self.push(Ok(HostReading {
                cpu_pct: 10.0,
                mem_pct: 20.0,
                disk_pct: 30.0,
                net_rx_bytes: rx,
                net_tx_bytes: tx,
            }));
        }

        pub fn reads(&self) -> usize {
            self.inner.lock().reads
        }
    }

    impl HostProbe for FakeProbe {
        fn read(&mut self) -> Result<HostReading, ProbeError> {
            let mut state = self.inner.lock();
            state.reads += 1;
            match state.queue.pop_front() {
                Some(Ok(reading)) => {
                    state.last = Some(reading);
                    Ok(reading)
                }
                Some(Err(e)) => Err(e),
                None => state.last.ok_or_else(|| ProbeError::Unavailable("no reading queued".into())),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProbe;

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
