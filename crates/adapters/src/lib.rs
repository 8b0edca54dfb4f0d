// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the host: resource probe, project catalog, compose status.

pub mod catalog;
pub mod compose;
pub mod probe;

pub use catalog::{CatalogError, DirCatalog, ProjectCatalog};
pub use compose::{ComposeError, ComposeInspector, ContainerInspector, ContainerStatus};
pub use probe::{HostProbe, HostReading, ProbeError, SysinfoProbe};

#[cfg(any(test, feature = "test-support"))]
pub use catalog::StaticCatalog;
#[cfg(any(test, feature = "test-support"))]
pub use compose::FakeInspector;
#[cfg(any(test, feature = "test-support"))]
pub use probe::FakeProbe;
