// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed set of operations an operator can run against a project.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Compose file every project is expected to carry at its root.
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// Operation requested from the UI. Each kind maps to one fixed argv template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Pull sources, pull images, rebuild and start the stack.
    Redeploy,
    /// Stop every service of the stack.
    StopAll,
    /// Tear the stack down including volumes.
    Prune,
    /// Rebuild images ignoring the build cache.
    BuildNoCache,
    ContainerStart,
    ContainerStop,
    ContainerRestart,
    ContainerDelete,
    /// Follow logs of one service, or of the whole stack, until cancelled.
    ContainerLogs,
}

impl CommandKind {
    pub const ALL: [CommandKind; 9] = [
        CommandKind::Redeploy,
        CommandKind::StopAll,
        CommandKind::Prune,
        CommandKind::BuildNoCache,
        CommandKind::ContainerStart,
        CommandKind::ContainerStop,
        CommandKind::ContainerRestart,
        CommandKind::ContainerDelete,
        CommandKind::ContainerLogs,
    ];

    /// Whether the kind acts on a single service and cannot run without one.
    pub fn requires_service(self) -> bool {
        matches!(
            self,
            CommandKind::ContainerStart
                | CommandKind::ContainerStop
                | CommandKind::ContainerRestart
                | CommandKind::ContainerDelete
        )
    }

    /// Whether the kind takes a service name. `container-logs` follows every
    /// service of the stack when none is given.
    pub fn accepts_service(self) -> bool {
        self.requires_service() || self == CommandKind::ContainerLogs
    }

    /// Whether the kind may run before the deployment directory exists.
    pub fn creates_project_dir(self) -> bool {
        matches!(self, CommandKind::Redeploy)
    }
}

crate::simple_display! {
    CommandKind {
        Redeploy => "redeploy",
        StopAll => "stop-all",
        Prune => "prune",
        BuildNoCache => "build-no-cache",
        ContainerStart => "container-start",
        ContainerStop => "container-stop",
        ContainerRestart => "container-restart",
        ContainerDelete => "container-delete",
        ContainerLogs => "container-logs",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
