// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validated project and service identifiers.
//!
//! Identifiers end up as discrete argv tokens and path components, so they
//! are checked against a strict allow-list before anything else touches
//! them: an ASCII alphanumeric first character followed by up to 63
//! alphanumerics, dashes, or underscores.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum identifier length in bytes.
pub const MAX_IDENT_LEN: usize = 64;

#[allow(clippy::expect_used)]
static IDENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("constant regex pattern is valid")
});

/// Which identifier failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentKind {
    Project,
    Service,
}

crate::simple_display! {
    IdentKind {
        Project => "project",
        Service => "service",
    }
}

/// Identifier rejected by the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("{kind} name is empty")]
    Empty { kind: IdentKind },
    #[error("{kind} name exceeds {} characters", MAX_IDENT_LEN)]
    TooLong { kind: IdentKind },
    #[error("{kind} name {value:?} contains characters outside [A-Za-z0-9_-] or does not start with an alphanumeric")]
    Invalid { kind: IdentKind, value: String },
}

fn validate(kind: IdentKind, value: &str) -> Result<(), IdentError> {
    if value.is_empty() {
        return Err(IdentError::Empty { kind });
    }
    if value.len() > MAX_IDENT_LEN {
        return Err(IdentError::TooLong { kind });
    }
    if !IDENT_PATTERN.is_match(value) {
        return Err(IdentError::Invalid { kind, value: value.to_string() });
    }
    Ok(())
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(value: impl Into<String>) -> Result<Self, IdentError> {
                let value = value.into();
                validate($kind, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdentError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(d)?;
                Self::parse(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_name! {
    /// Name of a deployable project (one cloned repository directory).
    ProjectName, IdentKind::Project
}

validated_name! {
    /// Name of a compose service within a project.
    ServiceName, IdentKind::Service
}

/// A project resolved by the catalog: where it lives and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: ProjectName,
    /// Deployment directory; also the key of the project lock.
    pub path: PathBuf,
    /// Clone remote used by `redeploy` when the directory is not yet a checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
