// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project catalog: maps a validated project name to its deployment directory.

use berth_core::{ProjectName, ProjectRef};
use std::path::PathBuf;
use thiserror::Error;

/// Placeholder replaced by the project name in a remote template.
pub const PROJECT_PLACEHOLDER: &str = "{project}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown project: {0}")]
    UnknownProject(String),
}

/// Resolves projects to their on-disk location and optional clone remote.
pub trait ProjectCatalog: Send + Sync + 'static {
    fn resolve(&self, name: &ProjectName) -> Result<ProjectRef, CatalogError>;
}

/// Every project lives at `<root>/<name>`.
///
/// With a remote template such as `git@github.com:acme/{project}.git`, a
/// missing checkout can be cloned on first redeploy.
#[derive(Debug, Clone)]
pub struct DirCatalog {
    root: PathBuf,
    remote_template: Option<String>,
}

impl DirCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), remote_template: None }
    }

    pub fn with_remote_template(mut self, template: impl Into<String>) -> Self {
        self.remote_template = Some(template.into());
        self
    }
}

impl ProjectCatalog for DirCatalog {
    fn resolve(&self, name: &ProjectName) -> Result<ProjectRef, CatalogError> {
        Ok(ProjectRef {
            name: name.clone(),
            path: self.root.join(name.as_str()),
            remote: self
                .remote_template
                .as_ref()
                .map(|t| t.replace(PROJECT_PLACEHOLDER, name.as_str())),
        })
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{CatalogError, ProjectCatalog};
    use berth_core::{ProjectName, ProjectRef};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    /// Catalog with an explicit set of known projects.
    #[derive(Clone, Default)]
    pub struct StaticCatalog {
        projects: Arc<Mutex<HashMap<String, ProjectRef>>>,
    }

    impl StaticCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, name: ProjectName, path: impl Into<PathBuf>, remote: Option<&str>) {
            let project =
                ProjectRef { name: name.clone(), path: path.into(), remote: remote.map(str::to_string) };
            self.projects.lock().insert(name.as_str().to_string(), project);
        }
    }

    impl ProjectCatalog for StaticCatalog {
        fn resolve(&self, name: &ProjectName) -> Result<ProjectRef, CatalogError> {
            self.projects
                .lock()
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| CatalogError::UnknownProject(name.to_string()))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::StaticCatalog;

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
