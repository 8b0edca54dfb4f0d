// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use berth_core::test_support::project;

#[test]
fn dir_catalog_joins_root_and_name() {
    let catalog = DirCatalog::new("/var/deploy");
    let resolved = catalog.resolve(&project("demo")).unwrap();
    assert_eq!(resolved.path, PathBuf::from("/var/deploy/demo"));
    assert_eq!(resolved.remote, None);
}

#[test]
fn dir_catalog_expands_remote_template() {
    let catalog = DirCatalog::new("/srv").with_remote_template("git@github.com:acme/{project}.git");
    let resolved = catalog.resolve(&project("shop-api")).unwrap();
    assert_eq!(resolved.remote.as_deref(), Some("git@github.com:acme/shop-api.git"));
}

#[test]
fn static_catalog_knows_only_inserted_projects() {
    let catalog = StaticCatalog::new();
    catalog.insert(project("demo"), "/tmp/demo", None);

    assert_eq!(catalog.resolve(&project("demo")).unwrap().path, PathBuf::from("/tmp/demo"));
    assert_eq!(
        catalog.resolve(&project("other")).unwrap_err(),
        CatalogError::UnknownProject("other".into())
    );
}
