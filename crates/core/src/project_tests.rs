// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    simple     = { "demo" },
    dashed     = { "my-app" },
    underscore = { "my_app_2" },
    digits     = { "42" },
    max_len    = { "a123456789012345678901234567890123456789012345678901234567890123" },
)]
fn accepts_allow_listed_names(value: &str) {
    let name = ProjectName::parse(value).unwrap();
    assert_eq!(name.as_str(), value);
}

#[yare::parameterized(
    semicolon   = { "proj; rm -rf /" },
    space       = { "my app" },
    slash       = { "../etc" },
    dot         = { "app.v2" },
    dollar      = { "$(reboot)" },
    backtick    = { "`id`" },
    pipe        = { "a|b" },
    leading_dash = { "-rf" },
    newline     = { "demo\n" },
    unicode     = { "démo" },
)]
fn rejects_metacharacters(value: &str) {
    let err = ServiceName::parse(value).unwrap_err();
    assert!(matches!(err, IdentError::Invalid { kind: IdentKind::Service, .. }), "{err:?}");
}

#[test]
fn rejects_empty() {
    assert_eq!(
        ProjectName::parse("").unwrap_err(),
        IdentError::Empty { kind: IdentKind::Project }
    );
}

#[test]
fn rejects_too_long() {
    let long = "a".repeat(MAX_IDENT_LEN + 1);
    assert_eq!(
        ProjectName::parse(long).unwrap_err(),
        IdentError::TooLong { kind: IdentKind::Project }
    );
}

#[test]
fn deserialize_validates() {
    let ok: ProjectName = serde_json::from_str("\"demo\"").unwrap();
    assert_eq!(ok.as_str(), "demo");

    let err = serde_json::from_str::<ProjectName>("\"demo; ls\"");
    assert!(err.is_err());
}

#[test]
fn error_message_names_the_kind() {
    let err = ProjectName::parse("a b").unwrap_err();
    assert!(err.to_string().starts_with("project name \"a b\""), "{err}");
}
