//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::Path;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Writes `content` to `root/rel`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// A small schema tree: `Person` master type with a `Student` sub-type, an `Employee` mixin, a
/// `Level` enum, and a self-association `Mentorship` (`mentors` on the A side, `mentees` on B).
#[allow(dead_code)]
pub fn write_people_schema(root: &Path) {
    write_file(
        root,
        "Person.yaml",
        r#"class: MasterType
title: Person
properties:
  - label: age
    type: Number
  - label: nickname
    type: String
  - label: friends
    refTo: Person.yaml
    isArray: true
  - label: level
    enumOf: Level.yaml
"#,
    );
    write_file(
        root,
        "Level.yaml",
        "class: Enum\ntitle: Level\nvalues:\n  - junior\n  - senior\n",
    );
    write_file(
        root,
        "Mentorship.yaml",
        r#"class: Association
typeA: Person.yaml
typeB: Person.yaml
type: "N:N"
nameA: mentees
nameB: mentors
"#,
    );
    write_file(
        root,
        "Person/Employee.yaml",
        "class: MixinType\ntitle: Employee\nproperties:\n  - label: company\n    type: String\n",
    );
    write_file(
        root,
        "Person/Student.yaml",
        "class: MasterType\ntitle: Student\nproperties:\n  - label: school\n    type: String\n",
    );
}
