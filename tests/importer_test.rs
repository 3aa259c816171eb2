//! End-to-end import runs against the in-memory collaborators.

mod common;

use common::{write_file, write_people_schema};
use std::path::Path;
use tempfile::TempDir;
use test_log::test;
use unified_import::{
    config::{ImportConfig, ImportMode},
    importer::Importer,
    paths::PathKey,
    source::{MemoryBlobSink, MemoryMaterializer, StaticTypeLookup},
    ImportError,
};

type MemoryImporter = Importer<StaticTypeLookup, MemoryBlobSink, MemoryMaterializer>;

fn importer(mode: ImportMode) -> MemoryImporter {
    Importer::new(
        ImportConfig::new(mode).with_variable("company", "Acme"),
        StaticTypeLookup::new(["Todo", "In Progress", "Done"], ["Policy"]),
        MemoryBlobSink::default(),
        MemoryMaterializer::default(),
    )
}

fn write_workspace(root: &Path) {
    write_file(
        root,
        "settings.yaml",
        "projectTypes:\n  - name: Classic\n    taskTypes:\n      - name: Task\n",
    );
    write_file(
        root,
        "Backend.yaml",
        "class: Project\ntitle: Backend\nidentifier: BE\nprojectType: Classic\ndefaultIssueStatus: Todo\n",
    );
    write_file(
        root,
        "Backend/1.Login fails.md",
        "---\nclass: Issue\ntitle: Login fails\nstatus: In Progress\npriority: High\n---\nSteps to reproduce.\n",
    );
    write_file(
        root,
        "Backend/1.Login fails/2.Fix cookie.md",
        "---\nclass: Issue\ntitle: Fix cookie\nstatus: Todo\n---\n",
    );
    write_file(root, "Docs.yaml", "class: Teamspace\ntitle: Docs\n");
    write_file(
        root,
        "Docs/Onboarding.md",
        "---\nclass: Document\ntitle: \"Welcome to ${company}\"\n---\nRead me first.\n",
    );

    write_people_schema(root);
    write_file(root, "Person/photo.png", "not really a png");
    write_file(root, "Person/cv.pdf", "%PDF-1.4");
    write_file(root, "Backend/screenshot.png", "login screen");
    write_file(
        root,
        "Person/alice.md",
        "---\ntitle: Alice\nblobs:\n  - photo.png\nattachments:\n  - cv.pdf\n---\n",
    );
}

#[test(tokio::test)]
async fn imports_a_workspace() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_workspace(root);

    let mut importer = importer(ImportMode::Strict);
    let summary = importer.import_folder(root).await.unwrap();
    assert_eq!(summary.spaces, 2);
    assert_eq!(summary.items, 3);
    assert_eq!(summary.types, 3);
    assert_eq!(summary.content_items, 1);
    assert_eq!(summary.blobs, 3);
    assert!(summary.report.is_valid());

    let (_, blobs, materializer) = importer.into_parts();
    assert_eq!(blobs.len(), 3);
    let graph = materializer.last().unwrap();
    let screenshot = &graph.files[&PathKey::new(root.join("Backend/screenshot.png"))];
    assert_eq!(blobs.get(&screenshot.id), Some(&b"login screen"[..]));
    assert_eq!(graph.files.len(), 3);
    assert_eq!(materializer.graphs().len(), 1);

    let alice = graph
        .schema
        .item(&PathKey::new(root.join("Person/alice.md")))
        .unwrap();
    assert_eq!(alice.blobs.len(), 1);
    assert_eq!(blobs.get(&alice.blobs[0].id), Some(&b"not really a png"[..]));
    assert_eq!(alice.blobs[0].content_type, "image/png");

    let attachment = &graph.schema.attachments[0];
    assert_eq!(attachment.attached_to, alice.id);
    assert_eq!(attachment.content_type, "application/pdf");
    assert_eq!(blobs.record(&attachment.file).unwrap().name, "cv.pdf");

    let issue = graph
        .mentions
        .get(&PathKey::new(root.join("Backend/1.Login fails/2.Fix cookie.md")))
        .unwrap();
    assert_eq!(issue.title, "BE-2");
    assert!(graph
        .mentions
        .get(&PathKey::new(root.join("Person/alice.md")))
        .is_some());

    let docs = graph
        .workspace
        .space(&PathKey::new(root.join("Docs")))
        .unwrap();
    assert_eq!(docs.items[0].title(), Some("Welcome to Acme"));
    assert_eq!(
        docs.items[0].field("content").and_then(|v| v.as_str()),
        Some("Read me first.\n")
    );
}

#[test(tokio::test)]
async fn lenient_runs_skip_invalid_items() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_workspace(root);
    write_file(
        root,
        "Backend/3.Unknown status.md",
        "---\nclass: Issue\ntitle: Unknown status\nstatus: Blocked\n---\n",
    );

    let mut importer = importer(ImportMode::Lenient);
    let summary = importer.import_folder(root).await.unwrap();
    assert_eq!(summary.items, 3);
    assert_eq!(summary.report.len(), 1);
    let rejected = PathKey::new(root.join("Backend/3.Unknown status.md")).to_string();
    assert!(matches!(
        summary.report.get(&rejected),
        [ImportError::FieldValidation { .. }]
    ));
    assert_eq!(importer.materializer().graphs().len(), 1);
}

#[test(tokio::test)]
async fn strict_runs_stop_at_the_first_invalid_item() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_workspace(root);
    write_file(
        root,
        "Backend/3.Unknown status.md",
        "---\nclass: Issue\ntitle: Unknown status\nstatus: Blocked\n---\n",
    );

    let mut importer = importer(ImportMode::Strict);
    let err = importer.import_folder(root).await.unwrap_err();
    assert!(err.to_string().contains("unknown status 'Blocked'"), "{err}");
    assert!(importer.materializer().graphs().is_empty());
    assert!(importer.blobs().is_empty());
}

#[test(tokio::test)]
async fn missing_root_fails() {
    let tmp = TempDir::new().unwrap();
    let mut importer = importer(ImportMode::Lenient);
    let result = importer.import_folder(tmp.path().join("nowhere")).await;
    assert!(result.is_err());
}
