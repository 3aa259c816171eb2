//! Schema-then-content resolution over real directory trees.

mod common;

use common::{write_file, write_people_schema};
use std::path::Path;
use tempfile::TempDir;
use test_log::test;
use unified_import::{
    codec::FormatParser,
    config::{ImportConfig, ImportMode},
    paths::PathKey,
    properties::StableId,
    registry::MetadataRegistry,
    resolver::{FieldValue, ResolveOutput, SchemaResolver},
    schema::{Cardinality, FieldTag},
    ImportError,
};

fn resolve(root: &Path) -> Result<ResolveOutput, ImportError> {
    let config = ImportConfig::new(ImportMode::Strict).with_variable("company", "Acme");
    let parser = FormatParser::new(config.variable_table());
    let mut registry = MetadataRegistry::new();
    SchemaResolver::new(&mut registry, &parser).resolve(root)
}

fn write_people(root: &Path) {
    write_people_schema(root);
    write_file(
        root,
        "Person/alice.md",
        r#"---
title: Alice
age: 30
friends:
  - carol.md
  - bob.md
level: senior
tags:
  - Employee.yaml
company: "${company}"
mentors: bob.md
---
Alice's notes.
"#,
    );
    write_file(root, "Person/bob.md", "---\ntitle: Bob\nmentees: alice.md\n---\n");
    write_file(root, "Person/carol.md", "---\ntitle: Carol\nnickname: Caz\n---\n");
    write_file(
        root,
        "Person/Student/dave.md",
        "---\ntitle: Dave\nschool: MIT\nage: 20\nfriends: ../alice.md\n---\n",
    );
    write_file(root, "Person/alice/junior.md", "---\ntitle: Junior\nlevel: junior\n---\n");
}

fn attribute_name(output: &ResolveOutput, type_title: &str, label: &str) -> String {
    output
        .types
        .iter()
        .find(|t| t.title == type_title)
        .and_then(|t| t.attributes.get(label))
        .map(|a| a.name.clone())
        .unwrap()
}

fn item_id(output: &ResolveOutput, root: &Path, rel: &str) -> StableId {
    output.item(&PathKey::new(root.join(rel))).unwrap().id
}

#[test]
fn resolves_types_and_content() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people(root);

    let output = resolve(root).unwrap();
    assert_eq!(output.types.len(), 3);
    assert_eq!(output.enums.len(), 1);
    assert_eq!(output.associations.len(), 1);
    assert_eq!(output.items.len(), 5);
    assert_eq!(output.top_level_types.len(), 1);

    let person = output.types.iter().find(|t| t.title == "Person").unwrap();
    let student = output.types.iter().find(|t| t.title == "Student").unwrap();
    assert_eq!(output.ancestors(&student.id).unwrap(), vec![person.id]);

    let dave = output
        .item(&PathKey::new(root.join("Person/Student/dave.md")))
        .unwrap();
    assert_eq!(dave.class, student.id);
    let age = attribute_name(&output, "Person", "age");
    assert_eq!(dave.fields.get(&age), Some(&FieldValue::Number(20.0)));
}

#[test]
fn array_references_keep_their_order() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people(root);

    let output = resolve(root).unwrap();
    let friends = attribute_name(&output, "Person", "friends");
    let alice = output.item(&PathKey::new(root.join("Person/alice.md"))).unwrap();
    assert_eq!(
        alice.fields.get(&friends),
        Some(&FieldValue::Array(vec![
            FieldValue::Ref(item_id(&output, root, "Person/carol.md")),
            FieldValue::Ref(item_id(&output, root, "Person/bob.md")),
        ]))
    );

    // a single value is accepted for an array attribute
    let dave = output
        .item(&PathKey::new(root.join("Person/Student/dave.md")))
        .unwrap();
    assert_eq!(
        dave.fields.get(&friends),
        Some(&FieldValue::Array(vec![FieldValue::Ref(alice.id)]))
    );

    let level = attribute_name(&output, "Person", "level");
    assert_eq!(
        alice.fields.get(&level),
        Some(&FieldValue::Enum("senior".to_string()))
    );
}

#[test]
fn relations_are_oriented_by_side() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people(root);

    let output = resolve(root).unwrap();
    let alice = item_id(&output, root, "Person/alice.md");
    let bob = item_id(&output, root, "Person/bob.md");
    let association = output.associations[0].id;
    assert_eq!(output.relations.len(), 2);
    for relation in output.relations.iter() {
        assert_eq!(relation.association, association);
        assert_eq!((relation.doc_a, relation.doc_b), (alice, bob));
    }
}

#[test]
fn mixins_and_variables() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people(root);

    let output = resolve(root).unwrap();
    let alice = item_id(&output, root, "Person/alice.md");
    let mixins: Vec<_> = output.mixins_of(&alice).collect();
    assert_eq!(mixins.len(), 1);
    let company = attribute_name(&output, "Employee", "company");
    assert_eq!(
        mixins[0].fields.get(&company),
        Some(&FieldValue::String("Acme".to_string()))
    );
    let employee = output.types.iter().find(|t| t.title == "Employee").unwrap();
    assert_eq!(mixins[0].mixin, employee.id);
    assert_eq!(output.item_by_id(&alice).unwrap().body, "Alice's notes.\n");
}

#[test]
fn children_follow_the_same_named_directory() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people(root);

    let output = resolve(root).unwrap();
    let junior = PathKey::new(root.join("Person/alice/junior.md"));
    assert_eq!(
        output.parents.get(&junior),
        Some(&PathKey::new(root.join("Person/alice.md")))
    );

    let (roots, orphans) = output.content_tree();
    assert!(orphans.is_empty());
    assert_eq!(roots.len(), 4);
    let alice = roots.iter().find(|item| item.title == "Alice").unwrap();
    assert_eq!(alice.children.len(), 1);
    assert_eq!(alice.children[0].title, "Junior");
}

#[test]
fn unknown_property_fails() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people_schema(root);
    write_file(root, "Person/eve.md", "---\ntitle: Eve\ncolor: red\n---\n");

    let err = resolve(root).unwrap_err();
    match err {
        ImportError::FieldValidation { path, message } => {
            assert!(path.ends_with("eve.md"));
            assert!(message.contains("Unknown field: color"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unsupported_property_type_fails() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_file(
        root,
        "Meeting.yaml",
        "class: MasterType\ntitle: Meeting\nproperties:\n  - label: when\n    type: Date\n",
    );

    let err = resolve(root).unwrap_err();
    assert_eq!(
        err,
        ImportError::UnsupportedType {
            path: PathKey::new(root.join("Meeting.yaml")).to_string(),
            property: "when".to_string(),
            type_name: "Date".to_string(),
        }
    );
}

#[test]
fn references_to_the_wrong_type_fail() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people_schema(root);
    write_file(root, "Company.yaml", "class: MasterType\ntitle: Company\n");
    write_file(root, "Company/acme.md", "---\ntitle: Acme\n---\n");
    write_file(
        root,
        "Person/frank.md",
        "---\ntitle: Frank\nfriends:\n  - ../Company/acme.md\n---\n",
    );

    let err = resolve(root).unwrap_err();
    assert!(
        matches!(&err, ImportError::UnresolvedReference { target, .. } if target.ends_with("acme.md")),
        "{err:?}"
    );
}

#[test]
fn references_to_non_items_fail() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people_schema(root);
    write_file(root, "Person/gina.md", "---\ntitle: Gina\nmentors: Employee.yaml\n---\n");

    let err = resolve(root).unwrap_err();
    assert!(matches!(err, ImportError::UnresolvedReference { .. }), "{err:?}");
}

#[test]
fn missing_variable_fails() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people_schema(root);
    write_file(root, "Person/hal.md", "---\ntitle: \"${team}\"\n---\n");

    let err = resolve(root).unwrap_err();
    assert_eq!(err, ImportError::MissingVariable("team".to_string()));
}

#[test]
fn enum_values_are_checked() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people_schema(root);
    write_file(root, "Person/ivy.md", "---\ntitle: Ivy\nlevel: expert\n---\n");

    let err = resolve(root).unwrap_err();
    assert!(err.to_string().contains("level must be one of [junior, senior]"), "{err}");
}

#[test]
fn mixins_need_a_master_directory() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_file(root, "Stray.yaml", "class: MixinType\ntitle: Stray\n");

    let err = resolve(root).unwrap_err();
    assert!(matches!(err, ImportError::FieldValidation { .. }));
}

#[test]
fn content_outside_master_directories_is_ignored() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people_schema(root);
    write_file(root, "README.md", "# Workspace\n");
    write_file(root, "notes/todo.md", "---\ntitle: Todo\n---\n");

    let output = resolve(root).unwrap();
    assert!(output.items.is_empty());
}

#[test]
fn unrecognized_directories_inside_master_types_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_people_schema(root);
    write_file(root, "Person/bob.md", "---\ntitle: Bob\n---\n");
    write_file(root, "Person/drafts/carol.md", "---\ntitle: Carol\n---\n");

    let output = resolve(root).unwrap();
    assert_eq!(output.items.len(), 1);
    assert!(output
        .item(&PathKey::new(root.join("Person/bob.md")))
        .is_some());
}

#[test]
fn associations_register_both_sides() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_file(root, "Author.yaml", "class: MasterType\ntitle: Author\n");
    write_file(root, "Book.yaml", "class: MasterType\ntitle: Book\n");
    write_file(
        root,
        "Writes.yaml",
        "class: Association\ntypeA: Author.yaml\ntypeB: Book.yaml\ntype: \"1:N\"\nnameA: writtenBy\nnameB: books\n",
    );
    write_file(root, "Author/ursula.md", "---\ntitle: Ursula\nbooks:\n  - ../Book/earthsea.md\n---\n");
    write_file(root, "Book/earthsea.md", "---\ntitle: Earthsea\n---\n");
    write_file(root, "Book/lathe.md", "---\ntitle: Lathe\nwrittenBy: ../Author/ursula.md\n---\n");

    let parser = FormatParser::default();
    let mut registry = MetadataRegistry::new();
    let output = SchemaResolver::new(&mut registry, &parser)
        .resolve(root)
        .unwrap();

    let association = output.associations[0].id;
    let author_side = registry.associations(&PathKey::new(root.join("Author.yaml")));
    let book_side = registry.associations(&PathKey::new(root.join("Book.yaml")));
    assert_eq!(author_side.keys().collect::<Vec<_>>(), vec!["books"]);
    assert_eq!(book_side.keys().collect::<Vec<_>>(), vec!["writtenBy"]);

    let books = &author_side["books"];
    let written_by = &book_side["writtenBy"];
    assert_eq!(books.field, FieldTag::A);
    assert_eq!(written_by.field, FieldTag::B);
    assert_eq!(books.cardinality, Cardinality::OneToMany);
    assert_eq!(written_by.cardinality, Cardinality::OneToMany);
    assert_eq!((books.association, written_by.association), (association, association));
    assert!(books.is_array());
    assert!(!written_by.is_array());

    // both sides yield relations with the author on side A
    let ursula = item_id(&output, root, "Author/ursula.md");
    let mut books_of_ursula: Vec<StableId> = output
        .relations
        .iter()
        .filter(|r| r.doc_a == ursula)
        .map(|r| r.doc_b)
        .collect();
    books_of_ursula.sort();
    let mut expected = vec![
        item_id(&output, root, "Book/earthsea.md"),
        item_id(&output, root, "Book/lathe.md"),
    ];
    expected.sort();
    assert_eq!(output.relations.len(), 2);
    assert_eq!(books_of_ursula, expected);
}
