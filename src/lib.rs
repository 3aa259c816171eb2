//! # unified-import
//!
//! Resolves a directory tree of schema definitions and front-matter content files into a
//! validated, cross-referenced import graph.
//!
//! ## Overview
//!
//! An import root holds two kinds of files:
//!
//! - **Schema files** (`*.yaml`): master types, mixin types, associations and enumerations. A master
//!   type `Task.yaml` owns the same-named directory `Task/`, which holds its sub-types, mixins and
//!   content.
//! - **Content files** (`*.md`): a YAML header fenced by `---` lines followed by a free-form body.
//!   An item `Task/Fix.md` owns the same-named directory `Task/Fix/`, which holds its children.
//!
//! Alongside, root `*.yaml` files that declare a space class (`Project`, `Teamspace`, `OrgSpace`)
//! describe spaces whose same-named directory holds issues, documents and controlled documents.
//!
//! Files refer to each other by relative path. Every path is given a stable identifier the first
//! time anything mentions it, so a file may refer to another before that file has been read.
//!
//! ## Architecture
//!
//! - **[`registry`]**: path → stable id arena plus per-path metadata (attributes, relations,
//!   mentions, enum values)
//! - **[`codec`]**: header/body splitting, `${name}` variable substitution and header format checks
//! - **[`resolver`]**: the two-phase schema-then-content pass producing a [`resolver::ResolveOutput`]
//! - **[`builder`]**: strict/lenient validation of spaces and items and per-space hierarchy assembly
//! - **[`workspace`]**: feeds the builder from a workspace folder
//! - **[`importer`]**: one end-to-end run against a [`source::TypeLookup`], [`source::BlobSink`]
//!   and [`source::Materializer`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unified_import::{
//!     config::{ImportConfig, ImportMode},
//!     importer::Importer,
//!     source::{MemoryBlobSink, MemoryMaterializer, StaticTypeLookup},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ImportConfig::new(ImportMode::Lenient).with_variable("team", "Platform");
//!     let lookup = StaticTypeLookup::new(["Todo", "Done"], ["Policy"]);
//!     let mut importer = Importer::new(
//!         config,
//!         lookup,
//!         MemoryBlobSink::default(),
//!         MemoryMaterializer::default(),
//!     );
//!     let summary = importer.import_folder("./workspace").await?;
//!     println!("{} items, {} rejected", summary.items, summary.report.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Modes
//!
//! In [`config::ImportMode::Strict`] (the default) the first invalid space or item fails the run.
//! In [`config::ImportMode::Lenient`] invalid entities are left out and recorded in a
//! [`report::ValidationReport`]. Schema and content resolution errors are fatal in both modes.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod importer;
pub mod paths;
pub mod properties;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod workspace;

pub use error::*;
