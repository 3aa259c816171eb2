//! One import run, from folder to materialized graph.
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use crate::{
    builder::{ImportWorkspace, ImportWorkspaceBuilder},
    codec::FormatParser,
    config::ImportConfig,
    error::ImportError,
    paths::{absolute_root, PathKey},
    registry::{Mention, MetadataRegistry},
    report::ValidationReport,
    resolver::{FileRecord, ResolveOutput, SchemaResolver},
    source::{BlobSink, Materializer, TypeLookup},
    workspace::WorkspaceLoader,
};

/// Everything one run hands to the [Materializer].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportGraph {
    pub workspace: ImportWorkspace,
    pub schema: ResolveOutput,
    pub mentions: BTreeMap<PathKey, Mention>,
    /// Every uploaded file: the ones content items reference plus the workspace attachments.
    pub files: BTreeMap<PathKey, FileRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub spaces: usize,
    pub items: usize,
    pub types: usize,
    pub content_items: usize,
    pub relations: usize,
    pub blobs: usize,
    pub report: ValidationReport,
}

pub struct Importer<L, B, M> {
    config: ImportConfig,
    lookup: L,
    blobs: B,
    materializer: M,
}

impl<L, B, M> Importer<L, B, M>
where
    L: TypeLookup,
    B: BlobSink,
    M: Materializer,
{
    pub fn new(config: ImportConfig, lookup: L, blobs: B, materializer: M) -> Self {
        Importer {
            config,
            lookup,
            blobs,
            materializer,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn materializer(&self) -> &M {
        &self.materializer
    }

    pub fn into_parts(self) -> (L, B, M) {
        (self.lookup, self.blobs, self.materializer)
    }

    /// Imports the folder at `root`. Every run starts from an empty registry.
    pub async fn import_folder<P: AsRef<Path>>(
        &mut self,
        root: P,
    ) -> Result<ImportSummary, ImportError> {
        let root = absolute_root(root)?;
        tracing::info!(
            "[Importer::import_folder] Importing {} ({:?} mode)",
            root.display(),
            self.config.mode
        );
        let mut registry = MetadataRegistry::new();
        let parser = FormatParser::new(self.config.variable_table());

        let mut builder = ImportWorkspaceBuilder::new(self.config.mode);
        builder.init_cache(&self.lookup).await?;
        let mut loader = WorkspaceLoader::new(&mut registry, &parser);
        loader.load(&root, &mut builder)?;
        let mut files = loader.collect_files(&root)?;
        let schema = SchemaResolver::new(&mut registry, &parser).resolve(&root)?;
        let workspace = builder.build()?;

        files.extend(
            schema
                .files
                .iter()
                .map(|(path, file)| (path.clone(), file.clone())),
        );
        for file in files.values() {
            let bytes = tokio::fs::read(file.path.as_path()).await?;
            self.blobs.put(file, bytes).await?;
        }

        let mentions: BTreeMap<PathKey, Mention> = registry
            .mentions()
            .map(|(path, mention)| (path.clone(), mention.clone()))
            .collect();
        let summary = ImportSummary {
            spaces: workspace.spaces.len(),
            items: workspace.item_count(),
            types: schema.types.len(),
            content_items: schema.items.len(),
            relations: schema.relations.len(),
            blobs: files.len(),
            report: workspace.report.clone(),
        };
        tracing::info!(
            "[Importer::import_folder] {} spaces, {} items, {} types, {} content items, {} blobs, {} rejected",
            summary.spaces,
            summary.items,
            summary.types,
            summary.content_items,
            summary.blobs,
            summary.report.len()
        );

        self.materializer
            .materialize(ImportGraph {
                workspace,
                schema,
                mentions,
                files,
            })
            .await?;
        Ok(summary)
    }
}
