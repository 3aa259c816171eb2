//! External collaborators of an import run, with in-memory implementations.
use std::collections::BTreeMap;

use crate::{
    error::ImportError, importer::ImportGraph, properties::BlobId, resolver::FileRecord,
};

/// Read-only lookup of names that imported headers may refer to.
pub trait TypeLookup: Sync {
    fn issue_statuses(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, ImportError>> + Send;

    fn document_categories(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, ImportError>> + Send;
}

/// Receives the bytes of every file referenced as a blob or attachment.
pub trait BlobSink: Send {
    fn put(
        &mut self,
        file: &FileRecord,
        bytes: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<(), ImportError>> + Send;
}

/// Commits a finished import graph to the target store.
pub trait Materializer: Send {
    fn materialize(
        &mut self,
        graph: ImportGraph,
    ) -> impl std::future::Future<Output = Result<(), ImportError>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticTypeLookup {
    pub statuses: Vec<String>,
    pub categories: Vec<String>,
}

impl StaticTypeLookup {
    pub fn new<S: Into<String>, C: Into<String>>(
        statuses: impl IntoIterator<Item = S>,
        categories: impl IntoIterator<Item = C>,
    ) -> Self {
        StaticTypeLookup {
            statuses: statuses.into_iter().map(Into::into).collect(),
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }
}

impl TypeLookup for StaticTypeLookup {
    async fn issue_statuses(&self) -> Result<Vec<String>, ImportError> {
        Ok(self.statuses.clone())
    }

    async fn document_categories(&self) -> Result<Vec<String>, ImportError> {
        Ok(self.categories.clone())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobSink {
    blobs: BTreeMap<BlobId, (FileRecord, Vec<u8>)>,
}

impl MemoryBlobSink {
    pub fn get(&self, id: &BlobId) -> Option<&[u8]> {
        self.blobs.get(id).map(|(_, bytes)| bytes.as_slice())
    }

    pub fn record(&self, id: &BlobId) -> Option<&FileRecord> {
        self.blobs.get(id).map(|(record, _)| record)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobSink for MemoryBlobSink {
    async fn put(&mut self, file: &FileRecord, bytes: Vec<u8>) -> Result<(), ImportError> {
        tracing::debug!(
            "[MemoryBlobSink::put] {} ({} bytes) as {}",
            file.name,
            bytes.len(),
            file.id
        );
        self.blobs.insert(file.id, (file.clone(), bytes));
        Ok(())
    }
}

/// Keeps every graph it is handed.
#[derive(Debug, Default)]
pub struct MemoryMaterializer {
    graphs: Vec<ImportGraph>,
}

impl MemoryMaterializer {
    pub fn graphs(&self) -> &[ImportGraph] {
        &self.graphs
    }

    pub fn last(&self) -> Option<&ImportGraph> {
        self.graphs.last()
    }
}

impl Materializer for MemoryMaterializer {
    async fn materialize(&mut self, graph: ImportGraph) -> Result<(), ImportError> {
        self.graphs.push(graph);
        Ok(())
    }
}
