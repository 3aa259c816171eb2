//! Path-keyed identity and metadata registry.
//!
//! The registry lets any file refer to any other file before that file has been read: asking for
//! the [StableId] of a path allocates one on first sight and returns the same id forever after.
//! Attribute maps, relation maps, mention metadata and enum values written by one file are read
//! back by whichever file is processed later.
//!
//! Storage is a dense arena. Each distinct [PathKey] gets a [PathIdx] the first time it is seen and
//! all per-path metadata lives in parallel vectors indexed by it.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    paths::PathKey,
    properties::{BlobId, StableId},
    schema::{AttributeMap, RelationMap, RelationMeta, SchemaKind},
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathIdx(u32);

impl PathIdx {
    fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Display metadata used to render links to an imported entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: StableId,
    pub class: String,
    pub title: String,
}

#[derive(Debug, Default)]
pub struct MetadataRegistry {
    index: HashMap<PathKey, PathIdx>,
    by_id: HashMap<StableId, PathIdx>,
    paths: Vec<PathKey>,
    ids: Vec<Option<StableId>>,
    blob_ids: Vec<Option<BlobId>>,
    attributes: Vec<AttributeMap>,
    associations: Vec<RelationMap>,
    mentions: Vec<Option<Mention>>,
    enum_values: Vec<Option<Vec<String>>>,
    schema_kinds: Vec<Option<SchemaKind>>,
    empty_attributes: AttributeMap,
    empty_relations: RelationMap,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        MetadataRegistry::default()
    }

    /// Number of distinct paths seen.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Forgets every path and all metadata.
    pub fn reset(&mut self) {
        tracing::debug!("[MetadataRegistry::reset] Dropping {} paths", self.paths.len());
        *self = MetadataRegistry::default();
    }

    fn slot(&mut self, path: &PathKey) -> PathIdx {
        if let Some(idx) = self.index.get(path) {
            return *idx;
        }
        let idx = PathIdx(self.paths.len() as u32);
        self.index.insert(path.clone(), idx);
        self.paths.push(path.clone());
        self.ids.push(None);
        self.blob_ids.push(None);
        self.attributes.push(AttributeMap::default());
        self.associations.push(RelationMap::new());
        self.mentions.push(None);
        self.enum_values.push(None);
        self.schema_kinds.push(None);
        idx
    }

    fn find(&self, path: &PathKey) -> Option<usize> {
        self.index.get(path).map(PathIdx::as_usize)
    }

    /// The stable id of `path`, allocated on first request.
    pub fn id(&mut self, path: &PathKey) -> StableId {
        let idx = self.slot(path).as_usize();
        if let Some(id) = self.ids[idx] {
            return id;
        }
        let id = StableId::generate();
        self.ids[idx] = Some(id);
        self.by_id.insert(id, PathIdx(idx as u32));
        id
    }

    /// The stable id of `path` if one has already been allocated.
    pub fn peek_id(&self, path: &PathKey) -> Option<StableId> {
        self.find(path).and_then(|idx| self.ids[idx])
    }

    /// Reverse lookup of [MetadataRegistry::id].
    pub fn path_of(&self, id: &StableId) -> Option<&PathKey> {
        self.by_id.get(id).map(|idx| &self.paths[idx.as_usize()])
    }

    /// The blob id of `path`, allocated on first request. Independent of [MetadataRegistry::id].
    pub fn blob_id(&mut self, path: &PathKey) -> BlobId {
        let idx = self.slot(path).as_usize();
        *self.blob_ids[idx].get_or_insert_with(BlobId::generate)
    }

    pub fn set_attributes(&mut self, path: &PathKey, attributes: AttributeMap) {
        let idx = self.slot(path).as_usize();
        self.attributes[idx] = attributes;
    }

    /// Attributes set for `path`, or an empty map.
    pub fn attributes(&self, path: &PathKey) -> &AttributeMap {
        self.find(path)
            .map(|idx| &self.attributes[idx])
            .unwrap_or(&self.empty_attributes)
    }

    /// Appends a relation property to `path`. A later entry with the same name replaces the
    /// earlier one.
    pub fn add_association(&mut self, path: &PathKey, name: &str, meta: RelationMeta) {
        let idx = self.slot(path).as_usize();
        self.associations[idx].insert(name.to_string(), meta);
    }

    /// Relation properties added for `path`, or an empty map.
    pub fn associations(&self, path: &PathKey) -> &RelationMap {
        self.find(path)
            .map(|idx| &self.associations[idx])
            .unwrap_or(&self.empty_relations)
    }

    /// Records link metadata. The mention id defaults to the path's stable id.
    pub fn set_mention(
        &mut self,
        path: &PathKey,
        class: &str,
        title: &str,
        id_override: Option<StableId>,
    ) {
        let id = match id_override {
            Some(id) => id,
            None => self.id(path),
        };
        let idx = self.slot(path).as_usize();
        self.mentions[idx] = Some(Mention {
            id,
            class: class.to_string(),
            title: title.to_string(),
        });
    }

    pub fn has_mention(&self, path: &PathKey) -> bool {
        self.mention(path).is_some()
    }

    pub fn mention(&self, path: &PathKey) -> Option<&Mention> {
        self.find(path).and_then(|idx| self.mentions[idx].as_ref())
    }

    pub fn mentions(&self) -> impl Iterator<Item = (&PathKey, &Mention)> {
        self.paths
            .iter()
            .zip(self.mentions.iter())
            .filter_map(|(path, mention)| mention.as_ref().map(|m| (path, m)))
    }

    pub fn set_enum_values(&mut self, path: &PathKey, values: Vec<String>) {
        let idx = self.slot(path).as_usize();
        self.enum_values[idx] = Some(values);
    }

    pub fn enum_values(&self, path: &PathKey) -> Option<&[String]> {
        self.find(path)
            .and_then(|idx| self.enum_values[idx].as_deref())
    }

    pub fn enum_values_by_id(&self, id: &StableId) -> Option<&[String]> {
        self.by_id
            .get(id)
            .and_then(|idx| self.enum_values[idx.as_usize()].as_deref())
    }

    pub fn set_schema_kind(&mut self, path: &PathKey, kind: SchemaKind) {
        let idx = self.slot(path).as_usize();
        self.schema_kinds[idx] = Some(kind);
    }

    /// Class of a schema file seen by the schema pass.
    pub fn schema_kind(&self, path: &PathKey) -> Option<&SchemaKind> {
        self.find(path)
            .and_then(|idx| self.schema_kinds[idx].as_ref())
    }
}
