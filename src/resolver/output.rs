use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    error::ImportError,
    hierarchy::{assemble, Nested},
    paths::{content_type, PathKey},
    properties::{BlobId, StableId},
    schema::{AssociationDef, EnumDef, SchemaType, SuperType, TypeKind},
};

/// A coerced custom field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Ref(StableId),
    Enum(String),
    Array(Vec<FieldValue>),
}

/// A file on disk destined for blob storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: BlobId,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub path: PathKey,
}

impl FileRecord {
    /// Describes the file at `path` from its metadata. A missing file is [ImportError::NotFound].
    pub fn read(path: &PathKey, id: BlobId) -> Result<FileRecord, ImportError> {
        let metadata = std::fs::metadata(path.as_path())
            .map_err(|_| ImportError::NotFound(format!("File {path} does not exist")))?;
        let name = path.file_name();
        Ok(FileRecord {
            id,
            content_type: content_type(&name).to_string(),
            name,
            size: metadata.len(),
            path: path.clone(),
        })
    }
}

/// A file attached to a content item as a standalone document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDoc {
    pub id: StableId,
    pub attached_to: StableId,
    pub attached_to_class: StableId,
    pub file: BlobId,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

/// Values of one mixin type applied to one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixinValue {
    pub mixin: StableId,
    pub target: StableId,
    pub fields: BTreeMap<String, FieldValue>,
}

/// One edge of an association. `doc_a` sits on the association's A side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationInstance {
    pub id: StableId,
    pub association: StableId,
    pub doc_a: StableId,
    pub doc_b: StableId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: StableId,
    /// The master type this item instantiates.
    pub class: StableId,
    pub path: PathKey,
    pub title: String,
    /// Custom field values keyed by attribute name.
    pub fields: BTreeMap<String, FieldValue>,
    pub blobs: Vec<FileRecord>,
    pub body: String,
    /// Populated only by [ResolveOutput::content_tree].
    pub children: Vec<ContentItem>,
}

impl Nested for ContentItem {
    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

/// Everything the resolver produced for one import root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveOutput {
    pub types: Vec<SchemaType>,
    pub associations: Vec<AssociationDef>,
    pub enums: Vec<EnumDef>,
    /// Content items in discovery order, children flat.
    pub items: Vec<ContentItem>,
    /// Item path -> parent item path.
    pub parents: BTreeMap<PathKey, PathKey>,
    pub relations: Vec<RelationInstance>,
    pub mixins: Vec<MixinValue>,
    pub attachments: Vec<AttachmentDoc>,
    pub files: BTreeMap<PathKey, FileRecord>,
    /// Master types defined directly under the import root.
    pub top_level_types: Vec<StableId>,
}

impl ResolveOutput {
    pub fn schema_type(&self, id: &StableId) -> Option<&SchemaType> {
        self.types.iter().find(|t| &t.id == id)
    }

    pub fn type_at(&self, path: &PathKey) -> Option<&SchemaType> {
        self.types.iter().find(|t| &t.path == path)
    }

    pub fn item(&self, path: &PathKey) -> Option<&ContentItem> {
        self.items.iter().find(|item| &item.path == path)
    }

    pub fn item_by_id(&self, id: &StableId) -> Option<&ContentItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn mixins_of(&self, target: &StableId) -> impl Iterator<Item = &MixinValue> {
        let target = *target;
        self.mixins.iter().filter(move |m| m.target == target)
    }

    /// Super-types of `id`, nearest first. Walks `extends` pointers iteratively and fails on a
    /// cycle or a dangling pointer.
    pub fn ancestors(&self, id: &StableId) -> Result<Vec<StableId>, ImportError> {
        let by_id: HashMap<StableId, &SchemaType> = self.types.iter().map(|t| (t.id, t)).collect();
        let mut seen = HashSet::from([*id]);
        let mut chain = Vec::new();
        let mut current = *id;
        loop {
            let schema = by_id
                .get(&current)
                .ok_or_else(|| ImportError::NotFound(format!("Schema type {current}")))?;
            match schema.extends {
                SuperType::Root => return Ok(chain),
                SuperType::Type(parent) => {
                    if !seen.insert(parent) {
                        return Err(ImportError::field(
                            &schema.path,
                            format!("type hierarchy of {} contains a cycle", schema.title),
                        ));
                    }
                    chain.push(parent);
                    current = parent;
                }
            }
        }
    }

    /// The master type a type ultimately belongs to: itself for a master, the first master
    /// ancestor for a mixin.
    pub fn master_of(&self, id: &StableId) -> Result<StableId, ImportError> {
        if self.schema_type(id).map(|t| t.kind) == Some(TypeKind::Master) {
            return Ok(*id);
        }
        self.ancestors(id)?
            .into_iter()
            .find(|ancestor| self.schema_type(ancestor).map(|t| t.kind) == Some(TypeKind::Master))
            .ok_or_else(|| ImportError::NotFound(format!("Master type of {id}")))
    }

    /// Content items assembled into parent/child trees.
    pub fn content_tree(&self) -> (Vec<ContentItem>, Vec<ImportError>) {
        let order: Vec<PathKey> = self.items.iter().map(|item| item.path.clone()).collect();
        let items: HashMap<PathKey, ContentItem> = self
            .items
            .iter()
            .map(|item| (item.path.clone(), item.clone()))
            .collect();
        let assembled = assemble(&order, items, |path| self.parents.get(path).cloned());
        (assembled.roots, assembled.orphans)
    }
}
