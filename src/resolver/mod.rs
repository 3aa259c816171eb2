//! Two-phase schema-then-content resolution.
//!
//! The schema pass walks the import root for `*.yaml` definitions: master types (whose same-named
//! directory holds nested types, mixins and content), mixin types, associations and enumerations.
//! It completes over the whole tree before the content pass starts, so any content file may refer
//! to any type, relation or enum regardless of where it sits or in what order files are read.
//!
//! The content pass walks master type directories for `*.md` items, validates each header against
//! the attributes and relations in scope, coerces field values, emits relation instances and
//! mixin values, and recurses into an item's same-named directory for its children.
//!
//! Forward references to other items are resolved through the [MetadataRegistry] and checked once
//! both passes are done: any reference that never resolved to a real type, enum or item fails the
//! run with [ImportError::UnresolvedReference].
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use crate::{
    codec::{validate_schema, FormatParser, FormatSchema, Header},
    error::ImportError,
    paths::{absolute_root, PathKey},
    properties::StableId,
    registry::MetadataRegistry,
    schema::{AttributeMap, RelationMap},
};

mod content_pass;
pub mod output;
mod schema_pass;

pub use output::{
    AttachmentDoc, ContentItem, FieldValue, FileRecord, MixinValue, RelationInstance,
    ResolveOutput,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefTarget {
    Type,
    Enum,
    Item,
    /// An item of the given master type or one of its sub-types.
    ItemOf(StableId),
}

#[derive(Debug, Clone)]
struct PendingRef {
    source: PathKey,
    target: PathKey,
    id: StableId,
    expect: RefTarget,
}

/// State carried down the content pass. Cloned per directory so sibling master types never see
/// each other's attributes.
#[derive(Debug, Clone, Default)]
struct ContentContext {
    master: Option<StableId>,
    attributes: AttributeMap,
    relations: RelationMap,
    parent: Option<PathKey>,
}

pub struct SchemaResolver<'a> {
    registry: &'a mut MetadataRegistry,
    parser: &'a FormatParser,
    output: ResolveOutput,
    pending: Vec<PendingRef>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(registry: &'a mut MetadataRegistry, parser: &'a FormatParser) -> Self {
        SchemaResolver {
            registry,
            parser,
            output: ResolveOutput::default(),
            pending: Vec::new(),
        }
    }

    pub fn resolve<P: AsRef<Path>>(mut self, root: P) -> Result<ResolveOutput, ImportError> {
        let root = absolute_root(root)?;
        tracing::info!("[SchemaResolver::resolve] Schema pass over {}", root.display());
        self.discover_schema(&root, None)?;
        self.check_type_hierarchy()?;

        tracing::info!("[SchemaResolver::resolve] Content pass over {}", root.display());
        self.discover_content(&root, ContentContext::default())?;
        self.check_references()?;

        tracing::info!(
            "[SchemaResolver::resolve] Resolved {} types, {} associations, {} enums, {} items, {} relations",
            self.output.types.len(),
            self.output.associations.len(),
            self.output.enums.len(),
            self.output.items.len(),
            self.output.relations.len()
        );
        Ok(self.output)
    }

    fn defer(&mut self, source: &PathKey, target: &PathKey, id: StableId, expect: RefTarget) {
        self.pending.push(PendingRef {
            source: source.clone(),
            target: target.clone(),
            id,
            expect,
        });
    }

    fn check_type_hierarchy(&self) -> Result<(), ImportError> {
        for schema in self.output.types.iter() {
            self.output.master_of(&schema.id)?;
        }
        Ok(())
    }

    fn check_references(&self) -> Result<(), ImportError> {
        let types: HashSet<StableId> = self.output.types.iter().map(|t| t.id).collect();
        let enums: HashSet<StableId> = self.output.enums.iter().map(|e| e.id).collect();
        let items: HashMap<StableId, StableId> = self
            .output
            .items
            .iter()
            .map(|item| (item.id, item.class))
            .collect();
        for pending in self.pending.iter() {
            let resolved = match pending.expect {
                RefTarget::Type => types.contains(&pending.id),
                RefTarget::Enum => enums.contains(&pending.id),
                RefTarget::Item => items.contains_key(&pending.id),
                RefTarget::ItemOf(master) => match items.get(&pending.id) {
                    Some(class) => {
                        *class == master || self.output.ancestors(class)?.contains(&master)
                    }
                    None => false,
                },
            };
            if !resolved {
                return Err(ImportError::UnresolvedReference {
                    path: pending.source.to_string(),
                    target: pending.target.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Fails with every format problem of `header` in one message.
fn validate_format(
    header: &Header,
    format: &FormatSchema,
    path: &PathKey,
) -> Result<(), ImportError> {
    let errors = validate_schema(header, format, path.dir());
    if errors.is_empty() {
        return Ok(());
    }
    let details = errors
        .iter()
        .map(|err| format!("    * {err}"))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ImportError::field(path, format!("invalid format:\n{details}")))
}
