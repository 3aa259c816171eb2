//! Accumulates spaces and items, validates them and assembles them into per-space hierarchies.
//!
//! [ImportWorkspaceBuilder] is fed one entity at a time. Each addition is validated on its own
//! (field shapes, lookups, duplicate ordinal keys); cross-entity references are checked by
//! [ImportWorkspaceBuilder::validate]; [ImportWorkspaceBuilder::build] assembles every space's items
//! into trees.
//!
//! In [ImportMode::Strict] the first rejected entity fails the call that added it and an invalid
//! workspace fails `build`. In [ImportMode::Lenient] rejected entities are recorded in the
//! [ValidationReport], left out, and the run continues.
use petgraph::{algo::tarjan_scc, graph::DiGraph};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::{
    config::ImportMode,
    error::ImportError,
    hierarchy::assemble,
    paths::PathKey,
    properties::StableId,
    report::ValidationReport,
    source::TypeLookup,
};

pub mod model;
pub mod validate;


pub use model::{
    Fields, ImportContainer, ImportNode, ImportProjectType, ImportStatus, ImportTaskType,
    ImportWorkspace, ItemClass, SpaceClass,
};
use validate::{validate_item, validate_project_type, validate_space, KnownNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Empty,
    Accumulating,
    Validated,
}

/// Items of one space in insertion order.
#[derive(Debug, Default)]
struct SpaceItems {
    order: Vec<PathKey>,
    nodes: HashMap<PathKey, ImportNode>,
}

impl SpaceItems {
    /// Whether an item sharing the ordinal key `key` already holds `value`. Controlled documents
    /// and templates share the `code` key.
    fn has_ordinal(&self, key: &str, value: &Value) -> bool {
        self.nodes
            .values()
            .any(|node| node.class.ordinal_key() == Some(key) && node.field(key) == Some(value))
    }
}

#[derive(Debug)]
pub struct ImportWorkspaceBuilder {
    mode: ImportMode,
    state: BuilderState,
    known: KnownNames,
    project_types: BTreeMap<String, ImportProjectType>,
    spaces: BTreeMap<PathKey, ImportContainer>,
    items: BTreeMap<PathKey, SpaceItems>,
    parents: HashMap<PathKey, PathKey>,
    templates: HashMap<StableId, PathKey>,
    item_errors: ValidationReport,
    cross_errors: ValidationReport,
}

impl ImportWorkspaceBuilder {
    pub fn new(mode: ImportMode) -> Self {
        ImportWorkspaceBuilder {
            mode,
            state: BuilderState::Empty,
            known: KnownNames::default(),
            project_types: BTreeMap::new(),
            spaces: BTreeMap::new(),
            items: BTreeMap::new(),
            parents: HashMap::new(),
            templates: HashMap::new(),
            item_errors: ValidationReport::default(),
            cross_errors: ValidationReport::default(),
        }
    }

    pub fn mode(&self) -> ImportMode {
        self.mode
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Loads the status and category names headers may refer to.
    pub async fn init_cache<L: TypeLookup>(&mut self, lookup: &L) -> Result<&mut Self, ImportError> {
        self.known.statuses = lookup
            .issue_statuses()
            .await
            .map_err(|err| ImportError::Lookup(format!("issue statuses: {err}")))?
            .into_iter()
            .collect();
        self.known.categories = lookup
            .document_categories()
            .await
            .map_err(|err| ImportError::Lookup(format!("document categories: {err}")))?
            .into_iter()
            .collect();
        tracing::debug!(
            "[ImportWorkspaceBuilder::init_cache] {} statuses, {} categories",
            self.known.statuses.len(),
            self.known.categories.len()
        );
        Ok(self)
    }

    /// Records a rejection. Returns whether the entity passed; in strict mode a rejection is
    /// returned as the error instead.
    fn accept(&mut self, kind: &str, path: &str, errors: Vec<String>) -> Result<bool, ImportError> {
        self.state = BuilderState::Accumulating;
        if errors.is_empty() {
            return Ok(true);
        }
        let details = errors
            .iter()
            .map(|err| format!("    * {err}"))
            .collect::<Vec<_>>()
            .join("\n");
        let error = ImportError::field(path, format!("invalid {kind}:\n{details}"));
        self.reject(path, error)?;
        Ok(false)
    }

    /// Records an error found outside the builder's own checks. Strict mode returns it.
    pub fn reject(&mut self, path: &str, error: ImportError) -> Result<(), ImportError> {
        self.item_errors.push(path, error.clone());
        if self.mode.is_strict() {
            return Err(error);
        }
        tracing::warn!("[ImportWorkspaceBuilder] Skipping {path}: {error}");
        Ok(())
    }

    pub fn add_project_type(
        &mut self,
        project_type: ImportProjectType,
    ) -> Result<&mut Self, ImportError> {
        let errors = validate_project_type(&project_type);
        let name = project_type.name.clone();
        if self.accept("project type", &name, errors)? {
            self.project_types.insert(name, project_type);
        }
        Ok(self)
    }

    pub fn add_space(&mut self, container: ImportContainer) -> Result<&mut Self, ImportError> {
        let errors = validate_space(&container, &self.known);
        let path = container.path.to_string();
        if self.accept(container.class.as_str(), &path, errors)? {
            tracing::debug!("[ImportWorkspaceBuilder::add_space] {path}");
            self.spaces.insert(container.path.clone(), container);
        }
        Ok(self)
    }

    /// Adds `node` to the space at `space`. `parent` is the path of the enclosing item, which
    /// need not have been added yet.
    pub fn add_item(
        &mut self,
        space: &PathKey,
        node: ImportNode,
        parent: Option<PathKey>,
    ) -> Result<&mut Self, ImportError> {
        self.state = BuilderState::Accumulating;
        let path = node.path.to_string();
        if let Some(key) = node.class.ordinal_key() {
            if let Some(value) = node.field(key) {
                let duplicate = self
                    .items
                    .get(space)
                    .map(|items| items.has_ordinal(key, value))
                    .unwrap_or(false);
                if duplicate {
                    let error = ImportError::DuplicateKey {
                        path: path.clone(),
                        key: format!("{} {key} {value}", node.class.as_str()),
                        container: space.to_string(),
                    };
                    self.reject(&path, error)?;
                    return Ok(self);
                }
            }
        }

        let space_class = self.spaces.get(space).map(|container| container.class);
        let errors = validate_item(space_class, &node, &self.known);
        if !self.accept(node.class.as_str(), &path, errors)? {
            return Ok(self);
        }

        if let Some(parent) = parent {
            self.parents.insert(node.path.clone(), parent);
        }
        if node.class == ItemClass::DocumentTemplate {
            self.templates.insert(node.id, node.path.clone());
        }
        let items = self.items.entry(space.clone()).or_default();
        items.order.push(node.path.clone());
        items.nodes.insert(node.path.clone(), node);
        Ok(self)
    }

    /// Every error recorded so far, per-item and cross-entity.
    pub fn report(&self) -> ValidationReport {
        let mut report = self.item_errors.clone();
        report.merge(&self.cross_errors);
        report
    }

    /// Re-runs the cross-entity checks and returns the full report.
    pub fn validate(&mut self) -> ValidationReport {
        let mut cross = ValidationReport::default();
        self.check_project_types(&mut cross);
        self.check_spaces_and_templates(&mut cross);
        self.check_parents(&mut cross);
        self.cross_errors = cross;
        self.state = BuilderState::Validated;
        self.report()
    }

    fn check_project_types(&self, report: &mut ValidationReport) {
        for space in self.spaces.values() {
            let Some(name) = space.field("projectType").and_then(Value::as_str) else {
                continue;
            };
            if !self.project_types.contains_key(name) {
                report.push(
                    &space.path,
                    ImportError::field(
                        &space.path,
                        format!("referenced project type '{name}' not found"),
                    ),
                );
            }
        }
    }

    fn check_spaces_and_templates(&self, report: &mut ValidationReport) {
        for (space_path, items) in self.items.iter() {
            if !self.spaces.contains_key(space_path) {
                report.push(
                    space_path,
                    ImportError::NotFound(format!(
                        "{} items reference non-existent space {space_path}",
                        items.order.len()
                    )),
                );
                continue;
            }
            for path in items.order.iter() {
                let Some(node) = items.nodes.get(path) else {
                    continue;
                };
                if node.class != ItemClass::ControlledDocument {
                    continue;
                }
                let template = node.field("template").and_then(Value::as_str).unwrap_or_default();
                let template_path = StableId::try_from(template)
                    .ok()
                    .and_then(|id| self.templates.get(&id));
                match template_path {
                    None => report.push(
                        path,
                        ImportError::field(path, format!("template {template} not found")),
                    ),
                    Some(template_path) if !items.nodes.contains_key(template_path) => report.push(
                        path,
                        ImportError::field(
                            path,
                            format!("template {template_path} belongs to a different space"),
                        ),
                    ),
                    Some(_) => {}
                }
            }
        }
    }

    /// Parents must be items of the same space, and parent chains must not loop.
    fn check_parents(&self, report: &mut ValidationReport) {
        let space_of: HashMap<&PathKey, &PathKey> = self
            .items
            .iter()
            .flat_map(|(space, items)| items.order.iter().map(move |path| (path, space)))
            .collect();
        for (child, parent) in self.parents.iter() {
            let Some(space) = space_of.get(child) else {
                continue;
            };
            if space_of.get(parent) != Some(space) {
                report.push(
                    child,
                    ImportError::MissingParent {
                        path: child.to_string(),
                        parent: parent.to_string(),
                    },
                );
            }
        }

        let mut graph = DiGraph::<&PathKey, ()>::new();
        let mut indices = HashMap::new();
        for path in space_of.keys() {
            indices.insert(*path, graph.add_node(*path));
        }
        for (child, parent) in self.parents.iter() {
            if let (Some(c), Some(p)) = (indices.get(child), indices.get(parent)) {
                graph.add_edge(*c, *p, ());
            }
        }
        for component in tarjan_scc(&graph) {
            let looped = component.len() > 1
                || component
                    .first()
                    .map(|idx| graph.contains_edge(*idx, *idx))
                    .unwrap_or(false);
            if !looped {
                continue;
            }
            for idx in component {
                let path = graph[idx];
                report.push(
                    path,
                    ImportError::field(path, "parent chain forms a cycle"),
                );
            }
        }
    }

    /// Validates and assembles the workspace. Items whose parent is unreachable are dropped and
    /// reported as orphans.
    pub fn build(mut self) -> Result<ImportWorkspace, ImportError> {
        let mut report = self.validate();
        if self.mode.is_strict() && !report.is_valid() {
            return Err(ImportError::InvalidWorkspace(report.summary()));
        }

        let mut items = std::mem::take(&mut self.items);
        let mut spaces = Vec::with_capacity(self.spaces.len());
        for (path, mut container) in std::mem::take(&mut self.spaces) {
            if let Some(SpaceItems { order, nodes }) = items.remove(&path) {
                let assembled = assemble(&order, nodes, |item| self.parents.get(item).cloned());
                for orphan in assembled.orphans {
                    let orphan_path = orphan.path().unwrap_or_default().to_string();
                    report.push(orphan_path, orphan);
                }
                container.items = assembled.roots;
            }
            tracing::info!(
                "[ImportWorkspaceBuilder::build] {} '{}' with {} root items",
                container.class.as_str(),
                container.title().unwrap_or_default(),
                container.items.len()
            );
            spaces.push(container);
        }
        Ok(ImportWorkspace {
            project_types: self.project_types.into_values().collect(),
            spaces,
            report,
        })
    }
}
