use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    hierarchy::Nested, paths::PathKey, properties::StableId, report::ValidationReport,
};

/// Header fields of a space or item, as JSON.
pub type Fields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpaceClass {
    Project,
    Teamspace,
    OrgSpace,
}

impl SpaceClass {
    pub fn parse(class: &str) -> Option<SpaceClass> {
        match class {
            "Project" | "tracker:class:Project" => Some(SpaceClass::Project),
            "Teamspace" | "document:class:Teamspace" => Some(SpaceClass::Teamspace),
            "OrgSpace" | "documents:class:OrgSpace" => Some(SpaceClass::OrgSpace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceClass::Project => "Project",
            SpaceClass::Teamspace => "Teamspace",
            SpaceClass::OrgSpace => "OrgSpace",
        }
    }

    /// Whether items of `class` may live in a space of this class.
    pub fn accepts(&self, class: ItemClass) -> bool {
        matches!(
            (self, class),
            (SpaceClass::Project, ItemClass::Issue)
                | (SpaceClass::Teamspace, ItemClass::Document)
                | (SpaceClass::OrgSpace, ItemClass::ControlledDocument)
                | (SpaceClass::OrgSpace, ItemClass::DocumentTemplate)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemClass {
    Issue,
    Document,
    ControlledDocument,
    DocumentTemplate,
}

impl ItemClass {
    pub fn parse(class: &str) -> Option<ItemClass> {
        match class {
            "Issue" | "tracker:class:Issue" => Some(ItemClass::Issue),
            "Document" | "document:class:Document" => Some(ItemClass::Document),
            "ControlledDocument" | "documents:class:ControlledDocument" => {
                Some(ItemClass::ControlledDocument)
            }
            "DocumentTemplate" | "documents:mixin:DocumentTemplate" => {
                Some(ItemClass::DocumentTemplate)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::Issue => "Issue",
            ItemClass::Document => "Document",
            ItemClass::ControlledDocument => "ControlledDocument",
            ItemClass::DocumentTemplate => "DocumentTemplate",
        }
    }

    /// Field that must be unique within one container among items with the same key.
    pub fn ordinal_key(&self) -> Option<&'static str> {
        match self {
            ItemClass::Issue => Some("number"),
            ItemClass::ControlledDocument | ItemClass::DocumentTemplate => Some("code"),
            ItemClass::Document => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportNode {
    pub id: StableId,
    pub class: ItemClass,
    pub path: PathKey,
    pub fields: Fields,
    pub children: Vec<ImportNode>,
}

impl ImportNode {
    pub fn new(id: StableId, class: ItemClass, path: PathKey, fields: Fields) -> Self {
        ImportNode {
            id,
            class,
            path,
            fields,
            children: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title").and_then(Value::as_str)
    }
}

impl Nested for ImportNode {
    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

/// A space and the root items of its hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportContainer {
    pub id: StableId,
    pub class: SpaceClass,
    pub path: PathKey,
    pub fields: Fields,
    pub items: Vec<ImportNode>,
}

impl ImportContainer {
    pub fn new(id: StableId, class: SpaceClass, path: PathKey, fields: Fields) -> Self {
        ImportContainer {
            id,
            class,
            path,
            fields,
            items: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStatus {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTaskType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub statuses: Vec<ImportStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProjectType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub task_types: Vec<ImportTaskType>,
}

/// The built, hierarchical workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportWorkspace {
    pub project_types: Vec<ImportProjectType>,
    pub spaces: Vec<ImportContainer>,
    /// Everything rejected along the way. Empty after a strict build.
    pub report: ValidationReport,
}

impl ImportWorkspace {
    pub fn space(&self, path: &PathKey) -> Option<&ImportContainer> {
        self.spaces.iter().find(|space| &space.path == path)
    }

    /// Count of items across every space, children included.
    pub fn item_count(&self) -> usize {
        fn count(nodes: &[ImportNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        self.spaces.iter().map(|space| count(&space.items)).sum()
    }
}
