//! User-defined type system: master types, mixin types, associations and enumerations, plus the
//! attribute and relation metadata attached to them.
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{
    codec::{get_str, Header},
    paths::PathKey,
    properties::StableId,
};

/// Class of a schema definition file, decoded once from its `class` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaKind {
    MasterType,
    MixinType,
    Association,
    Enum,
    Unknown(String),
}

impl SchemaKind {
    pub fn from_class(class: Option<&str>) -> SchemaKind {
        match class {
            Some("MasterType") | Some("card:class:MasterTag") => SchemaKind::MasterType,
            Some("MixinType") | Some("card:class:Tag") => SchemaKind::MixinType,
            Some("Association") | Some("core:class:Association") => SchemaKind::Association,
            Some("Enum") | Some("core:class:Enum") => SchemaKind::Enum,
            Some(other) => SchemaKind::Unknown(other.to_string()),
            None => SchemaKind::Unknown(String::new()),
        }
    }

    pub fn from_header(header: &Header) -> SchemaKind {
        SchemaKind::from_class(get_str(header, "class"))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SchemaKind::Unknown(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    Number,
    Boolean,
}

impl ScalarType {
    pub fn parse(name: &str) -> Option<ScalarType> {
        match name {
            "String" | "TypeString" => Some(ScalarType::String),
            "Number" | "TypeNumber" => Some(ScalarType::Number),
            "Boolean" | "TypeBoolean" => Some(ScalarType::Boolean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueType {
    Scalar(ScalarType),
    /// Reference to an item of the target master type.
    RefTo { target: StableId, is_array: bool },
    /// A value drawn from an enumeration.
    EnumOf { of: StableId, is_array: bool },
}

impl ValueType {
    pub fn is_array(&self) -> bool {
        match self {
            ValueType::Scalar(_) => false,
            ValueType::RefTo { is_array, .. } | ValueType::EnumOf { is_array, .. } => *is_array,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Generated, globally unique. Field values are keyed by this, never by label.
    pub name: String,
    pub label: String,
    pub owner: StableId,
    pub value_type: ValueType,
    pub default_value: Option<serde_json::Value>,
}

/// Attribute definitions keyed by label, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeMap(Vec<AttributeDef>);

impl AttributeMap {
    /// Inserts `def`, replacing an existing definition with the same label in place.
    pub fn insert(&mut self, def: AttributeDef) {
        match self.0.iter_mut().find(|existing| existing.label == def.label) {
            Some(existing) => *existing = def,
            None => self.0.push(def),
        }
    }

    pub fn get(&self, label: &str) -> Option<&AttributeDef> {
        self.0.iter().find(|def| def.label == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeDef> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `other` into this map; `other` wins on label collisions.
    pub fn extend(&mut self, other: &AttributeMap) {
        for def in other.iter() {
            self.insert(def.clone());
        }
    }
}

impl FromIterator<AttributeDef> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = AttributeDef>>(iter: I) -> Self {
        let mut map = AttributeMap::default();
        for def in iter {
            map.insert(def);
        }
        map
    }
}

/// Which side of an association a relation property sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldTag {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "N:N")]
    ManyToMany,
}

impl Cardinality {
    pub fn parse(value: &str) -> Option<Cardinality> {
        match value {
            "1:1" => Some(Cardinality::OneToOne),
            "1:N" => Some(Cardinality::OneToMany),
            "N:N" => Some(Cardinality::ManyToMany),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:N",
            Cardinality::ManyToMany => "N:N",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One endpoint of an association, as seen from the type that owns the relation property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMeta {
    pub association: StableId,
    pub field: FieldTag,
    pub cardinality: Cardinality,
}

impl RelationMeta {
    /// Whether the property holds many targets. A 1:N association is many-valued on its A side.
    pub fn is_array(&self) -> bool {
        match self.cardinality {
            Cardinality::ManyToMany => true,
            Cardinality::OneToMany => self.field == FieldTag::A,
            Cardinality::OneToOne => false,
        }
    }
}

/// Relation properties keyed by name.
pub type RelationMap = BTreeMap<String, RelationMeta>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationDef {
    pub id: StableId,
    pub path: PathKey,
    pub type_a: StableId,
    pub type_b: StableId,
    pub name_a: String,
    pub name_b: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub id: StableId,
    pub path: PathKey,
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Master,
    Mixin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuperType {
    Root,
    Type(StableId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaType {
    pub id: StableId,
    pub kind: TypeKind,
    pub title: String,
    pub extends: SuperType,
    pub attributes: AttributeMap,
    pub path: PathKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn attr(label: &str, scalar: ScalarType) -> AttributeDef {
        AttributeDef {
            name: crate::properties::generate_name(),
            label: label.to_string(),
            owner: StableId::nil(),
            value_type: ValueType::Scalar(scalar),
            default_value: None,
        }
    }

    #[test]
    fn schema_kinds_decode_aliases() {
        assert_eq!(SchemaKind::from_class(Some("MasterType")), SchemaKind::MasterType);
        assert_eq!(
            SchemaKind::from_class(Some("card:class:Tag")),
            SchemaKind::MixinType
        );
        assert_eq!(
            SchemaKind::from_class(Some("Space")),
            SchemaKind::Unknown("Space".to_string())
        );
        assert!(!SchemaKind::from_class(None).is_known());
    }

    #[test]
    fn attribute_map_keeps_order_and_replaces_by_label() {
        let mut map: AttributeMap = vec![attr("age", ScalarType::Number), attr("nick", ScalarType::String)]
            .into_iter()
            .collect();
        map.insert(attr("age", ScalarType::String));
        let labels: Vec<_> = map.iter().map(|def| def.label.as_str()).collect();
        assert_eq!(labels, vec!["age", "nick"]);
        assert_eq!(
            map.get("age").map(|def| &def.value_type),
            Some(&ValueType::Scalar(ScalarType::String))
        );
    }

    #[test]
    fn relation_arrays_follow_cardinality() {
        let meta = |field, cardinality| RelationMeta {
            association: StableId::nil(),
            field,
            cardinality,
        };
        assert!(meta(FieldTag::A, Cardinality::ManyToMany).is_array());
        assert!(meta(FieldTag::B, Cardinality::ManyToMany).is_array());
        assert!(meta(FieldTag::A, Cardinality::OneToMany).is_array());
        assert!(!meta(FieldTag::B, Cardinality::OneToMany).is_array());
        assert!(!meta(FieldTag::A, Cardinality::OneToOne).is_array());
    }

    #[test]
    fn cardinality_round_trips_through_strings() {
        for card in [
            Cardinality::OneToOne,
            Cardinality::OneToMany,
            Cardinality::ManyToMany,
        ] {
            assert_eq!(Cardinality::parse(card.as_str()), Some(card));
        }
        assert_eq!(Cardinality::parse("2:2"), None);
    }
}
