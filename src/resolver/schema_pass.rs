use serde_yaml::{Mapping, Value};
use std::path::Path;

use super::{validate_format, RefTarget, SchemaResolver};
use crate::{
    codec::{
        format::{association_schema, enum_schema, master_type_schema, mixin_type_schema},
        get_str, string_list, Header, SCHEMA_EXTENSION,
    },
    error::ImportError,
    paths::{list_dir, PathKey},
    properties::{generate_name, StableId},
    schema::{
        AssociationDef, AttributeDef, AttributeMap, Cardinality, EnumDef, FieldTag, RelationMeta,
        ScalarType, SchemaKind, SchemaType, SuperType, TypeKind, ValueType,
    },
};

impl SchemaResolver<'_> {
    /// Registers every schema definition in `dir`. `master` is the master type whose directory
    /// this is, if any.
    pub(super) fn discover_schema(
        &mut self,
        dir: &Path,
        master: Option<StableId>,
    ) -> Result<(), ImportError> {
        let listing = list_dir(dir)?;
        for file in listing.files_with_extension(SCHEMA_EXTENSION) {
            let path = PathKey::new(file);
            let config = self.parser.load_yaml(&path)?;
            match SchemaKind::from_header(&config) {
                SchemaKind::MasterType => {
                    let extends = master.map(SuperType::Type).unwrap_or(SuperType::Root);
                    let id = self.register_type(&path, &config, TypeKind::Master, extends)?;
                    if master.is_none() {
                        self.output.top_level_types.push(id);
                    }
                    let sub_dir = path.companion_dir();
                    if sub_dir.is_dir() {
                        self.discover_schema(&sub_dir, Some(id))?;
                    }
                }
                SchemaKind::MixinType => {
                    let Some(master) = master else {
                        return Err(ImportError::field(
                            &path,
                            "mixin type must be defined inside a master type directory",
                        ));
                    };
                    self.register_mixin(&path, &config, SuperType::Type(master))?;
                }
                SchemaKind::Association => self.register_association(&path, &config)?,
                SchemaKind::Enum => self.register_enum(&path, &config)?,
                SchemaKind::Unknown(class) => {
                    tracing::debug!(
                        "[SchemaResolver::discover_schema] Skipping {path}: '{class}' is not a schema class"
                    );
                }
            }
        }
        Ok(())
    }

    fn register_type(
        &mut self,
        path: &PathKey,
        config: &Header,
        kind: TypeKind,
        extends: SuperType,
    ) -> Result<StableId, ImportError> {
        let (format, schema_kind) = match kind {
            TypeKind::Master => (master_type_schema(), SchemaKind::MasterType),
            TypeKind::Mixin => (mixin_type_schema(), SchemaKind::MixinType),
        };
        validate_format(config, &format, path)?;

        let id = self.registry.id(path);
        let title = get_str(config, "title").unwrap_or_default().to_string();
        let attributes = self.build_attributes(path, config, id)?;
        self.registry.set_attributes(path, attributes.clone());
        self.registry.set_schema_kind(path, schema_kind);
        tracing::info!(
            "[SchemaResolver::register_type] {kind:?} type '{title}' with {} attributes at {path}",
            attributes.len()
        );
        self.output.types.push(SchemaType {
            id,
            kind,
            title,
            extends,
            attributes,
            path: path.clone(),
        });
        Ok(id)
    }

    /// Registers a mixin and, recursively, the mixins defined in its same-named directory.
    fn register_mixin(
        &mut self,
        path: &PathKey,
        config: &Header,
        extends: SuperType,
    ) -> Result<(), ImportError> {
        let id = self.register_type(path, config, TypeKind::Mixin, extends)?;
        let sub_dir = path.companion_dir();
        if !sub_dir.is_dir() {
            return Ok(());
        }
        let listing = list_dir(&sub_dir)?;
        for file in listing.files_with_extension(SCHEMA_EXTENSION) {
            let child = PathKey::new(file);
            let child_config = self.parser.load_yaml(&child)?;
            if SchemaKind::from_header(&child_config) == SchemaKind::MixinType {
                self.register_mixin(&child, &child_config, SuperType::Type(id))?;
            } else {
                tracing::debug!(
                    "[SchemaResolver::register_mixin] Skipping {child}: only mixins nest under a mixin"
                );
            }
        }
        Ok(())
    }

    fn build_attributes(
        &mut self,
        path: &PathKey,
        config: &Header,
        owner: StableId,
    ) -> Result<AttributeMap, ImportError> {
        let mut attributes = AttributeMap::default();
        let properties = match config.get("properties") {
            None | Some(Value::Null) => return Ok(attributes),
            Some(Value::Sequence(items)) => items,
            Some(_) => return Err(ImportError::field(path, "properties must be an array")),
        };
        for property in properties {
            let property = property
                .as_mapping()
                .ok_or_else(|| ImportError::field(path, "each property must be an object"))?;
            let label = get_str(property, "label")
                .ok_or_else(|| ImportError::field(path, "property is missing a label"))?
                .to_string();
            let value_type = self.convert_property_type(path, &label, property)?;
            let default_value = match property.get("defaultValue") {
                None | Some(Value::Null) => None,
                Some(value) => Some(serde_json::to_value(value)?),
            };
            attributes.insert(AttributeDef {
                name: generate_name(),
                label,
                owner,
                value_type,
                default_value,
            });
        }
        Ok(attributes)
    }

    /// `refTo` and `enumOf` are resolved relative to the defining file and take precedence over
    /// `type`.
    fn convert_property_type(
        &mut self,
        path: &PathKey,
        label: &str,
        property: &Mapping,
    ) -> Result<ValueType, ImportError> {
        let is_array = property
            .get("isArray")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(ref_to) = get_str(property, "refTo") {
            let target_path = path.resolve(ref_to);
            let target = self.registry.id(&target_path);
            self.defer(path, &target_path, target, RefTarget::Type);
            return Ok(ValueType::RefTo { target, is_array });
        }
        if let Some(enum_of) = get_str(property, "enumOf") {
            let enum_path = path.resolve(enum_of);
            let of = self.registry.id(&enum_path);
            self.defer(path, &enum_path, of, RefTarget::Enum);
            return Ok(ValueType::EnumOf { of, is_array });
        }
        let type_name = get_str(property, "type").unwrap_or_default();
        ScalarType::parse(type_name)
            .map(ValueType::Scalar)
            .ok_or_else(|| ImportError::UnsupportedType {
                path: path.to_string(),
                property: label.to_string(),
                type_name: type_name.to_string(),
            })
    }

    /// The A-side type gets a relation property named `nameB`, the B-side type one named `nameA`.
    fn register_association(&mut self, path: &PathKey, config: &Header) -> Result<(), ImportError> {
        validate_format(config, &association_schema(), path)?;
        let cardinality = get_str(config, "type")
            .and_then(Cardinality::parse)
            .ok_or_else(|| ImportError::field(path, "type must be one of 1:1, 1:N, N:N"))?;
        let id = self.registry.id(path);
        let type_a_path = path.resolve(get_str(config, "typeA").unwrap_or_default());
        let type_b_path = path.resolve(get_str(config, "typeB").unwrap_or_default());
        let name_a = get_str(config, "nameA").unwrap_or_default().to_string();
        let name_b = get_str(config, "nameB").unwrap_or_default().to_string();

        self.registry.add_association(
            &type_a_path,
            &name_b,
            RelationMeta {
                association: id,
                field: FieldTag::A,
                cardinality,
            },
        );
        self.registry.add_association(
            &type_b_path,
            &name_a,
            RelationMeta {
                association: id,
                field: FieldTag::B,
                cardinality,
            },
        );
        let type_a = self.registry.id(&type_a_path);
        let type_b = self.registry.id(&type_b_path);
        self.defer(path, &type_a_path, type_a, RefTarget::Type);
        self.defer(path, &type_b_path, type_b, RefTarget::Type);
        self.registry.set_schema_kind(path, SchemaKind::Association);

        tracing::info!(
            "[SchemaResolver::register_association] {name_a} <-{cardinality}-> {name_b} at {path}"
        );
        self.output.associations.push(AssociationDef {
            id,
            path: path.clone(),
            type_a,
            type_b,
            name_a,
            name_b,
            cardinality,
        });
        Ok(())
    }

    fn register_enum(&mut self, path: &PathKey, config: &Header) -> Result<(), ImportError> {
        validate_format(config, &enum_schema(), path)?;
        let id = self.registry.id(path);
        let name = get_str(config, "title").unwrap_or_default().to_string();
        let values = string_list(config.get("values"));
        self.registry.set_enum_values(path, values.clone());
        self.registry.set_schema_kind(path, SchemaKind::Enum);
        tracing::info!(
            "[SchemaResolver::register_enum] '{name}' with {} values at {path}",
            values.len()
        );
        self.output.enums.push(EnumDef {
            id,
            path: path.clone(),
            name,
            values,
        });
        Ok(())
    }
}
