use serde_yaml::Value;
use std::{collections::BTreeMap, path::Path};

use super::{
    output::{AttachmentDoc, ContentItem, FieldValue, FileRecord, MixinValue, RelationInstance},
    validate_format, ContentContext, RefTarget, SchemaResolver,
};
use crate::{
    codec::{
        get_str, string_list, BaseFieldType, FieldType, FormatSchema, CONTENT_EXTENSION,
        SCHEMA_EXTENSION,
    },
    error::ImportError,
    paths::{list_dir, PathKey},
    properties::StableId,
    schema::{AttributeDef, AttributeMap, FieldTag, RelationMap, ScalarType, SchemaKind, ValueType},
};

/// Header keys with built-in meaning on every content item.
const RESERVED_KEYS: [&str; 4] = ["title", "tags", "blobs", "attachments"];

impl SchemaResolver<'_> {
    /// Processes the content of `dir`. A directory described by a master type schema file switches
    /// the context to that master type; content outside any master type directory is ignored.
    pub(super) fn discover_content(
        &mut self,
        dir: &Path,
        mut ctx: ContentContext,
    ) -> Result<(), ImportError> {
        let companion = PathKey::companion_file(dir, SCHEMA_EXTENSION);
        if self.registry.schema_kind(&companion) == Some(&SchemaKind::MasterType) {
            ctx.master = Some(self.registry.id(&companion));
            ctx.attributes.extend(self.registry.attributes(&companion));
            for (name, meta) in self.registry.associations(&companion) {
                ctx.relations.insert(name.clone(), meta.clone());
            }
        }

        let listing = list_dir(dir)?;
        for file in listing.files_with_extension(CONTENT_EXTENSION) {
            let path = PathKey::new(file);
            if ctx.master.is_none() {
                tracing::debug!(
                    "[SchemaResolver::discover_content] Skipping {path}: not inside a master type directory"
                );
                continue;
            }
            self.process_item(&path, &ctx)?;
        }
        for sub_dir in listing.dirs.iter() {
            let sub_companion = PathKey::companion_file(sub_dir, SCHEMA_EXTENSION);
            match self.registry.schema_kind(&sub_companion) {
                Some(SchemaKind::MasterType) | Some(SchemaKind::MixinType) => {
                    self.discover_content(sub_dir, ctx.clone())?;
                }
                _ => tracing::debug!(
                    "[SchemaResolver::discover_content] Skipping {}: no master or mixin type file",
                    sub_dir.display()
                ),
            }
        }
        Ok(())
    }

    fn process_item(
        &mut self,
        path: &PathKey,
        ctx: &ContentContext,
    ) -> Result<StableId, ImportError> {
        let Some(master) = ctx.master else {
            return Err(ImportError::field(
                path,
                "content item is not inside a master type directory",
            ));
        };
        tracing::info!("[SchemaResolver::process_item] Processing {path}");
        let mut header = self.parser.load_header(path)?;
        header.remove("class");

        let mixin_paths: Vec<PathKey> = string_list(header.get("tags"))
            .iter()
            .map(|tag| path.resolve(tag))
            .collect();
        let mut mixin_attributes = AttributeMap::default();
        let mut relations = ctx.relations.clone();
        for mixin in mixin_paths.iter() {
            if self.registry.schema_kind(mixin) != Some(&SchemaKind::MixinType) {
                return Err(ImportError::UnresolvedReference {
                    path: path.to_string(),
                    target: mixin.to_string(),
                });
            }
            mixin_attributes.extend(self.registry.attributes(mixin));
            for (name, meta) in self.registry.associations(mixin) {
                relations.insert(name.clone(), meta.clone());
            }
        }

        let format = self.item_format(&ctx.attributes, &mixin_attributes, &relations);
        validate_format(&header, &format, path)?;

        let id = self.registry.id(path);
        let title = get_str(&header, "title").unwrap_or_default().to_string();

        let mut blobs = Vec::new();
        for blob in string_list(header.get("blobs")) {
            blobs.push(self.file_record(&path.resolve(&blob))?);
        }

        let mut fields = BTreeMap::new();
        for (key, value) in header.iter() {
            let Some(key) = key.as_str() else {
                continue;
            };
            if RESERVED_KEYS.contains(&key) || value.is_null() {
                continue;
            }
            if let Some(attribute) = ctx.attributes.get(key) {
                let coerced = self.coerce(path, attribute, value)?;
                fields.insert(attribute.name.clone(), coerced);
            } else if let Some(meta) = relations.get(key) {
                for target in string_list(Some(value)) {
                    let target_path = path.resolve(&target);
                    let other = self.registry.id(&target_path);
                    self.defer(path, &target_path, other, RefTarget::Item);
                    let (doc_a, doc_b) = match meta.field {
                        FieldTag::A => (id, other),
                        FieldTag::B => (other, id),
                    };
                    self.output.relations.push(RelationInstance {
                        id: StableId::generate(),
                        association: meta.association,
                        doc_a,
                        doc_b,
                    });
                }
            } else if !mixin_attributes.contains(key) {
                return Err(ImportError::field(
                    path,
                    format!("property '{key}' is not an attribute or relation of this item's types"),
                ));
            }
        }

        let body = self.parser.read_body(path.as_path())?;
        self.registry.set_mention(path, &master.to_string(), &title, None);
        self.output.items.push(ContentItem {
            id,
            class: master,
            path: path.clone(),
            title,
            fields,
            blobs,
            body,
            children: Vec::new(),
        });
        if let Some(parent) = &ctx.parent {
            self.output.parents.insert(path.clone(), parent.clone());
        }

        for mixin in mixin_paths.iter() {
            let mixin_id = self.registry.id(mixin);
            let attributes = self.registry.attributes(mixin).clone();
            let mut mixin_fields = BTreeMap::new();
            for attribute in attributes.iter() {
                match header.get(attribute.label.as_str()) {
                    Some(value) if !value.is_null() => {
                        let coerced = self.coerce(path, attribute, value)?;
                        mixin_fields.insert(attribute.name.clone(), coerced);
                    }
                    _ => {}
                }
            }
            self.output.mixins.push(MixinValue {
                mixin: mixin_id,
                target: id,
                fields: mixin_fields,
            });
        }

        for attachment in string_list(header.get("attachments")) {
            let attachment_path = path.resolve(&attachment);
            let file = self.file_record(&attachment_path)?;
            let attachment_id = self.registry.id(&attachment_path);
            self.output.attachments.push(AttachmentDoc {
                id: attachment_id,
                attached_to: id,
                attached_to_class: master,
                file: file.id,
                name: file.name,
                content_type: file.content_type,
                size: file.size,
            });
        }

        let children_dir = path.companion_dir();
        if children_dir.is_dir() {
            let mut child_ctx = ctx.clone();
            child_ctx.parent = Some(path.clone());
            let listing = list_dir(&children_dir)?;
            for file in listing.files_with_extension(CONTENT_EXTENSION) {
                self.process_item(&PathKey::new(file), &child_ctx)?;
            }
        }
        Ok(id)
    }

    /// Header format of an item: title, the built-in list fields, then every attribute and
    /// relation in scope.
    fn item_format(
        &self,
        attributes: &AttributeMap,
        mixin_attributes: &AttributeMap,
        relations: &RelationMap,
    ) -> FormatSchema {
        let mut format = FormatSchema::default()
            .required("title", FieldType::single(BaseFieldType::String))
            .optional("tags", FieldType::array(BaseFieldType::Path))
            .optional("blobs", FieldType::array(BaseFieldType::Path))
            .optional("attachments", FieldType::array(BaseFieldType::Path));
        for attribute in attributes.iter().chain(mixin_attributes.iter()) {
            let base = match &attribute.value_type {
                ValueType::Scalar(ScalarType::String) => BaseFieldType::String,
                ValueType::Scalar(ScalarType::Number) => BaseFieldType::Number,
                ValueType::Scalar(ScalarType::Boolean) => BaseFieldType::Boolean,
                ValueType::RefTo { .. } => BaseFieldType::Path,
                ValueType::EnumOf { of, .. } => BaseFieldType::OneOf(
                    self.registry
                        .enum_values_by_id(of)
                        .map(<[String]>::to_vec)
                        .unwrap_or_default(),
                ),
            };
            format = format.optional(
                attribute.label.clone(),
                FieldType {
                    base,
                    is_array: attribute.value_type.is_array(),
                },
            );
        }
        for (name, meta) in relations.iter() {
            format = format.optional(
                name.clone(),
                FieldType {
                    base: BaseFieldType::Path,
                    is_array: meta.is_array(),
                },
            );
        }
        format
    }

    /// Coerces a header value to an attribute's type. Array attributes keep input order and
    /// accept a single value as a one-element array.
    fn coerce(
        &mut self,
        path: &PathKey,
        attribute: &AttributeDef,
        value: &Value,
    ) -> Result<FieldValue, ImportError> {
        let values: Vec<&Value> = match value {
            Value::Sequence(items) if attribute.value_type.is_array() => items.iter().collect(),
            Value::Sequence(_) => {
                return Err(ImportError::field(
                    path,
                    format!("{} expects a single value", attribute.label),
                ))
            }
            single => vec![single],
        };
        let mut coerced = Vec::with_capacity(values.len());
        for value in values {
            coerced.push(self.coerce_one(path, attribute, value)?);
        }
        if attribute.value_type.is_array() {
            return Ok(FieldValue::Array(coerced));
        }
        coerced
            .into_iter()
            .next()
            .ok_or_else(|| ImportError::field(path, format!("{} has no value", attribute.label)))
    }

    fn coerce_one(
        &mut self,
        path: &PathKey,
        attribute: &AttributeDef,
        value: &Value,
    ) -> Result<FieldValue, ImportError> {
        let label = &attribute.label;
        let mismatch =
            |expected: &str| ImportError::field(path, format!("{label} must be {expected}"));
        match &attribute.value_type {
            ValueType::Scalar(ScalarType::String) => value
                .as_str()
                .map(|s| FieldValue::String(s.to_string()))
                .ok_or_else(|| mismatch("a string")),
            ValueType::Scalar(ScalarType::Number) => value
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| mismatch("a number")),
            ValueType::Scalar(ScalarType::Boolean) => value
                .as_bool()
                .map(FieldValue::Boolean)
                .ok_or_else(|| mismatch("a boolean")),
            ValueType::RefTo { target, .. } => {
                let relative = value.as_str().ok_or_else(|| mismatch("a path"))?;
                let target_path = path.resolve(relative);
                let id = self.registry.id(&target_path);
                self.defer(path, &target_path, id, RefTarget::ItemOf(*target));
                Ok(FieldValue::Ref(id))
            }
            ValueType::EnumOf { of, .. } => {
                let chosen = value.as_str().ok_or_else(|| mismatch("a string"))?;
                let allowed = self.registry.enum_values_by_id(of).unwrap_or_default();
                if allowed.iter().any(|v| v == chosen) {
                    Ok(FieldValue::Enum(chosen.to_string()))
                } else {
                    Err(mismatch(&format!("one of [{}]", allowed.join(", "))))
                }
            }
        }
    }

    fn file_record(&mut self, path: &PathKey) -> Result<FileRecord, ImportError> {
        if let Some(existing) = self.output.files.get(path) {
            return Ok(existing.clone());
        }
        let record = FileRecord::read(path, self.registry.blob_id(path))?;
        self.output.files.insert(path.clone(), record.clone());
        Ok(record)
    }
}
