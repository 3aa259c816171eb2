//! Header format schemas.
//!
//! A [FormatSchema] lists the fields a YAML header may carry, which of them are required and what
//! shape each value must have. [validate_schema] checks a parsed header against one and returns
//! every problem it finds rather than stopping at the first.
use serde_yaml::{Mapping, Value};
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Clone, PartialEq)]
pub enum BaseFieldType {
    String,
    Number,
    Boolean,
    /// A path relative to the header's file that must exist on disk.
    Path,
    OneOf(Vec<String>),
    Object,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    pub base: BaseFieldType,
    pub is_array: bool,
}

impl FieldType {
    pub fn single(base: BaseFieldType) -> Self {
        FieldType {
            base,
            is_array: false,
        }
    }

    pub fn array(base: BaseFieldType) -> Self {
        FieldType {
            base,
            is_array: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatSchema {
    pub required: BTreeMap<String, FieldType>,
    pub optional: BTreeMap<String, FieldType>,
}

impl FormatSchema {
    pub fn required<N: Into<String>>(mut self, name: N, field: FieldType) -> Self {
        self.required.insert(name.into(), field);
        self
    }

    pub fn optional<N: Into<String>>(mut self, name: N, field: FieldType) -> Self {
        self.optional.insert(name.into(), field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.required.get(name).or_else(|| self.optional.get(name))
    }
}

pub fn master_type_schema() -> FormatSchema {
    FormatSchema::default()
        .required("class", FieldType::single(BaseFieldType::String))
        .required("title", FieldType::single(BaseFieldType::String))
        .optional("properties", FieldType::array(BaseFieldType::Object))
}

pub fn mixin_type_schema() -> FormatSchema {
    master_type_schema()
}

pub fn association_schema() -> FormatSchema {
    FormatSchema::default()
        .required("class", FieldType::single(BaseFieldType::String))
        .required("typeA", FieldType::single(BaseFieldType::Path))
        .required("typeB", FieldType::single(BaseFieldType::Path))
        .required(
            "type",
            FieldType::single(BaseFieldType::OneOf(vec![
                "1:1".to_string(),
                "1:N".to_string(),
                "N:N".to_string(),
            ])),
        )
        .required("nameA", FieldType::single(BaseFieldType::String))
        .required("nameB", FieldType::single(BaseFieldType::String))
}

pub fn enum_schema() -> FormatSchema {
    FormatSchema::default()
        .required("class", FieldType::single(BaseFieldType::String))
        .required("title", FieldType::single(BaseFieldType::String))
        .required("values", FieldType::array(BaseFieldType::String))
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged value",
    }
}

fn check_value(name: &str, value: &Value, base: &BaseFieldType, base_dir: &Path) -> Option<String> {
    match base {
        BaseFieldType::String if !value.is_string() => {
            Some(format!("{name} must be a string, got {}", describe(value)))
        }
        BaseFieldType::Number if !value.is_number() => {
            Some(format!("{name} must be a number, got {}", describe(value)))
        }
        BaseFieldType::Boolean if !value.is_bool() => {
            Some(format!("{name} must be a boolean, got {}", describe(value)))
        }
        BaseFieldType::Object if !value.is_mapping() => {
            Some(format!("{name} must be an object, got {}", describe(value)))
        }
        BaseFieldType::Path => match value.as_str() {
            Some(relative) if base_dir.join(relative).exists() => None,
            Some(relative) => Some(format!("{name}: path not found: {relative}")),
            None => Some(format!("{name} must be a path, got {}", describe(value))),
        },
        BaseFieldType::OneOf(values) => match value.as_str() {
            Some(v) if values.iter().any(|allowed| allowed == v) => None,
            _ => Some(format!(
                "{name} must be one of [{}], got {}",
                values.join(", "),
                serde_yaml::to_string(value)
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_else(|_| describe(value).to_string())
            )),
        },
        _ => None,
    }
}

/// Checks `data` against `schema`. Relative paths are resolved against `base_dir`. Null values
/// count as absent.
pub fn validate_schema(data: &Mapping, schema: &FormatSchema, base_dir: &Path) -> Vec<String> {
    let mut errors = Vec::new();
    for name in schema.required.keys() {
        let present = data
            .get(name.as_str())
            .map(|value| !value.is_null())
            .unwrap_or(false);
        if !present {
            errors.push(format!("Missing required field: {name}"));
        }
    }
    for (key, value) in data {
        let Some(name) = key.as_str() else {
            errors.push(format!("Field names must be strings, got {}", describe(key)));
            continue;
        };
        let Some(field) = schema.field(name) else {
            errors.push(format!("Unknown field: {name}"));
            continue;
        };
        if value.is_null() {
            continue;
        }
        match value {
            Value::Sequence(items) if field.is_array => {
                for (idx, item) in items.iter().enumerate() {
                    if let Some(err) =
                        check_value(&format!("{name}[{idx}]"), item, &field.base, base_dir)
                    {
                        errors.push(err);
                    }
                }
            }
            Value::Sequence(_) => errors.push(format!("{name} must not be an array")),
            single => {
                if let Some(err) = check_value(name, single, &field.base, base_dir) {
                    errors.push(err);
                }
            }
        }
    }
    errors
}
