//! Reading schema and content files.
//!
//! Schema files are whole-file YAML mappings (`*.yaml`). Content files (`*.md`) open with a YAML
//! header fenced by `---` lines, followed by a free-form body. Both kinds pass through the
//! [VariableTable] before anything else looks at them.
pub mod format;
pub mod frontmatter;
pub mod variables;

use serde_yaml::{Mapping, Value};
use std::{fs::read_to_string, path::Path};

use crate::{error::ImportError, paths::PathKey};

pub use format::{validate_schema, BaseFieldType, FieldType, FormatSchema};
pub use frontmatter::{split_front_matter, FRONT_MATTER_DELIMITER};
pub use variables::VariableTable;

pub const SCHEMA_EXTENSION: &str = "yaml";
pub const CONTENT_EXTENSION: &str = "md";

/// A parsed header or schema document.
pub type Header = Mapping;

#[derive(Debug, Clone, Default)]
pub struct FormatParser {
    variables: VariableTable,
}

impl FormatParser {
    pub fn new(variables: VariableTable) -> Self {
        FormatParser { variables }
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    /// Header of a content file, with no variable substitution. A file without a header yields an
    /// empty mapping.
    pub fn read_header(&self, path: &Path) -> Result<Header, ImportError> {
        let content = read_to_string(path)?;
        let (header, _) =
            split_front_matter(&content).map_err(|msg| ImportError::parse(path.display(), msg))?;
        match header {
            Some(text) => parse_mapping(path, text),
            None => Ok(Header::new()),
        }
    }

    /// Body of a content file, or the whole file when it has no header.
    pub fn read_body(&self, path: &Path) -> Result<String, ImportError> {
        let content = read_to_string(path)?;
        let (_, body) =
            split_front_matter(&content).map_err(|msg| ImportError::parse(path.display(), msg))?;
        Ok(body.to_string())
    }

    /// A whole-file YAML mapping, with no variable substitution.
    pub fn read_yaml(&self, path: &Path) -> Result<Header, ImportError> {
        let content = read_to_string(path)?;
        parse_mapping(path, &content)
    }

    pub fn resolve_variables(&self, value: Value) -> Result<Value, ImportError> {
        self.variables.resolve(value)
    }

    /// [FormatParser::read_header] followed by variable substitution.
    pub fn load_header(&self, path: &PathKey) -> Result<Header, ImportError> {
        tracing::debug!("[FormatParser::load_header] Reading {}", path);
        let header = self.read_header(path.as_path())?;
        self.variables.resolve_mapping(header)
    }

    /// [FormatParser::read_yaml] followed by variable substitution.
    pub fn load_yaml(&self, path: &PathKey) -> Result<Header, ImportError> {
        tracing::debug!("[FormatParser::load_yaml] Reading {}", path);
        let document = self.read_yaml(path.as_path())?;
        self.variables.resolve_mapping(document)
    }
}

fn parse_mapping(path: &Path, text: &str) -> Result<Header, ImportError> {
    let value: Value = serde_yaml::from_str(text)
        .map_err(|err| ImportError::parse(path.display(), err.to_string()))?;
    match value {
        Value::Null => Ok(Header::new()),
        Value::Mapping(mapping) => Ok(mapping),
        other => Err(ImportError::parse(
            path.display(),
            format!("expected a mapping, found {other:?}"),
        )),
    }
}

/// String field of a header.
pub fn get_str<'a>(header: &'a Header, key: &str) -> Option<&'a str> {
    header.get(key).and_then(Value::as_str)
}

/// A header value read as a list of strings. A single string counts as a one-element list;
/// absent and null values are empty.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
