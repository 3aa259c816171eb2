use std::{fmt, io, path::StripPrefixError};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use serde_yaml::Error as YamlError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ImportError {
    #[error("Malformed front matter in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("Missing variable '${{{0}}}'")]
    MissingVariable(String),
    #[error("Unresolved reference in {path}: {target} is not a known type or item")]
    UnresolvedReference { path: String, target: String },
    #[error("Unsupported type '{type_name}' for property '{property}' in {path}")]
    UnsupportedType {
        path: String,
        property: String,
        type_name: String,
    },
    #[error("{path}: {message}")]
    FieldValidation { path: String, message: String },
    #[error("Duplicate {key} in {container} ({path})")]
    DuplicateKey {
        path: String,
        key: String,
        container: String,
    },
    #[error("Parent {parent} of {path} is not an item of the same container")]
    MissingParent { path: String, parent: String },
    #[error("Orphaned item {path}: parent {parent} is unreachable, item dropped from the hierarchy")]
    Orphaned { path: String, parent: String },
    #[error("Unknown class '{class}' in {path}")]
    UnknownClass { path: String, class: String },
    #[error("Invalid workspace:\n{0}")]
    InvalidWorkspace(String),
    #[error("Type lookup error: {0}")]
    Lookup(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Custom error: {0}")]
    Custom(String),
}

impl ImportError {
    pub fn field<P: fmt::Display, M: Into<String>>(path: P, message: M) -> ImportError {
        ImportError::FieldValidation {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn parse<P: fmt::Display, M: Into<String>>(path: P, message: M) -> ImportError {
        ImportError::Parse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// The source path this error is attributed to, when it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ImportError::Parse { path, .. }
            | ImportError::UnresolvedReference { path, .. }
            | ImportError::UnsupportedType { path, .. }
            | ImportError::FieldValidation { path, .. }
            | ImportError::DuplicateKey { path, .. }
            | ImportError::MissingParent { path, .. }
            | ImportError::Orphaned { path, .. }
            | ImportError::UnknownClass { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<StripPrefixError> for ImportError {
    fn from(src: StripPrefixError) -> ImportError {
        ImportError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for ImportError {
    fn from(src: toml::de::Error) -> ImportError {
        ImportError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<JsonError> for ImportError {
    fn from(src: JsonError) -> ImportError {
        ImportError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<YamlError> for ImportError {
    fn from(src: YamlError) -> ImportError {
        ImportError::Serialization(format!("YAML (de)serialization error: {src}"))
    }
}

impl From<uuid::Error> for ImportError {
    fn from(src: uuid::Error) -> ImportError {
        ImportError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for ImportError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ImportError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => ImportError::PermissionDenied,
            _ => ImportError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<walkdir::Error> for ImportError {
    fn from(x: walkdir::Error) -> Self {
        match x.into_io_error() {
            Some(io_error) => io_error.into(),
            None => ImportError::Io("Directory walk hit a symlink loop".to_string()),
        }
    }
}

impl From<fmt::Error> for ImportError {
    fn from(x: fmt::Error) -> Self {
        ImportError::Custom(format!("{x}"))
    }
}

impl From<RegexError> for ImportError {
    fn from(x: RegexError) -> Self {
        ImportError::Serialization(format!("Regex parse failed: {x}"))
    }
}
