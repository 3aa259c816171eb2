use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::Path,
};

use crate::{codec::VariableTable, error::ImportError};

/// Conventional name of an import configuration file placed next to the import root.
pub const CONFIG_FILE_NAME: &str = "import.toml";

/// Whether validation failures abort the run or are recorded and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Strict,
    Lenient,
}

impl ImportMode {
    pub fn is_strict(&self) -> bool {
        matches!(self, ImportMode::Strict)
    }
}

/// Import run configuration.
///
/// ```toml
/// mode = "lenient"
///
/// [variables]
/// team = "Platform"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImportConfig {
    pub mode: ImportMode,
    pub variables: BTreeMap<String, String>,
}

impl ImportConfig {
    pub fn new(mode: ImportMode) -> Self {
        ImportConfig {
            mode,
            ..Default::default()
        }
    }

    pub fn with_variable<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Reads a TOML configuration file. A missing file yields the default configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read import config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(ImportConfig::default());
        }
        let content = read_to_string(path)?;
        ImportConfig::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ImportError> {
        Ok(toml::from_str(content)?)
    }

    pub fn variable_table(&self) -> VariableTable {
        VariableTable::new(self.variables.clone())
    }
}
