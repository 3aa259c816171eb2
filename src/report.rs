use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ImportError;

/// Validation errors keyed by the source path they were found in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    errors: BTreeMap<String, Vec<ImportError>>,
}

impl ValidationReport {
    pub fn push<P: ToString>(&mut self, path: P, error: ImportError) {
        self.errors.entry(path.to_string()).or_default().push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of errors across all paths.
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn get(&self, path: &str) -> &[ImportError] {
        self.errors.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImportError)> {
        self.errors
            .iter()
            .flat_map(|(path, errors)| errors.iter().map(move |err| (path.as_str(), err)))
    }

    pub fn merge(&mut self, other: &ValidationReport) {
        for (path, error) in other.iter() {
            self.push(path, error.clone());
        }
    }

    /// One `    * path: error` line per error.
    pub fn summary(&self) -> String {
        self.iter()
            .map(|(path, err)| format!("    * {path}: {err}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
