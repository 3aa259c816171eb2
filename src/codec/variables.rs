use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::error::ImportError;

static VARIABLE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("variable token pattern is valid"));

/// Upper bound on substitutions within one string. A table whose values refer back to
/// themselves would otherwise never settle.
pub const MAX_EXPANSIONS: usize = 256;

/// Named `${var}` values substituted into every string of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableTable(BTreeMap<String, String>);

impl VariableTable {
    pub fn new(variables: BTreeMap<String, String>) -> Self {
        VariableTable(variables)
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Walks mappings, sequences and tagged values, expanding every string. Keys are left as
    /// written.
    pub fn resolve(&self, value: Value) -> Result<Value, ImportError> {
        match value {
            Value::String(string) => Ok(Value::String(self.expand(&string)?)),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Value::Mapping(mapping) => self.resolve_mapping(mapping).map(Value::Mapping),
            Value::Tagged(mut tagged) => {
                let inner = std::mem::replace(&mut tagged.value, Value::Null);
                tagged.value = self.resolve(inner)?;
                Ok(Value::Tagged(tagged))
            }
            other => Ok(other),
        }
    }

    pub fn resolve_mapping(&self, mapping: Mapping) -> Result<Mapping, ImportError> {
        let mut resolved = Mapping::with_capacity(mapping.len());
        for (key, value) in mapping {
            resolved.insert(key, self.resolve(value)?);
        }
        Ok(resolved)
    }

    /// Replaces `${name}` tokens until none remain. Substituted text is scanned again, so a
    /// value may itself refer to another variable.
    pub fn expand(&self, input: &str) -> Result<String, ImportError> {
        let mut current = input.to_string();
        for _ in 0..MAX_EXPANSIONS {
            let Some(found) = VARIABLE_TOKEN.find(&current) else {
                return Ok(current);
            };
            let range = found.range();
            let name = &current[range.start + 2..range.end - 1];
            let replacement = self
                .0
                .get(name)
                .ok_or_else(|| ImportError::MissingVariable(name.to_string()))?
                .clone();
            current.replace_range(range, &replacement);
        }
        Err(ImportError::Custom(format!(
            "Variable expansion of '{input}' did not settle after {MAX_EXPANSIONS} substitutions"
        )))
    }
}
