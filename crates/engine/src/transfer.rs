//! Export and import of a single schema's form data.
//!
//! An export wraps the collected JSON with the workflow name and a
//! timestamp. It also carries the exact tree (item ids, selected variants)
//! so a replace-import restores a deep-equal tree; exports written by other
//! tools may omit it, in which case the JSON is hydrated against the schema.

use chrono::{DateTime, Utc};
use schemaform_types::{FormValue, SchemaDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hydrate::hydrate_model;

/// How imported data combines with the current tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStrategy {
    /// Discard the current tree.
    #[default]
    Replace,
    /// Overlay imported object keys onto the current tree.
    Merge,
}

impl std::str::FromStr for ImportStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown import strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormExport {
    pub workflow: String,
    /// RFC 3339 timestamp.
    pub exported_at: DateTime<Utc>,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<FormValue>,
}

impl FormExport {
    pub fn new(workflow: impl Into<String>, tree: &FormValue) -> Self {
        Self {
            workflow: workflow.into(),
            exported_at: Utc::now(),
            data: tree.to_json(),
            tree: Some(tree.clone()),
        }
    }

    /// Tree to import for `document`: the exact tree when present, else the
    /// data hydrated against the root model.
    pub fn to_tree(&self, document: &SchemaDocument) -> FormValue {
        if let Some(tree) = &self.tree {
            return tree.clone();
        }
        match document.root_model() {
            Some(model) => hydrate_model(model, &self.data, document),
            None => FormValue::from_json(&self.data),
        }
    }
}

/// Combines `imported` with `current` according to `strategy`.
pub fn combine(current: Option<&FormValue>, imported: FormValue, strategy: ImportStrategy) -> FormValue {
    match (strategy, current) {
        (ImportStrategy::Merge, Some(current)) => {
            let mut merged = current.clone();
            merged.merge(imported);
            merged
        }
        _ => imported,
    }
}
