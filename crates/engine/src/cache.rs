//! Session-scoped caches for schema documents and field definitions.

use std::collections::HashMap;
use std::sync::Arc;

use schemaform_types::{FieldDefinition, FieldPath, PATH_SEPARATOR, SchemaDocument};
use tracing::debug;

/// Workflow name to previously loaded schema document.
#[derive(Debug, Default, Clone)]
pub struct SchemaCache {
    documents: HashMap<String, Arc<SchemaDocument>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, workflow: &str) -> Option<Arc<SchemaDocument>> {
        let document = self.documents.get(workflow).cloned();
        if document.is_some() {
            debug!(workflow, "schema cache hit");
        }
        document
    }

    /// Stores `document` under its workflow name, replacing any earlier entry.
    pub fn insert(&mut self, document: SchemaDocument) -> Arc<SchemaDocument> {
        let document = Arc::new(document);
        self.documents.insert(document.workflow.clone(), Arc::clone(&document));
        document
    }

    pub fn contains(&self, workflow: &str) -> bool {
        self.documents.contains_key(workflow)
    }

    pub fn remove(&mut self, workflow: &str) -> Option<Arc<SchemaDocument>> {
        self.documents.remove(workflow)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Composite `{schema}::{path}` key to the field definition rendered there.
///
/// The renderer registers every array and union it emits so a later
/// add-item or select-variant action can find its definition without
/// walking the schema again.
#[derive(Debug, Default, Clone)]
pub struct FieldCache {
    entries: HashMap<String, FieldDefinition>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema_name: &str, path: &FieldPath, definition: FieldDefinition) {
        self.entries.insert(path.cache_key(schema_name), definition);
    }

    pub fn get(&self, schema_name: &str, path: &FieldPath) -> Option<&FieldDefinition> {
        self.entries.get(&path.cache_key(schema_name))
    }

    /// Drops the entries registered strictly below `path`. Used when the
    /// sub-tree under `path` is replaced or removed.
    pub fn forget_below(&mut self, schema_name: &str, path: &FieldPath) {
        if path.is_root() {
            let root = path.cache_key(schema_name);
            let prefix = format!("{}::", schema_name);
            self.entries.retain(|key, _| key == &root || !key.starts_with(&prefix));
            return;
        }
        let prefix = format!("{}{}", path.cache_key(schema_name), PATH_SEPARATOR);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        debug!(schema = schema_name, path = %path, dropped = before - self.entries.len(), "field cache entries dropped");
    }

    /// Drops the entry for `path` and everything below it.
    pub fn forget_subtree(&mut self, schema_name: &str, path: &FieldPath) {
        self.entries.remove(&path.cache_key(schema_name));
        self.forget_below(schema_name, path);
    }

    /// Drops every entry registered for `schema_name`.
    pub fn forget_schema(&mut self, schema_name: &str) {
        let prefix = format!("{}::", schema_name);
        self.entries.retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaform_types::ItemId;
    use serde_json::json;

    #[test]
    fn schema_cache_replaces_by_workflow() {
        let mut cache = SchemaCache::new();
        let schema = json!({ "properties": { "a": { "type": "string" } } });
        let first = SchemaDocument::from_json_schema("wf", &schema).unwrap();
        cache.insert(first);
        cache.insert(SchemaDocument::from_json_schema("wf", &schema).unwrap());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("wf").is_some());
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn field_cache_keys_include_schema_and_full_path() {
        let mut cache = FieldCache::new();
        let definition = FieldDefinition::from_json(&json!({ "type": "array", "items": { "type": "string" } }));
        let path = FieldPath::root().field("tags");
        cache.register("a", &path, definition.clone());

        assert_eq!(cache.get("a", &path), Some(&definition));
        assert!(cache.get("b", &path).is_none());
        assert!(cache.get("a", &FieldPath::root().field("other").field("tags")).is_none());

        cache.register("b", &path, definition);
        cache.forget_schema("a");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn forgetting_a_sub_tree_keeps_siblings() {
        let mut cache = FieldCache::new();
        let definition = FieldDefinition::from_json(&json!({ "type": "array", "items": { "type": "string" } }));
        let stores = FieldPath::root().field("stores");
        let first = stores.item(ItemId(1));
        let tenth = stores.item(ItemId(10));
        for path in [stores.clone(), first.field("tags"), first.field("bike").field("extras"), tenth.field("tags")] {
            cache.register("shop", &path, definition.clone());
        }

        cache.forget_below("shop", &first.field("bike"));
        assert!(cache.get("shop", &first.field("bike").field("extras")).is_none());
        assert!(cache.get("shop", &first.field("tags")).is_some());

        cache.forget_subtree("shop", &first);
        assert!(cache.get("shop", &first.field("tags")).is_none());
        assert!(cache.get("shop", &tenth.field("tags")).is_some());
        assert!(cache.get("shop", &stores).is_some());
        assert_eq!(cache.len(), 2);
    }
}
