//! Form data store: one form data tree per schema.
//!
//! All mutations are synchronous. When a [`FormStorage`] mirror is attached,
//! the whole map is saved after every mutation; a failed save is logged and
//! otherwise ignored because persistence is a convenience.
//!
//! Reads for an unknown schema or path degrade to an empty object or `null`.
//! Writes create missing intermediate objects, arrays, and unions on the way.

use std::sync::Arc;

use indexmap::IndexMap;
use schemaform_types::{ArrayItem, FieldPath, FormArray, FormUnion, FormValue, ItemId, PathSegment};
use schemaform_util::{FormStorage, FormsConfig, JsonFileStorage};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FormError;

#[derive(Default)]
pub struct FormDataStore {
    trees: IndexMap<String, FormValue>,
    storage: Option<Arc<dyn FormStorage>>,
}

impl std::fmt::Debug for FormDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormDataStore")
            .field("trees", &self.trees)
            .field("persistent", &self.storage.is_some())
            .finish()
    }
}

impl FormDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store mirrored to `storage`. Previously saved trees are restored.
    pub fn with_storage(storage: Arc<dyn FormStorage>) -> Self {
        let trees = match storage.load() {
            Ok(Some(stored)) => {
                debug!(forms = stored.forms.len(), saved_at = %stored.saved_at, "restored saved form data");
                stored.forms
            }
            Ok(None) => IndexMap::new(),
            Err(error) => {
                warn!(error = %error, "failed to read saved form data; starting empty");
                IndexMap::new()
            }
        };
        Self {
            trees,
            storage: Some(storage),
        }
    }

    /// A store mirrored to the configured storage file when `persist` is on.
    pub fn from_config(config: &FormsConfig) -> Self {
        if config.persist {
            Self::with_storage(Arc::new(JsonFileStorage::new(config.storage_file())))
        } else {
            Self::new()
        }
    }

    /// Replaces the tree for `schema` with `defaults`.
    pub fn initialize(&mut self, schema: &str, defaults: FormValue) {
        self.trees.insert(schema.to_string(), defaults);
        self.persist();
    }

    pub fn contains(&self, schema: &str) -> bool {
        self.trees.contains_key(schema)
    }

    /// Sets a top-level field of the schema's tree.
    pub fn set_value(&mut self, schema: &str, field: &str, value: Value) -> Result<(), FormError> {
        self.set_at_path(schema, &FieldPath::root().field(field), FormValue::Scalar(value))
    }

    /// Sets `child` inside the top-level object field `parent`.
    pub fn set_nested_value(&mut self, schema: &str, parent: &str, child: &str, value: Value) -> Result<(), FormError> {
        self.set_at_path(schema, &FieldPath::root().field(parent).field(child), FormValue::Scalar(value))
    }

    /// Writes `value` at `path`. Missing or `null` intermediate fields become
    /// empty objects; items must already exist.
    pub fn set_at_path(&mut self, schema: &str, path: &FieldPath, value: FormValue) -> Result<(), FormError> {
        let (parent_path, last) = match (path.parent(), path.last()) {
            (Some(parent), Some(last)) => (parent, last.clone()),
            _ => {
                self.trees.insert(schema.to_string(), value);
                self.persist();
                return Ok(());
            }
        };

        let parent = self.node_mut(schema, &parent_path, FormValue::empty_object)?;
        if matches!(parent, FormValue::Scalar(Value::Null)) {
            *parent = FormValue::empty_object();
        }
        match last {
            PathSegment::Field(name) => {
                let fields = parent.fields_mut().ok_or_else(|| unknown_path(schema, path))?;
                fields.insert(name, value);
            }
            PathSegment::Item(id) => {
                let array = parent.as_array_mut().ok_or_else(|| not_an_array(schema, &parent_path))?;
                let slot = array.by_id_mut(id).ok_or_else(|| unknown_item(&parent_path, id))?;
                *slot = value;
            }
        }
        self.persist();
        Ok(())
    }

    /// Appends `value` to the array at `path`, creating the array if absent.
    pub fn add_array_item(&mut self, schema: &str, path: &FieldPath, value: FormValue) -> Result<(usize, ItemId), FormError> {
        let array = self.array_mut(schema, path)?;
        let added = array.push(value);
        debug!(schema, path = %path, index = added.0, item = %added.1, "added array item");
        self.persist();
        Ok(added)
    }

    /// Overwrites the item at `index`.
    pub fn replace_array_item(&mut self, schema: &str, path: &FieldPath, index: usize, value: FormValue) -> Result<(), FormError> {
        let array = self.array_mut(schema, path)?;
        let len = array.len();
        let item = array.get_mut(index).ok_or_else(|| out_of_range(path, index, len))?;
        item.value = value;
        self.persist();
        Ok(())
    }

    /// Overlays `partial` onto the item at `index`.
    pub fn merge_array_item(&mut self, schema: &str, path: &FieldPath, index: usize, partial: FormValue) -> Result<(), FormError> {
        let array = self.array_mut(schema, path)?;
        let len = array.len();
        let item = array.get_mut(index).ok_or_else(|| out_of_range(path, index, len))?;
        item.value.merge(partial);
        self.persist();
        Ok(())
    }

    /// Removes the item at `index`; later items move down one position.
    pub fn remove_array_item(&mut self, schema: &str, path: &FieldPath, index: usize) -> Result<ArrayItem, FormError> {
        let array = self.array_mut(schema, path)?;
        let len = array.len();
        let removed = array.remove(index).ok_or_else(|| out_of_range(path, index, len))?;
        debug!(schema, path = %path, index, item = %removed.id, "removed array item");
        self.persist();
        Ok(removed)
    }

    /// Selects `label` for the union at `path`, discarding the previous
    /// variant's fields. Returns the previously selected label.
    pub fn select_variant(
        &mut self,
        schema: &str,
        path: &FieldPath,
        label: &str,
        fields: IndexMap<String, FormValue>,
    ) -> Result<Option<String>, FormError> {
        let node = self.node_mut(schema, path, || FormValue::Union(FormUnion::default()))?;
        if matches!(node, FormValue::Scalar(Value::Null)) {
            *node = FormValue::Union(FormUnion::default());
        }
        let union = node.as_union_mut().ok_or_else(|| FormError::NotAUnion {
            schema: schema.to_string(),
            path: path.to_string(),
        })?;
        let previous = union.variant.take();
        union.select(label, fields);
        self.persist();
        Ok(previous)
    }

    /// The stored tree for `schema`.
    pub fn tree(&self, schema: &str) -> Option<&FormValue> {
        self.trees.get(schema)
    }

    /// Node at `path`, if present.
    pub fn get(&self, schema: &str, path: &FieldPath) -> Option<&FormValue> {
        self.trees.get(schema)?.get_path(path)
    }

    /// Plain JSON at `path`; `null` when absent.
    pub fn value_at(&self, schema: &str, path: &FieldPath) -> Value {
        self.get(schema, path).map(FormValue::to_json).unwrap_or(Value::Null)
    }

    /// The schema's tree as plain JSON; an empty object for unknown schemas.
    pub fn collect(&self, schema: &str) -> Value {
        self.trees
            .get(schema)
            .map(FormValue::to_json)
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// Every stored tree keyed by schema name.
    pub fn trees(&self) -> &IndexMap<String, FormValue> {
        &self.trees
    }

    /// Forgets the tree for `schema`.
    pub fn reset(&mut self, schema: &str) {
        self.trees.shift_remove(schema);
        self.persist();
    }

    /// Forgets every tree and the saved snapshot.
    pub fn clear(&mut self) {
        self.trees.clear();
        if let Some(storage) = &self.storage
            && let Err(error) = storage.clear()
        {
            warn!(error = %error, "failed to clear saved form data");
        }
    }

    fn array_mut(&mut self, schema: &str, path: &FieldPath) -> Result<&mut FormArray, FormError> {
        let node = self.node_mut(schema, path, || FormValue::Array(FormArray::new()))?;
        if matches!(node, FormValue::Scalar(Value::Null)) {
            *node = FormValue::Array(FormArray::new());
        }
        node.as_array_mut().ok_or_else(|| not_an_array(schema, path))
    }

    /// Walks to `path`, creating missing fields on the way. The final node is
    /// created with `create` when absent; intermediates become empty objects.
    fn node_mut(&mut self, schema: &str, path: &FieldPath, create: impl FnOnce() -> FormValue) -> Result<&mut FormValue, FormError> {
        let segments = path.segments();
        let mut current = self.trees.entry(schema.to_string()).or_default();
        let mut walked = FieldPath::root();
        let mut create = Some(create);
        for (position, segment) in segments.iter().enumerate() {
            let is_last = position + 1 == segments.len();
            current = match segment {
                PathSegment::Field(name) => {
                    if matches!(current, FormValue::Scalar(Value::Null)) {
                        *current = FormValue::empty_object();
                    }
                    let fields = current.fields_mut().ok_or_else(|| unknown_path(schema, &walked))?;
                    fields.entry(name.clone()).or_insert_with(|| match create.take() {
                        Some(create) if is_last => create(),
                        _ => FormValue::empty_object(),
                    })
                }
                PathSegment::Item(id) => {
                    let array = current.as_array_mut().ok_or_else(|| not_an_array(schema, &walked))?;
                    array.by_id_mut(*id).ok_or_else(|| unknown_item(&walked, *id))?
                }
            };
            walked = match segment {
                PathSegment::Field(name) => walked.field(name),
                PathSegment::Item(id) => walked.item(*id),
            };
        }
        Ok(current)
    }

    fn persist(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(error) = storage.save(&self.trees) {
            warn!(error = %error, "failed to save form data; continuing without persistence");
        }
    }
}

fn unknown_path(schema: &str, path: &FieldPath) -> FormError {
    FormError::UnknownPath {
        schema: schema.to_string(),
        path: path.to_string(),
    }
}

fn not_an_array(schema: &str, path: &FieldPath) -> FormError {
    FormError::NotAnArray {
        schema: schema.to_string(),
        path: path.to_string(),
    }
}

fn unknown_item(path: &FieldPath, id: ItemId) -> FormError {
    FormError::UnknownItem {
        path: path.to_string(),
        item: id.to_string(),
    }
}

fn out_of_range(path: &FieldPath, index: usize, len: usize) -> FormError {
    FormError::IndexOutOfRange {
        path: path.to_string(),
        index,
        len,
    }
}
