//! Form data tree: the live value structure a user fills in for one schema.
//!
//! Arrays keep a stable [`ItemId`] per item, assigned at creation and never
//! reused within that array, so removing an item does not renumber its
//! siblings' DOM ids. Unions keep the selected variant label next to the
//! variant's fields; collecting the tree as JSON drops both bookkeeping pieces.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

use crate::path::{FieldPath, PathSegment};

/// Stable identifier of an array item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One item of a [`FormArray`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayItem {
    pub id: ItemId,
    pub value: FormValue,
}

/// Ordered items with id allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormArray {
    items: Vec<ArrayItem>,
    next_id: u64,
}

impl FormArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an array whose ids follow the positions of `values`.
    pub fn from_values(values: impl IntoIterator<Item = FormValue>) -> Self {
        let mut array = Self::new();
        for value in values {
            array.push(value);
        }
        array
    }

    /// Appends an item, returning its position and new id.
    pub fn push(&mut self, value: FormValue) -> (usize, ItemId) {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.items.push(ArrayItem { id, value });
        (self.items.len() - 1, id)
    }

    /// Removes the item at `index`; later items shift down by one.
    pub fn remove(&mut self, index: usize) -> Option<ArrayItem> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&ArrayItem> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ArrayItem> {
        self.items.get_mut(index)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn by_id(&self, id: ItemId) -> Option<&FormValue> {
        self.items.iter().find(|item| item.id == id).map(|item| &item.value)
    }

    pub fn by_id_mut(&mut self, id: ItemId) -> Option<&mut FormValue> {
        self.items.iter_mut().find(|item| item.id == id).map(|item| &mut item.value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrayItem> {
        self.items.iter()
    }
}

/// Selected union variant and its fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormUnion {
    /// Label of the selected alternative; `None` while unselected.
    pub variant: Option<String>,
    pub fields: IndexMap<String, FormValue>,
}

impl FormUnion {
    /// Replaces any previous selection with `label` and its fields.
    pub fn select(&mut self, label: impl Into<String>, fields: IndexMap<String, FormValue>) {
        self.variant = Some(label.into());
        self.fields = fields;
    }

    pub fn clear(&mut self) {
        self.variant = None;
        self.fields.clear();
    }
}

/// Node of a form data tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FormValue {
    Scalar(Value),
    Object(IndexMap<String, FormValue>),
    Array(FormArray),
    Union(FormUnion),
}

impl Default for FormValue {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl FormValue {
    pub fn empty_object() -> Self {
        Self::Object(IndexMap::new())
    }

    pub fn null() -> Self {
        Self::Scalar(Value::Null)
    }

    /// Converts plain JSON into a tree without schema knowledge: objects stay
    /// objects, arrays get fresh ids, everything else is a scalar.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(key, nested)| (key.clone(), Self::from_json(nested)))
                    .collect(),
            ),
            Value::Array(items) => Self::Array(FormArray::from_values(items.iter().map(Self::from_json))),
            other => Self::Scalar(other.clone()),
        }
    }

    /// Collects the tree as plain JSON, dropping item ids and union bookkeeping.
    /// An unselected union collects as `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Object(fields) => Value::Object(fields_to_json(fields)),
            Self::Array(array) => Value::Array(array.iter().map(|item| item.value.to_json()).collect()),
            Self::Union(union) => match union.variant {
                Some(_) => Value::Object(fields_to_json(&union.fields)),
                None => Value::Null,
            },
        }
    }

    /// Field map of an object or of a selected union variant.
    pub fn fields(&self) -> Option<&IndexMap<String, FormValue>> {
        match self {
            Self::Object(fields) => Some(fields),
            Self::Union(union) => Some(&union.fields),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut IndexMap<String, FormValue>> {
        match self {
            Self::Object(fields) => Some(fields),
            Self::Union(union) => Some(&mut union.fields),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&FormArray> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut FormArray> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&FormUnion> {
        match self {
            Self::Union(union) => Some(union),
            _ => None,
        }
    }

    pub fn as_union_mut(&mut self) -> Option<&mut FormUnion> {
        match self {
            Self::Union(union) => Some(union),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Follows `path` from this node.
    pub fn get_path(&self, path: &FieldPath) -> Option<&FormValue> {
        let mut current = self;
        for segment in path.segments() {
            current = match segment {
                PathSegment::Field(name) => current.fields()?.get(name)?,
                PathSegment::Item(id) => current.as_array()?.by_id(*id)?,
            };
        }
        Some(current)
    }

    /// Mutable variant of [`FormValue::get_path`].
    pub fn get_path_mut(&mut self, path: &FieldPath) -> Option<&mut FormValue> {
        let mut current = self;
        for segment in path.segments() {
            current = match segment {
                PathSegment::Field(name) => current.fields_mut()?.get_mut(name)?,
                PathSegment::Item(id) => current.as_array_mut()?.by_id_mut(*id)?,
            };
        }
        Some(current)
    }

    /// Overlays `other` onto this node: object keys merge recursively, every
    /// other shape is replaced.
    pub fn merge(&mut self, other: FormValue) {
        match (self, other) {
            (Self::Object(target), Self::Object(source)) => merge_fields(target, source),
            (Self::Union(target), Self::Union(source)) if target.variant == source.variant => {
                merge_fields(&mut target.fields, source.fields);
            }
            (target, source) => *target = source,
        }
    }
}

fn merge_fields(target: &mut IndexMap<String, FormValue>, source: IndexMap<String, FormValue>) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing) => existing.merge(value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

fn fields_to_json(fields: &IndexMap<String, FormValue>) -> JsonMap<String, Value> {
    fields.iter().map(|(key, value)| (key.clone(), value.to_json())).collect()
}
