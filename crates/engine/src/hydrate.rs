//! Schema-aware conversion of plain JSON into a form data tree.
//!
//! [`FormValue::from_json`] knows nothing about unions; here the schema tells
//! which objects are union values so the selected variant can be inferred.

use indexmap::IndexMap;
use schemaform_types::{FieldDefinition, FieldKind, FormArray, FormUnion, FormValue, ModelDefinition, SchemaDocument, UnionField};
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::resolver::{resolve, resolve_reference};

/// Converts `value`, the JSON object for `model`, into a tree.
pub fn hydrate_model(model: &ModelDefinition, value: &Value, document: &SchemaDocument) -> FormValue {
    match value.as_object() {
        Some(object) => FormValue::Object(hydrate_fields(model, object, document)),
        None => FormValue::from_json(value),
    }
}

/// Converts `value` for `field`. Data is finite, so no cycle guard is needed.
pub fn hydrate_field(field: &FieldDefinition, value: &Value, document: &SchemaDocument) -> FormValue {
    match (&field.kind, value) {
        (FieldKind::Reference { reference }, Value::Object(_)) => match resolve(reference, document) {
            Some(model) => hydrate_model(model, value, document),
            None => FormValue::from_json(value),
        },
        (FieldKind::Object { model }, Value::Object(_)) => hydrate_model(model, value, document),
        (FieldKind::Array(array), Value::Array(items)) => FormValue::Array(FormArray::from_values(
            items.iter().map(|item| hydrate_field(&array.items, item, document)),
        )),
        (FieldKind::Union(_), Value::Null) => FormValue::Union(FormUnion::default()),
        (FieldKind::Union(union), Value::Object(object)) => hydrate_union(union, object, document),
        _ => FormValue::from_json(value),
    }
}

fn hydrate_fields(model: &ModelDefinition, object: &JsonMap<String, Value>, document: &SchemaDocument) -> IndexMap<String, FormValue> {
    object
        .iter()
        .map(|(name, nested)| {
            let value = match model.properties.get(name) {
                Some(field) => hydrate_field(field, nested, document),
                None => FormValue::from_json(nested),
            };
            (name.clone(), value)
        })
        .collect()
}

fn hydrate_union(union: &UnionField, object: &JsonMap<String, Value>, document: &SchemaDocument) -> FormValue {
    let Some(label) = infer_variant(union, object, document) else {
        return FormValue::from_json(&Value::Object(object.clone()));
    };
    let fields = match union.variant(&label).and_then(|variant| resolve(&variant.reference, document)) {
        Some(model) => hydrate_fields(model, object, document),
        None => object
            .iter()
            .map(|(name, nested)| (name.clone(), FormValue::from_json(nested)))
            .collect(),
    };
    let mut hydrated = FormUnion::default();
    hydrated.select(label, fields);
    FormValue::Union(hydrated)
}

/// Picks the variant an object belongs to: the discriminator value when it
/// names a variant, else the variant whose model declares the most of the
/// object's keys (first one on ties). `None` when the union has no variants.
pub fn infer_variant(union: &UnionField, object: &JsonMap<String, Value>, document: &SchemaDocument) -> Option<String> {
    if let Some(property) = &union.discriminator
        && let Some(tag) = object.get(property).and_then(Value::as_str)
    {
        if let Some(variant) = union.variant(tag) {
            return Some(variant.label.clone());
        }
        let by_model_name = union.variants.iter().find(|variant| {
            resolve_reference(&variant.reference, document).is_some_and(|resolved| resolved.name.eq_ignore_ascii_case(tag))
        });
        if let Some(variant) = by_model_name {
            return Some(variant.label.clone());
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for variant in &union.variants {
        let score = resolve(&variant.reference, document)
            .map(|model| object.keys().filter(|key| model.properties.contains_key(*key)).count())
            .unwrap_or(0);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((&variant.label, score));
        }
    }
    let label = best.map(|(label, _)| label.to_string());
    debug!(?label, "inferred union variant from keys");
    label
}
