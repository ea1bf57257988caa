//! Declared default values.
//!
//! The untouched tree for a model holds each field's declared default (or
//! the model-level default object's entry), nested models expanded
//! recursively, arrays empty, and unions unselected. Primitives without a
//! declared default are left out; nothing is guessed from constraints.

use indexmap::IndexMap;
use schemaform_types::{FieldDefinition, FieldKind, FormArray, FormUnion, FormValue, ModelDefinition, SchemaDocument, UnionField};
use serde_json::Value;

use crate::error::SchemaError;
use crate::hydrate::hydrate_field;
use crate::resolver::{ResolutionStack, resolve_reference, root_model};

/// Default tree for the document's root model.
pub fn default_tree(document: &SchemaDocument) -> Result<FormValue, SchemaError> {
    let model = root_model(document)?;
    let mut stack = ResolutionStack::new();
    let fields = stack.with_frame(&document.root, |stack| model_defaults(model, document, stack))?;
    Ok(FormValue::Object(fields))
}

/// Default field map for `model`.
pub fn model_defaults(
    model: &ModelDefinition,
    document: &SchemaDocument,
    stack: &mut ResolutionStack,
) -> Result<IndexMap<String, FormValue>, SchemaError> {
    let mut fields = IndexMap::new();
    for (name, field) in model.ordered_fields() {
        let declared = model.defaults.as_ref().and_then(|defaults| defaults.get(name));
        let value = match declared {
            Some(value) => Some(hydrate_field(field, value, document)),
            None => field_default(field, document, stack)?,
        };
        if let Some(value) = value {
            fields.insert(name.to_string(), value);
        }
    }
    Ok(fields)
}

/// Default for one field, or `None` when the field starts out absent.
pub fn field_default(field: &FieldDefinition, document: &SchemaDocument, stack: &mut ResolutionStack) -> Result<Option<FormValue>, SchemaError> {
    if let Some(declared) = &field.default {
        return Ok(Some(hydrate_field(field, declared, document)));
    }
    let value = match &field.kind {
        FieldKind::Primitive(_) | FieldKind::Enumerated { .. } => None,
        FieldKind::Reference { reference } => match resolve_reference(reference, document) {
            Some(resolved) => Some(FormValue::Object(
                stack.with_frame(resolved.name, |stack| model_defaults(resolved.model, document, stack))?,
            )),
            None => None,
        },
        FieldKind::Object { model } => Some(FormValue::Object(model_defaults(model, document, stack)?)),
        FieldKind::Array(_) => Some(FormValue::Array(FormArray::new())),
        FieldKind::Union(_) => Some(FormValue::Union(FormUnion::default())),
    };
    Ok(value)
}

/// Value seeded into a freshly added array item.
pub fn item_default(item: &FieldDefinition, document: &SchemaDocument) -> Result<FormValue, SchemaError> {
    let mut stack = ResolutionStack::new();
    Ok(field_default(item, document, &mut stack)?.unwrap_or_else(|| match item.kind {
        FieldKind::Primitive(_) | FieldKind::Enumerated { .. } => FormValue::null(),
        _ => FormValue::empty_object(),
    }))
}

/// Fields seeded when variant `label` is selected. The discriminator
/// property, when declared on the variant, is set to the label unless the
/// variant already defaults it.
pub fn variant_defaults(union: &UnionField, label: &str, document: &SchemaDocument) -> Result<Option<IndexMap<String, FormValue>>, SchemaError> {
    let Some(variant) = union.variant(label) else {
        return Ok(None);
    };
    let Some(resolved) = resolve_reference(&variant.reference, document) else {
        return Ok(Some(IndexMap::new()));
    };
    let mut stack = ResolutionStack::new();
    let mut fields = stack.with_frame(resolved.name, |stack| model_defaults(resolved.model, document, stack))?;
    if let Some(property) = &union.discriminator
        && resolved.model.properties.contains_key(property)
        && !fields.contains_key(property)
    {
        fields.insert(property.clone(), FormValue::Scalar(Value::String(label.to_string())));
    }
    Ok(Some(fields))
}
