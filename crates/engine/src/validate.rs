//! Advisory validation of a form data tree.
//!
//! Mirrors the native constraints the rendered inputs carry (required,
//! bounds, lengths, patterns, enum membership, item counts) so hosts without
//! a browser can block submission. Violations are data, never errors.

use schemaform_types::{
    FieldDefinition, FieldKind, FieldPath, FormValue, ModelDefinition, SchemaDocument, validate_enumerated_value, validate_primitive_value,
};
use serde::Serialize;
use serde_json::Value;

use crate::resolver::resolve;

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub path: FieldPath,
    pub label: String,
    pub message: String,
}

impl FieldViolation {
    fn new(path: &FieldPath, label: String, message: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            label,
            message: message.into(),
        }
    }
}

/// Checks the tree for the document's root model.
pub fn validate_tree(document: &SchemaDocument, data: &FormValue) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    if let Some(model) = document.root_model() {
        validate_model(document, model, &FieldPath::root(), Some(data), &mut violations);
    }
    violations
}

fn validate_model(
    document: &SchemaDocument,
    model: &ModelDefinition,
    path: &FieldPath,
    data: Option<&FormValue>,
    violations: &mut Vec<FieldViolation>,
) {
    let fields = data.and_then(FormValue::fields);
    for (name, field) in model.ordered_fields() {
        let value = fields.and_then(|fields| fields.get(name));
        let field_path = path.field(name);
        if is_blank(value) {
            if model.is_required(name) && !field.nullable {
                violations.push(FieldViolation::new(&field_path, field.label(name), "is required"));
            }
            continue;
        }
        validate_field(document, field, &field.label(name), &field_path, value, violations);
    }
}

fn validate_field(
    document: &SchemaDocument,
    field: &FieldDefinition,
    label: &str,
    path: &FieldPath,
    value: Option<&FormValue>,
    violations: &mut Vec<FieldViolation>,
) {
    let Some(value) = value else {
        return;
    };
    match &field.kind {
        FieldKind::Primitive(primitive) => {
            if let Some(scalar) = value.as_scalar()
                && let Err(message) = validate_primitive_value(scalar, primitive.kind, &primitive.constraints)
            {
                violations.push(FieldViolation::new(path, label.to_string(), message));
            }
        }
        FieldKind::Enumerated { values } => {
            if let Some(scalar) = value.as_scalar()
                && let Err(message) = validate_enumerated_value(scalar, values)
            {
                violations.push(FieldViolation::new(path, label.to_string(), message));
            }
        }
        FieldKind::Reference { reference } => {
            if let Some(model) = resolve(reference, document) {
                validate_model(document, model, path, Some(value), violations);
            }
        }
        FieldKind::Object { model } => validate_model(document, model, path, Some(value), violations),
        FieldKind::Array(array) => {
            let Some(items) = value.as_array() else {
                return;
            };
            if let Some(min) = array.min_items
                && items.len() < min
            {
                violations.push(FieldViolation::new(path, label.to_string(), format!("needs at least {} items", min)));
            }
            if let Some(max) = array.max_items
                && items.len() > max
            {
                violations.push(FieldViolation::new(path, label.to_string(), format!("allows at most {} items", max)));
            }
            for (index, item) in items.iter().enumerate() {
                let item_label = format!("{} {}", label, index + 1);
                validate_field(document, &array.items, &item_label, &path.item(item.id), Some(&item.value), violations);
            }
        }
        FieldKind::Union(union) => {
            let model = value
                .as_union()
                .and_then(|selected| selected.variant.as_deref())
                .and_then(|label| union.variant(label))
                .and_then(|variant| resolve(&variant.reference, document));
            if let Some(model) = model {
                validate_model(document, model, path, Some(value), violations);
            }
        }
    }
}

/// Absent, `null`, an empty string, or an unselected union.
fn is_blank(value: Option<&FormValue>) -> bool {
    match value {
        None => true,
        Some(FormValue::Scalar(Value::Null)) => true,
        Some(FormValue::Scalar(Value::String(text))) => text.is_empty(),
        Some(FormValue::Union(union)) => union.variant.is_none(),
        Some(_) => false,
    }
}
