//! Strongly typed schema definitions consumed by the form renderer and data store.
//!
//! A [`SchemaDocument`] is built from the JSON Schema a backend publishes for a
//! workflow. The top-level `properties` become the root model; every entry of
//! `$defs`, `definitions`, or `schemas` becomes a named model. Field and model
//! maps use `IndexMap` so forms render in authoring order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use thiserror::Error;

pub mod validation;

/// Name given to the root model when the schema carries no `title`.
pub const DEFAULT_ROOT_MODEL: &str = "RootModel";

/// Sections of a JSON Schema that hold named model definitions.
pub const DEFINITION_SECTIONS: &[&str] = &["$defs", "definitions", "schemas"];

/// Keys that may carry an explicit field display order on a model.
const ORDER_KEYS: &[&str] = &["x-order", "ui:order", "propertyOrder"];

/// Errors surfaced while converting raw JSON into a [`SchemaDocument`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaParseError {
    /// The payload is not a JSON object.
    #[error("schema for workflow '{0}' is not a JSON object")]
    NotAnObject(String),
    /// Neither top-level properties nor a root `$ref` were found.
    #[error("schema for workflow '{0}' declares no root model")]
    MissingRoot(String),
}

/// Backend-provided description of a workflow's data shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaDocument {
    /// Workflow the schema belongs to.
    pub workflow: String,
    /// Optional human-readable title.
    #[serde(default)]
    pub title: Option<String>,
    /// Name of the model rendered at the top of the form.
    pub root: String,
    /// Named models keyed by definition name, preserving declaration order.
    #[serde(default)]
    pub models: IndexMap<String, ModelDefinition>,
}

impl SchemaDocument {
    /// Builds a document from a raw JSON Schema payload.
    ///
    /// Payloads wrapped as `{ "schema": { ... } }` are unwrapped first.
    pub fn from_json_schema(workflow: impl Into<String>, schema: &Value) -> Result<Self, SchemaParseError> {
        let workflow = workflow.into();
        let Some(object) = schema.as_object() else {
            return Err(SchemaParseError::NotAnObject(workflow));
        };

        let is_bare_wrapper = !object.contains_key("properties") && !object.contains_key("$ref");
        if is_bare_wrapper && let Some(inner) = object.get("schema").filter(|inner| inner.is_object()) {
            return Self::from_json_schema(workflow, inner);
        }

        let mut models = IndexMap::new();
        for section in DEFINITION_SECTIONS {
            let Some(definitions) = object.get(*section).and_then(Value::as_object) else {
                continue;
            };
            for (name, definition) in definitions {
                models.insert(name.clone(), ModelDefinition::from_json(definition));
            }
        }

        let title = object.get("title").and_then(Value::as_str).map(str::to_string);
        let root = if object.contains_key("properties") {
            let root_name = title.clone().unwrap_or_else(|| DEFAULT_ROOT_MODEL.to_string());
            models.shift_insert(0, root_name.clone(), ModelDefinition::from_json(schema));
            root_name
        } else if let Some(reference) = object.get("$ref").and_then(Value::as_str) {
            bare_reference_name(reference).to_string()
        } else {
            return Err(SchemaParseError::MissingRoot(workflow));
        };

        Ok(Self {
            workflow,
            title,
            root,
            models,
        })
    }

    /// Returns the model rendered at the top of the form, if it is defined.
    pub fn root_model(&self) -> Option<&ModelDefinition> {
        self.models.get(&self.root)
    }

    /// Direct lookup of a model by exact name.
    pub fn model(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }
}

/// One named object type within a [`SchemaDocument`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelDefinition {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Type tag, usually `object`.
    #[serde(default = "default_object_type")]
    pub r#type: String,
    /// Field definitions keyed by field name in declaration order.
    #[serde(default)]
    pub properties: IndexMap<String, FieldDefinition>,
    /// Names of fields that must be supplied.
    #[serde(default)]
    pub required: Vec<String>,
    /// Model-level default object, when declared.
    #[serde(default)]
    pub defaults: Option<JsonMap<String, Value>>,
    /// Explicit display order; fields not listed follow in declaration order.
    #[serde(default)]
    pub order: Vec<String>,
}

impl ModelDefinition {
    /// Parses a model from a JSON Schema object node.
    pub fn from_json(value: &Value) -> Self {
        let properties = value
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, definition)| (name.clone(), FieldDefinition::from_json(definition)))
                    .collect()
            })
            .unwrap_or_default();

        let order = ORDER_KEYS
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_array))
            .map(|values| string_values(values))
            .unwrap_or_default();

        Self {
            title: string_field(value, "title"),
            description: string_field(value, "description"),
            r#type: value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("object")
                .to_string(),
            properties,
            required: value
                .get("required")
                .and_then(Value::as_array)
                .map(|values| string_values(values))
                .unwrap_or_default(),
            defaults: value.get("default").and_then(Value::as_object).cloned(),
            order,
        }
    }

    /// Returns true when the field is listed in `required`.
    pub fn is_required(&self, field_name: &str) -> bool {
        self.required.iter().any(|name| name == field_name)
    }

    /// Fields in display order: explicitly ordered names first, then the rest
    /// in declaration order. Unknown names in the explicit order are skipped.
    pub fn ordered_fields(&self) -> Vec<(&str, &FieldDefinition)> {
        let mut ordered: Vec<(&str, &FieldDefinition)> = Vec::with_capacity(self.properties.len());
        for name in &self.order {
            if let Some((key, field)) = self.properties.get_key_value(name)
                && !ordered.iter().any(|(existing, _)| *existing == key.as_str())
            {
                ordered.push((key.as_str(), field));
            }
        }
        for (name, field) in &self.properties {
            if !ordered.iter().any(|(existing, _)| *existing == name.as_str()) {
                ordered.push((name.as_str(), field));
            }
        }
        ordered
    }

    /// Human-readable label for the model.
    pub fn display_title<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.title.as_deref().unwrap_or(fallback)
    }
}

/// Description of one property of a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Declared default value.
    #[serde(default)]
    pub default: Option<Value>,
    /// True when `null` is an accepted alternative.
    #[serde(default)]
    pub nullable: bool,
    pub kind: FieldKind,
}

/// Tagged shape of a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum FieldKind {
    /// Scalar input.
    Primitive(PrimitiveField),
    /// Fixed set of allowed literal values.
    Enumerated { values: Vec<Value> },
    /// Points at another model by `$ref`.
    Reference { reference: String },
    /// Repeated items sharing one item definition.
    Array(ArrayField),
    /// Exactly one of several referenced models.
    Union(UnionField),
    /// Anonymous nested object declared inline.
    Object { model: Box<ModelDefinition> },
}

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveKind {
    fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

/// Scalar field with optional format and native validation constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrimitiveField {
    pub kind: PrimitiveKind,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
}

/// Native validation constraints carried by primitive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Constraints {
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub exclusive_minimum: Option<f64>,
    #[serde(default)]
    pub exclusive_maximum: Option<f64>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub multiple_of: Option<f64>,
}

impl Constraints {
    fn from_json(value: &Value) -> Self {
        Self {
            minimum: value.get("minimum").and_then(Value::as_f64),
            maximum: value.get("maximum").and_then(Value::as_f64),
            exclusive_minimum: value.get("exclusiveMinimum").and_then(Value::as_f64),
            exclusive_maximum: value.get("exclusiveMaximum").and_then(Value::as_f64),
            min_length: value.get("minLength").and_then(Value::as_u64).map(|length| length as usize),
            max_length: value.get("maxLength").and_then(Value::as_u64).map(|length| length as usize),
            pattern: string_field(value, "pattern"),
            multiple_of: value.get("multipleOf").and_then(Value::as_f64),
        }
    }

    /// Returns true when no constraint is declared.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Array field definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArrayField {
    pub items: Box<FieldDefinition>,
    #[serde(default)]
    pub min_items: Option<usize>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

/// Union field definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnionField {
    pub variants: Vec<UnionVariant>,
    /// Discriminator property name, when declared.
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl UnionField {
    /// Looks up an alternative by its label.
    pub fn variant(&self, label: &str) -> Option<&UnionVariant> {
        self.variants.iter().find(|variant| variant.label == label)
    }
}

/// One alternative of a union, tagged with the label shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnionVariant {
    pub label: String,
    pub reference: String,
}

impl FieldDefinition {
    /// Parses a field from a JSON Schema property node.
    ///
    /// Unrecognized shapes fall back to a plain string input.
    pub fn from_json(value: &Value) -> Self {
        let mut field = Self {
            title: string_field(value, "title"),
            description: string_field(value, "description"),
            default: value.get("default").cloned(),
            nullable: false,
            kind: FieldKind::Primitive(PrimitiveField::default()),
        };

        if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
            field.kind = FieldKind::Reference {
                reference: reference.to_string(),
            };
            return field;
        }

        if let Some(all_of) = value.get("allOf").and_then(Value::as_array)
            && let [single] = all_of.as_slice()
        {
            return field.merge_inner(FieldDefinition::from_json(single));
        }

        if let Some(alternatives) = value
            .get("oneOf")
            .or_else(|| value.get("anyOf"))
            .and_then(Value::as_array)
        {
            return field.with_alternatives(value, alternatives);
        }

        if let Some(values) = value.get("enum").and_then(Value::as_array) {
            field.kind = FieldKind::Enumerated { values: values.clone() };
            return field;
        }

        if let Some(constant) = value.get("const") {
            field.kind = FieldKind::Enumerated {
                values: vec![constant.clone()],
            };
            if field.default.is_none() {
                field.default = Some(constant.clone());
            }
            return field;
        }

        let (type_name, nullable) = declared_type(value);
        field.nullable = nullable;
        field.kind = match type_name.as_deref() {
            Some("array") => FieldKind::Array(ArrayField {
                items: Box::new(
                    value
                        .get("items")
                        .map(FieldDefinition::from_json)
                        .unwrap_or_else(|| FieldDefinition::from_json(&Value::Null)),
                ),
                min_items: value.get("minItems").and_then(Value::as_u64).map(|count| count as usize),
                max_items: value.get("maxItems").and_then(Value::as_u64).map(|count| count as usize),
            }),
            Some("object") if value.get("properties").is_some() => FieldKind::Object {
                model: Box::new(ModelDefinition::from_json(value)),
            },
            Some(other) => FieldKind::Primitive(PrimitiveField {
                kind: PrimitiveKind::from_type_name(other).unwrap_or_default(),
                format: string_field(value, "format"),
                constraints: Constraints::from_json(value),
            }),
            None if value.get("properties").is_some() => FieldKind::Object {
                model: Box::new(ModelDefinition::from_json(value)),
            },
            None => FieldKind::Primitive(PrimitiveField {
                kind: PrimitiveKind::String,
                format: string_field(value, "format"),
                constraints: Constraints::from_json(value),
            }),
        };
        field
    }

    fn with_alternatives(mut self, value: &Value, alternatives: &[Value]) -> Self {
        let non_null: Vec<&Value> = alternatives.iter().filter(|alternative| !is_null_schema(alternative)).collect();
        let nullable = non_null.len() < alternatives.len();

        if let [single] = non_null.as_slice() {
            let mut merged = self.merge_inner(FieldDefinition::from_json(single));
            merged.nullable = merged.nullable || nullable;
            return merged;
        }

        let references: Vec<&str> = non_null
            .iter()
            .filter_map(|alternative| alternative.get("$ref").and_then(Value::as_str))
            .collect();
        if references.is_empty() || references.len() != non_null.len() {
            self.nullable = nullable;
            return self;
        }

        let discriminator = value.get("discriminator");
        let mapping = discriminator.and_then(|node| node.get("mapping")).and_then(Value::as_object);
        let variants = references
            .into_iter()
            .map(|reference| {
                let label = mapping
                    .and_then(|mapping| {
                        mapping
                            .iter()
                            .find(|(_, target)| target.as_str() == Some(reference))
                            .map(|(label, _)| label.clone())
                    })
                    .unwrap_or_else(|| bare_reference_name(reference).to_string());
                UnionVariant {
                    label,
                    reference: reference.to_string(),
                }
            })
            .collect();

        self.nullable = nullable;
        self.kind = FieldKind::Union(UnionField {
            variants,
            discriminator: discriminator
                .and_then(|node| node.get("propertyName"))
                .and_then(Value::as_str)
                .map(str::to_string),
        });
        self
    }

    /// Outer metadata (title, description, default) wins over the wrapped definition.
    fn merge_inner(self, inner: FieldDefinition) -> Self {
        Self {
            title: self.title.or(inner.title),
            description: self.description.or(inner.description),
            default: self.default.or(inner.default),
            nullable: self.nullable || inner.nullable,
            kind: inner.kind,
        }
    }

    /// Label shown next to the input.
    pub fn label(&self, field_name: &str) -> String {
        self.title.clone().unwrap_or_else(|| humanize_field_name(field_name))
    }
}

/// Strips known definition prefixes from a `$ref`, returning the bare model name.
pub fn bare_reference_name(reference: &str) -> &str {
    for prefix in ["#/$defs/", "#/definitions/", "#/schemas/", "#/components/schemas/"] {
        if let Some(stripped) = reference.strip_prefix(prefix) {
            return stripped;
        }
    }
    reference.rsplit('/').next().unwrap_or(reference)
}

/// Turns `bike_stock` into `Bike Stock`.
pub fn humanize_field_name(field_name: &str) -> String {
    field_name
        .split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut characters = word.chars();
            match characters.next() {
                Some(first) => first.to_uppercase().chain(characters).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn declared_type(value: &Value) -> (Option<String>, bool) {
    match value.get("type") {
        Some(Value::String(type_name)) => (Some(type_name.clone()), false),
        Some(Value::Array(type_names)) => {
            let names = string_values(type_names);
            let nullable = names.iter().any(|name| name == "null");
            (names.into_iter().find(|name| name != "null"), nullable)
        }
        _ => (None, false),
    }
}

fn is_null_schema(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("null")
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_values(values: &[Value]) -> Vec<String> {
    values.iter().filter_map(Value::as_str).map(str::to_string).collect()
}

fn default_object_type() -> String {
    "object".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_root_and_definitions() {
        let schema = json!({
            "title": "RootModel",
            "type": "object",
            "properties": {
                "stores": { "type": "array", "items": { "$ref": "#/$defs/Store" } }
            },
            "$defs": {
                "Store": {
                    "type": "object",
                    "properties": { "name": { "type": "string", "maxLength": 40 } },
                    "required": ["name"]
                }
            }
        });

        let document = SchemaDocument::from_json_schema("bike_shop", &schema).expect("parse schema");
        assert_eq!(document.root, "RootModel");
        assert_eq!(document.models.keys().next().map(String::as_str), Some("RootModel"));

        let store = document.model("Store").expect("store model");
        assert!(store.is_required("name"));
        let FieldKind::Primitive(name) = &store.properties["name"].kind else {
            panic!("expected primitive name field");
        };
        assert_eq!(name.constraints.max_length, Some(40));

        let root = document.root_model().expect("root model");
        let FieldKind::Array(array) = &root.properties["stores"].kind else {
            panic!("expected array");
        };
        assert_eq!(
            array.items.kind,
            FieldKind::Reference {
                reference: "#/$defs/Store".to_string()
            }
        );
    }

    #[test]
    fn unwraps_wrapped_payload_and_root_ref() {
        let schema = json!({
            "schema": {
                "$ref": "#/definitions/Order",
                "definitions": { "Order": { "properties": { "id": { "type": "integer" } } } }
            }
        });
        let document = SchemaDocument::from_json_schema("orders", &schema).expect("parse");
        assert_eq!(document.root, "Order");
        assert!(document.root_model().is_some());
    }

    #[test]
    fn rejects_schema_without_root() {
        let error = SchemaDocument::from_json_schema("empty", &json!({ "$defs": {} })).unwrap_err();
        assert_eq!(error, SchemaParseError::MissingRoot("empty".to_string()));
        assert!(SchemaDocument::from_json_schema("bad", &json!([1, 2])).is_err());
    }

    #[test]
    fn optional_wrapper_unwraps_to_inner_kind() {
        let field = FieldDefinition::from_json(&json!({
            "title": "Nickname",
            "anyOf": [{ "type": "string", "minLength": 2 }, { "type": "null" }],
            "default": null
        }));
        assert!(field.nullable);
        assert_eq!(field.title.as_deref(), Some("Nickname"));
        assert!(matches!(field.kind, FieldKind::Primitive(PrimitiveField { kind: PrimitiveKind::String, .. })));
    }

    #[test]
    fn union_labels_follow_discriminator_mapping() {
        let field = FieldDefinition::from_json(&json!({
            "oneOf": [
                { "$ref": "#/$defs/MountainBike" },
                { "$ref": "#/$defs/ElectricBike" }
            ],
            "discriminator": {
                "propertyName": "bike_type",
                "mapping": { "mountain": "#/$defs/MountainBike", "electric": "#/$defs/ElectricBike" }
            }
        }));
        let FieldKind::Union(union) = field.kind else {
            panic!("expected union");
        };
        let labels: Vec<_> = union.variants.iter().map(|variant| variant.label.as_str()).collect();
        assert_eq!(labels, vec!["mountain", "electric"]);
        assert_eq!(union.discriminator.as_deref(), Some("bike_type"));
    }

    #[test]
    fn const_becomes_single_value_enum_with_default() {
        let field = FieldDefinition::from_json(&json!({ "const": "road" }));
        assert_eq!(field.default, Some(json!("road")));
        assert_eq!(field.kind, FieldKind::Enumerated { values: vec![json!("road")] });
    }

    #[test]
    fn explicit_order_precedes_declaration_order() {
        let model = ModelDefinition::from_json(&json!({
            "properties": { "a": {}, "b": {}, "c": {} },
            "x-order": ["c", "missing", "a"]
        }));
        let names: Vec<_> = model.ordered_fields().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn humanizes_field_names() {
        assert_eq!(humanize_field_name("bike_stock"), "Bike Stock");
        assert_eq!(bare_reference_name("#/$defs/Store"), "Store");
        assert_eq!(bare_reference_name("Store"), "Store");
    }
}
