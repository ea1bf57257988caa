//! Shared type definitions for schema-driven forms.
//!
//! - [`schema`]: schema documents, models, and field definitions parsed from JSON Schema
//! - [`form`]: the editable form data tree with stable array item ids
//! - [`path`]: field paths and the DOM id scheme shared by renderer and store

pub mod form;
pub mod path;
pub mod schema;

pub use form::{ArrayItem, FormArray, FormUnion, FormValue, ItemId};
pub use path::{FieldPath, PATH_SEPARATOR, PathParseError, PathSegment};
pub use schema::validation::{validate_enumerated_value, validate_primitive_value};
pub use schema::{
    ArrayField, Constraints, DEFAULT_ROOT_MODEL, FieldDefinition, FieldKind, ModelDefinition, PrimitiveField, PrimitiveKind, SchemaDocument,
    SchemaParseError, UnionField, UnionVariant, bare_reference_name, humanize_field_name,
};
