use schemaform_types::{PathParseError, SchemaParseError};
use thiserror::Error;

/// Failures while walking a schema's reference graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A model was re-entered while it was still being expanded.
    #[error("reference cycle detected: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },
    /// Nested models exceed the supported depth.
    #[error("schema nesting exceeds {max} levels at '{model}'")]
    DepthExceeded { max: usize, model: String },
    /// The document's root model is not among its models.
    #[error("root model '{0}' is not defined")]
    MissingRootModel(String),
    #[error(transparent)]
    Parse(#[from] SchemaParseError),
}

/// Failures surfaced by the form data store, item manager, and session.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("schema '{0}' is not loaded")]
    UnknownSchema(String),
    #[error("no field at '{path}' in schema '{schema}'")]
    UnknownPath { schema: String, path: String },
    #[error("'{path}' in schema '{schema}' is not an array")]
    NotAnArray { schema: String, path: String },
    #[error("'{path}' in schema '{schema}' is not a union")]
    NotAUnion { schema: String, path: String },
    #[error("'{path}' in schema '{schema}' holds nested fields and cannot take a single value")]
    NotALeaf { schema: String, path: String },
    #[error("index {index} is out of range for '{path}' ({len} items)")]
    IndexOutOfRange { path: String, index: usize, len: usize },
    #[error("union at '{path}' has no variant '{label}'")]
    UnknownVariant { path: String, label: String },
    #[error("array '{path}' has no item {item}")]
    UnknownItem { path: String, item: String },
    #[error("unknown form action '{0}'")]
    UnknownAction(String),
    #[error("form action '{0}' needs a value")]
    MissingValue(String),
    #[error("export is for workflow '{found}', expected '{expected}'")]
    WorkflowMismatch { expected: String, found: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Path(#[from] PathParseError),
}
