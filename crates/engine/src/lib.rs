//! # Schemaform Engine
//!
//! The Schemaform Engine turns JSON Schema documents into editable forms.
//! It resolves model references, renders a typed node tree (and Bootstrap
//! HTML from it), keeps one data tree per form in sync with the rendered
//! blocks, and validates, exports, imports, and submits that data.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use schemaform_engine::{FormDataStore, FormSession, RenderOptions, SchemaLoader, StaticSchemaSource};
//! use schemaform_types::{FieldPath, SchemaDocument};
//! use serde_json::json;
//!
//! let loader = SchemaLoader::new(Box::new(StaticSchemaSource::bundled()), Duration::from_secs(5));
//! let mut session = FormSession::new(loader, FormDataStore::new(), RenderOptions::default());
//!
//! let document = SchemaDocument::from_json_schema(
//!     "contact",
//!     &json!({ "properties": { "name": { "type": "string", "default": "Ada" } } }),
//! )?;
//! session.open_document(document)?;
//! assert_eq!(session.collect("contact"), json!({ "name": "Ada" }));
//!
//! let view = session.render("contact")?;
//! assert!(view.to_html().contains(r#"data-workflow="contact""#));
//!
//! session.set_value("contact", &FieldPath::root().field("name"), json!("Grace"))?;
//! assert_eq!(session.collect("contact"), json!({ "name": "Grace" }));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`loader`**: schema sources, fetch timeout, and fallback to the bundled sample
//! - **`cache`**: parsed documents by workflow and field definitions by path
//! - **`resolver`**: reference lookup, name variants, and cycle detection
//! - **`defaults`**: the initial data tree built from declared defaults
//! - **`render`**: node tree, event bindings, and HTML output
//! - **`store`**: per-form data trees and optional persistence
//! - **`manager`**: array item and union variant mutations with their fragments
//! - **`hydrate`**: plain JSON back into a data tree
//! - **`validate`**: advisory constraint checks
//! - **`transfer`**: export and import
//! - **`session`**: the context object tying the above together

pub mod cache;
pub mod defaults;
pub mod error;
pub mod hydrate;
pub mod loader;
pub mod manager;
pub mod render;
pub mod resolver;
pub mod session;
pub mod store;
pub mod transfer;
pub mod validate;

// Re-export commonly used types for convenience
pub use cache::{FieldCache, SchemaCache};
pub use defaults::default_tree;
pub use error::{FormError, SchemaError};
pub use loader::{FileSchemaSource, HttpSchemaSource, LoadOutcome, SAMPLE_WORKFLOW, SchemaLoader, SchemaSource, StaticSchemaSource};
pub use manager::{ItemAdded, ItemManager, ItemRemoved, VariantSelected};
pub use render::{FormAction, FormNode, FormRenderer, FormView, RenderOptions, Rendered};
pub use resolver::{MAX_RESOLUTION_DEPTH, resolve, resolve_reference};
pub use session::{ActionOutcome, FormSession, SubmissionHandler, SubmitOutcome};
pub use store::FormDataStore;
pub use transfer::{FormExport, ImportStrategy};
pub use validate::{FieldViolation, validate_tree};
