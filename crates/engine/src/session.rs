//! Form session: the context object tying loader, caches, store, and renderer.
//!
//! One session is constructed per page or process and passed around
//! explicitly; there is no global state. Every mutating call takes
//! `&mut self`, so edits are serialized by the borrow checker.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use schemaform_api::SchemaClient;
use schemaform_types::{FieldKind, FieldPath, FormValue, ItemId, PrimitiveKind, SchemaDocument};
use schemaform_util::FormsConfig;
use serde::Serialize;
use serde_json::{Number, Value};
use tracing::{info, warn};

use crate::cache::{FieldCache, SchemaCache};
use crate::defaults::default_tree;
use crate::error::FormError;
use crate::loader::{HttpSchemaSource, LoadOutcome, SchemaLoader, StaticSchemaSource};
use crate::manager::{ItemAdded, ItemManager, ItemRemoved, VariantSelected};
use crate::render::{FormAction, FormRenderer, FormView, RenderOptions};
use crate::resolver::{field_definition_at, resolve};
use crate::store::FormDataStore;
use crate::transfer::{FormExport, ImportStrategy, combine};
use crate::validate::{FieldViolation, validate_tree};

/// Receives collected form data on submit.
#[async_trait]
pub trait SubmissionHandler: Send + Sync {
    async fn submit(&self, workflow: &str, data: &Value) -> AnyResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted { data: Value },
    /// Validation failed; nothing was handed to the submission handler.
    Invalid { violations: Vec<FieldViolation> },
    /// The handler reported an error.
    Failed { reason: String },
}

/// Effect of a dispatched [`FormAction`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    ValueSet { path: FieldPath, value: Value },
    ItemAdded(ItemAdded),
    ItemRemoved(ItemRemoved),
    VariantSelected(VariantSelected),
}

pub struct FormSession {
    options: RenderOptions,
    loader: SchemaLoader,
    schemas: SchemaCache,
    fields: FieldCache,
    forms: IndexMap<String, Arc<SchemaDocument>>,
    store: FormDataStore,
}

impl FormSession {
    pub fn new(loader: SchemaLoader, store: FormDataStore, options: RenderOptions) -> Self {
        Self {
            options,
            loader,
            schemas: SchemaCache::new(),
            fields: FieldCache::new(),
            forms: IndexMap::new(),
            store,
        }
    }

    /// Session backed by the configured API, the bundled sample as fallback,
    /// and, when persistence is on, the JSON storage file.
    pub fn from_config(config: &FormsConfig) -> AnyResult<Self> {
        let client = SchemaClient::from_config(config)?;
        let loader = SchemaLoader::new(Box::new(HttpSchemaSource::new(client)), config.fetch_timeout())
            .with_fallback(Box::new(StaticSchemaSource::bundled()));
        Ok(Self::new(loader, FormDataStore::from_config(config), RenderOptions::from(config)))
    }

    /// Loads `workflow` and prepares its form. A degraded outcome with no
    /// document leaves the session unchanged.
    pub async fn open(&mut self, workflow: &str) -> Result<LoadOutcome, FormError> {
        let outcome = self.loader.load(workflow, &mut self.schemas).await;
        if let Some(document) = outcome.document() {
            self.attach(Arc::clone(document))?;
        }
        Ok(outcome)
    }

    /// Prepares a form for an already parsed document.
    pub fn open_document(&mut self, document: SchemaDocument) -> Result<Arc<SchemaDocument>, FormError> {
        let document = self.schemas.insert(document);
        self.attach(Arc::clone(&document))?;
        Ok(document)
    }

    fn attach(&mut self, document: Arc<SchemaDocument>) -> Result<(), FormError> {
        let workflow = document.workflow.clone();
        self.fields.forget_schema(&workflow);
        if !self.store.contains(&workflow) {
            self.store.initialize(&workflow, default_tree(&document)?);
        }
        info!(workflow = %workflow, "form opened");
        self.forms.insert(workflow, document);
        Ok(())
    }

    pub async fn workflows(&self) -> Vec<String> {
        self.loader.workflows().await
    }

    pub fn document(&self, workflow: &str) -> Result<Arc<SchemaDocument>, FormError> {
        self.forms
            .get(workflow)
            .cloned()
            .ok_or_else(|| FormError::UnknownSchema(workflow.to_string()))
    }

    pub fn store(&self) -> &FormDataStore {
        &self.store
    }

    /// Renders the whole form and refreshes the field cache.
    pub fn render(&mut self, workflow: &str) -> Result<FormView, FormError> {
        let document = self.document(workflow)?;
        let rendered = FormRenderer::new(&document, &self.options).render_document(self.store.tree(workflow))?;
        for (path, definition) in rendered.registrations {
            self.fields.register(workflow, &path, definition);
        }
        Ok(FormView {
            workflow: workflow.to_string(),
            title: document
                .title
                .clone()
                .or_else(|| document.root_model().and_then(|model| model.title.clone()))
                .unwrap_or_else(|| workflow.to_string()),
            nodes: rendered.nodes,
        })
    }

    /// Applies an action parsed from an event binding.
    pub fn dispatch(&mut self, workflow: &str, action: FormAction) -> Result<ActionOutcome, FormError> {
        match action {
            FormAction::SetValue { path, value } => {
                let value = self.set_value(workflow, &path, value)?;
                Ok(ActionOutcome::ValueSet { path, value })
            }
            FormAction::AddItem { path } => self.add_item(workflow, &path).map(ActionOutcome::ItemAdded),
            FormAction::RemoveItem { path, item } => self.remove_item_by_id(workflow, &path, item).map(ActionOutcome::ItemRemoved),
            FormAction::SelectVariant { path, variant } => self
                .select_variant(workflow, &path, &variant)
                .map(ActionOutcome::VariantSelected),
        }
    }

    /// Writes a leaf value, converting text from form controls to the
    /// field's type. Returns the stored value. Arrays, unions, and nested
    /// models are changed through their own actions; only a reference that
    /// does not resolve, rendered as a plain input, accepts a value.
    pub fn set_value(&mut self, workflow: &str, path: &FieldPath, value: Value) -> Result<Value, FormError> {
        let document = self.document(workflow)?;
        let definition = field_definition_at(&document, self.store.tree(workflow), path).ok_or_else(|| FormError::UnknownPath {
            schema: workflow.to_string(),
            path: path.to_string(),
        })?;
        let leaf = match &definition.kind {
            FieldKind::Primitive(_) | FieldKind::Enumerated { .. } => true,
            FieldKind::Reference { reference } => resolve(reference, &document).is_none(),
            FieldKind::Array(_) | FieldKind::Union(_) | FieldKind::Object { .. } => false,
        };
        if !leaf {
            return Err(FormError::NotALeaf {
                schema: workflow.to_string(),
                path: path.to_string(),
            });
        }
        let value = coerce_input(&definition.kind, definition.nullable, value);
        self.store.set_at_path(workflow, path, FormValue::Scalar(value.clone()))?;
        Ok(value)
    }

    pub fn add_item(&mut self, workflow: &str, array_path: &FieldPath) -> Result<ItemAdded, FormError> {
        let document = self.document(workflow)?;
        ItemManager::new(workflow, &document, &self.options, &mut self.fields, &mut self.store).add_item(array_path)
    }

    pub fn remove_item(&mut self, workflow: &str, array_path: &FieldPath, index: usize) -> Result<ItemRemoved, FormError> {
        let document = self.document(workflow)?;
        ItemManager::new(workflow, &document, &self.options, &mut self.fields, &mut self.store).remove_item(array_path, index)
    }

    pub fn remove_item_by_id(&mut self, workflow: &str, array_path: &FieldPath, id: ItemId) -> Result<ItemRemoved, FormError> {
        let document = self.document(workflow)?;
        ItemManager::new(workflow, &document, &self.options, &mut self.fields, &mut self.store).remove_item_by_id(array_path, id)
    }

    pub fn select_variant(&mut self, workflow: &str, union_path: &FieldPath, label: &str) -> Result<VariantSelected, FormError> {
        let document = self.document(workflow)?;
        ItemManager::new(workflow, &document, &self.options, &mut self.fields, &mut self.store).select_variant(union_path, label)
    }

    /// The form's data as plain JSON.
    pub fn collect(&self, workflow: &str) -> Value {
        self.store.collect(workflow)
    }

    pub fn tree(&self, workflow: &str) -> Option<&FormValue> {
        self.store.tree(workflow)
    }

    pub fn validate(&self, workflow: &str) -> Result<Vec<FieldViolation>, FormError> {
        let document = self.document(workflow)?;
        let empty = FormValue::empty_object();
        Ok(validate_tree(&document, self.store.tree(workflow).unwrap_or(&empty)))
    }

    /// Restores the declared defaults.
    pub fn reset(&mut self, workflow: &str) -> Result<(), FormError> {
        let document = self.document(workflow)?;
        self.store.initialize(workflow, default_tree(&document)?);
        self.fields.forget_schema(workflow);
        Ok(())
    }

    pub fn export(&self, workflow: &str) -> Result<FormExport, FormError> {
        self.document(workflow)?;
        let empty = FormValue::empty_object();
        Ok(FormExport::new(workflow, self.store.tree(workflow).unwrap_or(&empty)))
    }

    /// Imports `export` into `workflow`'s form, which must be open and must
    /// be the form the export was taken from.
    pub fn import(&mut self, workflow: &str, export: &FormExport, strategy: ImportStrategy) -> Result<(), FormError> {
        if export.workflow != workflow {
            return Err(FormError::WorkflowMismatch {
                expected: workflow.to_string(),
                found: export.workflow.clone(),
            });
        }
        let document = self.document(workflow)?;
        let imported = combine(self.store.tree(workflow), export.to_tree(&document), strategy);
        self.store.initialize(workflow, imported);
        self.fields.forget_schema(workflow);
        info!(workflow, strategy = ?strategy, "form data imported");
        Ok(())
    }

    /// Imports plain JSON data into `workflow`'s form.
    pub fn import_data(&mut self, workflow: &str, data: &Value, strategy: ImportStrategy) -> Result<(), FormError> {
        let export = FormExport {
            workflow: workflow.to_string(),
            exported_at: Utc::now(),
            data: data.clone(),
            tree: None,
        };
        self.import(workflow, &export, strategy)
    }

    /// Validates and hands the collected data to `handler`.
    pub async fn submit(&self, workflow: &str, handler: &dyn SubmissionHandler) -> Result<SubmitOutcome, FormError> {
        let violations = self.validate(workflow)?;
        if !violations.is_empty() {
            info!(workflow, violations = violations.len(), "submission blocked by validation");
            return Ok(SubmitOutcome::Invalid { violations });
        }
        let data = self.collect(workflow);
        match handler.submit(workflow, &data).await {
            Ok(()) => {
                info!(workflow, "form submitted");
                Ok(SubmitOutcome::Submitted { data })
            }
            Err(error) => {
                warn!(workflow, error = %format!("{:#}", error), "form submission failed");
                Ok(SubmitOutcome::Failed {
                    reason: format!("{:#}", error),
                })
            }
        }
    }
}

/// Converts control text into the JSON type the field declares. Text that
/// does not parse is kept as-is so validation can report it.
fn coerce_input(kind: &FieldKind, nullable: bool, value: Value) -> Value {
    let Value::String(text) = value else {
        return value;
    };
    let trimmed = text.trim();
    match kind {
        FieldKind::Primitive(primitive) => match primitive.kind {
            PrimitiveKind::Boolean => Value::Bool(matches!(trimmed, "true" | "on" | "1" | "yes")),
            PrimitiveKind::Integer | PrimitiveKind::Number if trimmed.is_empty() => Value::Null,
            PrimitiveKind::Integer => trimmed.parse::<i64>().map(Value::from).unwrap_or(Value::String(text)),
            PrimitiveKind::Number => trimmed
                .parse::<i64>()
                .map(Value::from)
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number))
                .unwrap_or(Value::String(text)),
            PrimitiveKind::String if text.is_empty() && nullable => Value::Null,
            PrimitiveKind::String => Value::String(text),
        },
        FieldKind::Enumerated { values } => values
            .iter()
            .find(|allowed| match allowed {
                Value::String(literal) => literal == &text,
                other => other.to_string() == trimmed,
            })
            .cloned()
            .unwrap_or(if text.is_empty() { Value::Null } else { Value::String(text) }),
        _ => Value::String(text),
    }
}
