//! Schema loading with cache, timeout, and fallback.
//!
//! A [`SchemaLoader`] asks its primary [`SchemaSource`] for a workflow's
//! schema under a fixed timeout. A failed or slow fetch degrades to the
//! fallback source (normally the bundled sample) with a warning, or to
//! [`LoadOutcome::Unavailable`] when there is none, so a caller can always
//! show something. Only documents from the primary source are cached; a
//! fallback is retried against the primary on the next load.
//!
//! Concurrent loads of the same uncached workflow are not coalesced.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use schemaform_api::SchemaClient;
use schemaform_types::SchemaDocument;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::cache::SchemaCache;

/// Workflow name of the bundled sample schema.
pub const SAMPLE_WORKFLOW: &str = "bike_shop";

const SAMPLE_SCHEMA: &str = include_str!("../data/bike_shop.schema.json");

/// Where raw JSON Schemas come from.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Raw JSON Schema for `workflow`.
    async fn fetch(&self, workflow: &str) -> Result<Value>;

    /// Workflows this source can serve.
    async fn workflows(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Backend schema endpoint.
pub struct HttpSchemaSource {
    client: SchemaClient,
}

impl HttpSchemaSource {
    pub fn new(client: SchemaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, workflow: &str) -> Result<Value> {
        self.client.fetch_schema(workflow).await
    }

    async fn workflows(&self) -> Result<Vec<String>> {
        self.client.list_workflows().await
    }
}

/// A JSON or YAML schema file on disk, served for any workflow name.
pub struct FileSchemaSource {
    path: PathBuf,
}

impl FileSchemaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SchemaSource for FileSchemaSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, _workflow: &str) -> Result<Value> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read schema file {}", self.path.display()))?;
        let is_yaml = matches!(
            self.path.extension().and_then(|extension| extension.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&content).with_context(|| format!("parse YAML schema {}", self.path.display()))
        } else {
            serde_json::from_str(&content).with_context(|| format!("parse JSON schema {}", self.path.display()))
        }
    }

    async fn workflows(&self) -> Result<Vec<String>> {
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.trim_end_matches(".schema").to_string());
        Ok(stem.into_iter().collect())
    }
}

/// An in-memory schema; [`StaticSchemaSource::bundled`] is the sample
/// shipped with the crate.
pub struct StaticSchemaSource {
    workflow: String,
    raw: Cow<'static, str>,
}

impl StaticSchemaSource {
    pub fn new(workflow: impl Into<String>, raw: impl Into<Cow<'static, str>>) -> Self {
        Self {
            workflow: workflow.into(),
            raw: raw.into(),
        }
    }

    pub fn bundled() -> Self {
        Self::new(SAMPLE_WORKFLOW, SAMPLE_SCHEMA)
    }
}

#[async_trait]
impl SchemaSource for StaticSchemaSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, _workflow: &str) -> Result<Value> {
        serde_json::from_str(&self.raw).with_context(|| format!("parse bundled schema '{}'", self.workflow))
    }

    async fn workflows(&self) -> Result<Vec<String>> {
        Ok(vec![self.workflow.clone()])
    }
}

/// How a schema load was satisfied.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Cached(Arc<SchemaDocument>),
    Fetched(Arc<SchemaDocument>),
    /// The primary source failed; this document came from the fallback.
    Fallback { document: Arc<SchemaDocument>, reason: String },
    /// No source produced a usable schema.
    Unavailable { reason: String },
}

impl LoadOutcome {
    pub fn document(&self) -> Option<&Arc<SchemaDocument>> {
        match self {
            Self::Cached(document) | Self::Fetched(document) | Self::Fallback { document, .. } => Some(document),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Fallback { .. } | Self::Unavailable { .. })
    }
}

pub struct SchemaLoader {
    primary: Box<dyn SchemaSource>,
    fallback: Option<Box<dyn SchemaSource>>,
    timeout: Duration,
}

impl SchemaLoader {
    pub fn new(primary: Box<dyn SchemaSource>, timeout: Duration) -> Self {
        Self {
            primary,
            fallback: None,
            timeout,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn SchemaSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Loads `workflow`, consulting `cache` first and filling it on success.
    pub async fn load(&self, workflow: &str, cache: &mut SchemaCache) -> LoadOutcome {
        if let Some(document) = cache.get(workflow) {
            return LoadOutcome::Cached(document);
        }

        let reason = match self.fetch_document(self.primary.as_ref(), workflow).await {
            Ok(document) => {
                info!(workflow, source = self.primary.name(), models = document.models.len(), "loaded schema");
                return LoadOutcome::Fetched(cache.insert(document));
            }
            Err(error) => format!("{:#}", error),
        };
        warn!(workflow, source = self.primary.name(), error = %reason, "schema fetch failed");

        let Some(fallback) = &self.fallback else {
            return LoadOutcome::Unavailable { reason };
        };
        match self.fetch_document(fallback.as_ref(), workflow).await {
            Ok(document) => {
                warn!(workflow, source = fallback.name(), "using fallback schema");
                LoadOutcome::Fallback {
                    document: Arc::new(document),
                    reason,
                }
            }
            Err(error) => {
                warn!(workflow, source = fallback.name(), error = %format!("{:#}", error), "fallback schema failed");
                LoadOutcome::Unavailable { reason }
            }
        }
    }

    /// Workflow names from the primary source, else the fallback's; empty
    /// when neither answers.
    pub async fn workflows(&self) -> Vec<String> {
        match timeout(self.timeout, self.primary.workflows()).await {
            Ok(Ok(names)) => return names,
            Ok(Err(error)) => warn!(source = self.primary.name(), error = %format!("{:#}", error), "workflow list failed"),
            Err(_) => warn!(source = self.primary.name(), timeout_secs = self.timeout.as_secs(), "workflow list timed out"),
        }
        match &self.fallback {
            Some(fallback) => fallback.workflows().await.unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn fetch_document(&self, source: &dyn SchemaSource, workflow: &str) -> Result<SchemaDocument> {
        let raw = timeout(self.timeout, source.fetch(workflow))
            .await
            .map_err(|_| anyhow!("timed out after {:?}", self.timeout))??;
        Ok(SchemaDocument::from_json_schema(workflow, &raw)?)
    }
}
