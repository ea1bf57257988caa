//! Backend client for workflow schemas.
//!
//! This module provides a lightweight client for the custom-workflow API.
//! It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults and a fixed timeout
//! - Validating the configured base URL for safety
//! - Fetching a workflow's JSON Schema and the list of known workflows
//!
//! Any non-2xx response is an error; callers decide how to degrade.
//!
//! # Example
//!
//! ```ignore
//! use schemaform_api::SchemaClient;
//! use std::time::Duration;
//!
//! async fn load() -> anyhow::Result<()> {
//!     let client = SchemaClient::new("http://localhost:8000", Duration::from_secs(10))?;
//!     let schema = client.fetch_schema("bike_shop").await?;
//!     println!("{}", schema);
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, StatusCode, Url, header};
use schemaform_util::FormsConfig;
use serde_json::Value;
use tracing::debug;

/// Path prefix of the per-workflow schema endpoint.
pub const SCHEMA_PATH_PREFIX: &str = "/api/v1/custom-workflows/schema/";

/// Path of the workflow listing endpoint.
pub const WORKFLOWS_PATH: &str = "/api/v1/custom-workflows/";

/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Characters escaped when a workflow name becomes a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for the schema backend.
pub struct SchemaClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl SchemaClient {
    /// Construct a client for `base_url`. Non-localhost hosts must use HTTPS.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url,
            http,
            user_agent: format!("schemaform/0.1; {}", env::consts::OS),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &FormsConfig) -> Result<Self> {
        Self::new(&config.api_base, config.fetch_timeout())
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "building request");

        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }

    /// `GET {base}/api/v1/custom-workflows/schema/{workflow}/`.
    pub async fn fetch_schema(&self, workflow: &str) -> Result<Value> {
        let path = schema_path(workflow);
        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .with_context(|| format!("request schema for workflow '{}'", workflow))?;
        ensure_success(response.status(), &path)?;
        response
            .json::<Value>()
            .await
            .with_context(|| format!("decode schema for workflow '{}'", workflow))
    }

    /// `GET {base}/api/v1/custom-workflows/`, reduced to workflow names.
    pub async fn list_workflows(&self) -> Result<Vec<String>> {
        let response = self
            .request(reqwest::Method::GET, WORKFLOWS_PATH)
            .send()
            .await
            .context("request workflow list")?;
        ensure_success(response.status(), WORKFLOWS_PATH)?;
        let payload = response.json::<Value>().await.context("decode workflow list")?;
        Ok(workflow_names(&payload))
    }
}

/// API-relative path of a workflow's schema.
pub fn schema_path(workflow: &str) -> String {
    format!("{}{}/", SCHEMA_PATH_PREFIX, utf8_percent_encode(workflow, PATH_SEGMENT))
}

fn ensure_success(status: StatusCode, path: &str) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(anyhow!("GET {} failed with status {}", path, status))
    }
}

/// Accepts `["a", "b"]`, `[{"name": "a"}]`, or either wrapped as `{"workflows": [...]}`.
fn workflow_names(payload: &Value) -> Vec<String> {
    let items = payload
        .get("workflows")
        .or_else(|| payload.get("results"))
        .unwrap_or(payload)
        .as_array();
    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.as_str()
                        .or_else(|| item.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid API base URL '{}': {}", base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("API base URL must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "API base URL must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    Ok(())
}
