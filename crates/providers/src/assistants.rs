//! Client for the hosted Assistants API (v2).
//!
//! Covers the startup provisioning calls (assistant, vector store, file
//! upload and registration) and the streaming `threads/runs` call used for
//! every user message.

use std::path::Path;

use serde_json::Value;

use dg_domain::config::Config;
use dg_domain::error::{Error, Result};

use crate::traits::{AssistantSpec, ByteStream, Provisioner, RunClient, RunRequest};
use crate::util::{from_reqwest, parse_id, success_body};

/// Beta header required by every Assistants v2 endpoint.
const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bearer-authenticated Assistants API client.
///
/// The underlying `reqwest::Client` has a connect timeout but no overall
/// request timeout: a streaming run lasts as long as the remote keeps the
/// connection open.
pub struct AssistantsClient {
    base_url: String,
    api_key: String,
    temperature: f64,
    top_p: f64,
    client: reqwest::Client,
}

impl AssistantsClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        if cfg.api_key.is_empty() {
            return Err(Error::Auth("api_key is empty".into()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    // ── Internal: build authenticated request builder ──────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<String> {
        let url = self.url(path);
        tracing::debug!(url = %url, "assistants request");
        let resp = self
            .authed_post(&url)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let body = success_body(resp).await?;
        tracing::debug!(url = %url, body = %body, "assistants response");
        Ok(body)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Body builders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn assistant_body(spec: &AssistantSpec) -> Value {
    let tools: Vec<Value> = spec
        .tools
        .iter()
        .map(|t| serde_json::json!({ "type": t }))
        .collect();
    serde_json::json!({
        "name": spec.name,
        "instructions": spec.instructions,
        "model": spec.model,
        "tools": tools,
    })
}

fn file_search_resources(index_id: &str) -> Value {
    serde_json::json!({
        "file_search": { "vector_store_ids": [index_id] }
    })
}

fn run_body(req: &RunRequest, temperature: f64, top_p: f64) -> Value {
    serde_json::json!({
        "assistant_id": req.assistant_id,
        "thread": { "messages": req.messages },
        "tool_resources": file_search_resources(&req.index_id),
        "temperature": temperature,
        "top_p": top_p,
        "stream": true,
    })
}

/// Adapt a response into a chunk stream that ends at EOF or after the
/// first read error.
fn body_stream(response: reqwest::Response) -> ByteStream {
    let stream = async_stream::stream! {
        let mut response = response;
        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => yield Ok(bytes.to_vec()),
                Ok(None) => break,
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl Provisioner for AssistantsClient {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        let body = self.post_json("assistants", &assistant_body(spec)).await?;
        let id = parse_id(&body)?;
        tracing::info!(assistant_id = %id, "assistant created");
        Ok(id)
    }

    async fn create_index(&self) -> Result<String> {
        let body = self
            .post_json("vector_stores", &serde_json::json!({}))
            .await?;
        let id = parse_id(&body)?;
        tracing::info!(vector_store_id = %id, "vector store created");
        Ok(id)
    }

    async fn upload_document(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        tracing::debug!(path = %path.display(), "reading document for upload");
        let bytes = tokio::fs::read(path).await?;

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone()),
            )
            .text("purpose", "assistants");

        let url = self.url("files");
        tracing::debug!(url = %url, file_name = %file_name, "uploading document");
        let resp = self
            .authed_post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(from_reqwest)?;
        let body = success_body(resp).await?;
        let id = parse_id(&body)?;
        tracing::debug!(file_name = %file_name, file_id = %id, "document uploaded");
        Ok(id)
    }

    async fn register_document(&self, index_id: &str, document_id: &str) -> Result<()> {
        let path = format!("vector_stores/{index_id}/files");
        self.post_json(&path, &serde_json::json!({ "file_id": document_id }))
            .await?;
        tracing::info!(vector_store_id = %index_id, file_id = %document_id, "document registered");
        Ok(())
    }

    async fn attach_index(&self, assistant_id: &str, index_id: &str) -> Result<()> {
        let path = format!("assistants/{assistant_id}");
        let body = serde_json::json!({ "tool_resources": file_search_resources(index_id) });
        self.post_json(&path, &body).await?;
        tracing::info!(assistant_id = %assistant_id, vector_store_id = %index_id, "assistant updated");
        Ok(())
    }
}

#[async_trait::async_trait]
impl RunClient for AssistantsClient {
    async fn create_run(&self, req: &RunRequest) -> Result<ByteStream> {
        let url = self.url("threads/runs");
        let body = run_body(req, self.temperature, self.top_p);

        tracing::debug!(
            assistant_id = %req.assistant_id,
            messages = req.messages.len(),
            "starting streaming run"
        );

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Remote {
                status: status.as_u16(),
                body: err_text,
            });
        }

        Ok(body_stream(resp))
    }
}
