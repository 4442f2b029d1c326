use std::path::Path;

use dg_domain::config::Config;
use dg_domain::error::Result;
use dg_domain::stream::BoxStream;
use dg_domain::turn::Turn;

/// Raw body of a streaming run, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Definition of the assistant created at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
    /// Tool types to enable, e.g. `"file_search"`.
    pub tools: Vec<String>,
}

impl AssistantSpec {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            name: cfg.name.clone(),
            instructions: cfg.instructions.clone(),
            model: cfg.model.clone(),
            tools: cfg.tools.clone(),
        }
    }
}

/// One streaming run over a snapshot of a user's history.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub assistant_id: String,
    pub index_id: String,
    /// History snapshot, oldest first.
    pub messages: Vec<Turn>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collaborator traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One-shot calls that set up the assistant and its retrieval index.
#[async_trait::async_trait]
pub trait Provisioner: Send + Sync {
    /// Create the assistant; returns its ID.
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String>;

    /// Create an empty retrieval index (vector store); returns its ID.
    async fn create_index(&self) -> Result<String>;

    /// Upload one document; returns the remote file ID.
    async fn upload_document(&self, path: &Path) -> Result<String>;

    /// Add an uploaded document to an index.
    async fn register_document(&self, index_id: &str, document_id: &str) -> Result<()>;

    /// Point the assistant's file search at an index.
    async fn attach_index(&self, assistant_id: &str, index_id: &str) -> Result<()>;
}

/// Starts streaming runs.
#[async_trait::async_trait]
pub trait RunClient: Send + Sync {
    /// Send the run request and return the live response body.  Transport
    /// failures and non-2xx statuses surface here, before any bytes are
    /// streamed.
    async fn create_run(&self, req: &RunRequest) -> Result<ByteStream>;
}
