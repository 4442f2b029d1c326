/// Shared error type used across all docguide crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("config: {0}")]
    Config(String),

    /// Startup provisioning of the assistant, index, or documents failed.
    #[error("provisioning {step}: {message}")]
    Provisioning { step: String, message: String },

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The remote API answered with a non-success status.
    #[error("remote HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("stream read: {0}")]
    StreamRead(String),

    /// The run stream finished without producing any text.
    #[error("assistant returned an empty reply")]
    EmptyReply,

    #[error("channel: {0}")]
    Channel(String),

    #[error("auth: {0}")]
    Auth(String),
}

impl Error {
    /// Wrap any error raised during a provisioning step.
    pub fn provisioning(step: &str, err: impl std::fmt::Display) -> Self {
        Error::Provisioning {
            step: step.to_owned(),
            message: err.to_string(),
        }
    }

    pub fn is_empty_reply(&self) -> bool {
        matches!(self, Error::EmptyReply)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
