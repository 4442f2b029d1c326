pub mod assistants;
pub mod sse;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use assistants::AssistantsClient;
pub use sse::{decode_reply, DecodedReply};
pub use traits::{AssistantSpec, ByteStream, Provisioner, RunClient, RunRequest};
