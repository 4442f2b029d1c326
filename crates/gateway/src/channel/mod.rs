//! Messaging front end contract.
//!
//! A front end feeds [`InboundMessage`]s into an mpsc channel, one at a time
//! and in arrival order, and accepts outbound text through [`ReplySink`].

pub mod telegram;

use dg_domain::error::Result;
use dg_domain::turn::UserId;

/// A user message as received from the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: UserId,
    /// Chat the reply goes to.
    pub chat_id: i64,
    pub text: String,
}

/// Delivers outbound text to a chat.
#[async_trait::async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
}
