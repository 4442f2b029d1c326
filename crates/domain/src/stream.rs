use serde::{Deserialize, Deserializer};
use std::pin::Pin;

use crate::error::Result;

/// A boxed async stream, used for the streaming run response body.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Sentinel payload that terminates a run stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded `data:` payload of a streaming run, tagged by its `object`
/// field.
///
/// Only the kinds the reply decoder acts on get their own variant; every
/// other well-formed event (run status changes, step deltas, ...) lands in
/// [`StreamEvent::Other`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "object")]
pub enum StreamEvent {
    /// An increment of assistant text.
    #[serde(rename = "thread.message.delta")]
    Delta { delta: MessageDelta },

    /// One assistant message is finished. More events may follow.
    #[serde(rename = "thread.message.completed")]
    Completed,

    #[serde(other)]
    Other,
}

impl StreamEvent {
    /// Parse a single `data:` payload.  Malformed payloads return an error
    /// the caller is expected to log and skip.
    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Body of a `thread.message.delta` event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageDelta {
    /// Entries that do not match the expected shape are dropped on their
    /// own; the rest of the delta is kept.
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Vec<DeltaContent>,
}

fn lenient_content<'de, D>(deserializer: D) -> std::result::Result<Vec<DeltaContent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

impl MessageDelta {
    /// Text fragments carried by this delta, in content order.  Entries
    /// without a `text.value` (images, annotations-only parts) are skipped.
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.content
            .iter()
            .filter_map(|part| part.text.as_ref()?.value.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeltaContent {
    #[serde(default)]
    pub text: Option<DeltaText>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeltaText {
    #[serde(default)]
    pub value: Option<String>,
}
