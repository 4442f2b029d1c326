use serde::{Deserialize, Serialize};

/// Fixed texts sent to the user when a reply cannot be produced.
///
/// They never include error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticesConfig {
    /// Sent when the run request or its stream fails.
    #[serde(default = "d_transport_failure")]
    pub transport_failure: String,
    /// Sent when the run finishes without any text.
    #[serde(default = "d_empty_reply")]
    pub empty_reply: String,
}

impl Default for NoticesConfig {
    fn default() -> Self {
        Self {
            transport_failure: d_transport_failure(),
            empty_reply: d_empty_reply(),
        }
    }
}

fn d_transport_failure() -> String {
    "Sorry, something went wrong while processing your request.".into()
}
fn d_empty_reply() -> String {
    "The assistant could not provide an answer.".into()
}
