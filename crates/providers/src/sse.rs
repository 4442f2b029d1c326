//! Decoder for the server-sent-events body of a streaming run.
//!
//! The body is a sequence of newline-terminated lines.  Only `data:` lines
//! matter: each carries either one JSON event or the `[DONE]` sentinel.
//! [`decode_reply`] concatenates the text of every `thread.message.delta`
//! event until the sentinel or end of stream.

use futures_util::StreamExt;

use dg_domain::error::{Error, Result};
use dg_domain::stream::{StreamEvent, DONE_SENTINEL};

use crate::traits::ByteStream;

/// Fully assembled assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReply {
    pub text: String,
    /// Number of `thread.message.completed` events seen.
    pub messages_completed: usize,
}

/// Pull every complete line out of `buffer`.
///
/// Lines are split on `\n` at the byte level so multi-byte characters that
/// straddle chunk boundaries are reassembled before decoding.  A trailing
/// partial line stays in the buffer for the next call.
pub(crate) fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&raw).into_owned());
    }
    lines
}

/// The payload of a `data:` line, or `None` for blank lines, comments and
/// other SSE fields.
pub(crate) fn data_payload(line: &str) -> Option<&str> {
    let data = line.trim().strip_prefix("data:")?.trim();
    (!data.is_empty()).then_some(data)
}

enum Step {
    Continue,
    Done,
}

#[derive(Default)]
struct Accumulator {
    text: String,
    messages_completed: usize,
}

impl Accumulator {
    fn feed_line(&mut self, line: &str) -> Step {
        let Some(data) = data_payload(line) else {
            return Step::Continue;
        };

        if data == DONE_SENTINEL {
            tracing::debug!("run stream finished");
            return Step::Done;
        }

        match StreamEvent::parse(data) {
            Ok(StreamEvent::Delta { delta }) => {
                for fragment in delta.fragments() {
                    self.text.push_str(fragment);
                }
            }
            Ok(StreamEvent::Completed) => {
                self.messages_completed += 1;
                tracing::debug!(
                    messages_completed = self.messages_completed,
                    "assistant message completed"
                );
            }
            Ok(StreamEvent::Other) => {}
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed stream event");
            }
        }
        Step::Continue
    }

    fn finish(self) -> Result<DecodedReply> {
        tracing::debug!(reply_chars = self.text.chars().count(), "reply assembled");
        if self.text.is_empty() {
            return Err(Error::EmptyReply);
        }
        Ok(DecodedReply {
            text: self.text,
            messages_completed: self.messages_completed,
        })
    }
}

/// Consume a run body and return the concatenated reply text.
///
/// Reading stops at the `[DONE]` sentinel or when the stream ends; a
/// `thread.message.completed` event does not stop it.  Malformed events are
/// logged and skipped.  The stream is owned and dropped on return, which
/// closes the underlying connection on every path.
///
/// # Errors
///
/// * [`Error::StreamRead`] when the body yields an error.
/// * [`Error::EmptyReply`] when no text was accumulated.
pub async fn decode_reply(mut body: ByteStream) -> Result<DecodedReply> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut acc = Accumulator::default();

    while let Some(chunk) = body.next().await {
        let bytes = chunk.map_err(|e| Error::StreamRead(e.to_string()))?;
        buffer.extend_from_slice(&bytes);

        for line in drain_lines(&mut buffer) {
            if let Step::Done = acc.feed_line(&line) {
                return acc.finish();
            }
        }
    }

    // Body closed: the last line may lack its terminating newline.
    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).into_owned();
        acc.feed_line(&line);
    }

    acc.finish()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn body_of(chunks: Vec<Result<Vec<u8>>>) -> ByteStream {
        Box::pin(futures_util::stream::iter(chunks))
    }

    fn text_body(chunks: &[&str]) -> ByteStream {
        body_of(chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect())
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {{\"object\":\"thread.message.delta\",\"delta\":{{\"content\":[{{\"text\":{{\"value\":{}}}}}]}}}}\n",
            serde_json::to_string(text).unwrap()
        )
    }

    #[test]
    fn drain_complete_lines() {
        let mut buf = b"data: one\ndata: two\n".to_vec();
        assert_eq!(drain_lines(&mut buf), vec!["data: one\n", "data: two\n"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_partial_line_stays_in_buffer() {
        let mut buf = b"data: complete\ndata: part".to_vec();
        assert_eq!(drain_lines(&mut buf), vec!["data: complete\n"]);
        assert_eq!(buf, b"data: part");
    }

    #[test]
    fn data_payload_filters_lines() {
        assert_eq!(data_payload("data: {\"a\":1}\r\n"), Some("{\"a\":1}"));
        assert_eq!(data_payload("data: [DONE]"), Some("[DONE]"));
        assert_eq!(data_payload("event: thread.message.delta"), None);
        assert_eq!(data_payload(": keep-alive"), None);
        assert_eq!(data_payload("   "), None);
        assert_eq!(data_payload("data: "), None);
    }

    #[tokio::test]
    async fn concatenates_deltas_until_done() {
        let input = concat!(
            "data: {\"object\":\"thread.message.delta\",\"delta\":{\"content\":[{\"text\":{\"value\":\"Hel\"}}]}}\n",
            "data: {\"object\":\"thread.message.delta\",\"delta\":{\"content\":[{\"text\":{\"value\":\"lo\"}}]}}\n",
            "data: [DONE]\n",
        );
        let reply = decode_reply(text_body(&[input])).await.unwrap();
        assert_eq!(reply.text, "Hello");
    }

    #[tokio::test]
    async fn only_done_is_empty_reply() {
        let err = decode_reply(text_body(&["data: [DONE]\n"])).await.unwrap_err();
        assert!(err.is_empty_reply());
    }

    #[tokio::test]
    async fn eof_without_text_is_empty_reply() {
        let err = decode_reply(text_body(&[])).await.unwrap_err();
        assert!(err.is_empty_reply());
    }

    #[tokio::test]
    async fn malformed_event_is_skipped() {
        let input = format!("data: {{not valid json}}\n{}data: [DONE]\n", delta("still here"));
        let reply = decode_reply(text_body(&[&input])).await.unwrap();
        assert_eq!(reply.text, "still here");
    }

    #[tokio::test]
    async fn mixed_shape_delta_keeps_its_good_fragment() {
        let input = format!(
            "data: {{\"object\":\"thread.message.delta\",\"delta\":{{\"content\":[{{\"text\":{{\"value\":\"Hel\"}}}},{{\"text\":\"x\"}}]}}}}\n{}data: [DONE]\n",
            delta("lo")
        );
        let reply = decode_reply(text_body(&[&input])).await.unwrap();
        assert_eq!(reply.text, "Hello");
    }

    #[tokio::test]
    async fn completed_does_not_stop_reading() {
        let input = format!(
            "{}data: {{\"object\":\"thread.message.completed\"}}\n{}data: [DONE]\n",
            delta("first "),
            delta("second")
        );
        let reply = decode_reply(text_body(&[&input])).await.unwrap();
        assert_eq!(reply.text, "first second");
        assert_eq!(reply.messages_completed, 1);
    }

    #[tokio::test]
    async fn done_ignores_remaining_lines() {
        let input = format!("{}data: [DONE]\n{}", delta("kept"), delta(" dropped"));
        let reply = decode_reply(text_body(&[&input])).await.unwrap();
        assert_eq!(reply.text, "kept");
    }

    #[tokio::test]
    async fn event_lines_and_other_kinds_are_ignored() {
        let input = format!(
            "event: thread.run.created\ndata: {{\"object\":\"thread.run\",\"status\":\"queued\"}}\n\nevent: thread.message.delta\n{}\nevent: done\ndata: [DONE]\n",
            delta("ok")
        );
        let reply = decode_reply(text_body(&[&input])).await.unwrap();
        assert_eq!(reply.text, "ok");
    }

    #[tokio::test]
    async fn lines_split_across_chunks() {
        let line = delta("Привет");
        let bytes = line.as_bytes();
        // Split inside the multi-byte text on purpose.
        let cut = line.find("Привет").unwrap() + 1;
        let chunks = vec![
            Ok(bytes[..cut].to_vec()),
            Ok(bytes[cut..].to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
        ];
        let reply = decode_reply(body_of(chunks)).await.unwrap();
        assert_eq!(reply.text, "Привет");
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_decoded() {
        let line = delta("tail");
        let unterminated = line.trim_end_matches('\n');
        let reply = decode_reply(text_body(&[unterminated])).await.unwrap();
        assert_eq!(reply.text, "tail");
    }

    #[tokio::test]
    async fn read_error_fails_decode() {
        let chunks = vec![
            Ok(delta("partial").into_bytes()),
            Err(Error::Http("connection reset".into())),
        ];
        let err = decode_reply(body_of(chunks)).await.unwrap_err();
        assert!(matches!(err, Error::StreamRead(ref m) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn body_is_dropped_on_done() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let chunks = vec![Ok(format!("{}data: [DONE]\n", delta("x")).into_bytes())];
        // Never-ending tail: only the sentinel can end this decode.
        let body = futures_util::stream::iter(chunks)
            .chain(futures_util::stream::pending())
            .map(move |item| {
                let _keep = &flag;
                item
            });

        let reply = decode_reply(Box::pin(body)).await.unwrap();
        assert_eq!(reply.text, "x");
        assert!(dropped.load(Ordering::SeqCst));
    }
}
