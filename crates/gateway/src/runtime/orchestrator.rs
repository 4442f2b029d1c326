//! Request orchestration for one inbound message.
//!
//! [`Orchestrator::accept`] records the user turn and must run in arrival
//! order.  [`Orchestrator::respond`] does the slow part (remote run, stream
//! decode, delivery) and may run concurrently with other messages.

use std::sync::Arc;
use std::time::Instant;

use dg_domain::config::NoticesConfig;
use dg_domain::error::Result;
use dg_domain::trace::TraceEvent;
use dg_domain::turn::Turn;
use dg_providers::{decode_reply, DecodedReply, RunClient, RunRequest};
use dg_sessions::{Session, SessionStore};

use crate::channel::{InboundMessage, ReplySink};

/// How a message was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The assistant reply was recorded and sent.
    Replied,
    /// The run produced no text; the empty-reply notice was sent.
    EmptyReply,
    /// The run request or its stream failed; the failure notice was sent.
    Failed,
}

pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    runs: Arc<dyn RunClient>,
    sink: Arc<dyn ReplySink>,
    assistant_id: String,
    index_id: String,
    notices: NoticesConfig,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        runs: Arc<dyn RunClient>,
        sink: Arc<dyn ReplySink>,
        assistant_id: impl Into<String>,
        index_id: impl Into<String>,
        notices: NoticesConfig,
    ) -> Self {
        Self {
            sessions,
            runs,
            sink,
            assistant_id: assistant_id.into(),
            index_id: index_id.into(),
            notices,
        }
    }

    /// Resolve the sender's session and append the user turn.
    pub fn accept(&self, msg: &InboundMessage) -> Arc<Session> {
        let session = self.sessions.get_or_create(&msg.user_id);
        session.append_and_trim(Turn::user(msg.text.clone()));
        session
    }

    /// Run the assistant over a snapshot of `session` and deliver the
    /// result to the message's chat.
    ///
    /// Errors never escape: failures become a fixed notice and nothing is
    /// appended to the history.
    pub async fn respond(&self, session: &Session, msg: &InboundMessage) -> Outcome {
        let started = Instant::now();
        let messages = session.snapshot();

        TraceEvent::RunDispatched {
            user_id: msg.user_id.to_string(),
            history_len: messages.len(),
        }
        .emit();

        let req = RunRequest {
            assistant_id: self.assistant_id.clone(),
            index_id: self.index_id.clone(),
            messages,
        };

        match self.run(&req).await {
            Ok(reply) => {
                TraceEvent::RunFinished {
                    user_id: msg.user_id.to_string(),
                    reply_chars: reply.text.chars().count(),
                    messages_completed: reply.messages_completed,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit();

                session.append_and_trim(Turn::assistant(reply.text.clone()));
                self.deliver(msg, &reply.text).await;
                Outcome::Replied
            }
            Err(e) => {
                let empty = e.is_empty_reply();
                tracing::warn!(user_id = %msg.user_id, error = %e, "run failed");
                TraceEvent::RunFailed {
                    user_id: msg.user_id.to_string(),
                    empty_reply: empty,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit();

                if empty {
                    self.deliver(msg, &self.notices.empty_reply).await;
                    Outcome::EmptyReply
                } else {
                    self.deliver(msg, &self.notices.transport_failure).await;
                    Outcome::Failed
                }
            }
        }
    }

    /// `accept` followed by `respond`.
    pub async fn handle(&self, msg: &InboundMessage) -> Outcome {
        let session = self.accept(msg);
        self.respond(&session, msg).await
    }

    async fn run(&self, req: &RunRequest) -> Result<DecodedReply> {
        let body = self.runs.create_run(req).await?;
        decode_reply(body).await
    }

    async fn deliver(&self, msg: &InboundMessage, text: &str) {
        if let Err(e) = self.sink.send_text(msg.chat_id, text).await {
            tracing::error!(user_id = %msg.user_id, chat_id = msg.chat_id, error = %e, "reply delivery failed");
        }
    }
}
