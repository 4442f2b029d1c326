//! Inbound dispatch loop.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::Instrument;

use super::orchestrator::{Orchestrator, Outcome};
use crate::channel::InboundMessage;

/// Single consumer over the inbound channel.
///
/// User turns are recorded synchronously in arrival order; everything after
/// that runs on its own task so a slow run never delays ingestion.
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    limit: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>, max_in_flight: Option<usize>) -> Self {
        Self {
            orchestrator,
            limit: max_in_flight.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    /// Consume `rx` until every sender is dropped.
    ///
    /// Finished units are reaped as the loop goes; the ones still running
    /// when the channel closes are handed back to the caller.
    pub async fn run(&self, mut rx: mpsc::Receiver<InboundMessage>) -> JoinSet<Outcome> {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    let Some(msg) = maybe else { break };
                    self.dispatch(msg, &mut in_flight);
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!(error = %e, "reply task panicked");
                    }
                }
            }
        }

        tracing::info!(in_flight = in_flight.len(), "inbound channel closed");
        in_flight
    }

    fn dispatch(&self, msg: InboundMessage, in_flight: &mut JoinSet<Outcome>) {
        if msg.text.is_empty() {
            tracing::debug!(user_id = %msg.user_id, "skipping empty message");
            return;
        }

        let session = self.orchestrator.accept(&msg);
        let orchestrator = self.orchestrator.clone();
        let limit = self.limit.clone();

        let span = tracing::info_span!("reply", user_id = %msg.user_id, chat_id = msg.chat_id);
        in_flight.spawn(
            async move {
                // Acquired inside the task; ingestion never waits on it.
                let _permit = match limit {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                orchestrator.respond(&session, &msg).await
            }
            .instrument(span),
        );
    }
}

/// Run until `shutdown` resolves, failing as soon as the poller or the
/// dispatch loop ends on its own.
///
/// On shutdown the poller is aborted, which drops the inbound sender and
/// lets the dispatch loop return its still-running units.
pub async fn supervise<S>(
    mut poller: JoinHandle<()>,
    mut dispatch: JoinHandle<JoinSet<Outcome>>,
    shutdown: S,
) -> anyhow::Result<JoinSet<Outcome>>
where
    S: Future<Output = ()>,
{
    tokio::select! {
        _ = shutdown => {}
        res = &mut poller => {
            dispatch.abort();
            return Err(exited("telegram poller", res.err()));
        }
        res = &mut dispatch => {
            poller.abort();
            return Err(exited("dispatch loop", res.err()));
        }
    }

    poller.abort();
    dispatch.await.context("dispatch loop")
}

fn exited(task: &str, err: Option<JoinError>) -> anyhow::Error {
    match err {
        Some(e) => anyhow::Error::new(e).context(format!("{task} failed")),
        None => anyhow::anyhow!("{task} stopped unexpectedly"),
    }
}
