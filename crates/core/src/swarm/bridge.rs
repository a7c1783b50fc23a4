//! # Progress Bridge
//!
//! Interleaves a running pipeline with live delivery of its status updates.
//!
//! ```text
//! StatusRegistry ──(run-scoped subscriber)──▶ unbounded queue ──▶ relay loop ──▶ out (SSE)
//!                                                                   ▲
//! tokio::spawn(Coordinator::execute) ── JoinHandle ─────────────────┘
//! ```
//!
//! The relay sends `start`, forwards queued updates while the run is in
//! flight, drains what is left once it finishes, then sends exactly one
//! terminal event. The subscription is released on every exit path.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::state::SharedState;

use super::coordinator::Coordinator;
use super::events::ProgressEvent;
use super::registry::StatusUpdate;

/// How often the relay re-checks the run while no events arrive
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Capacity of the outgoing channel returned by [`ProgressBridge::stream`]
const OUTPUT_BUFFER: usize = 64;

/// How a relay ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// `complete` was sent
    Completed { has_errors: bool },
    /// `error` was sent: the run produced no summary or died
    Failed,
    /// The receiving side went away; the run was aborted
    Cancelled,
}

/// Per-request relay from the status registry to an event channel
#[derive(Clone)]
pub struct ProgressBridge {
    coordinator: Coordinator,
    poll_interval: Duration,
}

impl ProgressBridge {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start a run in the background and return its event stream
    pub fn stream(&self, query: &str) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        let bridge = self.clone();
        let query = query.to_string();
        tokio::spawn(async move {
            let outcome = bridge.relay(&query, tx).await;
            tracing::debug!(?outcome, "Progress relay finished");
        });
        rx
    }

    /// Run `query` and relay its events into `out` until a terminal event
    #[tracing::instrument(skip(self, out), fields(run_id = tracing::field::Empty))]
    pub async fn relay(&self, query: &str, out: mpsc::Sender<ProgressEvent>) -> RelayOutcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let (queue_tx, mut queue) = mpsc::unbounded_channel::<ProgressEvent>();
        let scope = run_id.clone();
        let _subscription = self
            .coordinator
            .registry()
            .subscribe(Arc::new(move |update: &StatusUpdate| {
                if update.run_id.as_deref() == Some(scope.as_str()) {
                    let _ = queue_tx.send(ProgressEvent::from_status(update));
                }
            }));

        if out.send(ProgressEvent::start(query)).await.is_err() {
            return RelayOutcome::Cancelled;
        }

        let coordinator = self.coordinator.clone();
        let run_query = query.to_string();
        let run_scope = run_id.clone();
        let mut handle: JoinHandle<SharedState> =
            tokio::spawn(async move { coordinator.execute(&run_query, &run_scope).await });

        let joined = loop {
            tokio::select! {
                _ = out.closed() => return cancel(&handle, &out, query),
                received = tokio::time::timeout(self.poll_interval, queue.recv()) => {
                    if let Ok(Some(event)) = received {
                        if out.send(event).await.is_err() {
                            return cancel(&handle, &out, query);
                        }
                    }
                }
            }
            if handle.is_finished() {
                break (&mut handle).await;
            }
        };

        while let Ok(event) = queue.try_recv() {
            if out.send(event).await.is_err() {
                return RelayOutcome::Cancelled;
            }
        }

        let (terminal, outcome) = terminal_event(joined, query);
        if out.send(terminal).await.is_err() {
            return RelayOutcome::Cancelled;
        }
        outcome
    }
}

fn terminal_event(joined: Result<SharedState, JoinError>, query: &str) -> (ProgressEvent, RelayOutcome) {
    match joined {
        Ok(state) => match ProgressEvent::complete(&state) {
            Some(event) => {
                let has_errors = state.has_error();
                (event, RelayOutcome::Completed { has_errors })
            }
            None => {
                let message = state
                    .error
                    .clone()
                    .unwrap_or_else(|| "Pipeline finished without a summary".to_string());
                let source = state.last_sender.clone();
                (ProgressEvent::error(Some(&source), message, query), RelayOutcome::Failed)
            }
        },
        Err(e) => {
            tracing::error!("Pipeline task failed: {}", e);
            let message = if e.is_panic() {
                "Pipeline execution panicked".to_string()
            } else {
                format!("Pipeline execution was aborted: {}", e)
            };
            (ProgressEvent::error(None, message, query), RelayOutcome::Failed)
        }
    }
}

fn cancel(
    handle: &JoinHandle<SharedState>,
    out: &mpsc::Sender<ProgressEvent>,
    query: &str,
) -> RelayOutcome {
    tracing::info!("Client disconnected; aborting run");
    handle.abort();
    // Best effort: a send that failed mid-stream leaves the receiver open.
    if !out.is_closed() {
        let _ = out.try_send(ProgressEvent::error(None, "Client disconnected.", query));
    }
    RelayOutcome::Cancelled
}
