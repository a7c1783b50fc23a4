//! # Swarm Coordinator
//!
//! Drives one query through the pipeline. [`Coordinator::run`] is a lazy
//! stream yielding a [`StageSnapshot`] after every stage; each call starts a
//! fresh run with its own state and run id.

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Instrument;

use crate::state::SharedState;

use super::pipeline::{route, Pipeline, PipelineStage, ROUTER};
use super::registry::{StatusRegistry, StatusReporter};

/// Merged state after a stage, with the routing decision taken
#[derive(Debug, Clone, Serialize)]
pub struct StageSnapshot {
    pub stage: PipelineStage,
    pub next: PipelineStage,
    pub state: SharedState,
}

/// The pipeline driver. Cheap to clone; clones share the pipeline and registry.
#[derive(Clone)]
pub struct Coordinator {
    pipeline: Arc<Pipeline>,
    registry: Arc<StatusRegistry>,
}

struct Cursor {
    coordinator: Coordinator,
    status: StatusReporter,
    state: SharedState,
    stage: PipelineStage,
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if let Some(run_id) = self.status.run_id() {
            self.coordinator.registry.release_run(run_id);
        }
    }
}

impl Coordinator {
    pub fn new(pipeline: Pipeline, registry: Arc<StatusRegistry>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<StatusRegistry> {
        &self.registry
    }

    /// Start a run under a fresh run id
    pub fn run(&self, query: &str) -> BoxStream<'static, StageSnapshot> {
        self.run_scoped(query, &uuid::Uuid::new_v4().to_string())
    }

    /// Start a run whose status updates carry `run_id`
    pub fn run_scoped(&self, query: &str, run_id: &str) -> BoxStream<'static, StageSnapshot> {
        let cursor = Cursor {
            coordinator: self.clone(),
            status: StatusReporter::new(self.registry.clone(), run_id),
            state: SharedState::new(query),
            stage: PipelineStage::Plan,
        };
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);

        stream::unfold(Some(cursor), move |cursor| {
            let span = span.clone();
            async move {
                let mut cursor = cursor?;
                let snapshot = cursor.step().instrument(span).await?;
                let next = (!snapshot.next.is_terminal()).then_some(cursor);
                Some((snapshot, next))
            }
        })
        .boxed()
    }

    /// Drive a run to the end and return the final state
    #[tracing::instrument(skip(self, query))]
    pub async fn execute(&self, query: &str, run_id: &str) -> SharedState {
        let mut runs = self.run_scoped(query, run_id);
        let mut last = SharedState::new(query);
        while let Some(snapshot) = runs.next().await {
            last = snapshot.state;
        }
        last
    }

    fn publish_route(&self, status: &StatusReporter, from: PipelineStage, to: PipelineStage) {
        let mut extra = Map::new();
        extra.insert("from".to_string(), Value::String(from.to_string()));
        extra.insert("next".to_string(), Value::String(to.to_string()));
        status.update_with(ROUTER, extra, &format!("Routing {} -> {}", from, to));
    }
}

impl Cursor {
    /// Run the current stage, merge, route. `None` once terminal.
    async fn step(&mut self) -> Option<StageSnapshot> {
        let completed = self.stage;
        let stage = self.coordinator.pipeline.stage(completed)?.clone();

        tracing::info!(stage = %completed, "Stage started");
        let update = stage.run(&self.state, &self.status).await;
        self.state.apply(update);

        let decision = route(completed, &self.state);
        if let Some(patch) = decision.patch {
            self.state.apply(patch);
        }
        if let Some(error) = self.state.error.as_deref() {
            tracing::debug!(stage = %completed, error, "State carries an error");
        }
        self.coordinator
            .publish_route(&self.status, completed, decision.next);
        tracing::info!(stage = %completed, next = %decision.next, "Stage finished");

        self.stage = decision.next;
        Some(StageSnapshot {
            stage: completed,
            next: decision.next,
            state: self.state.clone(),
        })
    }
}
