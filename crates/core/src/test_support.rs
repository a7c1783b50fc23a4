//! Deterministic stand-ins for the reasoning service and capabilities.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::skills::{OutputShape, Reasoned, ReasoningError, ReasoningService};
use crate::state::ToolInput;
use crate::tools::{Capability, CapabilityError, CapabilityProvider};

/// Reasoning service answering each shape with a fixed response
#[derive(Default)]
pub struct ScriptedReasoning {
    responses: HashMap<OutputShape, Result<Reasoned, ReasoningError>>,
    calls: AtomicUsize,
}

impl ScriptedReasoning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for the value's shape with `value`
    pub fn with(mut self, value: Reasoned) -> Self {
        self.responses.insert(value.shape(), Ok(value));
        self
    }

    pub fn failing(mut self, shape: OutputShape, reason: &str) -> Self {
        self.responses.insert(
            shape,
            Err(ReasoningError::Call {
                shape,
                reason: reason.to_string(),
            }),
        );
        self
    }

    /// Answer requests for `shape` with a value of another shape
    pub fn mismatched(mut self, shape: OutputShape, value: Reasoned) -> Self {
        self.responses.insert(shape, Ok(value));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn invoke(&self, shape: OutputShape, _prompt: &str) -> Result<Reasoned, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses.get(&shape).cloned().unwrap_or_else(|| {
            Err(ReasoningError::Call {
                shape,
                reason: "no scripted response".to_string(),
            })
        })
    }
}

/// Capability provider returning a canned outcome
pub struct StubProvider {
    capability: Capability,
    outcome: Result<Value, CapabilityError>,
    delay: Option<Duration>,
}

impl StubProvider {
    pub fn ok(capability: Capability, output: Value) -> Self {
        Self {
            capability,
            outcome: Ok(output),
            delay: None,
        }
    }

    pub fn failing(capability: Capability, error: CapabilityError) -> Self {
        Self {
            capability,
            outcome: Err(error),
            delay: None,
        }
    }

    /// Sleep before answering, to keep a run in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CapabilityProvider for StubProvider {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn invoke(&self, _input: &ToolInput) -> Result<Value, CapabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
