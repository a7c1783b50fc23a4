//! # Swarm Orchestration
//!
//! Drives queries through the stage pipeline and relays progress.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Query → Plan → Execute → Analyze → Summarize → complete
//!           └───────┴── error ──────────┘
//! ```

pub mod bridge;
pub mod coordinator;
pub mod events;
pub mod pipeline;
pub mod registry;

pub use bridge::{ProgressBridge, RelayOutcome, DEFAULT_POLL_INTERVAL};
pub use coordinator::{Coordinator, StageSnapshot};
pub use events::ProgressEvent;
pub use pipeline::{route, Pipeline, PipelineStage, Route, ROUTER};
pub use registry::{
    display_name, EntityStatus, StatusEntry, StatusRegistry, StatusReporter, StatusSubscriber,
    StatusUpdate, SubscriberId, Subscription,
};
