//! # Status Registry
//!
//! Process-wide status board. Holds the last-known status of every entity
//! (stage, router, capability) and pushes each update synchronously to the
//! registered subscribers.
//!
//! ```text
//! Stage ── StatusReporter ──▶ StatusRegistry ──┬──▶ subscriber (bridge, run A)
//!                                              ├──▶ subscriber (bridge, run B)
//!                                              └──▶ ...
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// One status change, as delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    /// Run that produced the update, `None` for process-level notices
    pub run_id: Option<String>,
    pub entity: String,
    /// Extra data of the entity after merging this update. Scoped updates
    /// only see keys published by their own run.
    pub extra: Map<String, Value>,
    /// Message passed with this update (may be empty)
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Last-known status of an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityStatus {
    pub status_message: String,
    pub extra: Map<String, Value>,
    pub last_update: DateTime<Utc>,
}

/// Entity status plus a display name, for status listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEntry {
    pub display_name: String,
    #[serde(flatten)]
    pub status: EntityStatus,
}

/// Receives status updates
pub trait StatusSubscriber: Send + Sync {
    fn on_update(&self, update: &StatusUpdate);
}

impl<F> StatusSubscriber for F
where
    F: Fn(&StatusUpdate) + Send + Sync,
{
    fn on_update(&self, update: &StatusUpdate) {
        self(update)
    }
}

/// Handle identifying a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct Inner {
    entities: HashMap<String, EntityStatus>,
    /// (run id, entity) -> extra data merged from that run only
    scoped: HashMap<(String, String), Map<String, Value>>,
    subscribers: Vec<(SubscriberId, Arc<dyn StatusSubscriber>)>,
    next_id: u64,
}

/// The status board
#[derive(Default)]
pub struct StatusRegistry {
    inner: Mutex<Inner>,
}

impl StatusRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Subscribers run outside the lock, so poisoning only happens on a
        // bug inside this module; the map itself stays consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a process-level update for `entity`
    pub fn update(&self, entity: &str, extra: Option<Map<String, Value>>, message: &str) {
        self.publish(None, entity, extra, message);
    }

    /// Record an update and notify every subscriber before returning
    pub fn publish(
        &self,
        run_id: Option<&str>,
        entity: &str,
        extra: Option<Map<String, Value>>,
        message: &str,
    ) {
        let timestamp = Utc::now();
        let (merged, subscribers) = {
            let mut inner = self.lock();
            let status = inner
                .entities
                .entry(entity.to_string())
                .or_insert_with(|| EntityStatus {
                    status_message: String::new(),
                    extra: Map::new(),
                    last_update: timestamp,
                });
            if let Some(extra) = &extra {
                for (key, value) in extra {
                    status.extra.insert(key.clone(), value.clone());
                }
            }
            if !message.is_empty() {
                status.status_message = message.to_string();
            }
            status.last_update = timestamp;
            let process_wide = status.extra.clone();

            let merged = match run_id {
                Some(run_id) => {
                    let scoped = inner
                        .scoped
                        .entry((run_id.to_string(), entity.to_string()))
                        .or_default();
                    scoped.extend(extra.unwrap_or_default());
                    scoped.clone()
                }
                None => process_wide,
            };
            let subscribers: Vec<_> = inner.subscribers.iter().map(|(_, s)| s.clone()).collect();
            (merged, subscribers)
        };

        let update = StatusUpdate {
            run_id: run_id.map(str::to_string),
            entity: entity.to_string(),
            extra: merged,
            message: message.to_string(),
            timestamp,
        };
        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber.on_update(&update))).is_err() {
                tracing::warn!(entity = %update.entity, "Status subscriber panicked; skipping it");
            }
        }
    }

    /// Add a subscriber; it stays registered until [`unregister`](Self::unregister)
    pub fn register(&self, subscriber: Arc<dyn StatusSubscriber>) -> SubscriberId {
        let mut inner = self.lock();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, subscriber));
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unregister(&self, id: SubscriberId) {
        self.lock().subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Register a subscriber for as long as the returned guard lives
    pub fn subscribe(self: &Arc<Self>, subscriber: Arc<dyn StatusSubscriber>) -> Subscription {
        let id = self.register(subscriber);
        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    /// Forget the extra data scoped to `run_id`. Entity statuses are kept.
    pub fn release_run(&self, run_id: &str) {
        self.lock().scoped.retain(|(run, _), _| run != run_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Current status of one entity
    pub fn status(&self, entity: &str) -> Option<EntityStatus> {
        self.lock().entities.get(entity).cloned()
    }

    /// Current status of every entity, keyed by entity name
    pub fn snapshot(&self) -> BTreeMap<String, StatusEntry> {
        self.lock()
            .entities
            .iter()
            .map(|(name, status)| {
                (
                    name.clone(),
                    StatusEntry {
                        display_name: display_name(name),
                        status: status.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Guard that unregisters its subscriber on drop
#[must_use = "dropping the subscription unregisters the subscriber"]
pub struct Subscription {
    registry: Weak<StatusRegistry>,
    id: SubscriberId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

/// Run-scoped publishing handle given to stages
#[derive(Clone)]
pub struct StatusReporter {
    registry: Arc<StatusRegistry>,
    run_id: Option<String>,
}

impl StatusReporter {
    pub fn new(registry: Arc<StatusRegistry>, run_id: impl Into<String>) -> Self {
        Self {
            registry,
            run_id: Some(run_id.into()),
        }
    }

    /// Reporter that publishes without a run scope
    pub fn unscoped(registry: Arc<StatusRegistry>) -> Self {
        Self {
            registry,
            run_id: None,
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn update(&self, entity: &str, message: &str) {
        self.registry
            .publish(self.run_id.as_deref(), entity, None, message);
    }

    pub fn update_with(&self, entity: &str, extra: Map<String, Value>, message: &str) {
        self.registry
            .publish(self.run_id.as_deref(), entity, Some(extra), message);
    }
}

/// Display-friendly form of an entity name
pub fn display_name(entity: &str) -> String {
    let base = entity
        .strip_suffix("Agent")
        .or_else(|| entity.strip_suffix("_agent"))
        .unwrap_or(entity);
    base.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extra(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn collector() -> (Arc<Mutex<Vec<StatusUpdate>>>, Arc<dyn StatusSubscriber>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscriber: Arc<dyn StatusSubscriber> =
            Arc::new(move |u: &StatusUpdate| sink.lock().unwrap().push(u.clone()));
        (seen, subscriber)
    }

    #[test]
    fn test_extra_data_is_merged_by_key() {
        let registry = StatusRegistry::new();
        registry.update("ExecutionAgent", Some(extra(json!({"task_id": "t1", "current_step": "1/2"}))), "step 1");
        registry.update("ExecutionAgent", Some(extra(json!({"task_id": "t2"}))), "step 2");

        let status = registry.status("ExecutionAgent").unwrap();
        assert_eq!(status.extra["task_id"], "t2");
        assert_eq!(status.extra["current_step"], "1/2");
        assert_eq!(status.status_message, "step 2");
    }

    #[test]
    fn test_empty_message_keeps_previous() {
        let registry = StatusRegistry::new();
        registry.update("PlannerAgent", None, "Planning...");
        registry.update("PlannerAgent", Some(extra(json!({"steps": 2}))), "");
        assert_eq!(registry.status("PlannerAgent").unwrap().status_message, "Planning...");
    }

    #[test]
    fn test_subscribers_receive_merged_extra_and_given_message() {
        let registry = StatusRegistry::new();
        let (seen, subscriber) = collector();
        registry.register(subscriber);

        registry.update("ExecutionAgent", Some(extra(json!({"current_step": "1/2"}))), "first");
        registry.update("ExecutionAgent", Some(extra(json!({"task_id": "t1"}))), "");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].message, "");
        assert_eq!(seen[1].extra["current_step"], "1/2");
        assert_eq!(seen[1].extra["task_id"], "t1");
    }

    #[test]
    fn test_unregister_stops_delivery_and_is_idempotent() {
        let registry = StatusRegistry::new();
        let (seen, subscriber) = collector();
        let id = registry.register(subscriber);
        registry.update("A", None, "one");
        registry.unregister(id);
        registry.unregister(id);
        registry.update("A", None, "two");
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let registry = StatusRegistry::new();
        registry.register(Arc::new(|_: &StatusUpdate| panic!("boom")));
        let (seen, subscriber) = collector();
        registry.register(subscriber);

        registry.update("A", None, "still delivered");
        registry.update("A", None, "and again");

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(registry.status("A").unwrap().status_message, "and again");
    }

    #[test]
    fn test_subscription_guard_unregisters_on_drop() {
        let registry = StatusRegistry::new();
        let (_seen, subscriber) = collector();
        {
            let _subscription = registry.subscribe(subscriber);
            assert_eq!(registry.subscriber_count(), 1);
        }
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[test]
    fn test_reporter_tags_run_id() {
        let registry = StatusRegistry::new();
        let (seen, subscriber) = collector();
        registry.register(subscriber);
        StatusReporter::new(registry.clone(), "run-1").update("PlannerAgent", "hi");
        StatusReporter::unscoped(registry.clone()).update("GraphService", "ready");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].run_id.as_deref(), Some("run-1"));
        assert_eq!(seen[1].run_id, None);
    }

    #[test]
    fn test_scoped_extra_does_not_cross_runs() {
        let registry = StatusRegistry::new();
        let (seen, subscriber) = collector();
        registry.register(subscriber);
        let run_a = StatusReporter::new(registry.clone(), "run-a");
        let run_b = StatusReporter::new(registry.clone(), "run-b");

        run_a.update_with("ExecutionAgent", extra(json!({"task_id": "a1", "current_step": "1/1"})), "a step");
        run_b.update_with("ExecutionAgent", extra(json!({"task_id": "b1"})), "b step");
        run_a.update("ExecutionAgent", "Completed 1/1 steps");

        let seen = seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.run_id.as_deref(), Some("run-a"));
        assert_eq!(last.extra["task_id"], "a1");
        assert_eq!(last.extra["current_step"], "1/1");
        // the status board still shows the latest write from any run
        assert_eq!(registry.status("ExecutionAgent").unwrap().extra["task_id"], "b1");
    }

    #[test]
    fn test_release_run_drops_scoped_extra() {
        let registry = StatusRegistry::new();
        let (seen, subscriber) = collector();
        registry.register(subscriber);
        let run = StatusReporter::new(registry.clone(), "run-a");

        run.update_with("ExecutionAgent", extra(json!({"task_id": "a1"})), "step");
        registry.release_run("run-a");
        run.update("ExecutionAgent", "again");

        assert!(seen.lock().unwrap().last().unwrap().extra.is_empty());
        assert_eq!(registry.status("ExecutionAgent").unwrap().status_message, "again");
    }

    #[test]
    fn test_snapshot_display_names() {
        let registry = StatusRegistry::new();
        registry.update("PlannerAgent", None, "x");
        registry.update("summary_agent", None, "x");
        registry.update("web_search", None, "x");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot["PlannerAgent"].display_name, "Planner");
        assert_eq!(snapshot["summary_agent"].display_name, "Summary");
        assert_eq!(snapshot["web_search"].display_name, "Web Search");
    }
}
