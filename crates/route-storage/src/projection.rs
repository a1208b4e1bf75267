//! Projection of domain events onto the graph store.
//!
//! One edit operation maps to one transaction. Events are staged in order so
//! later events see the effect of earlier ones; the transaction commits once.
//! After commit, every registered [`PostCommitObserver`] inspects the
//! operation and may emit [`RepairIntent`]s. Observers never run before the
//! commit they observe.

use crate::events::RouteNetworkEditOperation;
use crate::graph_store::{RouteNetworkGraphStore, StageError, StageOutcome};
use crate::split::{RepairIntent, SegmentSplitObserver};
use crate::transaction::{Transaction, TransactionError};
use route_core::{ElementId, Version};
use std::fmt;

/// Reacts to a committed edit operation.
pub trait PostCommitObserver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called after `operation` committed as `committed`.
    fn observe(
        &self,
        operation: &RouteNetworkEditOperation,
        committed: Version,
        store: &RouteNetworkGraphStore,
    ) -> Vec<RepairIntent>;
}

/// Ordered set of post-commit observers.
#[derive(Default)]
pub struct ProjectionRegistry {
    observers: Vec<Box<dyn PostCommitObserver>>,
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: impl PostCommitObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.observers.iter().map(|o| o.name()).collect()
    }
}

impl fmt::Debug for ProjectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionRegistry")
            .field("observers", &self.names())
            .finish()
    }
}

/// Why an event did not reach the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Add for an id that already exists.
    Duplicate,
    /// Rejected by the store; the rest of the batch still applies.
    Rejected(StageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEvent {
    /// Position of the event within its operation.
    pub index: usize,
    pub event: &'static str,
    pub element_id: ElementId,
    pub reason: SkipReason,
}

/// Result of staging one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedOperation {
    pub staged: usize,
    pub skipped: Vec<SkippedEvent>,
}

/// Result of applying one operation in command mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionOutcome {
    pub version: Version,
    pub staged: StagedOperation,
    pub intents: Vec<RepairIntent>,
}

/// Maps edit operations to graph mutations.
#[derive(Debug)]
pub struct RouteNetworkProjection {
    registry: ProjectionRegistry,
}

impl Default for RouteNetworkProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteNetworkProjection {
    /// Projection with split detection registered.
    pub fn new() -> Self {
        let mut registry = ProjectionRegistry::new();
        registry.register(SegmentSplitObserver);
        Self { registry }
    }

    pub fn with_registry(registry: ProjectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProjectionRegistry {
        &self.registry
    }

    /// Stages every event of `operation` into `tx`, skipping the ones the store rejects.
    pub fn stage_operation(
        &self,
        store: &RouteNetworkGraphStore,
        tx: &mut Transaction,
        operation: &RouteNetworkEditOperation,
    ) -> StagedOperation {
        let mut result = StagedOperation::default();
        for (index, event) in operation.events.iter().enumerate() {
            let element_id = event.element_id();
            let reason = match store.stage(tx, event.to_mutation()) {
                Ok(StageOutcome::Staged) => {
                    result.staged += 1;
                    continue;
                }
                Ok(StageOutcome::IgnoredDuplicate) => {
                    tracing::debug!(
                        event = event.name(),
                        element_id = %element_id,
                        "Ignoring add for existing element"
                    );
                    SkipReason::Duplicate
                }
                Err(e) => {
                    tracing::warn!(
                        operation = %operation.event_id,
                        event = event.name(),
                        element_id = %element_id,
                        error = %e,
                        "Skipping event"
                    );
                    SkipReason::Rejected(e)
                }
            };
            result.skipped.push(SkippedEvent {
                index,
                event: event.name(),
                element_id,
                reason,
            });
        }
        result
    }

    /// Stages, commits and observes one operation.
    ///
    /// Observers only run when the commit produced a new version.
    pub fn apply(
        &self,
        store: &RouteNetworkGraphStore,
        tx: &mut Transaction,
        operation: &RouteNetworkEditOperation,
    ) -> Result<ProjectionOutcome, TransactionError> {
        let before = store.current_version();
        let staged = self.stage_operation(store, tx, operation);
        let version = tx.commit(store)?;

        let intents = if version > before {
            self.observe(operation, version, store)
        } else {
            Vec::new()
        };

        Ok(ProjectionOutcome {
            version,
            staged,
            intents,
        })
    }

    fn observe(
        &self,
        operation: &RouteNetworkEditOperation,
        committed: Version,
        store: &RouteNetworkGraphStore,
    ) -> Vec<RepairIntent> {
        self.registry
            .observers
            .iter()
            .flat_map(|o| o.observe(operation, committed, store))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RouteNetworkEvent, SEGMENT_SPLIT_COMMAND};
    use crate::transaction::WriteMode;
    use route_core::ElementMetadata;

    fn node_added(id: ElementId, x: f64) -> RouteNetworkEvent {
        RouteNetworkEvent::RouteNodeAdded {
            node_id: id,
            point: [x, 0.0],
            info: None,
            metadata: ElementMetadata::default(),
        }
    }

    fn segment_added(id: ElementId, from: ElementId, to: ElementId) -> RouteNetworkEvent {
        RouteNetworkEvent::RouteSegmentAdded {
            segment_id: id,
            from_node_id: from,
            to_node_id: to,
            line: vec![[0.0, 0.0], [1.0, 0.0]],
            info: None,
            metadata: ElementMetadata::default(),
        }
    }

    #[test]
    fn test_one_operation_one_version() {
        let store = RouteNetworkGraphStore::new();
        let projection = RouteNetworkProjection::new();
        let (a, b, s) = (ElementId::new(), ElementId::new(), ElementId::new());
        let op = RouteNetworkEditOperation::new(
            "NewRouteSegmentDigitized",
            vec![node_added(a, 0.0), node_added(b, 1.0), segment_added(s, a, b)],
        );

        let mut tx = store.begin_transaction(WriteMode::Command);
        let outcome = projection.apply(&store, &mut tx, &op).unwrap();

        assert_eq!(outcome.version, 1);
        assert_eq!(outcome.staged.staged, 3);
        assert!(outcome.intents.is_empty());
        assert_eq!(store.snapshot().stats().segment_count, 1);
    }

    #[test]
    fn test_corrupt_event_is_skipped_not_fatal() {
        let store = RouteNetworkGraphStore::new();
        let projection = RouteNetworkProjection::new();
        let (a, ghost, s, c) = (
            ElementId::new(),
            ElementId::new(),
            ElementId::new(),
            ElementId::new(),
        );
        let op = RouteNetworkEditOperation::new(
            "Replay",
            vec![
                node_added(a, 0.0),
                segment_added(s, a, ghost),
                node_added(a, 5.0),
                node_added(c, 2.0),
            ],
        );

        let mut tx = store.begin_transaction(WriteMode::Load);
        let staged = projection.stage_operation(&store, &mut tx, &op);
        tx.commit(&store).unwrap();

        assert_eq!(staged.staged, 2);
        assert_eq!(staged.skipped.len(), 2);
        assert!(matches!(
            staged.skipped[0].reason,
            SkipReason::Rejected(StageError::MissingEndpoint { .. })
        ));
        assert_eq!(staged.skipped[1].reason, SkipReason::Duplicate);
        assert_eq!(store.snapshot().stats().node_count, 2);
    }

    #[test]
    fn test_split_emits_intent_after_commit() {
        let (a, b, s) = (ElementId::new(), ElementId::new(), ElementId::new());
        let store = RouteNetworkGraphStore::builder()
            .add_node(a, 0.0, 0.0)
            .add_node(b, 10.0, 0.0)
            .add_segment(s, a, b)
            .build();
        let projection = RouteNetworkProjection::new();
        let (x, s1, s2) = (ElementId::new(), ElementId::new(), ElementId::new());
        let op = RouteNetworkEditOperation::new(
            SEGMENT_SPLIT_COMMAND,
            vec![
                node_added(x, 5.0),
                RouteNetworkEvent::RouteSegmentRemoved {
                    segment_id: s,
                    replaced_by_segments: vec![s1, s2],
                },
                segment_added(s1, a, x),
                segment_added(s2, x, b),
            ],
        );

        let mut tx = store.begin_transaction(WriteMode::Command);
        let outcome = projection.apply(&store, &mut tx, &op).unwrap();

        assert_eq!(outcome.version, 2);
        assert_eq!(outcome.intents.len(), 1);
        assert!(store.get_element(s).is_none());
        assert_eq!(projection.registry().names(), vec!["segment-split"]);
    }
}
