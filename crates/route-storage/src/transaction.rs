//! Transaction management for the route network graph store.
//!
//! Transactions use a "Buffer-then-Apply" strategy:
//!
//! 1. `BEGIN`: a new [`Transaction`] is created by the [`TransactionManager`].
//! 2. Staging: every accepted mutation is appended to the transaction buffer
//!    and its topology effect is recorded in a private overlay, so later
//!    events in the same transaction see earlier ones (read-your-writes).
//! 3. `COMMIT`: the store takes its write lock once, applies the whole buffer
//!    under a single new version and publishes it.
//! 4. `ROLLBACK`: the buffer is discarded. Nothing reaches the store.
//!
//! Readers never observe a buffer, so there is no partial visibility.

use crate::graph_store::{RouteNetworkGraphStore, Topology};
use geo::{LineString, Point};
use route_core::{
    ElementId, LifecycleInfo, MappingInfo, NamingInfo, RouteNode, RouteNodeInfo, RouteSegment,
    RouteSegmentInfo, SafetyInfo, Version,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Unique identifier for a transaction.
pub type TransactionId = u64;

/// Errors related to transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Transaction {0} is not active")]
    NotActive(TransactionId),
    #[error("Transaction {0} is still open; commit or roll it back first")]
    AlreadyOpen(TransactionId),
}

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// How a transaction is being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Bootstrap replay of the full event history under one transaction.
    Load,
    /// One transaction per accepted live edit operation.
    Command,
}

/// A single staged change to the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphMutation {
    AddNode(RouteNode),
    AddSegment(RouteSegment),
    Delete { element_id: ElementId },
    SetNodeGeometry { node_id: ElementId, point: Point<f64> },
    SetSegmentGeometry { segment_id: ElementId, line: LineString<f64> },
    SetNodeInfo { node_id: ElementId, info: Option<RouteNodeInfo> },
    SetSegmentInfo { segment_id: ElementId, info: Option<RouteSegmentInfo> },
    SetNaming { element_id: ElementId, naming: Option<NamingInfo> },
    SetLifecycle { element_id: ElementId, lifecycle: Option<LifecycleInfo> },
    SetMapping { element_id: ElementId, mapping: Option<MappingInfo> },
    SetSafety { element_id: ElementId, safety: Option<SafetyInfo> },
}

impl GraphMutation {
    /// The element this mutation targets.
    pub fn element_id(&self) -> ElementId {
        match self {
            Self::AddNode(n) => n.id,
            Self::AddSegment(s) => s.id,
            Self::Delete { element_id }
            | Self::SetNaming { element_id, .. }
            | Self::SetLifecycle { element_id, .. }
            | Self::SetMapping { element_id, .. }
            | Self::SetSafety { element_id, .. } => *element_id,
            Self::SetNodeGeometry { node_id, .. } | Self::SetNodeInfo { node_id, .. } => *node_id,
            Self::SetSegmentGeometry { segment_id, .. }
            | Self::SetSegmentInfo { segment_id, .. } => *segment_id,
        }
    }

    /// True for mutations that change graph topology (and thus the version chain).
    pub fn is_topology(&self) -> bool {
        matches!(self, Self::AddNode(_) | Self::AddSegment(_) | Self::Delete { .. })
    }
}

/// A handle to an open transaction.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    mode: WriteMode,
    buffer: Vec<GraphMutation>,
    /// Topology as seen from inside the transaction (`None` = deleted here).
    staged: HashMap<ElementId, Option<Topology>>,
}

impl Transaction {
    /// Creates a new active transaction.
    pub fn new(id: TransactionId, mode: WriteMode) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            mode,
            buffer: Vec::new(),
            staged: HashMap::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Number of buffered mutations.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn mutations(&self) -> &[GraphMutation] {
        &self.buffer
    }

    /// Topology staged for `id` in this transaction.
    ///
    /// `None` means the transaction has not touched the element;
    /// `Some(None)` means it was deleted here.
    pub fn staged(&self, id: ElementId) -> Option<Option<&Topology>> {
        self.staged.get(&id).map(|t| t.as_ref())
    }

    /// Buffers a mutation for execution on commit.
    pub fn buffer_mutation(&mut self, mutation: GraphMutation) -> Result<(), TransactionError> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.id));
        }
        match &mutation {
            GraphMutation::AddNode(n) => {
                self.staged.insert(n.id, Some(Topology::Node));
            }
            GraphMutation::AddSegment(s) => {
                self.staged.insert(
                    s.id,
                    Some(Topology::Segment {
                        from: s.from_node,
                        to: s.to_node,
                    }),
                );
            }
            GraphMutation::Delete { element_id } => {
                self.staged.insert(*element_id, None);
            }
            _ => {}
        }
        self.buffer.push(mutation);
        Ok(())
    }

    /// Commits the transaction, publishing all buffered mutations as one new version.
    ///
    /// Returns the version readers will see the changes at. An empty
    /// transaction commits without advancing the version.
    pub fn commit(&mut self, store: &RouteNetworkGraphStore) -> Result<Version, TransactionError> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.id));
        }
        let buffer = std::mem::take(&mut self.buffer);
        let version = store.apply_committed(self.id, &buffer);
        self.state = TransactionState::Committed;
        self.staged.clear();
        Ok(version)
    }

    /// Rolls back the transaction, discarding the buffer.
    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.id));
        }
        self.state = TransactionState::Aborted;
        self.buffer.clear();
        self.staged.clear();
        Ok(())
    }
}

/// Manages transaction lifecycles.
#[derive(Debug)]
pub struct TransactionManager {
    next_tx_id: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_tx_id: AtomicU64::new(1),
        }
    }

    /// Starts a new transaction.
    pub fn begin(&self, mode: WriteMode) -> Transaction {
        let id = self.next_tx_id.fetch_add(1, Ordering::SeqCst);
        Transaction::new(id, mode)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_overlay_tracks_adds_and_deletes() {
        let manager = TransactionManager::new();
        let mut tx = manager.begin(WriteMode::Command);
        let node = RouteNode::new(ElementId::new(), 1.0, 2.0);
        let id = node.id;

        assert_eq!(tx.staged(id), None);
        tx.buffer_mutation(GraphMutation::AddNode(node)).unwrap();
        assert_eq!(tx.staged(id), Some(Some(&Topology::Node)));

        tx.buffer_mutation(GraphMutation::Delete { element_id: id }).unwrap();
        assert_eq!(tx.staged(id), Some(None));
        assert_eq!(tx.len(), 2);
    }

    #[test]
    fn test_rollback_discards_buffer() {
        let manager = TransactionManager::new();
        let mut tx = manager.begin(WriteMode::Command);
        tx.buffer_mutation(GraphMutation::AddNode(RouteNode::new(ElementId::new(), 0.0, 0.0)))
            .unwrap();
        tx.rollback().unwrap();

        assert_eq!(tx.state(), TransactionState::Aborted);
        assert!(tx.is_empty());
        assert!(matches!(
            tx.buffer_mutation(GraphMutation::Delete {
                element_id: ElementId::new()
            }),
            Err(TransactionError::NotActive(_))
        ));
    }

    #[test]
    fn test_transaction_ids_increase() {
        let manager = TransactionManager::new();
        let a = manager.begin(WriteMode::Load);
        let b = manager.begin(WriteMode::Command);
        assert!(b.id() > a.id());
        assert_eq!(a.mode(), WriteMode::Load);
    }
}
