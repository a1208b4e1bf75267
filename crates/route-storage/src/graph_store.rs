//! Versioned in-memory store for the route network graph.
//!
//! Topology (which nodes and segments exist, and which nodes a segment
//! connects) is kept in per-element MVCC version chains, so a read at any
//! committed version is stable forever. Attributes (geometry, kind info,
//! naming, lifecycle, mapping, safety) are last-write-wins and are not
//! versioned.
//!
//! ## Example
//!
//! ```
//! use route_core::ElementId;
//! use route_storage::RouteNetworkGraphStore;
//!
//! let a = ElementId::new();
//! let b = ElementId::new();
//! let s = ElementId::new();
//!
//! let store = RouteNetworkGraphStore::builder()
//!     .add_node(a, 0.0, 0.0)
//!     .add_node(b, 100.0, 0.0)
//!     .add_segment(s, a, b)
//!     .build();
//!
//! let segment = store.snapshot().get_segment(s).unwrap();
//! assert_eq!(segment.length(), 100.0);
//! ```

use crate::mvcc::VersionedValue;
use crate::transaction::{
    GraphMutation, Transaction, TransactionError, TransactionId, TransactionManager, WriteMode,
};
use geo::LineString;
use parking_lot::RwLock;
use route_core::{
    ElementId, Envelope, NamingInfo, RouteNetworkElement, RouteNetworkElementKind, RouteNode,
    RouteNodeInfo, RouteNodeKind, RouteSegment, Version,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// =============================================================================
// Topology
// =============================================================================

/// The versioned part of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    Node,
    Segment { from: ElementId, to: ElementId },
}

impl Topology {
    pub fn kind(&self) -> RouteNetworkElementKind {
        match self {
            Self::Node => RouteNetworkElementKind::RouteNode,
            Self::Segment { .. } => RouteNetworkElementKind::RouteSegment,
        }
    }
}

/// Why a mutation could not be staged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Segment {segment} references endpoint {node} which is not a route node")]
    MissingEndpoint { segment: ElementId, node: ElementId },

    #[error("Element {0} not found")]
    NotFound(ElementId),

    #[error("Element {id} is a {actual:?}, expected {expected:?}")]
    WrongKind {
        id: ElementId,
        expected: RouteNetworkElementKind,
        actual: RouteNetworkElementKind,
    },

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Result of staging a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Staged,
    /// An add for an id that already exists; ignored.
    IgnoredDuplicate,
}

/// Element counts at one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub version: Version,
    pub node_count: usize,
    pub segment_count: usize,
}

// =============================================================================
// Store state
// =============================================================================

#[derive(Debug, Default)]
struct StoreState {
    /// Version chains for topology.
    topology: HashMap<ElementId, VersionedValue<Topology>>,
    /// Latest attributes of every element ever added.
    attributes: HashMap<ElementId, RouteNetworkElement>,
    /// node -> every segment ever attached to it (append-only).
    incident: HashMap<ElementId, Vec<ElementId>>,
    committed_version: Version,
}

impl StoreState {
    fn topology_at(&self, id: ElementId, version: Version) -> Option<Topology> {
        self.topology.get(&id).and_then(|c| c.get(version)).copied()
    }

    fn element_at(&self, id: ElementId, version: Version) -> Option<RouteNetworkElement> {
        let topology = self.topology_at(id, version)?;
        let attributes = self.attributes.get(&id)?;
        match (topology, attributes) {
            (Topology::Node, RouteNetworkElement::Node(node)) => {
                Some(RouteNetworkElement::Node(node.clone()))
            }
            (Topology::Segment { from, to }, RouteNetworkElement::Segment(segment)) => {
                let mut segment = segment.clone();
                segment.from_node = from;
                segment.to_node = to;
                Some(RouteNetworkElement::Segment(segment))
            }
            _ => None,
        }
    }

    fn apply(&mut self, mutation: &GraphMutation, version: Version) {
        match mutation {
            GraphMutation::AddNode(node) => {
                self.push_topology(node.id, Topology::Node, version);
                self.attributes
                    .insert(node.id, RouteNetworkElement::Node(node.clone()));
            }
            GraphMutation::AddSegment(segment) => {
                let topology = Topology::Segment {
                    from: segment.from_node,
                    to: segment.to_node,
                };
                self.push_topology(segment.id, topology, version);
                self.attributes
                    .insert(segment.id, RouteNetworkElement::Segment(segment.clone()));
                for node in [segment.from_node, segment.to_node] {
                    let list = self.incident.entry(node).or_default();
                    if !list.contains(&segment.id) {
                        list.push(segment.id);
                    }
                }
            }
            GraphMutation::Delete { element_id } => {
                if let Some(chain) = self.topology.get_mut(element_id) {
                    chain.delete(version);
                }
            }
            GraphMutation::SetNodeGeometry { node_id, point } => {
                if let Some(RouteNetworkElement::Node(n)) = self.attributes.get_mut(node_id) {
                    n.point = *point;
                }
            }
            GraphMutation::SetSegmentGeometry { segment_id, line } => {
                if let Some(RouteNetworkElement::Segment(s)) = self.attributes.get_mut(segment_id) {
                    s.line = line.clone();
                }
            }
            GraphMutation::SetNodeInfo { node_id, info } => {
                if let Some(RouteNetworkElement::Node(n)) = self.attributes.get_mut(node_id) {
                    n.info = info.clone();
                }
            }
            GraphMutation::SetSegmentInfo { segment_id, info } => {
                if let Some(RouteNetworkElement::Segment(s)) = self.attributes.get_mut(segment_id) {
                    s.info = info.clone();
                }
            }
            GraphMutation::SetNaming { element_id, naming } => {
                if let Some(e) = self.attributes.get_mut(element_id) {
                    metadata_mut(e).naming = naming.clone();
                }
            }
            GraphMutation::SetLifecycle {
                element_id,
                lifecycle,
            } => {
                if let Some(e) = self.attributes.get_mut(element_id) {
                    metadata_mut(e).lifecycle = lifecycle.clone();
                }
            }
            GraphMutation::SetMapping {
                element_id,
                mapping,
            } => {
                if let Some(e) = self.attributes.get_mut(element_id) {
                    metadata_mut(e).mapping = mapping.clone();
                }
            }
            GraphMutation::SetSafety { element_id, safety } => {
                if let Some(e) = self.attributes.get_mut(element_id) {
                    metadata_mut(e).safety = safety.clone();
                }
            }
        }
    }

    fn push_topology(&mut self, id: ElementId, topology: Topology, version: Version) {
        match self.topology.get_mut(&id) {
            Some(chain) => chain.update(version, topology),
            None => {
                self.topology.insert(id, VersionedValue::new(version, topology));
            }
        }
    }
}

fn metadata_mut(element: &mut RouteNetworkElement) -> &mut route_core::ElementMetadata {
    match element {
        RouteNetworkElement::Node(n) => &mut n.metadata,
        RouteNetworkElement::Segment(s) => &mut s.metadata,
    }
}

// =============================================================================
// RouteNetworkGraphStore
// =============================================================================

/// Versioned in-memory graph of route nodes and route segments.
///
/// All reads target a committed version. Writes are staged in a
/// [`Transaction`] and published atomically by [`Transaction::commit`].
/// The store itself is `Sync`: any number of readers may run alongside the
/// single writer.
#[derive(Debug, Default)]
pub struct RouteNetworkGraphStore {
    state: RwLock<StoreState>,
    transaction_manager: TransactionManager,
}

impl RouteNetworkGraphStore {
    /// Creates an empty store at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new store builder.
    pub fn builder() -> RouteNetworkGraphStoreBuilder {
        RouteNetworkGraphStoreBuilder::new()
    }

    /// The latest committed version.
    pub fn current_version(&self) -> Version {
        self.state.read().committed_version
    }

    /// A read handle pinned to the latest committed version.
    pub fn snapshot(&self) -> GraphSnapshot<'_> {
        GraphSnapshot {
            store: self,
            version: self.current_version(),
        }
    }

    /// A read handle pinned to `version` (clamped to the latest committed version).
    pub fn snapshot_at(&self, version: Version) -> GraphSnapshot<'_> {
        GraphSnapshot {
            store: self,
            version: version.min(self.current_version()),
        }
    }

    /// Starts a new transaction.
    pub fn begin_transaction(&self, mode: WriteMode) -> Transaction {
        self.transaction_manager.begin(mode)
    }

    /// Gets an element at the latest committed version.
    pub fn get_element(&self, id: ElementId) -> Option<RouteNetworkElement> {
        let state = self.state.read();
        state.element_at(id, state.committed_version)
    }

    /// Gets an element as it was at `version`.
    pub fn get_element_at(&self, id: ElementId, version: Version) -> Option<RouteNetworkElement> {
        let state = self.state.read();
        state.element_at(id, version.min(state.committed_version))
    }

    /// Linear scan for elements whose envelope intersects `envelope` at `version`.
    pub fn query_by_envelope(&self, version: Version, envelope: &Envelope) -> Vec<RouteNetworkElement> {
        let state = self.state.read();
        let version = version.min(state.committed_version);
        state
            .topology
            .keys()
            .filter_map(|id| state.element_at(*id, version))
            .filter(|e| e.envelope().is_some_and(|env| env.intersects(envelope)))
            .collect()
    }

    /// Segments attached to `node` at `version`.
    pub fn incident_segments_at(&self, node: ElementId, version: Version) -> Vec<RouteSegment> {
        let state = self.state.read();
        let version = version.min(state.committed_version);
        state
            .incident
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|sid| match state.element_at(*sid, version) {
                Some(RouteNetworkElement::Segment(s)) if s.has_endpoint(node) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Returns element counts at `version`.
    pub fn stats_at(&self, version: Version) -> GraphStats {
        let state = self.state.read();
        let version = version.min(state.committed_version);
        let mut stats = GraphStats {
            version,
            node_count: 0,
            segment_count: 0,
        };
        for chain in state.topology.values() {
            match chain.get(version) {
                Some(Topology::Node) => stats.node_count += 1,
                Some(Topology::Segment { .. }) => stats.segment_count += 1,
                None => {}
            }
        }
        stats
    }

    /// Topology of `id` as seen from inside `tx`.
    pub fn topology_in(&self, tx: &Transaction, id: ElementId) -> Option<Topology> {
        match tx.staged(id) {
            Some(staged) => staged.copied(),
            None => {
                let state = self.state.read();
                state.topology_at(id, state.committed_version)
            }
        }
    }

    /// Validates `mutation` against the graph as seen from inside `tx` and buffers it.
    pub fn stage(
        &self,
        tx: &mut Transaction,
        mutation: GraphMutation,
    ) -> Result<StageOutcome, StageError> {
        match &mutation {
            GraphMutation::AddNode(node) => {
                if self.topology_in(tx, node.id).is_some() {
                    return Ok(StageOutcome::IgnoredDuplicate);
                }
            }
            GraphMutation::AddSegment(segment) => {
                if self.topology_in(tx, segment.id).is_some() {
                    return Ok(StageOutcome::IgnoredDuplicate);
                }
                for node in [segment.from_node, segment.to_node] {
                    if self.topology_in(tx, node) != Some(Topology::Node) {
                        return Err(StageError::MissingEndpoint {
                            segment: segment.id,
                            node,
                        });
                    }
                }
            }
            GraphMutation::SetNodeGeometry { node_id, .. }
            | GraphMutation::SetNodeInfo { node_id, .. } => {
                self.expect_kind(tx, *node_id, RouteNetworkElementKind::RouteNode)?;
            }
            GraphMutation::SetSegmentGeometry { segment_id, .. }
            | GraphMutation::SetSegmentInfo { segment_id, .. } => {
                self.expect_kind(tx, *segment_id, RouteNetworkElementKind::RouteSegment)?;
            }
            GraphMutation::Delete { element_id }
            | GraphMutation::SetNaming { element_id, .. }
            | GraphMutation::SetLifecycle { element_id, .. }
            | GraphMutation::SetMapping { element_id, .. }
            | GraphMutation::SetSafety { element_id, .. } => {
                if self.topology_in(tx, *element_id).is_none() {
                    return Err(StageError::NotFound(*element_id));
                }
            }
        }
        tx.buffer_mutation(mutation)?;
        Ok(StageOutcome::Staged)
    }

    fn expect_kind(
        &self,
        tx: &Transaction,
        id: ElementId,
        expected: RouteNetworkElementKind,
    ) -> Result<(), StageError> {
        let actual = self
            .topology_in(tx, id)
            .ok_or(StageError::NotFound(id))?
            .kind();
        if actual != expected {
            return Err(StageError::WrongKind {
                id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Applies a committed buffer under one new version.
    pub(crate) fn apply_committed(&self, tx_id: TransactionId, buffer: &[GraphMutation]) -> Version {
        let mut state = self.state.write();
        if buffer.is_empty() {
            return state.committed_version;
        }
        let version = state.committed_version + 1;
        for mutation in buffer {
            state.apply(mutation, version);
        }
        state.committed_version = version;
        tracing::debug!(
            tx_id,
            version,
            mutations = buffer.len(),
            "Committed route network transaction"
        );
        version
    }
}

// =============================================================================
// GraphSnapshot
// =============================================================================

/// Read handle pinned to one committed version.
///
/// Every read through the same snapshot sees the same graph, no matter what
/// the writer commits in the meantime.
#[derive(Debug, Clone, Copy)]
pub struct GraphSnapshot<'a> {
    store: &'a RouteNetworkGraphStore,
    version: Version,
}

impl<'a> GraphSnapshot<'a> {
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn get_element(&self, id: ElementId) -> Option<RouteNetworkElement> {
        self.store.get_element_at(id, self.version)
    }

    pub fn get_node(&self, id: ElementId) -> Option<RouteNode> {
        match self.get_element(id) {
            Some(RouteNetworkElement::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn get_segment(&self, id: ElementId) -> Option<RouteSegment> {
        match self.get_element(id) {
            Some(RouteNetworkElement::Segment(s)) => Some(s),
            _ => None,
        }
    }

    pub fn contains(&self, id: ElementId) -> bool {
        let state = self.store.state.read();
        state.topology_at(id, self.version).is_some()
    }

    pub fn incident_segments(&self, node: ElementId) -> Vec<RouteSegment> {
        self.store.incident_segments_at(node, self.version)
    }

    /// Segments directly connecting `a` and `b`.
    pub fn segments_between(&self, a: ElementId, b: ElementId) -> Vec<RouteSegment> {
        self.incident_segments(a)
            .into_iter()
            .filter(|s| s.other_end(a) == Some(b))
            .collect()
    }

    pub fn query_by_envelope(&self, envelope: &Envelope) -> Vec<RouteNetworkElement> {
        self.store.query_by_envelope(self.version, envelope)
    }

    pub fn stats(&self) -> GraphStats {
        self.store.stats_at(self.version)
    }
}

// =============================================================================
// RouteNetworkGraphStoreBuilder
// =============================================================================

/// Builder for constructing fixture graphs in a single transaction.
#[derive(Debug, Default)]
pub struct RouteNetworkGraphStoreBuilder {
    mutations: Vec<GraphMutation>,
    points: HashMap<ElementId, (f64, f64)>,
}

impl RouteNetworkGraphStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unnamed, unclassified node.
    pub fn add_node(mut self, id: ElementId, x: f64, y: f64) -> Self {
        self.points.insert(id, (x, y));
        self.mutations
            .push(GraphMutation::AddNode(RouteNode::new(id, x, y)));
        self
    }

    /// Adds a named node of the given kind.
    pub fn add_named_node(
        mut self,
        id: ElementId,
        name: &str,
        kind: Option<RouteNodeKind>,
        x: f64,
        y: f64,
    ) -> Self {
        let mut node = RouteNode::new(id, x, y);
        node.info = kind.map(|k| RouteNodeInfo {
            kind: Some(k),
            function: None,
        });
        node.metadata.naming = Some(NamingInfo {
            name: Some(name.to_string()),
            description: None,
        });
        self.points.insert(id, (x, y));
        self.mutations.push(GraphMutation::AddNode(node));
        self
    }

    /// Adds a straight segment between two previously added nodes.
    pub fn add_segment(self, id: ElementId, from: ElementId, to: ElementId) -> Self {
        let a = self.points.get(&from).copied().unwrap_or_default();
        let b = self.points.get(&to).copied().unwrap_or_default();
        self.add_segment_with_line(id, from, to, vec![a, b])
    }

    /// Adds a segment with an explicit polyline.
    pub fn add_segment_with_line(
        mut self,
        id: ElementId,
        from: ElementId,
        to: ElementId,
        coords: Vec<(f64, f64)>,
    ) -> Self {
        self.mutations.push(GraphMutation::AddSegment(RouteSegment {
            id,
            from_node: from,
            to_node: to,
            line: LineString::from(coords),
            info: None,
            metadata: Default::default(),
        }));
        self
    }

    /// Builds the store; everything lands in version 1.
    pub fn build(self) -> RouteNetworkGraphStore {
        let store = RouteNetworkGraphStore::new();
        let mut tx = store.begin_transaction(WriteMode::Load);
        for mutation in self.mutations {
            let id = mutation.element_id();
            if let Err(e) = store.stage(&mut tx, mutation) {
                tracing::warn!(element_id = %id, error = %e, "Builder skipped mutation");
            }
        }
        if let Err(e) = tx.commit(&store) {
            tracing::warn!(error = %e, "Builder commit failed");
        }
        store
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn ids(n: usize) -> Vec<ElementId> {
        (0..n).map(|_| ElementId::new()).collect()
    }

    #[test]
    fn test_builder_commits_one_version() {
        let id = ids(3);
        let store = RouteNetworkGraphStore::builder()
            .add_node(id[0], 0.0, 0.0)
            .add_node(id[1], 3.0, 4.0)
            .add_segment(id[2], id[0], id[1])
            .build();

        assert_eq!(store.current_version(), 1);
        let stats = store.snapshot().stats();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.segment_count, 1);
        assert_eq!(store.snapshot().get_segment(id[2]).unwrap().length(), 5.0);
    }

    #[test]
    fn test_no_visibility_before_commit() {
        let store = RouteNetworkGraphStore::new();
        let node = ElementId::new();
        let mut tx = store.begin_transaction(WriteMode::Command);
        store
            .stage(&mut tx, GraphMutation::AddNode(RouteNode::new(node, 1.0, 1.0)))
            .unwrap();

        assert!(store.get_element(node).is_none());
        assert_eq!(store.topology_in(&tx, node), Some(Topology::Node));

        let version = tx.commit(&store).unwrap();
        assert_eq!(version, 1);
        assert!(store.get_element(node).is_some());
    }

    #[test]
    fn test_historical_reads_are_stable() {
        let id = ids(3);
        let store = RouteNetworkGraphStore::builder()
            .add_node(id[0], 0.0, 0.0)
            .add_node(id[1], 1.0, 0.0)
            .add_segment(id[2], id[0], id[1])
            .build();

        let mut tx = store.begin_transaction(WriteMode::Command);
        store
            .stage(&mut tx, GraphMutation::Delete { element_id: id[2] })
            .unwrap();
        let v2 = tx.commit(&store).unwrap();

        assert_eq!(v2, 2);
        assert!(store.get_element(id[2]).is_none());
        assert!(store.get_element_at(id[2], 1).is_some());
        assert_eq!(store.snapshot_at(1).incident_segments(id[0]).len(), 1);
        assert!(store.snapshot().incident_segments(id[0]).is_empty());
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let node = ElementId::new();
        let store = RouteNetworkGraphStore::builder().add_node(node, 0.0, 0.0).build();

        let mut tx = store.begin_transaction(WriteMode::Command);
        let outcome = store
            .stage(&mut tx, GraphMutation::AddNode(RouteNode::new(node, 9.0, 9.0)))
            .unwrap();
        assert_eq!(outcome, StageOutcome::IgnoredDuplicate);
        assert!(tx.is_empty());
        assert_eq!(store.snapshot().get_node(node).unwrap().point, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_segment_with_missing_endpoint_is_rejected() {
        let id = ids(3);
        let store = RouteNetworkGraphStore::builder().add_node(id[0], 0.0, 0.0).build();
        let mut tx = store.begin_transaction(WriteMode::Command);
        let result = store.stage(
            &mut tx,
            GraphMutation::AddSegment(RouteSegment {
                id: id[2],
                from_node: id[0],
                to_node: id[1],
                line: LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
                info: None,
                metadata: Default::default(),
            }),
        );
        assert_eq!(
            result,
            Err(StageError::MissingEndpoint {
                segment: id[2],
                node: id[1]
            })
        );
    }

    #[test]
    fn test_metadata_overwrites_in_place() {
        let node = ElementId::new();
        let store = RouteNetworkGraphStore::builder().add_node(node, 0.0, 0.0).build();

        let mut tx = store.begin_transaction(WriteMode::Command);
        store
            .stage(
                &mut tx,
                GraphMutation::SetNaming {
                    element_id: node,
                    naming: Some(NamingInfo {
                        name: Some("CO-1".into()),
                        description: None,
                    }),
                },
            )
            .unwrap();
        tx.commit(&store).unwrap();

        // Not versioned: the old version reports the new name too.
        assert_eq!(store.get_element_at(node, 1).unwrap().metadata().name(), Some("CO-1"));
    }

    #[test]
    fn test_query_by_envelope() {
        let id = ids(4);
        let store = RouteNetworkGraphStore::builder()
            .add_node(id[0], 0.0, 0.0)
            .add_node(id[1], 10.0, 0.0)
            .add_node(id[2], 500.0, 500.0)
            .add_segment(id[3], id[0], id[1])
            .build();

        let found = store
            .snapshot()
            .query_by_envelope(&Envelope::new(-1.0, -1.0, 5.0, 1.0));
        let found: Vec<_> = found.iter().map(|e| e.id()).collect();
        assert!(found.contains(&id[0]));
        assert!(found.contains(&id[3]));
        assert!(!found.contains(&id[1]));
        assert!(!found.contains(&id[2]));
    }

    #[test]
    fn test_empty_commit_keeps_version() {
        let store = RouteNetworkGraphStore::new();
        let mut tx = store.begin_transaction(WriteMode::Command);
        assert_eq!(tx.commit(&store).unwrap(), 0);
        assert_eq!(store.current_version(), 0);
    }
}
