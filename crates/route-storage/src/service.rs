//! In-process command and query facade over the route network core.
//!
//! [`RouteNetworkService`] owns the graph store, the interest index and the
//! projection. Writes are serialized through a single writer gate that holds
//! at most one open transaction. Queries read a committed snapshot and never
//! take the gate.
//!
//! Split repair follows an outbox pattern: applying an edit operation commits
//! it, collects the repair intents emitted by post-commit observers into the
//! outbox, releases the gate and only then drains the outbox by issuing
//! `UpdateWalkOfInterest` commands.

use crate::config::RouteNetworkConfig;
use crate::events::{parse_event_log, EventLogRecord, RouteNetworkEditOperation, RouteNetworkEvent};
use crate::graph_store::{GraphSnapshot, GraphStats, RouteNetworkGraphStore};
use crate::interest_index::InterestIndex;
use crate::projection::{RouteNetworkProjection, SkippedEvent};
use crate::search::{self, FindNearestRouteNodesQuery, NearestRouteNodeHit, RoutePath};
use crate::split::{repair_walk, RepairIntent};
use crate::transaction::{Transaction, WriteMode};
use crate::walk::{ValidatedRouteNetworkWalk, WalkValidator};
use parking_lot::{Mutex, RwLock};
use route_core::{
    ElementId, InterestId, InterestKind, InterestRelation, RelationKind, Result,
    RouteNetworkElement, RouteNetworkError, RouteNetworkInterest, Version,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

// =============================================================================
// Query / result types
// =============================================================================

/// How much interest information to attach to route network details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedInterestFilter {
    /// Elements only.
    None,
    /// Elements with their interest relation rows.
    #[default]
    ReferencesFromRouteElementOnly,
    /// Relation rows plus the interest objects they point at.
    ReferencesFromRouteElementAndInterestObjects,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNetworkDetailsQuery {
    #[serde(default)]
    pub element_ids: Vec<ElementId>,
    #[serde(default)]
    pub interest_ids: Vec<InterestId>,
    #[serde(default)]
    pub related_interest_filter: RelatedInterestFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNetworkElementDetails {
    pub element: RouteNetworkElement,
    pub interest_relations: Vec<InterestRelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNetworkDetails {
    pub version: Version,
    pub route_network_elements: Vec<RouteNetworkElementDetails>,
    pub interests: Vec<RouteNetworkInterest>,
}

/// Outcome of a bootstrap replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub operations: usize,
    pub events_applied: usize,
    pub events_skipped: usize,
    pub interest_events_applied: usize,
    pub interest_events_skipped: usize,
    pub interests: usize,
    pub version: Version,
}

/// Repair of one interest after a split.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairResult {
    pub interest_id: InterestId,
    pub outcome: Result<RouteNetworkInterest>,
}

/// Outcome of one command-mode edit operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub version: Version,
    pub skipped: Vec<SkippedEvent>,
    pub repairs: Vec<RepairResult>,
}

// =============================================================================
// RouteNetworkService
// =============================================================================

#[derive(Debug)]
pub struct RouteNetworkService {
    store: RouteNetworkGraphStore,
    interests: RwLock<InterestIndex>,
    projection: RouteNetworkProjection,
    /// Single writer gate; holds the lazily created command transaction.
    writer: Mutex<Option<Transaction>>,
    outbox: Mutex<VecDeque<RepairIntent>>,
    config: RouteNetworkConfig,
}

impl Default for RouteNetworkService {
    fn default() -> Self {
        Self::new(RouteNetworkConfig::default())
    }
}

impl RouteNetworkService {
    pub fn new(config: RouteNetworkConfig) -> Self {
        Self::with_store(RouteNetworkGraphStore::new(), config)
    }

    /// Wraps an existing store, e.g. one built with [`RouteNetworkGraphStore::builder`].
    pub fn with_store(store: RouteNetworkGraphStore, config: RouteNetworkConfig) -> Self {
        Self {
            store,
            interests: RwLock::new(InterestIndex::new()),
            projection: RouteNetworkProjection::new(),
            writer: Mutex::new(None),
            outbox: Mutex::new(VecDeque::new()),
            config,
        }
    }

    pub fn store(&self) -> &RouteNetworkGraphStore {
        &self.store
    }

    pub fn config(&self) -> &RouteNetworkConfig {
        &self.config
    }

    pub fn snapshot(&self) -> GraphSnapshot<'_> {
        self.store.snapshot()
    }

    pub fn stats(&self) -> GraphStats {
        self.store.snapshot().stats()
    }

    pub fn interest_count(&self) -> usize {
        self.interests.read().len()
    }

    // -------------------------------------------------------------------------
    // Event projection
    // -------------------------------------------------------------------------

    /// Replays an ordered JSON event log in load mode.
    ///
    /// Every edit event goes into one transaction with a single commit.
    /// Interest events are applied afterwards exactly as recorded; split repair
    /// is not run since its results are part of the log.
    pub fn seed(&self, event_log_json: &str) -> Result<SeedReport> {
        let records = parse_event_log(event_log_json)
            .map_err(|e| RouteNetworkError::InvalidEventLog(e.to_string()))?;
        self.seed_records(&records)
    }

    pub fn seed_records(&self, records: &[EventLogRecord]) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        let writer = self.writer.lock();
        if let Some(open) = writer.as_ref() {
            return Err(RouteNetworkError::Transaction(format!(
                "transaction {} is still open",
                open.id()
            )));
        }

        let mut tx = self.store.begin_transaction(WriteMode::Load);
        for record in records {
            if let EventLogRecord::RouteNetworkEditOperation(op) = record {
                let staged = self.projection.stage_operation(&self.store, &mut tx, op);
                report.operations += 1;
                report.events_applied += staged.staged;
                report.events_skipped += staged.skipped.len();
            }
        }
        report.version = tx
            .commit(&self.store)
            .map_err(|e| RouteNetworkError::Transaction(e.to_string()))?;

        let mut index = self.interests.write();
        for record in records {
            let applied = match record {
                EventLogRecord::RouteNetworkEditOperation(_) => continue,
                EventLogRecord::NodeOfInterestRegistered {
                    interest_id,
                    node_id,
                } => index.register(RouteNetworkInterest::node_of_interest(*interest_id, *node_id)),
                EventLogRecord::WalkOfInterestRegistered { interest_id, walk } => index.register(
                    RouteNetworkInterest::walk_of_interest(*interest_id, walk.clone()),
                ),
                EventLogRecord::WalkOfInterestRouteNetworkElementsModified { interest_id, walk } => {
                    index.update(*interest_id, walk.clone()).map(|_| ())
                }
                EventLogRecord::InterestUnregistered { interest_id } => {
                    index.unregister(*interest_id).map(|_| ())
                }
            };
            match applied {
                Ok(()) => report.interest_events_applied += 1,
                Err(e) => {
                    tracing::warn!(error = %e, code = %e.code(), "Skipping interest event");
                    report.interest_events_skipped += 1;
                }
            }
        }
        report.interests = index.len();
        drop(index);
        drop(writer);

        tracing::info!(
            operations = report.operations,
            events = report.events_applied,
            skipped = report.events_skipped,
            interests = report.interests,
            version = report.version,
            "Seeded route network"
        );
        Ok(report)
    }

    /// Applies one live edit operation and repairs interests affected by a split.
    pub fn apply_edit_operation(
        &self,
        operation: &RouteNetworkEditOperation,
    ) -> Result<EditOutcome> {
        let outcome = {
            let mut writer = self.writer.lock();
            let tx = writer.get_or_insert_with(|| self.store.begin_transaction(WriteMode::Command));
            let result = self.projection.apply(&self.store, tx, operation);
            *writer = None;
            result.map_err(|e| RouteNetworkError::Transaction(e.to_string()))?
        };

        if !operation.is_segment_split() {
            self.warn_dangling_interests(operation, outcome.version);
        }
        self.outbox.lock().extend(outcome.intents);
        let repairs = self.process_outbox();

        Ok(EditOutcome {
            version: outcome.version,
            skipped: outcome.staged.skipped,
            repairs,
        })
    }

    /// Drains pending repair intents; each affected interest is updated independently.
    pub fn process_outbox(&self) -> Vec<RepairResult> {
        let mut results = Vec::new();
        loop {
            // Pop under the lock, repair without it.
            let Some(intent) = self.outbox.lock().pop_front() else {
                break;
            };
            match intent {
                RepairIntent::SegmentSplit(split) => {
                    let affected = self.interests.read().interest_ids_referencing(split.removed);
                    for interest_id in affected {
                        let outcome = self.repair_interest(interest_id, |walk| {
                            repair_walk(walk, &split).map_err(|e| {
                                RouteNetworkError::StructuralInconsistency(e.to_string())
                            })
                        });
                        match &outcome {
                            Ok(interest) => tracing::info!(
                                interest_id = %interest_id,
                                elements = interest.route_network_element_refs.len(),
                                "Repaired interest after segment split"
                            ),
                            Err(e) => tracing::warn!(
                                interest_id = %interest_id,
                                error = %e,
                                "Failed to repair interest after segment split"
                            ),
                        }
                        results.push(RepairResult {
                            interest_id,
                            outcome,
                        });
                    }
                }
            }
        }
        results
    }

    fn repair_interest(
        &self,
        interest_id: InterestId,
        rewrite: impl FnOnce(&[ElementId]) -> Result<Vec<ElementId>>,
    ) -> Result<RouteNetworkInterest> {
        let current = self.get_interest(interest_id)?;
        let repaired = rewrite(&current.route_network_element_refs)?;
        self.update_walk_of_interest(interest_id, &repaired)
    }

    fn warn_dangling_interests(&self, operation: &RouteNetworkEditOperation, version: Version) {
        let index = self.interests.read();
        for event in &operation.events {
            let deleted = match event {
                RouteNetworkEvent::RouteNodeMarkedForDeletion { node_id } => *node_id,
                RouteNetworkEvent::RouteSegmentMarkedForDeletion { segment_id }
                | RouteNetworkEvent::RouteSegmentRemoved { segment_id, .. } => *segment_id,
                _ => continue,
            };
            let referencing = index.interest_ids_referencing(deleted);
            if !referencing.is_empty() && self.store.get_element_at(deleted, version).is_none() {
                tracing::warn!(
                    element_id = %deleted,
                    interests = referencing.len(),
                    "Deleted element is still referenced by interests"
                );
            }
        }
    }

    // -------------------------------------------------------------------------
    // Interest commands
    // -------------------------------------------------------------------------

    pub fn register_node_of_interest(
        &self,
        interest_id: InterestId,
        node_id: ElementId,
    ) -> Result<RouteNetworkInterest> {
        let _writer = self.writer.lock();
        if self.interests.read().contains(interest_id) {
            return Err(RouteNetworkError::InterestAlreadyExists(interest_id));
        }
        let walk = self.validate(&[node_id])?;
        if walk.len() != 1 {
            return Err(RouteNetworkError::NotANode(node_id));
        }
        let interest = RouteNetworkInterest::node_of_interest(interest_id, node_id);
        self.interests.write().register(interest.clone())?;
        tracing::debug!(interest_id = %interest_id, node_id = %node_id, "Registered node of interest");
        Ok(interest)
    }

    pub fn register_walk_of_interest(
        &self,
        interest_id: InterestId,
        walk_ids: &[ElementId],
    ) -> Result<RouteNetworkInterest> {
        let _writer = self.writer.lock();
        if self.interests.read().contains(interest_id) {
            return Err(RouteNetworkError::InterestAlreadyExists(interest_id));
        }
        let walk = self.validate(walk_ids)?;
        let interest = RouteNetworkInterest::walk_of_interest(interest_id, walk.into_vec());
        self.interests.write().register(interest.clone())?;
        tracing::debug!(
            interest_id = %interest_id,
            elements = interest.route_network_element_refs.len(),
            "Registered walk of interest"
        );
        Ok(interest)
    }

    pub fn update_walk_of_interest(
        &self,
        interest_id: InterestId,
        walk_ids: &[ElementId],
    ) -> Result<RouteNetworkInterest> {
        let _writer = self.writer.lock();
        if !self.interests.read().contains(interest_id) {
            return Err(RouteNetworkError::InterestNotFound(interest_id));
        }
        let walk = self.validate(walk_ids)?;

        let mut index = self.interests.write();
        index.update(interest_id, walk.into_vec())?;
        index
            .get(interest_id)
            .cloned()
            .ok_or(RouteNetworkError::InterestNotFound(interest_id))
    }

    pub fn unregister_interest(&self, interest_id: InterestId) -> Result<RouteNetworkInterest> {
        let _writer = self.writer.lock();
        let removed = self.interests.write().unregister(interest_id)?;
        tracing::debug!(interest_id = %interest_id, "Unregistered interest");
        Ok(removed)
    }

    /// Validates a walk without registering anything.
    pub fn validate_walk_of_interest(
        &self,
        walk_ids: &[ElementId],
    ) -> Result<ValidatedRouteNetworkWalk> {
        self.validate(walk_ids)
    }

    fn validate(&self, walk_ids: &[ElementId]) -> Result<ValidatedRouteNetworkWalk> {
        Ok(WalkValidator::new(self.store.snapshot()).validate(walk_ids)?)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn get_interest(&self, interest_id: InterestId) -> Result<RouteNetworkInterest> {
        self.interests
            .read()
            .get(interest_id)
            .cloned()
            .ok_or(RouteNetworkError::InterestNotFound(interest_id))
    }

    /// Interests touching `element_id` with the way each one touches it.
    pub fn get_interests_touching(
        &self,
        element_id: ElementId,
    ) -> Vec<(RouteNetworkInterest, RelationKind)> {
        self.interests
            .read()
            .touching(element_id)
            .into_iter()
            .map(|(i, kind)| (i.clone(), kind))
            .collect()
    }

    pub fn get_route_network_details(
        &self,
        query: &RouteNetworkDetailsQuery,
    ) -> Result<RouteNetworkDetails> {
        let snapshot = self.store.snapshot();
        let index = self.interests.read();

        let mut element_ids: Vec<ElementId> = Vec::new();
        let mut seen: HashSet<ElementId> = HashSet::new();
        let mut interests: Vec<RouteNetworkInterest> = Vec::new();
        let mut seen_interests: HashSet<InterestId> = HashSet::new();

        for id in &query.element_ids {
            if seen.insert(*id) {
                element_ids.push(*id);
            }
        }
        for interest_id in &query.interest_ids {
            let interest = index
                .get(*interest_id)
                .ok_or(RouteNetworkError::InterestNotFound(*interest_id))?;
            for id in &interest.route_network_element_refs {
                if seen.insert(*id) {
                    element_ids.push(*id);
                }
            }
            if seen_interests.insert(interest.id) {
                interests.push(interest.clone());
            }
        }

        let mut elements = Vec::with_capacity(element_ids.len());
        for id in element_ids {
            let element = snapshot
                .get_element(id)
                .ok_or(RouteNetworkError::ElementNotFound(id))?;
            let interest_relations = match query.related_interest_filter {
                RelatedInterestFilter::None => Vec::new(),
                _ => index.relations_of(id).to_vec(),
            };
            if query.related_interest_filter
                == RelatedInterestFilter::ReferencesFromRouteElementAndInterestObjects
            {
                for rel in &interest_relations {
                    if seen_interests.insert(rel.interest_id) {
                        if let Some(i) = index.get(rel.interest_id) {
                            interests.push(i.clone());
                        }
                    }
                }
            }
            elements.push(RouteNetworkElementDetails {
                element,
                interest_relations,
            });
        }

        Ok(RouteNetworkDetails {
            version: snapshot.version(),
            route_network_elements: elements,
            interests,
        })
    }

    pub fn find_nearest_route_nodes(
        &self,
        query: &FindNearestRouteNodesQuery,
    ) -> Result<Vec<NearestRouteNodeHit>> {
        let snapshot = self.store.snapshot();
        let index = self.interests.read();
        search::find_nearest_route_nodes(&snapshot, query, |node, kinds| {
            index
                .touching(node)
                .iter()
                .any(|(interest, _)| kinds.contains(&interest.kind))
        })
    }

    /// Nearest-node search using the configured radius and hit limit.
    pub fn find_nearest_route_nodes_with_defaults(
        &self,
        source_route_node_id: ElementId,
    ) -> Result<Vec<NearestRouteNodeHit>> {
        let query = FindNearestRouteNodesQuery::new(
            source_route_node_id,
            self.config.search.default_max_hits,
            self.config.search.default_radius_meters,
        );
        self.find_nearest_route_nodes(&query)
    }

    pub fn shortest_path_between_route_nodes(
        &self,
        from: ElementId,
        to: ElementId,
    ) -> Result<Option<RoutePath>> {
        search::shortest_path_between_route_nodes(&self.store.snapshot(), from, to)
    }

    /// Interests of `kind`, in no particular order.
    pub fn interests_of_kind(&self, kind: InterestKind) -> Vec<RouteNetworkInterest> {
        self.interests
            .read()
            .iter()
            .filter(|i| i.kind == kind)
            .cloned()
            .collect()
    }
}
