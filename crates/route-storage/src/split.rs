//! Segment split detection and walk repair.
//!
//! A split replaces one route segment `A -S- B` with two segments joined by
//! a new node `X`. Interests whose walks used `S` must be rewritten to use the
//! new pair. Detection happens after the split has committed and only emits
//! a [`RepairIntent`]; the repair itself is carried out later by the service
//! as ordinary `UpdateWalkOfInterest` commands.

use crate::events::{RouteNetworkEditOperation, RouteNetworkEvent};
use crate::graph_store::{GraphSnapshot, RouteNetworkGraphStore};
use crate::projection::PostCommitObserver;
use route_core::{ElementId, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a split could not be identified or applied to a walk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("Split must remove one segment and add two, found {removed} removed and {added} added")]
    UnexpectedEventCount { removed: usize, added: usize },

    #[error("New segments {first} and {second} do not meet head to tail")]
    NotChained { first: ElementId, second: ElementId },

    #[error("Removed segment {segment} not found at version {version}")]
    RemovedSegmentUnknown { segment: ElementId, version: Version },

    #[error("New segments end at {outer:?}, removed segment {removed} ran between {expected:?}")]
    EndpointMismatch {
        removed: ElementId,
        outer: (ElementId, ElementId),
        expected: (ElementId, ElementId),
    },

    #[error("Walk does not traverse removed segment {0} between its endpoints")]
    WalkMismatch(ElementId),
}

/// A verified split: `removed` was replaced by `first -> split_node -> second`.
///
/// `first` runs from `first_outer` to `split_node`, `second` from
/// `split_node` to `second_outer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSplit {
    pub removed: ElementId,
    pub first: ElementId,
    pub split_node: ElementId,
    pub second: ElementId,
    pub first_outer: ElementId,
    pub second_outer: ElementId,
}

/// Work emitted by a post-commit observer, consumed from the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairIntent {
    SegmentSplit(SegmentSplit),
}

/// Identifies the add/remove triad of a split operation.
///
/// `before` must be the snapshot just before the split committed; the
/// removed segment is no longer visible after it.
pub fn detect_split(
    operation: &RouteNetworkEditOperation,
    before: &GraphSnapshot<'_>,
) -> Result<SegmentSplit, SplitError> {
    let mut removed = Vec::new();
    let mut added = Vec::new();
    for event in &operation.events {
        match event {
            RouteNetworkEvent::RouteSegmentRemoved { segment_id, .. } => removed.push(*segment_id),
            RouteNetworkEvent::RouteSegmentAdded {
                segment_id,
                from_node_id,
                to_node_id,
                ..
            } => added.push((*segment_id, *from_node_id, *to_node_id)),
            _ => {}
        }
    }

    let (removed_id, (a_id, a_from, a_to), (b_id, b_from, b_to)) =
        match (removed.as_slice(), added.as_slice()) {
            ([r], [a, b]) => (*r, *a, *b),
            _ => {
                return Err(SplitError::UnexpectedEventCount {
                    removed: removed.len(),
                    added: added.len(),
                })
            }
        };

    // Exactly two pairings are accepted; anything else is rejected.
    let split = if a_to == b_from {
        SegmentSplit {
            removed: removed_id,
            first: a_id,
            split_node: a_to,
            second: b_id,
            first_outer: a_from,
            second_outer: b_to,
        }
    } else if a_from == b_to {
        SegmentSplit {
            removed: removed_id,
            first: b_id,
            split_node: a_from,
            second: a_id,
            first_outer: b_from,
            second_outer: a_to,
        }
    } else {
        return Err(SplitError::NotChained {
            first: a_id,
            second: b_id,
        });
    };

    let original = before
        .get_segment(removed_id)
        .ok_or(SplitError::RemovedSegmentUnknown {
            segment: removed_id,
            version: before.version(),
        })?;
    let outer = (split.first_outer, split.second_outer);
    let expected = (original.from_node, original.to_node);
    if outer != expected && outer != (expected.1, expected.0) {
        return Err(SplitError::EndpointMismatch {
            removed: removed_id,
            outer,
            expected,
        });
    }

    Ok(split)
}

/// Splices the split triad into `walk` wherever it used the removed segment.
///
/// The triad is oriented to the walk's own direction of travel. Elements
/// other than the removed segment are preserved.
pub fn repair_walk(walk: &[ElementId], split: &SegmentSplit) -> Result<Vec<ElementId>, SplitError> {
    let mut out = Vec::with_capacity(walk.len() + 2);
    for (pos, id) in walk.iter().enumerate() {
        if *id != split.removed {
            out.push(*id);
            continue;
        }
        let prev = pos.checked_sub(1).and_then(|p| walk.get(p)).copied();
        let next = walk.get(pos + 1).copied();
        match (prev, next) {
            (Some(p), Some(n)) if p == split.first_outer && n == split.second_outer => {
                out.extend([split.first, split.split_node, split.second]);
            }
            (Some(p), Some(n)) if p == split.second_outer && n == split.first_outer => {
                out.extend([split.second, split.split_node, split.first]);
            }
            _ => return Err(SplitError::WalkMismatch(split.removed)),
        }
    }
    Ok(out)
}

/// Post-commit observer that turns split operations into repair intents.
#[derive(Debug, Default, Clone, Copy)]
pub struct SegmentSplitObserver;

impl PostCommitObserver for SegmentSplitObserver {
    fn name(&self) -> &'static str {
        "segment-split"
    }

    fn observe(
        &self,
        operation: &RouteNetworkEditOperation,
        committed: Version,
        store: &RouteNetworkGraphStore,
    ) -> Vec<RepairIntent> {
        if !operation.is_segment_split() {
            return Vec::new();
        }
        let before = store.snapshot_at(committed.saturating_sub(1));
        match detect_split(operation, &before) {
            Ok(split) => {
                tracing::debug!(
                    removed = %split.removed,
                    split_node = %split.split_node,
                    "Detected segment split"
                );
                vec![RepairIntent::SegmentSplit(split)]
            }
            Err(e) => {
                tracing::warn!(
                    operation = %operation.event_id,
                    error = %e,
                    "Could not identify segment split, interests left unrepaired"
                );
                Vec::new()
            }
        }
    }
}
