//! Walk validation and canonicalization.
//!
//! Callers may describe a path through the route network with node ids,
//! segment ids or any mix of the two. [`WalkValidator`] expands such a list
//! into the canonical alternating `Node, Segment, Node, ..., Node` form by
//! following graph adjacency at one snapshot, and rejects lists that do not
//! describe a connected path.

use crate::graph_store::GraphSnapshot;
use route_core::{ElementId, RouteNetworkElement, RouteSegment, WalkError};
use serde::{Deserialize, Serialize};

/// A canonical walk: odd length, route nodes at even positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatedRouteNetworkWalk(Vec<ElementId>);

impl ValidatedRouteNetworkWalk {
    /// Wraps a list already known to be canonical, e.g. one built by a graph search.
    pub(crate) fn from_canonical(elements: Vec<ElementId>) -> Self {
        Self(elements)
    }

    pub fn as_slice(&self) -> &[ElementId] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ElementId> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_node(&self) -> Option<ElementId> {
        self.0.first().copied()
    }

    pub fn to_node(&self) -> Option<ElementId> {
        self.0.last().copied()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.0.iter().step_by(2).copied()
    }

    pub fn segment_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.0.iter().skip(1).step_by(2).copied()
    }

    /// The same walk travelled the other way.
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// True if both walks cover the same elements in the same or fully reversed order.
    pub fn equivalent(&self, other: &[ElementId]) -> bool {
        self.0 == other || self.0.iter().rev().eq(other.iter())
    }
}

/// Validates walks against one graph snapshot.
#[derive(Debug, Clone, Copy)]
pub struct WalkValidator<'a> {
    snapshot: GraphSnapshot<'a>,
}

impl<'a> WalkValidator<'a> {
    pub fn new(snapshot: GraphSnapshot<'a>) -> Self {
        Self { snapshot }
    }

    /// Expands `ids` into a canonical walk.
    ///
    /// Each pair of consecutive ids is joined on its own: two nodes through
    /// the one segment between them, a node and a segment directly or through
    /// the one other segment reaching either end, two segments through their
    /// shared end. Joining only looks at the pair, so validating the reversed
    /// input yields the reversed walk. A lone segment is read in its stored
    /// direction.
    ///
    /// # Errors
    ///
    /// - [`WalkError::EmptyWalk`] for an empty list
    /// - [`WalkError::EmptyId`] for a nil id
    /// - [`WalkError::UnknownElement`] for an id not in the snapshot
    /// - [`WalkError::NotAdjacent`] when consecutive ids are not connected
    /// - [`WalkError::AmbiguousNodePair`] when consecutive ids can be joined in more than one way
    /// - [`WalkError::SegmentRepeated`] when the walk turns back along the segment it just used
    pub fn validate(&self, ids: &[ElementId]) -> Result<ValidatedRouteNetworkWalk, WalkError> {
        if ids.is_empty() {
            return Err(WalkError::EmptyWalk);
        }
        if let Some(pos) = ids.iter().position(|id| id.is_nil()) {
            return Err(WalkError::EmptyId(pos));
        }
        let elements = ids
            .iter()
            .map(|id| {
                self.snapshot
                    .get_element(*id)
                    .ok_or(WalkError::UnknownElement(*id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let joins = elements
            .windows(2)
            .map(|pair| self.join(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        let mut out: Vec<ElementId> = Vec::with_capacity(ids.len() * 2 + 1);
        for (i, element) in elements.iter().enumerate() {
            match element {
                RouteNetworkElement::Node(n) => push_node(&mut out, n.id),
                RouteNetworkElement::Segment(s) => {
                    let entry = i.checked_sub(1).and_then(|j| joins[j].right_port);
                    let exit = joins.get(i).and_then(|j| j.left_port);
                    let (entry, exit) = match (entry, exit) {
                        (Some(entry), Some(exit)) if entry == exit => {
                            return Err(WalkError::SegmentRepeated(s.id))
                        }
                        (Some(entry), Some(exit)) => (entry, exit),
                        (Some(entry), None) => (entry, far_end(s, entry)?),
                        (None, Some(exit)) => (far_end(s, exit)?, exit),
                        (None, None) => (s.from_node, s.to_node),
                    };
                    push_node(&mut out, entry);
                    out.push(s.id);
                    out.push(exit);
                }
            }
            if let Some(bridge) = joins.get(i).and_then(|j| j.bridge) {
                out.push(bridge);
            }
        }

        // Segments sit at odd positions; the same one on both sides of a node
        // means the walk turned back.
        if let Some(w) = out.windows(3).skip(1).step_by(2).find(|w| w[0] == w[2]) {
            return Err(WalkError::SegmentRepeated(w[0]));
        }

        Ok(ValidatedRouteNetworkWalk(out))
    }

    fn join(&self, left: &RouteNetworkElement, right: &RouteNetworkElement) -> Result<Join, WalkError> {
        use RouteNetworkElement::{Node, Segment};

        match (left, right) {
            (Node(a), Node(b)) if a.id == b.id => Ok(Join::default()),
            (Node(a), Node(b)) => match self.snapshot.segments_between(a.id, b.id).as_slice() {
                [] => Err(WalkError::NotAdjacent(a.id, b.id)),
                [segment] => Ok(Join {
                    bridge: Some(segment.id),
                    ..Join::default()
                }),
                _ => Err(WalkError::AmbiguousNodePair(a.id, b.id)),
            },
            (Node(a), Segment(s)) => {
                let (bridge, port) = self.reach(a.id, s, (a.id, s.id))?;
                Ok(Join {
                    bridge,
                    left_port: None,
                    right_port: Some(port),
                })
            }
            (Segment(s), Node(b)) => {
                let (bridge, port) = self.reach(b.id, s, (s.id, b.id))?;
                Ok(Join {
                    bridge,
                    left_port: Some(port),
                    right_port: None,
                })
            }
            (Segment(s), Segment(t)) => {
                if s.id == t.id {
                    return Err(WalkError::SegmentRepeated(s.id));
                }
                let shared: Vec<_> = endpoints(s).filter(|p| t.has_endpoint(*p)).collect();
                match shared.as_slice() {
                    [] => Err(WalkError::NotAdjacent(s.id, t.id)),
                    [port] => Ok(Join {
                        bridge: None,
                        left_port: Some(*port),
                        right_port: Some(*port),
                    }),
                    [a, b, ..] => Err(WalkError::AmbiguousNodePair(*a, *b)),
                }
            }
        }
    }

    /// Finds the end of `segment` the walk touches coming from or going to
    /// `node`, plus the segment bridging the two when `node` is not an end.
    fn reach(
        &self,
        node: ElementId,
        segment: &RouteSegment,
        pair: (ElementId, ElementId),
    ) -> Result<(Option<ElementId>, ElementId), WalkError> {
        if segment.has_endpoint(node) {
            return Ok((None, node));
        }
        let skip = segment.id;
        let snapshot = self.snapshot;
        let candidates: Vec<(ElementId, ElementId)> = endpoints(segment)
            .flat_map(move |port| {
                snapshot
                    .segments_between(node, port)
                    .into_iter()
                    .filter(move |g| g.id != skip)
                    .map(move |g| (g.id, port))
            })
            .collect();
        match candidates.as_slice() {
            [] => Err(WalkError::NotAdjacent(pair.0, pair.1)),
            [(bridge, port)] => Ok((Some(*bridge), *port)),
            [(_, port), ..] => Err(WalkError::AmbiguousNodePair(node, *port)),
        }
    }
}

/// How two consecutive input elements connect.
#[derive(Debug, Default, Clone, Copy)]
struct Join {
    /// Segment inserted between them when they do not touch.
    bridge: Option<ElementId>,
    /// Node the walk leaves the left element by, when it is a segment.
    left_port: Option<ElementId>,
    /// Node the walk enters the right element by, when it is a segment.
    right_port: Option<ElementId>,
}

fn endpoints(segment: &RouteSegment) -> impl Iterator<Item = ElementId> {
    let to = (segment.to_node != segment.from_node).then_some(segment.to_node);
    std::iter::once(segment.from_node).chain(to)
}

fn far_end(segment: &RouteSegment, entry: ElementId) -> Result<ElementId, WalkError> {
    segment
        .other_end(entry)
        .ok_or(WalkError::NotAdjacent(entry, segment.id))
}

fn push_node(out: &mut Vec<ElementId>, node: ElementId) {
    if out.last() != Some(&node) {
        out.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::RouteNetworkGraphStore;

    /// N0 -S0- N1 -S1- N2 -S2- N3, S1 digitized backwards (N2 -> N1).
    fn chain() -> (RouteNetworkGraphStore, Vec<ElementId>, Vec<ElementId>) {
        let n: Vec<_> = (0..4).map(|_| ElementId::new()).collect();
        let s: Vec<_> = (0..3).map(|_| ElementId::new()).collect();
        let store = RouteNetworkGraphStore::builder()
            .add_node(n[0], 0.0, 0.0)
            .add_node(n[1], 10.0, 0.0)
            .add_node(n[2], 20.0, 0.0)
            .add_node(n[3], 30.0, 0.0)
            .add_segment(s[0], n[0], n[1])
            .add_segment(s[1], n[2], n[1])
            .add_segment(s[2], n[2], n[3])
            .build();
        (store, n, s)
    }

    #[test]
    fn test_nodes_only_expand_to_canonical() {
        let (store, n, s) = chain();
        let walk = WalkValidator::new(store.snapshot())
            .validate(&[n[0], n[1], n[2], n[3]])
            .unwrap();
        assert_eq!(walk.as_slice(), &[n[0], s[0], n[1], s[1], n[2], s[2], n[3]]);
        assert_eq!(walk.node_ids().collect::<Vec<_>>(), n);
        assert_eq!(walk.segment_ids().collect::<Vec<_>>(), s);
    }

    #[test]
    fn test_segments_only_follow_adjacency_not_storage_direction() {
        let (store, n, s) = chain();
        let validator = WalkValidator::new(store.snapshot());

        let forward = validator.validate(&[s[0], s[1], s[2]]).unwrap();
        assert_eq!(forward.as_slice(), &[n[0], s[0], n[1], s[1], n[2], s[2], n[3]]);

        let backward = validator.validate(&[s[2], s[1], s[0]]).unwrap();
        assert_eq!(backward, forward.reversed());
    }

    #[test]
    fn test_mixed_input() {
        let (store, n, s) = chain();
        let walk = WalkValidator::new(store.snapshot())
            .validate(&[s[0], n[2], s[2]])
            .unwrap();
        assert_eq!(walk.as_slice(), &[n[0], s[0], n[1], s[1], n[2], s[2], n[3]]);
    }

    #[test]
    fn test_single_node_is_valid() {
        let (store, n, _) = chain();
        let walk = WalkValidator::new(store.snapshot()).validate(&[n[2]]).unwrap();
        assert_eq!(walk.as_slice(), &[n[2]]);
    }

    #[test]
    fn test_rejections() {
        let (store, n, s) = chain();
        let validator = WalkValidator::new(store.snapshot());

        assert_eq!(validator.validate(&[]), Err(WalkError::EmptyWalk));
        assert_eq!(
            validator.validate(&[n[0], ElementId(uuid::Uuid::nil())]),
            Err(WalkError::EmptyId(1))
        );
        let ghost = ElementId::new();
        assert_eq!(
            validator.validate(&[n[0], ghost]),
            Err(WalkError::UnknownElement(ghost))
        );
        assert_eq!(
            validator.validate(&[n[0], n[2]]),
            Err(WalkError::NotAdjacent(n[0], n[2]))
        );
        assert_eq!(
            validator.validate(&[s[0], s[2]]),
            Err(WalkError::NotAdjacent(s[0], s[2]))
        );
        assert_eq!(
            validator.validate(&[n[0], s[0], n[1], s[0], n[0]]),
            Err(WalkError::SegmentRepeated(s[0]))
        );
        assert_eq!(
            validator.validate(&[n[0], n[1], n[0]]),
            Err(WalkError::SegmentRepeated(s[0]))
        );
    }

    #[test]
    fn test_parallel_segments_are_ambiguous_between_nodes() {
        let a = ElementId::new();
        let b = ElementId::new();
        let s1 = ElementId::new();
        let s2 = ElementId::new();
        let store = RouteNetworkGraphStore::builder()
            .add_node(a, 0.0, 0.0)
            .add_node(b, 1.0, 0.0)
            .add_segment(s1, a, b)
            .add_segment_with_line(s2, a, b, vec![(0.0, 0.0), (0.5, 1.0), (1.0, 0.0)])
            .build();
        let validator = WalkValidator::new(store.snapshot());

        assert_eq!(
            validator.validate(&[a, b]),
            Err(WalkError::AmbiguousNodePair(a, b))
        );
        // Naming the segment resolves it.
        assert_eq!(validator.validate(&[a, s2, b]).unwrap().as_slice(), &[a, s2, b]);
    }

    #[test]
    fn test_node_then_distant_segment_is_bridged_both_ways() {
        let (store, n, s) = chain();
        let validator = WalkValidator::new(store.snapshot());

        let forward = validator.validate(&[n[0], s[1]]).unwrap();
        assert_eq!(forward.as_slice(), &[n[0], s[0], n[1], s[1], n[2]]);

        let backward = validator.validate(&[s[1], n[0]]).unwrap();
        assert_eq!(backward, forward.reversed());

        let tail = validator.validate(&[s[0], n[2], s[2]]).unwrap();
        let head = validator.validate(&[s[2], n[2], s[0]]).unwrap();
        assert_eq!(tail, head.reversed());
    }

    #[test]
    fn test_bridge_must_be_unique() {
        // A -SA- B -SB- C with a second route A -SX- C: from A both ends of SB are reachable.
        let (a, b, c) = (ElementId::new(), ElementId::new(), ElementId::new());
        let (sa, sb, sx) = (ElementId::new(), ElementId::new(), ElementId::new());
        let store = RouteNetworkGraphStore::builder()
            .add_node(a, 0.0, 0.0)
            .add_node(b, 10.0, 0.0)
            .add_node(c, 20.0, 0.0)
            .add_segment(sa, a, b)
            .add_segment(sb, b, c)
            .add_segment_with_line(sx, a, c, vec![(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)])
            .build();
        let validator = WalkValidator::new(store.snapshot());

        assert!(matches!(
            validator.validate(&[a, sb]),
            Err(WalkError::AmbiguousNodePair(..))
        ));
        assert!(matches!(
            validator.validate(&[sb, a]),
            Err(WalkError::AmbiguousNodePair(..))
        ));
        // Naming the turn back resolves it.
        assert_eq!(validator.validate(&[a, b, sb]).unwrap().as_slice(), &[a, sa, b, sb, c]);
    }

    #[test]
    fn test_turning_back_on_a_segment_is_rejected() {
        let (store, n, s) = chain();
        let validator = WalkValidator::new(store.snapshot());
        assert_eq!(
            validator.validate(&[n[1], s[0], n[1]]),
            Err(WalkError::SegmentRepeated(s[0]))
        );
        assert_eq!(
            validator.validate(&[s[1], s[1]]),
            Err(WalkError::SegmentRepeated(s[1]))
        );
    }

    #[test]
    fn test_equivalent() {
        let (store, n, _) = chain();
        let walk = WalkValidator::new(store.snapshot())
            .validate(&[n[0], n[1]])
            .unwrap();
        let reversed: Vec<_> = walk.as_slice().iter().rev().copied().collect();
        assert!(walk.equivalent(&reversed));
        assert!(!walk.equivalent(&[n[0]]));
    }
}
