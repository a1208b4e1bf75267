//! Route searches over one graph snapshot: nearest nodes and shortest paths.
//!
//! Both are Dijkstra over segment polyline lengths.

use crate::graph_store::GraphSnapshot;
use crate::walk::ValidatedRouteNetworkWalk;
use ordered_float::OrderedFloat;
use route_core::{
    ElementId, Envelope, InterestKind, Result, RouteNetworkElement, RouteNetworkError, RouteNode,
    RouteNodeFunction, RouteNodeKind, RouteSegment,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Parameters of a nearest-node search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindNearestRouteNodesQuery {
    pub source_route_node_id: ElementId,
    pub max_hits: usize,
    pub search_radius_meters: f64,
    /// Nodes of these kinds are hits.
    #[serde(default)]
    pub node_kind_stops: Vec<RouteNodeKind>,
    /// Nodes with these functions are hits.
    #[serde(default)]
    pub node_function_stops: Vec<RouteNodeFunction>,
    /// Nodes touched by an interest of these kinds are hits.
    #[serde(default)]
    pub interest_kinds: Vec<InterestKind>,
}

impl FindNearestRouteNodesQuery {
    pub fn new(source_route_node_id: ElementId, max_hits: usize, search_radius_meters: f64) -> Self {
        Self {
            source_route_node_id,
            max_hits,
            search_radius_meters,
            node_kind_stops: Vec::new(),
            node_function_stops: Vec::new(),
            interest_kinds: Vec::new(),
        }
    }

    pub fn with_kind_stops(mut self, kinds: impl IntoIterator<Item = RouteNodeKind>) -> Self {
        self.node_kind_stops.extend(kinds);
        self
    }

    pub fn with_function_stops(
        mut self,
        functions: impl IntoIterator<Item = RouteNodeFunction>,
    ) -> Self {
        self.node_function_stops.extend(functions);
        self
    }

    pub fn with_interest_kinds(mut self, kinds: impl IntoIterator<Item = InterestKind>) -> Self {
        self.interest_kinds.extend(kinds);
        self
    }

    fn has_stops(&self) -> bool {
        !self.node_kind_stops.is_empty()
            || !self.node_function_stops.is_empty()
            || !self.interest_kinds.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestRouteNodeHit {
    pub route_node_id: ElementId,
    pub distance_meters: f64,
    /// Canonical walk from the source to the hit.
    pub walk: ValidatedRouteNetworkWalk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    pub walk: ValidatedRouteNetworkWalk,
    pub length_meters: f64,
}

/// Finds the nodes nearest to the source along the route network.
///
/// Only segments whose envelope intersects the search square are traversed,
/// and nothing further than the radius is settled. A hit is not expanded
/// through. Without any stop criteria every reachable node is a hit and the
/// search runs on through them.
/// `interest_hit(node, kinds)` reports whether an interest of one of `kinds`
/// touches `node`.
pub fn find_nearest_route_nodes(
    snapshot: &GraphSnapshot<'_>,
    query: &FindNearestRouteNodesQuery,
    interest_hit: impl Fn(ElementId, &[InterestKind]) -> bool,
) -> Result<Vec<NearestRouteNodeHit>> {
    let source = require_node(snapshot, query.source_route_node_id)?;
    if query.max_hits == 0 {
        return Ok(Vec::new());
    }

    let envelope = Envelope::around(source.point, query.search_radius_meters);
    let candidates: HashSet<ElementId> = snapshot
        .query_by_envelope(&envelope)
        .iter()
        .filter_map(RouteNetworkElement::as_segment)
        .map(|s| s.id)
        .collect();

    let mut hits: Vec<(ElementId, f64)> = Vec::new();
    let tree = dijkstra(
        snapshot,
        source.id,
        query.search_radius_meters,
        |s| candidates.contains(&s.id),
        |node_id, distance| {
            if node_id == source.id {
                return Settle::Expand;
            }
            let is_hit = !query.has_stops()
                || snapshot
                    .get_node(node_id)
                    .is_some_and(|n| is_stop(&n, query))
                || (!query.interest_kinds.is_empty()
                    && interest_hit(node_id, &query.interest_kinds));
            if !is_hit {
                return Settle::Expand;
            }
            hits.push((node_id, distance));
            if hits.len() >= query.max_hits {
                Settle::Halt
            } else if query.has_stops() {
                Settle::Stop
            } else {
                Settle::Expand
            }
        },
    );

    Ok(hits
        .into_iter()
        .map(|(node, distance)| NearestRouteNodeHit {
            route_node_id: node,
            distance_meters: distance,
            walk: ValidatedRouteNetworkWalk::from_canonical(tree.walk_to(source.id, node)),
        })
        .collect())
}

fn is_stop(node: &RouteNode, query: &FindNearestRouteNodesQuery) -> bool {
    node.kind().is_some_and(|k| query.node_kind_stops.contains(&k))
        || node
            .function()
            .is_some_and(|f| query.node_function_stops.contains(&f))
}

/// Shortest path between two route nodes; `None` when they are not connected.
pub fn shortest_path_between_route_nodes(
    snapshot: &GraphSnapshot<'_>,
    from: ElementId,
    to: ElementId,
) -> Result<Option<RoutePath>> {
    require_node(snapshot, from)?;
    require_node(snapshot, to)?;

    let mut reached = None;
    let tree = dijkstra(
        snapshot,
        from,
        f64::INFINITY,
        |_| true,
        |node, distance| {
            if node == to {
                reached = Some(distance);
                Settle::Halt
            } else {
                Settle::Expand
            }
        },
    );

    Ok(reached.map(|length| RoutePath {
        walk: ValidatedRouteNetworkWalk::from_canonical(tree.walk_to(from, to)),
        length_meters: length,
    }))
}

fn require_node(snapshot: &GraphSnapshot<'_>, id: ElementId) -> Result<RouteNode> {
    match snapshot.get_element(id) {
        Some(RouteNetworkElement::Node(n)) => Ok(n),
        Some(RouteNetworkElement::Segment(_)) => Err(RouteNetworkError::NotANode(id)),
        None => Err(RouteNetworkError::ElementNotFound(id)),
    }
}

// =============================================================================
// Dijkstra
// =============================================================================

/// What to do with a node once its distance is final.
enum Settle {
    Expand,
    /// Do not expand this node.
    Stop,
    /// End the search.
    Halt,
}

#[derive(Debug, Default)]
struct SearchTree {
    /// node -> (segment used to reach it, previous node)
    prev: HashMap<ElementId, (ElementId, ElementId)>,
}

impl SearchTree {
    fn walk_to(&self, source: ElementId, target: ElementId) -> Vec<ElementId> {
        let mut walk = vec![target];
        let mut current = target;
        while current != source {
            let Some(&(segment, previous)) = self.prev.get(&current) else {
                break;
            };
            walk.push(segment);
            walk.push(previous);
            current = previous;
        }
        walk.reverse();
        walk
    }
}

fn dijkstra(
    snapshot: &GraphSnapshot<'_>,
    source: ElementId,
    max_distance: f64,
    segment_filter: impl Fn(&RouteSegment) -> bool,
    mut on_settle: impl FnMut(ElementId, f64) -> Settle,
) -> SearchTree {
    let mut tree = SearchTree::default();
    let mut dist: HashMap<ElementId, f64> = HashMap::new();
    let mut settled: HashSet<ElementId> = HashSet::new();
    let mut heap = BinaryHeap::new();

    dist.insert(source, 0.0);
    heap.push(Reverse((OrderedFloat(0.0), source)));

    while let Some(Reverse((OrderedFloat(d), node))) = heap.pop() {
        if !settled.insert(node) {
            continue;
        }
        match on_settle(node, d) {
            Settle::Expand => {}
            Settle::Stop => continue,
            Settle::Halt => break,
        }
        for segment in snapshot.incident_segments(node) {
            if !segment_filter(&segment) {
                continue;
            }
            let Some(other) = segment.other_end(node) else {
                continue;
            };
            if other == node || settled.contains(&other) {
                continue;
            }
            let candidate = d + segment.length();
            if candidate > max_distance {
                continue;
            }
            if dist.get(&other).map_or(true, |&known| candidate < known) {
                dist.insert(other, candidate);
                tree.prev.insert(other, (segment.id, node));
                heap.push(Reverse((OrderedFloat(candidate), other)));
            }
        }
    }
    tree
}
