//! Walks the overlay graph outward from a terminal or edge.

use crate::graph::{UtilityGraph, UtilityGraphElement};
use route_core::{ElementId, UNCLASSIFIED_FUNCTION_RANK};
use route_storage::GraphSnapshot;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default cap on traversal steps per direction.
pub const DEFAULT_MAX_HOPS: usize = 1024;

/// Elements reached on each side of the start element.
///
/// Both directions are listed outward from the source, so the end-to-end
/// order is `reverse(upstream) + source + downstream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilityGraphTrace {
    pub upstream: Vec<Uuid>,
    pub source: Uuid,
    pub downstream: Vec<Uuid>,
}

impl UtilityGraphTrace {
    pub fn ordered(&self) -> Vec<Uuid> {
        let mut out = Vec::with_capacity(self.upstream.len() + self.downstream.len() + 1);
        out.extend(self.upstream.iter().rev());
        out.push(self.source);
        out.extend(self.downstream.iter());
        out
    }

    /// Same trace read end to start.
    pub fn reversed(self) -> Self {
        Self {
            upstream: self.downstream,
            source: self.source,
            downstream: self.upstream,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    NotConnected,
    Traced(UtilityGraphTrace),
}

impl TraceOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Traced(_))
    }

    /// End-to-end element ids; empty when not connected.
    pub fn ordered(&self) -> Vec<Uuid> {
        match self {
            Self::NotConnected => Vec::new(),
            Self::Traced(trace) => trace.ordered(),
        }
    }
}

pub struct UtilityGraphTracer<'a> {
    graph: &'a UtilityGraph,
    snapshot: GraphSnapshot<'a>,
    max_hops: usize,
}

impl<'a> UtilityGraphTracer<'a> {
    pub fn new(graph: &'a UtilityGraph, snapshot: GraphSnapshot<'a>) -> Self {
        Self {
            graph,
            snapshot,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Traces from a terminal, span segment or jumper link.
    ///
    /// The result always runs from the more central end to the more distal
    /// one, judged by the function rank of the end terminals' route nodes.
    pub fn trace(&self, start: Uuid) -> TraceOutcome {
        let Some(element) = self.graph.get(start) else {
            debug!(%start, "Trace start not in utility graph");
            return TraceOutcome::NotConnected;
        };

        let mut visited = HashSet::from([start]);
        let trace = match element {
            UtilityGraphElement::Terminal(terminal) => {
                let edges = if terminal.is_dummy_end {
                    &[][..]
                } else {
                    self.graph.edges_of(start)
                };
                let upstream = match edges {
                    [first, _, ..] => self.follow(start, *first, &mut visited),
                    _ => Vec::new(),
                };
                let downstream = match edges {
                    [] => Vec::new(),
                    [only] => self.follow(start, *only, &mut visited),
                    [_, second, ..] => self.follow(start, *second, &mut visited),
                };
                UtilityGraphTrace {
                    upstream,
                    source: start,
                    downstream,
                }
            }
            edge => {
                let Some((from, to)) = edge.ends() else {
                    return TraceOutcome::NotConnected;
                };
                visited.insert(from);
                visited.insert(to);
                let mut upstream = vec![from];
                upstream.extend(self.continue_from(from, start, &mut visited));
                let mut downstream = vec![to];
                downstream.extend(self.continue_from(to, start, &mut visited));
                UtilityGraphTrace {
                    upstream,
                    source: start,
                    downstream,
                }
            }
        };

        TraceOutcome::Traced(self.orient(trace))
    }

    fn continue_from(&self, terminal: Uuid, came_via: Uuid, visited: &mut HashSet<Uuid>) -> Vec<Uuid> {
        match self.next_edge(terminal, came_via, visited) {
            Some(edge) => self.follow(terminal, edge, visited),
            None => Vec::new(),
        }
    }

    /// Alternating edge/terminal ids reached by leaving `from` over `edge`.
    fn follow(&self, from: Uuid, edge: Uuid, visited: &mut HashSet<Uuid>) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut current = from;
        let mut next = Some(edge);
        let mut steps = 0;

        while let Some(edge_id) = next {
            if steps >= self.max_hops {
                warn!(%from, max_hops = self.max_hops, "Trace hop limit reached");
                break;
            }
            steps += 1;
            if !visited.insert(edge_id) {
                break;
            }
            let Some(terminal) = self.graph.get(edge_id).and_then(|e| e.other_end(current)) else {
                break;
            };
            out.push(edge_id);
            if !visited.insert(terminal) {
                debug!(%terminal, "Trace revisited a terminal");
                break;
            }
            out.push(terminal);
            current = terminal;
            next = self.next_edge(terminal, edge_id, visited);
        }
        out
    }

    fn next_edge(&self, terminal: Uuid, came_via: Uuid, visited: &HashSet<Uuid>) -> Option<Uuid> {
        if self.graph.terminal(terminal)?.is_dummy_end {
            return None;
        }
        self.graph
            .edges_of(terminal)
            .iter()
            .find(|e| **e != came_via && !visited.contains(*e))
            .copied()
    }

    fn orient(&self, trace: UtilityGraphTrace) -> UtilityGraphTrace {
        let nodes: Vec<ElementId> = trace
            .ordered()
            .into_iter()
            .filter_map(|id| self.graph.terminal(id))
            .map(|t| t.route_node_id)
            .collect();
        let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
            return trace;
        };
        if self.rank(*first) > self.rank(*last) {
            trace.reversed()
        } else {
            trace
        }
    }

    fn rank(&self, route_node_id: ElementId) -> u32 {
        self.snapshot
            .get_node(route_node_id)
            .map_or(UNCLASSIFIED_FUNCTION_RANK, |n| n.function_rank())
    }
}
