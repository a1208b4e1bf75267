//! Interests: claims that equipment occupies a point or path in the route network.

use crate::{ElementId, InterestId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterestKind {
    /// A single route node.
    NodeOfInterest,
    /// An alternating node, segment, node, ..., node walk.
    WalkOfInterest,
}

/// A registered interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNetworkInterest {
    pub id: InterestId,
    pub kind: InterestKind,
    /// Canonical element list; odd length, nodes at even positions.
    pub route_network_element_refs: Vec<ElementId>,
}

impl RouteNetworkInterest {
    pub fn node_of_interest(id: InterestId, node: ElementId) -> Self {
        Self {
            id,
            kind: InterestKind::NodeOfInterest,
            route_network_element_refs: vec![node],
        }
    }

    pub fn walk_of_interest(id: InterestId, walk: Vec<ElementId>) -> Self {
        Self {
            id,
            kind: InterestKind::WalkOfInterest,
            route_network_element_refs: walk,
        }
    }

    pub fn references(&self, element: ElementId) -> bool {
        self.route_network_element_refs.contains(&element)
    }

    /// Distinct (element, relation kind) pairs derived from positions in the walk.
    ///
    /// First position is `Start`, last is `End`, a one-element list is
    /// `InsideNode`, everything else `PassThrough`. An element that occurs
    /// several times yields one pair per distinct kind.
    pub fn relations(&self) -> Vec<(ElementId, RelationKind)> {
        let refs = &self.route_network_element_refs;
        let mut out: Vec<(ElementId, RelationKind)> = Vec::with_capacity(refs.len());
        for (pos, id) in refs.iter().enumerate() {
            let kind = RelationKind::from_position(pos, refs.len());
            if !out.contains(&(*id, kind)) {
                out.push((*id, kind));
            }
        }
        out
    }
}

/// How an interest touches a route network element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Start,
    End,
    PassThrough,
    InsideNode,
}

impl RelationKind {
    /// Relation of the element at `pos` in a list of `len` elements.
    pub fn from_position(pos: usize, len: usize) -> Self {
        if len == 1 {
            Self::InsideNode
        } else if pos == 0 {
            Self::Start
        } else if pos + 1 == len {
            Self::End
        } else {
            Self::PassThrough
        }
    }
}

/// One row of the reverse index: interest `interest_id` touches an element as `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterestRelation {
    pub interest_id: InterestId,
    pub kind: RelationKind,
}
