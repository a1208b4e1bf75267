//! Equipment-level overlay graph.
//!
//! Terminals are the vertices; span segments (one fiber of a cable between
//! two route nodes) and jumper links (patch cords inside a node) are the
//! edges. A span segment end without a terminal gets a dummy terminal so
//! every edge has two ends.

use crate::model::{JumperLinkRecord, SpanSegmentRecord};
use crate::GraphBuildError;
use route_core::ElementId;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct UtilityGraphTerminal {
    pub id: Uuid,
    pub route_node_id: ElementId,
    /// `None` for dummy terminals.
    pub equipment_id: Option<Uuid>,
    pub is_dummy_end: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UtilityGraphSegmentRef {
    pub id: Uuid,
    pub span_equipment_id: Uuid,
    pub fiber_number: u32,
    pub from_route_node_id: ElementId,
    pub to_route_node_id: ElementId,
    pub from_terminal_id: Uuid,
    pub to_terminal_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UtilityGraphLink {
    pub id: Uuid,
    pub from_terminal_id: Uuid,
    pub to_terminal_id: Uuid,
    pub length_meters: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UtilityGraphElement {
    Terminal(UtilityGraphTerminal),
    SpanSegment(UtilityGraphSegmentRef),
    Link(UtilityGraphLink),
}

impl UtilityGraphElement {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Terminal(t) => t.id,
            Self::SpanSegment(s) => s.id,
            Self::Link(l) => l.id,
        }
    }

    pub fn as_terminal(&self) -> Option<&UtilityGraphTerminal> {
        match self {
            Self::Terminal(t) => Some(t),
            _ => None,
        }
    }

    /// Terminal ids at both ends of an edge.
    pub fn ends(&self) -> Option<(Uuid, Uuid)> {
        match self {
            Self::Terminal(_) => None,
            Self::SpanSegment(s) => Some((s.from_terminal_id, s.to_terminal_id)),
            Self::Link(l) => Some((l.from_terminal_id, l.to_terminal_id)),
        }
    }

    pub fn other_end(&self, terminal: Uuid) -> Option<Uuid> {
        let (from, to) = self.ends()?;
        if from == terminal {
            Some(to)
        } else if to == terminal {
            Some(from)
        } else {
            None
        }
    }

    /// Edge length in meters. Span segment lengths live in the route network,
    /// so they report zero here.
    pub fn link_length(&self) -> f64 {
        match self {
            Self::Link(l) => l.length_meters,
            _ => 0.0,
        }
    }
}

/// Terminals plus their incident edges, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct UtilityGraph {
    elements: HashMap<Uuid, UtilityGraphElement>,
    adjacency: HashMap<Uuid, Vec<Uuid>>,
}

impl UtilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&UtilityGraphElement> {
        self.elements.get(&id)
    }

    pub fn terminal(&self, id: Uuid) -> Option<&UtilityGraphTerminal> {
        self.get(id).and_then(UtilityGraphElement::as_terminal)
    }

    /// Edge ids incident to `terminal`.
    pub fn edges_of(&self, terminal: Uuid) -> &[Uuid] {
        self.adjacency
            .get(&terminal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_terminal(
        &mut self,
        id: Uuid,
        route_node_id: ElementId,
        equipment_id: Uuid,
    ) -> Result<(), GraphBuildError> {
        self.insert(UtilityGraphElement::Terminal(UtilityGraphTerminal {
            id,
            route_node_id,
            equipment_id: Some(equipment_id),
            is_dummy_end: false,
        }))?;
        self.adjacency.entry(id).or_default();
        Ok(())
    }

    /// Adds a span segment, creating dummy terminals for unconnected ends.
    pub fn add_span_segment(
        &mut self,
        record: &SpanSegmentRecord,
    ) -> Result<UtilityGraphSegmentRef, GraphBuildError> {
        if self.elements.contains_key(&record.id) {
            return Err(GraphBuildError::DuplicateElement(record.id));
        }
        let from = self.resolve_end(record.id, record.from_terminal_id, record.from_route_node_id)?;
        let to = self.resolve_end(record.id, record.to_terminal_id, record.to_route_node_id)?;

        let segment = UtilityGraphSegmentRef {
            id: record.id,
            span_equipment_id: record.span_equipment_id,
            fiber_number: record.fiber_number,
            from_route_node_id: record.from_route_node_id,
            to_route_node_id: record.to_route_node_id,
            from_terminal_id: from,
            to_terminal_id: to,
        };
        self.connect(UtilityGraphElement::SpanSegment(segment.clone()))?;
        Ok(segment)
    }

    pub fn add_link(&mut self, record: &JumperLinkRecord) -> Result<(), GraphBuildError> {
        for terminal in [record.from_terminal_id, record.to_terminal_id] {
            if self.terminal(terminal).is_none() {
                return Err(GraphBuildError::UnknownTerminal {
                    edge: record.id,
                    terminal,
                });
            }
        }
        self.connect(UtilityGraphElement::Link(UtilityGraphLink {
            id: record.id,
            from_terminal_id: record.from_terminal_id,
            to_terminal_id: record.to_terminal_id,
            length_meters: record.unit.to_meters(record.length),
        }))
    }

    fn resolve_end(
        &mut self,
        edge: Uuid,
        terminal: Option<Uuid>,
        route_node_id: ElementId,
    ) -> Result<Uuid, GraphBuildError> {
        let Some(terminal) = terminal else {
            let id = Uuid::new_v4();
            self.insert(UtilityGraphElement::Terminal(UtilityGraphTerminal {
                id,
                route_node_id,
                equipment_id: None,
                is_dummy_end: true,
            }))?;
            return Ok(id);
        };
        match self.terminal(terminal) {
            None => Err(GraphBuildError::UnknownTerminal { edge, terminal }),
            Some(t) if t.route_node_id != route_node_id => Err(GraphBuildError::TerminalOutsideNode {
                terminal,
                expected: route_node_id,
                actual: t.route_node_id,
            }),
            Some(_) => Ok(terminal),
        }
    }

    fn connect(&mut self, edge: UtilityGraphElement) -> Result<(), GraphBuildError> {
        let id = edge.id();
        let Some((from, to)) = edge.ends() else {
            return self.insert(edge);
        };
        self.insert(edge)?;
        self.adjacency.entry(from).or_default().push(id);
        if to != from {
            self.adjacency.entry(to).or_default().push(id);
        }
        Ok(())
    }

    fn insert(&mut self, element: UtilityGraphElement) -> Result<(), GraphBuildError> {
        let id = element.id();
        if self.elements.contains_key(&id) {
            return Err(GraphBuildError::DuplicateElement(id));
        }
        self.elements.insert(id, element);
        Ok(())
    }
}
