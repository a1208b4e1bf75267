//! The equipment registry and its overlay graph.

use crate::graph::{UtilityGraph, UtilityGraphSegmentRef};
use crate::model::{
    JumperLinkRecord, NodeContainer, SpanEquipment, SpanSegmentRecord, SpecificationCatalog,
    Terminal, TerminalEquipment, TerminalStructure, UtilityNetworkDocument,
};
use crate::{Result, UtilityNetworkError};
use route_core::ElementId;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct TerminalLocation {
    equipment_id: Uuid,
    structure: usize,
    terminal: usize,
}

/// A terminal resolved back to the equipment and structure holding it.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRef<'a> {
    pub equipment: &'a TerminalEquipment,
    pub structure: &'a TerminalStructure,
    pub terminal: &'a Terminal,
}

#[derive(Debug, Default)]
pub struct UtilityNetwork {
    catalog: SpecificationCatalog,
    terminal_equipment: HashMap<Uuid, TerminalEquipment>,
    span_equipment: HashMap<Uuid, SpanEquipment>,
    node_containers: HashMap<ElementId, NodeContainer>,
    terminal_locations: HashMap<Uuid, TerminalLocation>,
    graph: UtilityGraph,
}

impl UtilityNetwork {
    pub fn new(catalog: SpecificationCatalog) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: UtilityNetworkDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Builds the network in dependency order: specifications, equipment,
    /// containers, then connectivity.
    pub fn from_document(document: UtilityNetworkDocument) -> Result<Self> {
        let mut catalog = SpecificationCatalog::new();
        let specs = document.specifications;
        specs
            .terminal_equipment
            .into_iter()
            .for_each(|s| catalog.add_terminal_equipment(s));
        specs
            .terminal_structures
            .into_iter()
            .for_each(|s| catalog.add_terminal_structure(s));
        specs
            .span_equipment
            .into_iter()
            .for_each(|s| catalog.add_span_equipment(s));

        let mut network = Self::new(catalog);
        for equipment in document.terminal_equipment {
            network.add_terminal_equipment(equipment)?;
        }
        for span in document.span_equipment {
            network.add_span_equipment(span)?;
        }
        for container in document.node_containers {
            network.add_node_container(container)?;
        }
        for segment in &document.span_segments {
            network.add_span_segment(segment)?;
        }
        for link in &document.jumper_links {
            network.add_jumper_link(link)?;
        }
        debug!(
            terminal_equipment = network.terminal_equipment.len(),
            span_equipment = network.span_equipment.len(),
            graph_elements = network.graph.len(),
            "Utility network loaded"
        );
        Ok(network)
    }

    // -------------------------------------------------------------------------
    // Building
    // -------------------------------------------------------------------------

    /// Registers equipment and adds each of its terminals to the graph.
    pub fn add_terminal_equipment(&mut self, equipment: TerminalEquipment) -> Result<()> {
        if self.terminal_equipment.contains_key(&equipment.id) {
            return Err(UtilityNetworkError::DuplicateEquipment(equipment.id));
        }
        for (s, structure) in equipment.structures.iter().enumerate() {
            for (t, terminal) in structure.terminals.iter().enumerate() {
                self.graph
                    .add_terminal(terminal.id, equipment.route_node_id, equipment.id)?;
                self.terminal_locations.insert(
                    terminal.id,
                    TerminalLocation {
                        equipment_id: equipment.id,
                        structure: s,
                        terminal: t,
                    },
                );
            }
        }
        self.terminal_equipment.insert(equipment.id, equipment);
        Ok(())
    }

    pub fn add_span_equipment(&mut self, span: SpanEquipment) -> Result<()> {
        if self.span_equipment.contains_key(&span.id) {
            return Err(UtilityNetworkError::DuplicateEquipment(span.id));
        }
        self.span_equipment.insert(span.id, span);
        Ok(())
    }

    pub fn add_node_container(&mut self, container: NodeContainer) -> Result<()> {
        let referenced = container
            .rack_equipment_ids()
            .chain(container.terminal_equipment_ids.iter().copied());
        for id in referenced {
            if !self.terminal_equipment.contains_key(&id) {
                return Err(UtilityNetworkError::UnknownEquipment(id));
            }
        }
        self.node_containers
            .insert(container.route_node_id, container);
        Ok(())
    }

    pub fn add_span_segment(&mut self, record: &SpanSegmentRecord) -> Result<UtilityGraphSegmentRef> {
        if !self.span_equipment.contains_key(&record.span_equipment_id) {
            return Err(UtilityNetworkError::UnknownEquipment(record.span_equipment_id));
        }
        Ok(self.graph.add_span_segment(record)?)
    }

    pub fn add_jumper_link(&mut self, record: &JumperLinkRecord) -> Result<()> {
        Ok(self.graph.add_link(record)?)
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn catalog(&self) -> &SpecificationCatalog {
        &self.catalog
    }

    pub fn graph(&self) -> &UtilityGraph {
        &self.graph
    }

    pub fn terminal_equipment(&self, id: Uuid) -> Option<&TerminalEquipment> {
        self.terminal_equipment.get(&id)
    }

    pub fn span_equipment(&self, id: Uuid) -> Option<&SpanEquipment> {
        self.span_equipment.get(&id)
    }

    pub fn node_container(&self, route_node_id: ElementId) -> Option<&NodeContainer> {
        self.node_containers.get(&route_node_id)
    }

    pub fn locate_terminal(&self, terminal_id: Uuid) -> Option<TerminalRef<'_>> {
        let location = self.terminal_locations.get(&terminal_id)?;
        let equipment = self.terminal_equipment.get(&location.equipment_id)?;
        let structure = equipment.structures.get(location.structure)?;
        let terminal = structure.terminals.get(location.terminal)?;
        Some(TerminalRef {
            equipment,
            structure,
            terminal,
        })
    }

    /// Rack-mounted equipment in the container of `route_node_id`.
    pub fn rack_equipment(&self, route_node_id: ElementId) -> impl Iterator<Item = &TerminalEquipment> {
        self.node_containers
            .get(&route_node_id)
            .into_iter()
            .flat_map(NodeContainer::rack_equipment_ids)
            .filter_map(|id| self.terminal_equipment.get(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rack, TerminalEquipmentSpecification};

    fn equipment(node: ElementId, terminals: &[Uuid]) -> TerminalEquipment {
        TerminalEquipment {
            id: Uuid::new_v4(),
            name: Some("ODF 1".into()),
            spec_id: Uuid::new_v4(),
            route_node_id: node,
            address: None,
            structures: vec![TerminalStructure {
                id: Uuid::new_v4(),
                name: "Tray 1".into(),
                spec_id: Uuid::new_v4(),
                terminals: terminals
                    .iter()
                    .enumerate()
                    .map(|(i, id)| Terminal {
                        id: *id,
                        name: format!("{}", i + 1),
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_locate_terminal() {
        let node = ElementId::new();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut network = UtilityNetwork::default();
        network.add_terminal_equipment(equipment(node, &[t1, t2])).unwrap();

        let found = network.locate_terminal(t2).unwrap();
        assert_eq!(found.terminal.name, "2");
        assert_eq!(found.structure.name, "Tray 1");
        assert_eq!(found.equipment.route_node_id, node);
        assert!(network.graph().terminal(t2).is_some());
        assert!(network.locate_terminal(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_container_must_reference_known_equipment() {
        let mut network = UtilityNetwork::default();
        let err = network
            .add_node_container(NodeContainer {
                route_node_id: ElementId::new(),
                racks: vec![Rack {
                    name: "R1".into(),
                    terminal_equipment_ids: vec![Uuid::new_v4()],
                }],
                terminal_equipment_ids: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, UtilityNetworkError::UnknownEquipment(_)));
    }

    #[test]
    fn test_rack_equipment() {
        let node = ElementId::new();
        let mut catalog = SpecificationCatalog::new();
        let olt_spec = Uuid::new_v4();
        catalog.add_terminal_equipment(TerminalEquipmentSpecification {
            id: olt_spec,
            name: "OLT".into(),
            is_line_termination: true,
            is_rack_equipment: true,
        });
        let mut network = UtilityNetwork::new(catalog);

        let mut olt = equipment(node, &[Uuid::new_v4()]);
        olt.spec_id = olt_spec;
        let olt_id = olt.id;
        let loose = equipment(node, &[Uuid::new_v4()]);
        let loose_id = loose.id;
        network.add_terminal_equipment(olt).unwrap();
        network.add_terminal_equipment(loose).unwrap();
        network
            .add_node_container(NodeContainer {
                route_node_id: node,
                racks: vec![Rack {
                    name: "R1".into(),
                    terminal_equipment_ids: vec![olt_id],
                }],
                terminal_equipment_ids: vec![loose_id],
            })
            .unwrap();

        let racked: Vec<_> = network.rack_equipment(node).map(|e| e.id).collect();
        assert_eq!(racked, vec![olt_id]);
        assert_eq!(network.rack_equipment(ElementId::new()).count(), 0);
    }

    #[test]
    fn test_from_json_rejects_malformed_document() {
        assert!(matches!(
            UtilityNetwork::from_json("[1, 2"),
            Err(UtilityNetworkError::InvalidDocument(_))
        ));
        let empty = UtilityNetwork::from_json("{}").unwrap();
        assert!(empty.graph().is_empty());
    }
}
