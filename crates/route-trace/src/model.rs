//! Equipment model layered on top of the route network.
//!
//! Terminal equipment (splice trays, OLT cards, splitters) sits in a route
//! node, optionally mounted in a rack of the node's container. Span equipment
//! (cables) follows a walk of interest through the route network; each fiber
//! of a cable contributes span segments between terminals.

use route_core::{ElementId, InterestId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// =============================================================================
// Specifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalEquipmentSpecification {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_line_termination: bool,
    #[serde(default)]
    pub is_rack_equipment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStructureSpecification {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_customer_splitter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEquipmentSpecification {
    pub id: Uuid,
    pub name: String,
    pub fiber_count: u32,
}

/// Lookup of equipment specifications by id.
#[derive(Debug, Clone, Default)]
pub struct SpecificationCatalog {
    terminal_equipment: HashMap<Uuid, TerminalEquipmentSpecification>,
    terminal_structures: HashMap<Uuid, TerminalStructureSpecification>,
    span_equipment: HashMap<Uuid, SpanEquipmentSpecification>,
}

impl SpecificationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_terminal_equipment(&mut self, spec: TerminalEquipmentSpecification) {
        self.terminal_equipment.insert(spec.id, spec);
    }

    pub fn add_terminal_structure(&mut self, spec: TerminalStructureSpecification) {
        self.terminal_structures.insert(spec.id, spec);
    }

    pub fn add_span_equipment(&mut self, spec: SpanEquipmentSpecification) {
        self.span_equipment.insert(spec.id, spec);
    }

    pub fn terminal_equipment(&self, id: Uuid) -> Option<&TerminalEquipmentSpecification> {
        self.terminal_equipment.get(&id)
    }

    pub fn terminal_structure(&self, id: Uuid) -> Option<&TerminalStructureSpecification> {
        self.terminal_structures.get(&id)
    }

    pub fn span_equipment(&self, id: Uuid) -> Option<&SpanEquipmentSpecification> {
        self.span_equipment.get(&id)
    }
}

// =============================================================================
// Equipment
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: Uuid,
    pub name: String,
}

/// A card, tray or splitter inside terminal equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStructure {
    pub id: Uuid,
    pub name: String,
    pub spec_id: Uuid,
    #[serde(default)]
    pub terminals: Vec<Terminal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub unit_address: Option<String>,
    pub access_address: Option<String>,
}

impl AddressInfo {
    /// Unit address if present, access address otherwise.
    pub fn display(&self) -> Option<&str> {
        self.unit_address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| {
                self.access_address
                    .as_deref()
                    .filter(|a| !a.trim().is_empty())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalEquipment {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub spec_id: Uuid,
    pub route_node_id: ElementId,
    #[serde(default)]
    pub address: Option<AddressInfo>,
    #[serde(default)]
    pub structures: Vec<TerminalStructure>,
}

/// A cable following a walk of interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEquipment {
    pub id: Uuid,
    pub name: String,
    pub spec_id: Uuid,
    pub walk_of_interest_id: InterestId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    pub name: String,
    #[serde(default)]
    pub terminal_equipment_ids: Vec<Uuid>,
}

/// Equipment installed in one route node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContainer {
    pub route_node_id: ElementId,
    #[serde(default)]
    pub racks: Vec<Rack>,
    /// Equipment not mounted in a rack.
    #[serde(default)]
    pub terminal_equipment_ids: Vec<Uuid>,
}

impl NodeContainer {
    pub fn rack_equipment_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.racks
            .iter()
            .flat_map(|r| r.terminal_equipment_ids.iter().copied())
    }
}

// =============================================================================
// Connectivity
// =============================================================================

/// Physical length units a jumper length may be recorded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthUnit {
    Millimeter,
    Centimeter,
    #[default]
    Meter,
    Kilometer,
    Foot,
}

impl LengthUnit {
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            Self::Millimeter => value / 1000.0,
            Self::Centimeter => value / 100.0,
            Self::Meter => value,
            Self::Kilometer => value * 1000.0,
            Self::Foot => value * 0.3048,
        }
    }
}

/// One fiber of a cable between two route nodes.
///
/// A missing terminal id means that end is not connected to anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSegmentRecord {
    pub id: Uuid,
    pub span_equipment_id: Uuid,
    pub fiber_number: u32,
    pub from_route_node_id: ElementId,
    pub to_route_node_id: ElementId,
    #[serde(default)]
    pub from_terminal_id: Option<Uuid>,
    #[serde(default)]
    pub to_terminal_id: Option<Uuid>,
}

/// A patch cord between two terminals inside a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumperLinkRecord {
    pub id: Uuid,
    pub from_terminal_id: Uuid,
    pub to_terminal_id: Uuid,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub unit: LengthUnit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecificationsDocument {
    #[serde(default)]
    pub terminal_equipment: Vec<TerminalEquipmentSpecification>,
    #[serde(default)]
    pub terminal_structures: Vec<TerminalStructureSpecification>,
    #[serde(default)]
    pub span_equipment: Vec<SpanEquipmentSpecification>,
}

/// JSON form of a complete utility network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilityNetworkDocument {
    #[serde(default)]
    pub specifications: SpecificationsDocument,
    #[serde(default)]
    pub terminal_equipment: Vec<TerminalEquipment>,
    #[serde(default)]
    pub span_equipment: Vec<SpanEquipment>,
    #[serde(default)]
    pub node_containers: Vec<NodeContainer>,
    #[serde(default)]
    pub span_segments: Vec<SpanSegmentRecord>,
    #[serde(default)]
    pub jumper_links: Vec<JumperLinkRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_prefers_unit_address() {
        let mut address = AddressInfo {
            unit_address: Some("Vestergade 12, 1. th".into()),
            access_address: Some("Vestergade 12".into()),
        };
        assert_eq!(address.display(), Some("Vestergade 12, 1. th"));

        address.unit_address = Some("  ".into());
        assert_eq!(address.display(), Some("Vestergade 12"));

        address.access_address = None;
        assert_eq!(address.display(), None);
    }

    #[test]
    fn test_length_units() {
        assert_eq!(LengthUnit::Centimeter.to_meters(250.0), 2.5);
        assert_eq!(LengthUnit::Kilometer.to_meters(1.5), 1500.0);
        assert_eq!(LengthUnit::default().to_meters(3.0), 3.0);
    }

    #[test]
    fn test_rack_equipment_ids() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let container = NodeContainer {
            route_node_id: ElementId::new(),
            racks: vec![
                Rack {
                    name: "R1".into(),
                    terminal_equipment_ids: vec![a],
                },
                Rack {
                    name: "R2".into(),
                    terminal_equipment_ids: vec![b],
                },
            ],
            terminal_equipment_ids: vec![c],
        };
        assert_eq!(container.rack_equipment_ids().collect::<Vec<_>>(), vec![a, b]);
    }
}
