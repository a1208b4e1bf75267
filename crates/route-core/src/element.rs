//! Route network elements: nodes, segments and their metadata records.
//!
//! Metadata (naming, lifecycle, mapping, safety, kind info) is carried on the
//! element but is last-write-wins; only topology is versioned by the store.

use crate::ElementId;
use chrono::{DateTime, Utc};
use geo::{BoundingRect, EuclideanLength, LineString, Point};
use serde::{Deserialize, Serialize};

/// Rank given to nodes without a classified kind (most distal).
pub const UNCLASSIFIED_FUNCTION_RANK: u32 = 1000;

// =============================================================================
// Kind / function info
// =============================================================================

/// Physical kind of a route node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteNodeKind {
    CentralOfficeBig,
    CentralOfficeMedium,
    CentralOfficeSmall,
    CabinetBig,
    CabinetSmall,
    ManHole,
    HandHole,
    ConduitClosure,
    SpliceClosure,
    ConduitSimpleJunction,
    ConduitEnd,
    BuildingAccessPoint,
    MultiDwellingUnit,
    SingleDwellingUnit,
}

impl RouteNodeKind {
    /// Numeric rank used to orient traces: lower is closer to the central office.
    pub const fn function_rank(self) -> u32 {
        match self {
            Self::CentralOfficeBig => 1,
            Self::CentralOfficeMedium => 2,
            Self::CentralOfficeSmall => 3,
            Self::CabinetBig => 10,
            Self::CabinetSmall => 11,
            Self::ManHole => 20,
            Self::HandHole => 21,
            Self::ConduitClosure => 22,
            Self::SpliceClosure => 23,
            Self::ConduitSimpleJunction => 24,
            Self::ConduitEnd => 25,
            Self::BuildingAccessPoint => 30,
            Self::MultiDwellingUnit => 31,
            Self::SingleDwellingUnit => 32,
        }
    }

    pub const fn is_central_office(self) -> bool {
        matches!(
            self,
            Self::CentralOfficeBig | Self::CentralOfficeMedium | Self::CentralOfficeSmall
        )
    }
}

/// Network function a route node serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteNodeFunction {
    PrimaryNode,
    SecondaryNode,
    FlexPoint,
    SplicePoint,
    CustomerPremisesPoint,
    OpenConduitPoint,
    BuriedConduitPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNodeInfo {
    pub kind: Option<RouteNodeKind>,
    pub function: Option<RouteNodeFunction>,
}

/// Construction kind of a route segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteSegmentKind {
    Underground,
    Arial,
    Tunnel,
    Indoor,
    Drilling,
    RoadCrossoverDrilling,
    RoadCrossoverDuctBank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSegmentInfo {
    pub kind: Option<RouteSegmentKind>,
    pub height: Option<String>,
    pub width: Option<String>,
}

// =============================================================================
// Metadata records
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    InService,
    NotYetInstalled,
    OutOfService,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleInfo {
    pub deployment_state: Option<DeploymentState>,
    pub installation_date: Option<DateTime<Utc>>,
    pub removal_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingMethod {
    Drafting,
    LandSurveying,
    Schematic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingInfo {
    pub method: Option<MappingMethod>,
    pub vertical_accuracy: Option<String>,
    pub horizontal_accuracy: Option<String>,
    pub survey_date: Option<DateTime<Utc>>,
    pub source_info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyInfo {
    pub classification: Option<String>,
    pub remark: Option<String>,
}

/// The last-write-wins metadata shared by nodes and segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementMetadata {
    pub naming: Option<NamingInfo>,
    pub lifecycle: Option<LifecycleInfo>,
    pub mapping: Option<MappingInfo>,
    pub safety: Option<SafetyInfo>,
}

impl ElementMetadata {
    /// The element name, if one is set and not blank.
    pub fn name(&self) -> Option<&str> {
        self.naming
            .as_ref()
            .and_then(|n| n.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: max_x.max(min_x),
            max_y: max_y.max(min_y),
        }
    }

    /// Degenerate envelope covering a single point.
    pub fn from_point(point: Point<f64>) -> Self {
        Self::new(point.x(), point.y(), point.x(), point.y())
    }

    /// Square envelope of half-width `radius` centred on `point`.
    pub fn around(point: Point<f64>, radius: f64) -> Self {
        Self::new(
            point.x() - radius,
            point.y() - radius,
            point.x() + radius,
            point.y() + radius,
        )
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

// =============================================================================
// Elements
// =============================================================================

/// A manhole, cabinet, central office or other point in the route network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    pub id: ElementId,
    pub point: Point<f64>,
    pub info: Option<RouteNodeInfo>,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

impl RouteNode {
    pub fn new(id: ElementId, x: f64, y: f64) -> Self {
        Self {
            id,
            point: Point::new(x, y),
            info: None,
            metadata: ElementMetadata::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name()
    }

    pub fn kind(&self) -> Option<RouteNodeKind> {
        self.info.as_ref().and_then(|i| i.kind)
    }

    pub fn function(&self) -> Option<RouteNodeFunction> {
        self.info.as_ref().and_then(|i| i.function)
    }

    /// See [`RouteNodeKind::function_rank`]. Only the node kind decides the
    /// rank; [`RouteNodeFunction`] is ignored. Nodes without a kind rank last.
    pub fn function_rank(&self) -> u32 {
        self.kind()
            .map(RouteNodeKind::function_rank)
            .unwrap_or(UNCLASSIFIED_FUNCTION_RANK)
    }
}

/// A duct or trench run between two route nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub id: ElementId,
    pub from_node: ElementId,
    pub to_node: ElementId,
    pub line: LineString<f64>,
    pub info: Option<RouteSegmentInfo>,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

impl RouteSegment {
    pub fn name(&self) -> Option<&str> {
        self.metadata.name()
    }

    /// Euclidean length of the polyline.
    pub fn length(&self) -> f64 {
        self.line.euclidean_length()
    }

    pub fn envelope(&self) -> Option<Envelope> {
        self.line
            .bounding_rect()
            .map(|r| Envelope::new(r.min().x, r.min().y, r.max().x, r.max().y))
    }

    pub fn has_endpoint(&self, node: ElementId) -> bool {
        self.from_node == node || self.to_node == node
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint.
    pub fn other_end(&self, node: ElementId) -> Option<ElementId> {
        if self.from_node == node {
            Some(self.to_node)
        } else if self.to_node == node {
            Some(self.from_node)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteNetworkElementKind {
    RouteNode,
    RouteSegment,
}

/// Either a node or a segment, as read from a graph snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RouteNetworkElement {
    Node(RouteNode),
    Segment(RouteSegment),
}

impl RouteNetworkElement {
    pub fn id(&self) -> ElementId {
        match self {
            Self::Node(n) => n.id,
            Self::Segment(s) => s.id,
        }
    }

    pub fn kind(&self) -> RouteNetworkElementKind {
        match self {
            Self::Node(_) => RouteNetworkElementKind::RouteNode,
            Self::Segment(_) => RouteNetworkElementKind::RouteSegment,
        }
    }

    pub fn metadata(&self) -> &ElementMetadata {
        match self {
            Self::Node(n) => &n.metadata,
            Self::Segment(s) => &s.metadata,
        }
    }

    pub fn envelope(&self) -> Option<Envelope> {
        match self {
            Self::Node(n) => Some(Envelope::from_point(n.point)),
            Self::Segment(s) => s.envelope(),
        }
    }

    pub fn as_node(&self) -> Option<&RouteNode> {
        match self {
            Self::Node(n) => Some(n),
            Self::Segment(_) => None,
        }
    }

    pub fn as_segment(&self) -> Option<&RouteSegment> {
        match self {
            Self::Segment(s) => Some(s),
            Self::Node(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }
}
