//! Domain events that drive the route network projection.
//!
//! A client edit produces one [`RouteNetworkEditOperation`] carrying an
//! ordered batch of [`RouteNetworkEvent`]s. The seed event log is an ordered
//! JSON array of [`EventLogRecord`]s: edit operations interleaved with the
//! interest events that were recorded when interests were registered,
//! updated or removed.

use crate::transaction::GraphMutation;
use geo::{LineString, Point};
use route_core::{
    ElementId, ElementMetadata, InterestId, LifecycleInfo, MappingInfo, NamingInfo, RouteNode,
    RouteNodeInfo, RouteSegment, RouteSegmentInfo, SafetyInfo,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Command type of an edit operation that splits an existing segment.
pub const SEGMENT_SPLIT_COMMAND: &str = "ExistingRouteSegmentSplitted";

/// A single change to the route network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum RouteNetworkEvent {
    RouteNodeAdded {
        node_id: ElementId,
        point: [f64; 2],
        #[serde(default)]
        info: Option<RouteNodeInfo>,
        #[serde(default)]
        metadata: ElementMetadata,
    },
    RouteSegmentAdded {
        segment_id: ElementId,
        from_node_id: ElementId,
        to_node_id: ElementId,
        line: Vec<[f64; 2]>,
        #[serde(default)]
        info: Option<RouteSegmentInfo>,
        #[serde(default)]
        metadata: ElementMetadata,
    },
    RouteNodeMarkedForDeletion {
        node_id: ElementId,
    },
    RouteSegmentMarkedForDeletion {
        segment_id: ElementId,
    },
    /// Emitted when a segment is replaced, e.g. by a split.
    RouteSegmentRemoved {
        segment_id: ElementId,
        #[serde(default)]
        replaced_by_segments: Vec<ElementId>,
    },
    RouteNodeGeometryModified {
        node_id: ElementId,
        point: [f64; 2],
    },
    RouteSegmentGeometryModified {
        segment_id: ElementId,
        line: Vec<[f64; 2]>,
    },
    NamingInfoModified {
        element_id: ElementId,
        naming: Option<NamingInfo>,
    },
    LifecycleInfoModified {
        element_id: ElementId,
        lifecycle: Option<LifecycleInfo>,
    },
    MappingInfoModified {
        element_id: ElementId,
        mapping: Option<MappingInfo>,
    },
    SafetyInfoModified {
        element_id: ElementId,
        safety: Option<SafetyInfo>,
    },
    RouteNodeInfoModified {
        node_id: ElementId,
        info: Option<RouteNodeInfo>,
    },
    RouteSegmentInfoModified {
        segment_id: ElementId,
        info: Option<RouteSegmentInfo>,
    },
}

impl RouteNetworkEvent {
    /// The element the event targets.
    pub fn element_id(&self) -> ElementId {
        match self {
            Self::RouteNodeAdded { node_id, .. }
            | Self::RouteNodeMarkedForDeletion { node_id }
            | Self::RouteNodeGeometryModified { node_id, .. }
            | Self::RouteNodeInfoModified { node_id, .. } => *node_id,
            Self::RouteSegmentAdded { segment_id, .. }
            | Self::RouteSegmentMarkedForDeletion { segment_id }
            | Self::RouteSegmentRemoved { segment_id, .. }
            | Self::RouteSegmentGeometryModified { segment_id, .. }
            | Self::RouteSegmentInfoModified { segment_id, .. } => *segment_id,
            Self::NamingInfoModified { element_id, .. }
            | Self::LifecycleInfoModified { element_id, .. }
            | Self::MappingInfoModified { element_id, .. }
            | Self::SafetyInfoModified { element_id, .. } => *element_id,
        }
    }

    /// Short name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RouteNodeAdded { .. } => "RouteNodeAdded",
            Self::RouteSegmentAdded { .. } => "RouteSegmentAdded",
            Self::RouteNodeMarkedForDeletion { .. } => "RouteNodeMarkedForDeletion",
            Self::RouteSegmentMarkedForDeletion { .. } => "RouteSegmentMarkedForDeletion",
            Self::RouteSegmentRemoved { .. } => "RouteSegmentRemoved",
            Self::RouteNodeGeometryModified { .. } => "RouteNodeGeometryModified",
            Self::RouteSegmentGeometryModified { .. } => "RouteSegmentGeometryModified",
            Self::NamingInfoModified { .. } => "NamingInfoModified",
            Self::LifecycleInfoModified { .. } => "LifecycleInfoModified",
            Self::MappingInfoModified { .. } => "MappingInfoModified",
            Self::SafetyInfoModified { .. } => "SafetyInfoModified",
            Self::RouteNodeInfoModified { .. } => "RouteNodeInfoModified",
            Self::RouteSegmentInfoModified { .. } => "RouteSegmentInfoModified",
        }
    }

    /// Translates the event into the graph mutation it causes.
    pub fn to_mutation(&self) -> GraphMutation {
        match self {
            Self::RouteNodeAdded {
                node_id,
                point,
                info,
                metadata,
            } => GraphMutation::AddNode(RouteNode {
                id: *node_id,
                point: Point::new(point[0], point[1]),
                info: info.clone(),
                metadata: metadata.clone(),
            }),
            Self::RouteSegmentAdded {
                segment_id,
                from_node_id,
                to_node_id,
                line,
                info,
                metadata,
            } => GraphMutation::AddSegment(RouteSegment {
                id: *segment_id,
                from_node: *from_node_id,
                to_node: *to_node_id,
                line: to_line(line),
                info: info.clone(),
                metadata: metadata.clone(),
            }),
            Self::RouteNodeMarkedForDeletion { node_id } => GraphMutation::Delete {
                element_id: *node_id,
            },
            Self::RouteSegmentMarkedForDeletion { segment_id }
            | Self::RouteSegmentRemoved { segment_id, .. } => GraphMutation::Delete {
                element_id: *segment_id,
            },
            Self::RouteNodeGeometryModified { node_id, point } => GraphMutation::SetNodeGeometry {
                node_id: *node_id,
                point: Point::new(point[0], point[1]),
            },
            Self::RouteSegmentGeometryModified { segment_id, line } => {
                GraphMutation::SetSegmentGeometry {
                    segment_id: *segment_id,
                    line: to_line(line),
                }
            }
            Self::NamingInfoModified { element_id, naming } => GraphMutation::SetNaming {
                element_id: *element_id,
                naming: naming.clone(),
            },
            Self::LifecycleInfoModified {
                element_id,
                lifecycle,
            } => GraphMutation::SetLifecycle {
                element_id: *element_id,
                lifecycle: lifecycle.clone(),
            },
            Self::MappingInfoModified {
                element_id,
                mapping,
            } => GraphMutation::SetMapping {
                element_id: *element_id,
                mapping: mapping.clone(),
            },
            Self::SafetyInfoModified { element_id, safety } => GraphMutation::SetSafety {
                element_id: *element_id,
                safety: safety.clone(),
            },
            Self::RouteNodeInfoModified { node_id, info } => GraphMutation::SetNodeInfo {
                node_id: *node_id,
                info: info.clone(),
            },
            Self::RouteSegmentInfoModified { segment_id, info } => GraphMutation::SetSegmentInfo {
                segment_id: *segment_id,
                info: info.clone(),
            },
        }
    }
}

fn to_line(coords: &[[f64; 2]]) -> LineString<f64> {
    coords.iter().map(|c| (c[0], c[1])).collect::<Vec<_>>().into()
}

/// One client edit: an ordered batch applied in a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNetworkEditOperation {
    pub event_id: Uuid,
    /// E.g. `NewRouteSegmentDigitized` or [`SEGMENT_SPLIT_COMMAND`].
    #[serde(default)]
    pub command_type: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub work_task_id: Option<Uuid>,
    pub events: Vec<RouteNetworkEvent>,
}

impl RouteNetworkEditOperation {
    pub fn new(command_type: impl Into<String>, events: Vec<RouteNetworkEvent>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            command_type: Some(command_type.into()),
            user_name: None,
            work_task_id: None,
            events,
        }
    }

    pub fn is_segment_split(&self) -> bool {
        self.command_type.as_deref() == Some(SEGMENT_SPLIT_COMMAND)
    }
}

/// One entry of the ordered seed event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recordType")]
pub enum EventLogRecord {
    RouteNetworkEditOperation(RouteNetworkEditOperation),
    NodeOfInterestRegistered {
        interest_id: InterestId,
        node_id: ElementId,
    },
    WalkOfInterestRegistered {
        interest_id: InterestId,
        walk: Vec<ElementId>,
    },
    WalkOfInterestRouteNetworkElementsModified {
        interest_id: InterestId,
        walk: Vec<ElementId>,
    },
    InterestUnregistered {
        interest_id: InterestId,
    },
}

/// Parses an ordered JSON array of [`EventLogRecord`]s.
pub fn parse_event_log(json: &str) -> Result<Vec<EventLogRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_log() {
        let node = ElementId::new();
        let interest = InterestId::new();
        let json = format!(
            r#"[
                {{
                    "recordType": "RouteNetworkEditOperation",
                    "event_id": "{op}",
                    "command_type": "NewRouteNodeDigitized",
                    "events": [
                        {{ "eventType": "RouteNodeAdded", "node_id": "{node}", "point": [1.0, 2.0] }}
                    ]
                }},
                {{ "recordType": "NodeOfInterestRegistered", "interest_id": "{interest}", "node_id": "{node}" }}
            ]"#,
            op = Uuid::new_v4(),
        );

        let records = parse_event_log(&json).unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            EventLogRecord::RouteNetworkEditOperation(op) => {
                assert!(!op.is_segment_split());
                assert_eq!(op.events[0].element_id(), node);
                assert_eq!(op.events[0].name(), "RouteNodeAdded");
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(
            records[1],
            EventLogRecord::NodeOfInterestRegistered {
                interest_id: interest,
                node_id: node
            }
        );
    }

    #[test]
    fn test_segment_added_to_mutation() {
        let event = RouteNetworkEvent::RouteSegmentAdded {
            segment_id: ElementId::new(),
            from_node_id: ElementId::new(),
            to_node_id: ElementId::new(),
            line: vec![[0.0, 0.0], [3.0, 4.0]],
            info: None,
            metadata: ElementMetadata::default(),
        };
        match event.to_mutation() {
            GraphMutation::AddSegment(s) => assert_eq!(s.length(), 5.0),
            other => panic!("unexpected mutation {:?}", other),
        }
    }

    #[test]
    fn test_removed_and_marked_both_delete() {
        let id = ElementId::new();
        let removed = RouteNetworkEvent::RouteSegmentRemoved {
            segment_id: id,
            replaced_by_segments: vec![],
        };
        let marked = RouteNetworkEvent::RouteSegmentMarkedForDeletion { segment_id: id };
        assert_eq!(removed.to_mutation(), marked.to_mutation());
    }

    #[test]
    fn test_split_command_detection() {
        let op = RouteNetworkEditOperation::new(SEGMENT_SPLIT_COMMAND, vec![]);
        assert!(op.is_segment_split());
    }
}
