//! Bootstrap replay of an ordered event log (load mode).

use route_core::{ElementId, ErrorCode, InterestId, NamingInfo, RelationKind};
use route_storage::{
    EventLogRecord, RouteNetworkEditOperation, RouteNetworkEvent, RouteNetworkService,
};
use uuid::Uuid;

fn node(id: ElementId, x: f64, y: f64) -> RouteNetworkEvent {
    RouteNetworkEvent::RouteNodeAdded {
        node_id: id,
        point: [x, y],
        info: None,
        metadata: Default::default(),
    }
}

fn segment(id: ElementId, from: ElementId, to: ElementId, line: Vec<[f64; 2]>) -> RouteNetworkEvent {
    RouteNetworkEvent::RouteSegmentAdded {
        segment_id: id,
        from_node_id: from,
        to_node_id: to,
        line,
        info: None,
        metadata: Default::default(),
    }
}

fn op(events: Vec<RouteNetworkEvent>) -> EventLogRecord {
    EventLogRecord::RouteNetworkEditOperation(RouteNetworkEditOperation::new(
        "NewRouteSegmentDigitized",
        events,
    ))
}

#[test]
fn test_seed_commits_once() {
    let (a, b, c) = (ElementId::new(), ElementId::new(), ElementId::new());
    let (s1, s2) = (ElementId::new(), ElementId::new());
    let interest = InterestId::new();

    let records = vec![
        op(vec![node(a, 0.0, 0.0), node(b, 30.0, 40.0), segment(s1, a, b, vec![[0.0, 0.0], [30.0, 40.0]])]),
        op(vec![node(c, 30.0, 100.0), segment(s2, b, c, vec![[30.0, 40.0], [30.0, 100.0]])]),
        EventLogRecord::WalkOfInterestRegistered {
            interest_id: interest,
            walk: vec![a, s1, b],
        },
        EventLogRecord::WalkOfInterestRouteNetworkElementsModified {
            interest_id: interest,
            walk: vec![a, s1, b, s2, c],
        },
    ];
    let json = serde_json::to_string(&records).unwrap();

    let svc = RouteNetworkService::default();
    let report = svc.seed(&json).unwrap();

    assert_eq!(report.version, 1, "load mode has a single trailing commit");
    assert_eq!(report.operations, 2);
    assert_eq!(report.events_applied, 5);
    assert_eq!(report.events_skipped, 0);
    assert_eq!(report.interest_events_applied, 2);
    assert_eq!(report.interests, 1);

    let stats = svc.stats();
    assert_eq!((stats.node_count, stats.segment_count), (3, 2));
    assert_eq!(svc.snapshot().get_segment(s1).unwrap().length(), 50.0);

    let touching_c = svc.get_interests_touching(c);
    assert_eq!(touching_c.len(), 1);
    assert_eq!(touching_c[0].1, RelationKind::End);
    assert_eq!(svc.get_interests_touching(b)[0].1, RelationKind::PassThrough);
}

#[test]
fn test_replaying_adds_twice_is_idempotent() {
    let (a, b, s) = (ElementId::new(), ElementId::new(), ElementId::new());
    let batch = vec![node(a, 0.0, 0.0), node(b, 1.0, 0.0), segment(s, a, b, vec![[0.0, 0.0], [1.0, 0.0]])];
    let records = vec![op(batch.clone()), op(batch)];

    let svc = RouteNetworkService::default();
    let report = svc
        .seed(&serde_json::to_string(&records).unwrap())
        .unwrap();

    assert_eq!(report.events_applied, 3);
    assert_eq!(report.events_skipped, 3);
    let stats = svc.stats();
    assert_eq!((stats.node_count, stats.segment_count), (2, 1));
}

#[test]
fn test_corrupt_segment_is_skipped_and_replay_continues() {
    let (a, ghost, s, c) = (ElementId::new(), ElementId::new(), ElementId::new(), ElementId::new());
    let records = vec![
        op(vec![node(a, 0.0, 0.0)]),
        op(vec![segment(s, a, ghost, vec![[0.0, 0.0], [1.0, 1.0]])]),
        op(vec![node(c, 5.0, 5.0)]),
    ];

    let svc = RouteNetworkService::default();
    let report = svc
        .seed(&serde_json::to_string(&records).unwrap())
        .unwrap();

    assert_eq!(report.events_skipped, 1);
    assert!(svc.store().get_element(s).is_none());
    assert!(svc.store().get_element(c).is_some());
}

#[test]
fn test_metadata_events_overwrite() {
    let a = ElementId::new();
    let records = vec![
        op(vec![node(a, 0.0, 0.0)]),
        op(vec![
            RouteNetworkEvent::NamingInfoModified {
                element_id: a,
                naming: Some(NamingInfo {
                    name: Some("first".into()),
                    description: None,
                }),
            },
            RouteNetworkEvent::NamingInfoModified {
                element_id: a,
                naming: Some(NamingInfo {
                    name: Some("CO-KOLDING".into()),
                    description: None,
                }),
            },
            RouteNetworkEvent::RouteNodeGeometryModified {
                node_id: a,
                point: [7.0, 8.0],
            },
        ]),
    ];

    let svc = RouteNetworkService::default();
    svc.seed(&serde_json::to_string(&records).unwrap()).unwrap();

    let node = svc.snapshot().get_node(a).unwrap();
    assert_eq!(node.name(), Some("CO-KOLDING"));
    assert_eq!((node.point.x(), node.point.y()), (7.0, 8.0));
}

#[test]
fn test_raw_json_log() {
    let (a, b, s) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let interest = Uuid::new_v4();
    let json = format!(
        r#"[
          {{
            "recordType": "RouteNetworkEditOperation",
            "event_id": "{op}",
            "command_type": "NewRouteSegmentDigitized",
            "user_name": "surveyor",
            "events": [
              {{ "eventType": "RouteNodeAdded", "node_id": "{a}", "point": [0.0, 0.0],
                 "info": {{ "kind": "CentralOfficeSmall", "function": null }} }},
              {{ "eventType": "RouteNodeAdded", "node_id": "{b}", "point": [0.0, 10.0] }},
              {{ "eventType": "RouteSegmentAdded", "segment_id": "{s}",
                 "from_node_id": "{a}", "to_node_id": "{b}", "line": [[0.0, 0.0], [0.0, 10.0]] }}
            ]
          }},
          {{ "recordType": "NodeOfInterestRegistered", "interest_id": "{interest}", "node_id": "{a}" }}
        ]"#,
        op = Uuid::new_v4(),
    );

    let svc = RouteNetworkService::default();
    let report = svc.seed(&json).unwrap();
    assert_eq!(report.events_applied, 3);
    assert_eq!(report.interests, 1);

    let node = svc.snapshot().get_node(ElementId(a)).unwrap();
    assert_eq!(node.function_rank(), 3);
}

#[test]
fn test_invalid_log_is_rejected() {
    let svc = RouteNetworkService::default();
    let err = svc.seed("{ not a log").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidEventLog);
    assert_eq!(svc.store().current_version(), 0);
}

#[test]
fn test_bad_interest_record_is_skipped() {
    let a = ElementId::new();
    let missing = InterestId::new();
    let records = vec![
        op(vec![node(a, 0.0, 0.0)]),
        EventLogRecord::InterestUnregistered { interest_id: missing },
        EventLogRecord::NodeOfInterestRegistered {
            interest_id: InterestId::new(),
            node_id: a,
        },
    ];
    let svc = RouteNetworkService::default();
    let report = svc
        .seed(&serde_json::to_string(&records).unwrap())
        .unwrap();
    assert_eq!(report.interest_events_skipped, 1);
    assert_eq!(report.interest_events_applied, 1);
}
