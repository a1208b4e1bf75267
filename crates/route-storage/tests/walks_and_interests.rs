//! Walk canonicalization properties and reverse-index coherence.

use proptest::prelude::*;
use route_core::{ElementId, InterestId, RelationKind, RouteNetworkInterest};
use route_storage::{RouteNetworkConfig, RouteNetworkGraphStore, RouteNetworkService, WalkValidator};

/// A straight chain N0 - S0 - N1 - ... - Nn with each segment's stored
/// direction chosen by `flips`.
fn chain(flips: &[bool]) -> (RouteNetworkGraphStore, Vec<ElementId>, Vec<ElementId>) {
    let nodes: Vec<_> = (0..=flips.len()).map(|_| ElementId::new()).collect();
    let segments: Vec<_> = flips.iter().map(|_| ElementId::new()).collect();
    let mut builder = RouteNetworkGraphStore::builder();
    for (i, id) in nodes.iter().enumerate() {
        builder = builder.add_node(*id, i as f64 * 10.0, 0.0);
    }
    for (i, flip) in flips.iter().enumerate() {
        builder = if *flip {
            builder.add_segment(segments[i], nodes[i + 1], nodes[i])
        } else {
            builder.add_segment(segments[i], nodes[i], nodes[i + 1])
        };
    }
    (builder.build(), nodes, segments)
}

/// Canonical walk over nodes `from..=to` of the chain.
fn canonical(nodes: &[ElementId], segments: &[ElementId], from: usize, to: usize) -> Vec<ElementId> {
    let mut walk = vec![nodes[from]];
    for i in from..to {
        walk.push(segments[i]);
        walk.push(nodes[i + 1]);
    }
    walk
}

fn arb_case() -> impl Strategy<Value = (Vec<bool>, usize, usize, Vec<bool>, Vec<bool>)> {
    prop::collection::vec(any::<bool>(), 1..8).prop_flat_map(|flips| {
        let n = flips.len();
        (Just(flips), 0..n)
            .prop_flat_map(move |(flips, from)| {
                (
                    Just(flips),
                    Just(from),
                    (from + 1)..=n,
                    prop::collection::vec(any::<bool>(), n + 1),
                    prop::collection::vec(any::<bool>(), n),
                )
            })
    })
}

proptest! {
    #[test]
    fn prop_mixed_input_expands_to_same_walk(
        (flips, from, to, keep_nodes, keep_segments) in arb_case()
    ) {
        let (store, nodes, segments) = chain(&flips);
        let expected = canonical(&nodes, &segments, from, to);
        let validator = WalkValidator::new(store.snapshot());

        // Keep a segment or both of its end nodes, so the input still pins the path.
        let mut input = Vec::new();
        for i in from..=to {
            let keep_node = keep_nodes[i]
                || (i > from && !keep_segments[i - 1])
                || (i < to && !keep_segments[i])
                || (to == from + 1 && i == from);
            if keep_node {
                input.push(nodes[i]);
            }
            if i < to && keep_segments[i] {
                input.push(segments[i]);
            }
        }

        let walk = validator.validate(&input).unwrap();
        prop_assert_eq!(walk.as_slice(), expected.as_slice());

        let nodes_only: Vec<_> = expected.iter().step_by(2).copied().collect();
        prop_assert_eq!(validator.validate(&nodes_only).unwrap(), walk.clone());
    }

    #[test]
    fn prop_validate_reverse_is_reverse(
        (flips, from, to, _, _) in arb_case()
    ) {
        let (store, nodes, segments) = chain(&flips);
        let walk = canonical(&nodes, &segments, from, to);
        let validator = WalkValidator::new(store.snapshot());

        let forward = validator.validate(&walk).unwrap();
        let reversed_input: Vec<_> = walk.iter().rev().copied().collect();
        let backward = validator.validate(&reversed_input).unwrap();

        prop_assert_eq!(forward.clone(), backward.reversed());
        prop_assert!(forward.equivalent(backward.as_slice()));
    }
}

/// The chain from [`chain`] plus a dead-end spur off every node flagged in
/// `spurs` and a shortcut N(i) - N(i+2) for every index flagged in `shortcuts`.
fn branching(
    flips: &[bool],
    spurs: &[bool],
    shortcuts: &[bool],
) -> (RouteNetworkGraphStore, Vec<ElementId>, Vec<ElementId>) {
    let nodes: Vec<_> = (0..=flips.len()).map(|_| ElementId::new()).collect();
    let segments: Vec<_> = flips.iter().map(|_| ElementId::new()).collect();
    let mut builder = RouteNetworkGraphStore::builder();
    for (i, id) in nodes.iter().enumerate() {
        builder = builder.add_node(*id, i as f64 * 10.0, 0.0);
    }
    for (i, flip) in flips.iter().enumerate() {
        builder = if *flip {
            builder.add_segment(segments[i], nodes[i + 1], nodes[i])
        } else {
            builder.add_segment(segments[i], nodes[i], nodes[i + 1])
        };
    }
    for (i, spur) in spurs.iter().enumerate() {
        if *spur {
            let end = ElementId::new();
            builder = builder
                .add_node(end, i as f64 * 10.0, 10.0)
                .add_segment(ElementId::new(), nodes[i], end);
        }
    }
    for (i, shortcut) in shortcuts.iter().enumerate() {
        if *shortcut {
            let (x0, x1) = (i as f64 * 10.0, (i + 2) as f64 * 10.0);
            builder = builder.add_segment_with_line(
                ElementId::new(),
                nodes[i],
                nodes[i + 2],
                vec![(x0, 0.0), ((x0 + x1) / 2.0, -10.0), (x1, 0.0)],
            );
        }
    }
    (builder.build(), nodes, segments)
}

fn arb_branching_case() -> impl Strategy<Value = (Vec<bool>, Vec<bool>, Vec<bool>, Vec<bool>)> {
    prop::collection::vec(any::<bool>(), 1..7).prop_flat_map(|flips| {
        let n = flips.len();
        (
            Just(flips),
            prop::collection::vec(any::<bool>(), n + 1),
            prop::collection::vec(any::<bool>(), n.saturating_sub(1)),
            prop::collection::vec(any::<bool>(), 2 * n + 1),
        )
    })
}

proptest! {
    #[test]
    fn prop_sparse_input_validates_the_same_both_ways(
        (flips, spurs, shortcuts, keep) in arb_branching_case()
    ) {
        let (store, nodes, segments) = branching(&flips, &spurs, &shortcuts);
        let walk = canonical(&nodes, &segments, 0, flips.len());
        let input: Vec<_> = walk
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(id, _)| *id)
            .collect();
        prop_assume!(!input.is_empty());
        // A lone segment carries no direction of travel.
        prop_assume!(!(input.len() == 1 && segments.contains(&input[0])));

        let validator = WalkValidator::new(store.snapshot());
        let reversed_input: Vec<_> = input.iter().rev().copied().collect();
        match (validator.validate(&input), validator.validate(&reversed_input)) {
            (Ok(forward), Ok(backward)) => prop_assert_eq!(forward, backward.reversed()),
            (Err(_), Err(_)) => {}
            (forward, backward) => prop_assert!(
                false,
                "one direction failed: {:?} / {:?}",
                forward,
                backward
            ),
        }
    }

    #[test]
    fn prop_sparse_input_on_plain_chain_recovers_the_walk(
        (flips, _, _, keep) in arb_branching_case()
    ) {
        // Without spurs or shortcuts every gap has exactly one way to close.
        let (store, nodes, segments) = chain(&flips);
        let walk = canonical(&nodes, &segments, 0, flips.len());
        let input: Vec<_> = walk
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(id, _)| *id)
            .collect();
        let first_kept = walk.iter().position(|id| input.first() == Some(id));
        let last_kept = walk.iter().position(|id| input.last() == Some(id));
        let (Some(first), Some(last)) = (first_kept, last_kept) else {
            return Ok(());
        };
        // A lone segment carries no direction of travel.
        prop_assume!(first != last || first % 2 == 0);
        // Dropping two neighbours in a row leaves a gap wider than one segment.
        prop_assume!(keep[first..=last].windows(2).all(|w| w[0] || w[1]));

        let validated = WalkValidator::new(store.snapshot()).validate(&input).unwrap();
        // The walk spans the kept range, widened to nodes at both ends.
        let from = first - first % 2;
        let to = last + last % 2;
        prop_assert_eq!(validated.as_slice(), &walk[from..=to]);
    }
}

#[test]
fn test_node_then_distant_segment_matches_reverse() {
    let (store, nodes, segments) = chain(&[false, true]);
    let validator = WalkValidator::new(store.snapshot());
    let forward = validator.validate(&[nodes[0], segments[1]]).unwrap();
    let backward = validator.validate(&[segments[1], nodes[0]]).unwrap();
    assert_eq!(forward, backward.reversed());
    assert_eq!(
        forward.as_slice(),
        &[nodes[0], segments[0], nodes[1], segments[1], nodes[2]]
    );
}

#[test]
fn test_node_shared_by_three_walks() {
    // A - SA - HUB - SB - B, with C - SC - HUB
    let (a, hub, b, c) = (ElementId::new(), ElementId::new(), ElementId::new(), ElementId::new());
    let (sa, sb, sc) = (ElementId::new(), ElementId::new(), ElementId::new());
    let store = RouteNetworkGraphStore::builder()
        .add_node(a, 0.0, 0.0)
        .add_node(hub, 10.0, 0.0)
        .add_node(b, 20.0, 0.0)
        .add_node(c, 10.0, 10.0)
        .add_segment(sa, a, hub)
        .add_segment(sb, hub, b)
        .add_segment(sc, c, hub)
        .build();
    let svc = RouteNetworkService::with_store(store, RouteNetworkConfig::default());

    let starts = InterestId::new();
    let passes = InterestId::new();
    let ends = InterestId::new();
    svc.register_walk_of_interest(starts, &[hub, b]).unwrap();
    svc.register_walk_of_interest(passes, &[a, hub, b]).unwrap();
    svc.register_walk_of_interest(ends, &[c, hub]).unwrap();

    let mut touching: Vec<(InterestId, RelationKind)> = svc
        .get_interests_touching(hub)
        .into_iter()
        .map(|(i, k)| (i.id, k))
        .collect();
    touching.sort_by_key(|(id, _)| *id);

    let mut expected = vec![
        (starts, RelationKind::Start),
        (passes, RelationKind::PassThrough),
        (ends, RelationKind::End),
    ];
    expected.sort_by_key(|(id, _)| *id);
    assert_eq!(touching, expected);
}

#[test]
fn test_index_coherence_after_mixed_commands() {
    let flips = [false, true, false, true];
    let (store, nodes, segments) = chain(&flips);
    let svc = RouteNetworkService::with_store(store, RouteNetworkConfig::default());

    let ids: Vec<InterestId> = (0..4).map(|_| InterestId::new()).collect();
    svc.register_walk_of_interest(ids[0], &[nodes[0], nodes[4]]).unwrap_err();
    svc.register_walk_of_interest(ids[0], &segments).unwrap();
    svc.register_walk_of_interest(ids[1], &[nodes[1], nodes[2]]).unwrap();
    svc.register_node_of_interest(ids[2], nodes[3]).unwrap();
    svc.register_walk_of_interest(ids[3], &[nodes[4], nodes[3]]).unwrap();
    svc.update_walk_of_interest(ids[1], &[nodes[2], nodes[3], nodes[4]])
        .unwrap();
    svc.unregister_interest(ids[3]).unwrap();

    for id in &ids[..3] {
        let interest: RouteNetworkInterest = svc.get_interest(*id).unwrap();
        let refs = &interest.route_network_element_refs;
        for (pos, element) in refs.iter().enumerate() {
            let kind = RelationKind::from_position(pos, refs.len());
            assert!(
                svc.get_interests_touching(*element)
                    .iter()
                    .any(|(i, k)| i.id == *id && *k == kind),
                "missing row for {element} at {pos}"
            );
        }
    }

    for element in nodes.iter().chain(segments.iter()) {
        assert!(svc
            .get_interests_touching(*element)
            .iter()
            .all(|(i, _)| i.id != ids[3]));
    }
    // Old rows of the updated interest are gone
    assert!(svc
        .get_interests_touching(nodes[1])
        .iter()
        .all(|(i, _)| i.id != ids[1]));
}
