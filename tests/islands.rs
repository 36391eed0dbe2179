use std::collections::{BTreeSet, VecDeque};

use islandsim::{
    BodyState, DisjointSet, IslandSolver, PointToPointConstraint, SimulationIslandManager,
    SolverConfig, TypedConstraint, ahash::AHashMap, glam::Vec3A,
};
use proptest::prelude::*;

/// Connected components of `0..count` under `edges`, found by breadth-first search.
fn components(count: usize, edges: &[(usize, usize)]) -> BTreeSet<BTreeSet<usize>> {
    let mut adjacency = vec![Vec::new(); count];
    for &(a, b) in edges {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }

    let mut seen = vec![false; count];
    let mut result = BTreeSet::new();
    for start in 0..count {
        if seen[start] {
            continue;
        }

        seen[start] = true;
        let mut component = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &next in &adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    component.insert(next);
                    queue.push_back(next);
                }
            }
        }

        result.insert(component);
    }

    result
}

fn joint(a: usize, b: usize) -> PointToPointConstraint<usize> {
    PointToPointConstraint::new(a, b, Vec3A::ZERO, Vec3A::ZERO).unwrap()
}

#[test]
fn chained_constraints_share_an_island() {
    let store = vec![BodyState::sphere(Vec3A::ZERO, 1.0, 0.5); 4];
    let mut joints = [joint(1, 2), joint(2, 3)];
    let mut refs: Vec<&mut PointToPointConstraint<usize>> = joints.iter_mut().collect();

    let mut manager = SimulationIslandManager::default();
    let islands = manager.build_islands(&mut refs, &[], &store);

    assert_eq!(islands.len(), 1);
    let bodies: BTreeSet<usize> = islands[0].bodies.iter().copied().collect();
    assert_eq!(bodies, BTreeSet::from([1, 2, 3]));
    assert_eq!(islands[0].constraints.len(), 2);
}

#[test]
fn hash_map_store_drives_the_solver() {
    let mut store: AHashMap<&str, BodyState> = AHashMap::new();
    store.insert(
        "bob",
        BodyState::sphere(Vec3A::new(0.0, -1.0, 0.0), 1.0, 0.1)
            .with_velocity(Vec3A::new(0.0, -3.0, 0.0), Vec3A::ZERO),
    );

    // "anchor" is unknown to the store, so it acts as a static body
    let mut rope =
        PointToPointConstraint::new("bob", "anchor", Vec3A::new(0.0, 1.0, 0.0), Vec3A::ZERO)
            .unwrap();
    let mut constraints: Vec<&mut dyn TypedConstraint<&str>> =
        vec![&mut rope as &mut dyn TypedConstraint<&str>];

    let mut solver = IslandSolver::new(SolverConfig {
        parallel_islands: false,
        ..SolverConfig::DEFAULT
    })
    .unwrap();
    let report = solver.solve(&mut constraints, &[], &mut store, 1.0 / 60.0).unwrap();

    assert_eq!(report.islands, 1);
    assert_eq!(report.solved_constraints, 1);
    assert!(store.get("bob").unwrap().linear_velocity.y.abs() < 1e-2);
    assert!(!store.contains_key("anchor"));
}

#[test]
fn a_joint_moves_between_solvers() {
    let _ = islandsim::logging::try_init();

    let falling = BodyState::sphere(Vec3A::new(0.0, -1.0, 0.0), 1.0, 0.1)
        .with_velocity(Vec3A::new(0.0, -3.0, 0.0), Vec3A::ZERO);
    // body 1 is unknown to the store, so it acts as a static anchor
    let mut rope =
        PointToPointConstraint::new(0, 1, Vec3A::new(0.0, 1.0, 0.0), Vec3A::ZERO).unwrap();

    for _ in 0..2 {
        let mut store = vec![falling];
        let mut solver = IslandSolver::new(SolverConfig {
            parallel_islands: false,
            ..SolverConfig::DEFAULT
        })
        .unwrap();
        let report = solver.solve(&mut [&mut rope], &[], &mut store, 1.0 / 60.0).unwrap();

        assert_eq!(report.islands, 1);
        assert_eq!(report.solved_constraints, 1);
        assert_eq!(report.skipped_constraints, 0);
        assert!(store[0].linear_velocity.y.abs() < 1e-2);
    }
}

proptest! {
    #[test]
    fn disjoint_set_matches_breadth_first_search(
        count in 1usize..40,
        raw_edges in prop::collection::vec((any::<usize>(), any::<usize>()), 0..60),
    ) {
        let edges: Vec<(usize, usize)> =
            raw_edges.iter().map(|&(a, b)| (a % count, b % count)).collect();

        let mut set = DisjointSet::new();
        for i in 0..count {
            set.insert(i);
        }
        for &(a, b) in &edges {
            set.create_union(a, b);
        }

        let sets: BTreeSet<BTreeSet<usize>> = set
            .sets()
            .into_iter()
            .map(|members| members.into_iter().collect())
            .collect();
        let expected = components(count, &edges);
        prop_assert_eq!(&sets, &expected);
        prop_assert_eq!(set.representatives().len(), sets.len());

        for rep in set.representatives() {
            prop_assert_eq!(set.find(&rep), Some(rep));
            let members: BTreeSet<usize> = set.members(&rep).unwrap().into_iter().collect();
            let component = expected.iter().find(|component| component.contains(&rep));
            prop_assert_eq!(Some(&members), component);
        }
    }

    #[test]
    fn islands_partition_dynamic_bodies(
        count in 2usize..30,
        statics in prop::collection::vec(any::<bool>(), 30),
        raw_edges in prop::collection::vec((any::<usize>(), any::<usize>()), 0..40),
    ) {
        let store: Vec<BodyState> = (0..count)
            .map(|i| {
                if statics[i] {
                    BodyState::STATIC
                } else {
                    BodyState::sphere(Vec3A::ZERO, 1.0, 0.5)
                }
            })
            .collect();
        let edges: Vec<(usize, usize)> = raw_edges
            .iter()
            .map(|&(a, b)| (a % count, b % count))
            .filter(|&(a, b)| a != b)
            .collect();

        let mut joints: Vec<PointToPointConstraint<usize>> =
            edges.iter().map(|&(a, b)| joint(a, b)).collect();
        let mut refs: Vec<&mut PointToPointConstraint<usize>> = joints.iter_mut().collect();
        let all: Vec<usize> = (0..count).collect();

        let mut manager = SimulationIslandManager::default();
        let islands = manager.build_islands(&mut refs, &all, &store);

        // statics never carry connectivity
        let dynamic_edges: Vec<(usize, usize)> = edges
            .iter()
            .copied()
            .filter(|&(a, b)| !statics[a] && !statics[b])
            .collect();
        let expected: BTreeSet<BTreeSet<usize>> = components(count, &dynamic_edges)
            .into_iter()
            .filter(|component| component.iter().all(|&i| !statics[i]))
            .collect();
        let actual: BTreeSet<BTreeSet<usize>> = islands
            .iter()
            .map(|island| island.bodies.iter().copied().collect())
            .collect();
        prop_assert_eq!(actual, expected);

        // each constraint with a dynamic body lands in exactly the island of that body
        let mut placed = vec![0; edges.len()];
        for island in &islands {
            for &i in &island.constraints {
                placed[i] += 1;
                let (a, b) = edges[i];
                let body = if statics[a] { b } else { a };
                prop_assert!(island.bodies.contains(&body));
            }
        }
        for (i, &(a, b)) in edges.iter().enumerate() {
            let expected_count = usize::from(!(statics[a] && statics[b]));
            prop_assert_eq!(placed[i], expected_count);
        }
    }
}
