use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use islandsim::{Aabb, BroadphaseConfig, PairInfo, SpatialIndex, VolumeHandle, glam::Vec3A};
use proptest::prelude::*;

#[derive(Default)]
struct PairLog {
    begun: Vec<(VolumeHandle, VolumeHandle)>,
    ended: Vec<(VolumeHandle, VolumeHandle, u32)>,
}

fn logged_index(config: BroadphaseConfig) -> (SpatialIndex<u32, u32>, Rc<RefCell<PairLog>>) {
    let log = Rc::new(RefCell::new(PairLog::default()));
    let mut index = SpatialIndex::new(config).unwrap();

    let begin_log = log.clone();
    let mut next_payload = 0;
    index.set_pair_callback(move |pair: &PairInfo<u32>| {
        begin_log.borrow_mut().begun.push((pair.handle_a, pair.handle_b));
        next_payload += 1;
        next_payload
    });

    let end_log = log.clone();
    index.set_unpair_callback(move |pair: &PairInfo<u32>, payload| {
        end_log
            .borrow_mut()
            .ended
            .push((pair.handle_a, pair.handle_b, payload));
    });

    (index, log)
}

fn cube(center: Vec3A, half: f32) -> Aabb {
    Aabb::new(center - Vec3A::splat(half), center + Vec3A::splat(half))
}

#[test]
fn begin_and_end_fire_once_per_overlap() {
    let (mut index, log) = logged_index(BroadphaseConfig::DEFAULT);

    let a = index.create(1, 0, cube(Vec3A::ZERO, 1.0), false).unwrap();
    let b = index.create(2, 0, cube(Vec3A::new(10.0, 0.0, 0.0), 1.0), false).unwrap();
    assert_eq!(index.pair_count(), 0);

    index.move_volume(b, cube(Vec3A::new(1.5, 0.0, 0.0), 1.0)).unwrap();
    assert_eq!(log.borrow().begun, [(a.min(b), a.max(b))]);
    assert_eq!(index.pair_payload(a, b), Some(&1));

    // still overlapping, nothing new
    index.move_volume(b, cube(Vec3A::new(1.4, 0.0, 0.0), 1.0)).unwrap();
    assert_eq!(log.borrow().begun.len(), 1);

    index.move_volume(b, cube(Vec3A::new(10.0, 0.0, 0.0), 1.0)).unwrap();
    assert_eq!(log.borrow().ended, [(a.min(b), a.max(b), 1)]);
    assert_eq!(index.pair_count(), 0);

    index.remove(a).unwrap();
    assert_eq!(log.borrow().begun.len(), 1);
    assert_eq!(log.borrow().ended.len(), 1);
}

#[test]
fn removing_a_volume_ends_its_pairs() {
    let (mut index, log) = logged_index(BroadphaseConfig::DEFAULT);

    let ground = index.create(0, 0, cube(Vec3A::ZERO, 5.0), true).unwrap();
    let a = index.create(1, 0, cube(Vec3A::new(-1.0, 0.0, 0.0), 1.0), false).unwrap();
    let b = index.create(2, 0, cube(Vec3A::new(1.0, 0.0, 0.0), 1.0), false).unwrap();
    assert_eq!(index.pair_count(), 3);

    index.remove(a).unwrap();
    assert_eq!(index.pair_count(), 1);
    assert!(index.pair_payload(ground, b).is_some());

    let ended: BTreeSet<_> = log.borrow().ended.iter().map(|&(x, y, _)| (x, y)).collect();
    assert_eq!(ended, BTreeSet::from([(ground.min(a), ground.max(a)), (a.min(b), a.max(b))]));
    assert!(!index.contains(a));
}

#[test]
fn moving_to_the_same_box_is_a_no_op() {
    let (mut index, log) = logged_index(BroadphaseConfig::DEFAULT);

    let a = index.create(1, 0, cube(Vec3A::ZERO, 1.0), false).unwrap();
    let b = index.create(2, 0, cube(Vec3A::X, 1.0), false).unwrap();
    let box_b = index.aabb(b).unwrap();

    for _ in 0..3 {
        index.move_volume(b, box_b).unwrap();
    }

    assert_eq!(log.borrow().begun.len(), 1);
    assert!(log.borrow().ended.is_empty());
    assert_eq!(index.pair_payload(a, b), Some(&1));
}

#[test]
fn cull_queries_respect_max_results() {
    let mut index: SpatialIndex<u32> = SpatialIndex::default();
    for i in 0..8 {
        index
            .create(i, i as i32, cube(Vec3A::new(i as f32 * 0.1, 0.0, 0.0), 1.0), i % 2 == 0)
            .unwrap();
    }

    let query = cube(Vec3A::ZERO, 2.0);
    assert_eq!(index.cull_aabb(&query, 1).len(), 1);
    assert_eq!(index.cull_aabb(&query, 100).len(), 8);
    assert!(index.cull_aabb(&query, 0).is_empty());

    let hits = index.cull_point(Vec3A::new(1.65, 0.0, 0.0), 100);
    let objects: BTreeSet<u32> = hits.iter().map(|hit| hit.object).collect();
    assert_eq!(objects, BTreeSet::from([7]));
    assert_eq!(hits[0].subindex, 7);

    let hits = index.cull_segment(Vec3A::new(0.0, -5.0, 0.0), Vec3A::new(0.0, 5.0, 0.0), 100);
    assert_eq!(hits.len(), 8);
    assert!(
        index
            .cull_segment(Vec3A::new(5.0, -5.0, 0.0), Vec3A::new(5.0, 5.0, 0.0), 100)
            .is_empty()
    );
}

#[test]
fn set_static_re_evaluates_pairs() {
    let (mut index, log) = logged_index(BroadphaseConfig::DEFAULT);

    let a = index.create(1, 0, cube(Vec3A::ZERO, 1.0), true).unwrap();
    let b = index.create(2, 0, cube(Vec3A::X, 1.0), false).unwrap();
    assert_eq!(index.pair_count(), 1);

    index.set_static(b, true).unwrap();
    assert_eq!(index.pair_count(), 0);
    assert_eq!(log.borrow().ended.len(), 1);

    index.set_static(a, false).unwrap();
    assert_eq!(index.pair_count(), 1);
    assert!(!index.is_static(a).unwrap());
    assert_eq!(index.pair_payload(a, b), Some(&2));
}

#[derive(Clone, Debug)]
enum Op {
    Create { object: u32, center: [f32; 3], half: f32, is_static: bool },
    Move { pick: usize, center: [f32; 3], half: f32 },
    SetStatic { pick: usize, is_static: bool },
    Remove { pick: usize },
    Update,
}

fn center() -> impl Strategy<Value = [f32; 3]> {
    prop::array::uniform3(-8.0f32..8.0)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..6, center(), 0.1f32..3.0, any::<bool>())
            .prop_map(|(object, center, half, is_static)| Op::Create { object, center, half, is_static }),
        4 => (any::<usize>(), center(), 0.1f32..3.0)
            .prop_map(|(pick, center, half)| Op::Move { pick, center, half }),
        1 => (any::<usize>(), any::<bool>()).prop_map(|(pick, is_static)| Op::SetStatic { pick, is_static }),
        2 => any::<usize>().prop_map(|pick| Op::Remove { pick }),
        1 => Just(Op::Update),
    ]
}

struct Model {
    object: u32,
    aabb: Aabb,
    is_static: bool,
}

fn expected_pairs(live: &[(VolumeHandle, Model)]) -> BTreeSet<(VolumeHandle, VolumeHandle)> {
    let mut pairs = BTreeSet::new();
    for (i, (ha, a)) in live.iter().enumerate() {
        for (hb, b) in &live[i + 1..] {
            if a.object != b.object && !(a.is_static && b.is_static) && a.aabb.intersects(&b.aabb) {
                pairs.insert((*ha.min(hb), *ha.max(hb)));
            }
        }
    }

    pairs
}

proptest! {
    #[test]
    fn pairs_match_brute_force(ops in prop::collection::vec(op(), 1..80)) {
        let (mut index, log) = logged_index(BroadphaseConfig {
            rebalance_interval: 4,
            ..BroadphaseConfig::DEFAULT
        });
        let mut live: Vec<(VolumeHandle, Model)> = Vec::new();

        for op in ops {
            match op {
                Op::Create { object, center, half, is_static } => {
                    let aabb = cube(Vec3A::from_array(center), half);
                    let handle = index.create(object, 0, aabb, is_static).unwrap();
                    live.push((handle, Model { object, aabb, is_static }));
                }
                Op::Move { pick, center, half } if !live.is_empty() => {
                    let i = pick % live.len();
                    let (handle, model) = &mut live[i];
                    model.aabb = cube(Vec3A::from_array(center), half);
                    index.move_volume(*handle, model.aabb).unwrap();
                }
                Op::SetStatic { pick, is_static } if !live.is_empty() => {
                    let i = pick % live.len();
                    let (handle, model) = &mut live[i];
                    model.is_static = is_static;
                    index.set_static(*handle, is_static).unwrap();
                }
                Op::Remove { pick } if !live.is_empty() => {
                    let (handle, _) = live.swap_remove(pick % live.len());
                    index.remove(handle).unwrap();
                    prop_assert!(!index.contains(handle));
                }
                Op::Update => index.update(),
                _ => {}
            }

            let actual: BTreeSet<_> = index
                .pairs()
                .map(|(pair, _)| (pair.handle_a, pair.handle_b))
                .collect();
            prop_assert_eq!(&actual, &expected_pairs(&live));
            prop_assert_eq!(index.len(), live.len());

            for (handle, model) in &live {
                prop_assert_eq!(index.aabb(*handle).unwrap(), model.aabb);
                prop_assert_eq!(index.object(*handle).unwrap(), model.object);
            }
        }

        // every begin is matched by at most one end, carrying the begin's payload
        let log = log.borrow();
        let mut ended = BTreeSet::new();
        for &(a, b, payload) in &log.ended {
            prop_assert!(payload as usize <= log.begun.len());
            prop_assert!(ended.insert(payload));
            prop_assert_eq!(log.begun[payload as usize - 1], (a, b));
        }
        prop_assert_eq!(log.begun.len() - log.ended.len(), index.pair_count());
    }

    #[test]
    fn cull_aabb_matches_brute_force(
        boxes in prop::collection::vec((center(), 0.1f32..2.0, any::<bool>()), 0..40),
        query in (center(), 0.1f32..4.0),
    ) {
        let mut index: SpatialIndex<usize> = SpatialIndex::default();
        let mut aabbs = Vec::new();
        for (i, (center, half, is_static)) in boxes.into_iter().enumerate() {
            let aabb = cube(Vec3A::from_array(center), half);
            index.create(i, 0, aabb, is_static).unwrap();
            aabbs.push(aabb);
        }
        index.optimize();

        let query = cube(Vec3A::from_array(query.0), query.1);
        let hits: BTreeSet<usize> = index
            .cull_aabb(&query, usize::MAX)
            .iter()
            .map(|hit| hit.object)
            .collect();
        let expected: BTreeSet<usize> = aabbs
            .iter()
            .enumerate()
            .filter(|(_, aabb)| aabb.intersects(&query))
            .map(|(i, _)| i)
            .collect();

        prop_assert_eq!(hits, expected);
    }
}
