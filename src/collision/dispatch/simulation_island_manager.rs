use std::{cmp::Reverse, hash::Hash, ops::DerefMut};

use ahash::AHashMap;
use arrayvec::ArrayVec;

use super::union_find::DisjointSet;
use crate::dynamics::{
    constraint_solver::typed_constraint::{MAX_CONSTRAINT_BODIES, TypedConstraint},
    rigid_body::BodyStore,
};

/// Bodies that interact through constraints, and the constraints that link them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Island<B> {
    /// Dynamic bodies only
    pub bodies: Vec<B>,
    /// Indices into the constraint slice given to `build_islands`, by descending priority
    pub constraints: Vec<usize>,
}

impl<B> Island<B> {
    /// Islands without constraints have nothing to solve.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.constraints.is_empty()
    }
}

/// Splits bodies into islands each step, using a disjoint-set over constraint adjacency.
///
/// Static bodies (zero inverse mass, or unknown to the store) never link islands.
pub struct SimulationIslandManager<B> {
    union_find: DisjointSet<B>,
    island_step: u64,
    body_stamps: AHashMap<B, u64>,
}

impl<B: Copy + Eq + Hash> Default for SimulationIslandManager<B> {
    fn default() -> Self {
        Self {
            union_find: DisjointSet::new(),
            island_step: 0,
            body_stamps: AHashMap::new(),
        }
    }
}

impl<B: Copy + Eq + Hash> SimulationIslandManager<B> {
    /// Number of the most recent build, starting at 1.
    #[inline]
    pub const fn island_step(&self) -> u64 {
        self.island_step
    }

    /// The current build's stamp if `body` was a dynamic island member in it.
    pub fn body_island_step(&self, body: B) -> Option<u64> {
        self.body_stamps.get(&body).copied()
    }

    fn dynamic_bodies<S: BodyStore<B>>(
        bodies: &[B],
        store: &S,
    ) -> ArrayVec<B, MAX_CONSTRAINT_BODIES> {
        bodies
            .iter()
            .copied()
            .filter(|&body| store.body(body).is_some_and(|state| !state.is_static()))
            .collect()
    }

    /// Partitions `constraints` and `extra_bodies` into islands.
    ///
    /// Every dynamic body touched by a constraint, and every dynamic body in `extra_bodies`,
    /// lands in exactly one island. Constraints with only static bodies land in none.
    /// Islands are ordered by the first appearance of one of their bodies.
    pub fn build_islands<C, S>(
        &mut self,
        constraints: &mut [C],
        extra_bodies: &[B],
        store: &S,
    ) -> Vec<Island<B>>
    where
        C: DerefMut,
        C::Target: TypedConstraint<B>,
        S: BodyStore<B>,
    {
        self.island_step += 1;
        let step = self.island_step;
        self.union_find.clear();
        self.body_stamps.clear();

        let mut linked: Vec<Option<B>> = Vec::with_capacity(constraints.len());
        for constraint in constraints.iter_mut() {
            let header = constraint.header_mut();
            header.island_step = step;

            let dynamic = Self::dynamic_bodies(&header.bodies, store);
            let Some(&first) = dynamic.first() else {
                linked.push(None);
                continue;
            };

            self.union_find.insert(first);
            for &body in &dynamic[1..] {
                self.union_find.create_union(first, body);
            }
            linked.push(Some(first));
        }

        for &body in extra_bodies {
            if store.body(body).is_some_and(|state| !state.is_static()) {
                self.union_find.insert(body);
            }
        }

        let sets = self.union_find.sets();
        let mut island_of: AHashMap<B, usize> = AHashMap::with_capacity(sets.len());
        let mut islands: Vec<Island<B>> = Vec::with_capacity(sets.len());

        for set in sets {
            for &body in &set {
                self.body_stamps.insert(body, step);
            }

            if let Some(&representative) = set.first() {
                island_of.insert(representative, islands.len());
            }

            islands.push(Island {
                bodies: set,
                constraints: Vec::new(),
            });
        }

        for (i, first) in linked.into_iter().enumerate() {
            let Some(first) = first else {
                continue;
            };

            let island = self
                .union_find
                .find(&first)
                .and_then(|representative| island_of.get(&representative));

            if let Some(&island) = island {
                islands[island].constraints.push(i);
            }
        }

        for island in &mut islands {
            island
                .constraints
                .sort_by_key(|&i| Reverse(constraints[i].priority()));
        }

        islands
    }
}
