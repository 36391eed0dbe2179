use std::{fmt, hash::Hash};

use ahash::AHashMap;
use glam::Vec3A;
use log::{debug, trace};

use super::{
    constraint_solver::{
        contact_constraint::ContactConstraint,
        sequential_impulse_constraint_solver::{IslandSolver, StepReport},
        typed_constraint::TypedConstraint,
    },
    rigid_body::BodyStore,
};
use crate::{
    collision::{
        broadphase::{CullHit, SpatialIndex, VolumeHandle},
        narrowphase::{narrow_phase::NarrowPhase, persistent_manifold::PersistentManifold},
    },
    config::{BroadphaseConfig, SolverConfig},
    error::PhysicsError,
    linear_math::Aabb,
};

/// Payload of every broad-phase pair in a [`DynamicsWorld`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContactCandidate {
    /// Steps this pair went through narrow-phase
    pub frames_alive: u32,
    /// Contact points the narrow-phase produced last step
    pub last_contact_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(usize);

impl JointHandle {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

pub type Joint<B> = Box<dyn TypedConstraint<B>>;

/// Broad-phase, joints and the island solver, stepped together.
///
/// Bodies live in a caller-owned [`BodyStore`]. The world only tracks their bounding volumes
/// and the joints between them.
pub struct DynamicsWorld<B> {
    broadphase: SpatialIndex<B, ContactCandidate>,
    joints: Vec<Option<Joint<B>>>,
    free_joints: Vec<usize>,
    /// Joint count disabling collisions per body pair, stored under both orders
    disabled_pairs: AHashMap<(B, B), u32>,
    solver: IslandSolver<B>,
    manifolds: Vec<PersistentManifold<B>>,
}

impl<B> Default for DynamicsWorld<B>
where
    B: Copy + Eq + Hash + Send + Sync + fmt::Debug + 'static,
{
    fn default() -> Self {
        Self {
            broadphase: SpatialIndex::default(),
            joints: Vec::new(),
            free_joints: Vec::new(),
            disabled_pairs: AHashMap::new(),
            solver: IslandSolver::default(),
            manifolds: Vec::new(),
        }
    }
}

impl<B> DynamicsWorld<B>
where
    B: Copy + Eq + Hash + Send + Sync + fmt::Debug + 'static,
{
    pub fn new(
        broadphase_config: BroadphaseConfig,
        solver_config: SolverConfig,
    ) -> Result<Self, PhysicsError> {
        Ok(Self {
            broadphase: SpatialIndex::new(broadphase_config)?,
            solver: IslandSolver::new(solver_config)?,
            ..Default::default()
        })
    }

    #[inline]
    pub const fn broadphase(&self) -> &SpatialIndex<B, ContactCandidate> {
        &self.broadphase
    }

    #[inline]
    pub fn solver(&self) -> &IslandSolver<B> {
        &self.solver
    }

    /// Contact manifolds solved by the last step, with their applied impulses.
    #[inline]
    pub fn manifolds(&self) -> &[PersistentManifold<B>] {
        &self.manifolds
    }

    pub fn add_volume(
        &mut self,
        body: B,
        subindex: i32,
        aabb: Aabb,
        is_static: bool,
    ) -> Result<VolumeHandle, PhysicsError> {
        self.broadphase.create(body, subindex, aabb, is_static)
    }

    pub fn move_volume(&mut self, handle: VolumeHandle, aabb: Aabb) -> Result<(), PhysicsError> {
        self.broadphase.move_volume(handle, aabb)
    }

    pub fn set_static(&mut self, handle: VolumeHandle, is_static: bool) -> Result<(), PhysicsError> {
        self.broadphase.set_static(handle, is_static)
    }

    pub fn remove_volume(&mut self, handle: VolumeHandle) -> Result<(), PhysicsError> {
        self.broadphase.remove(handle)
    }

    pub fn cull_aabb(&self, aabb: &Aabb, max_results: usize) -> Vec<CullHit<B>> {
        self.broadphase.cull_aabb(aabb, max_results)
    }

    pub fn cull_point(&self, point: Vec3A, max_results: usize) -> Vec<CullHit<B>> {
        self.broadphase.cull_point(point, max_results)
    }

    pub fn cull_segment(&self, from: Vec3A, to: Vec3A, max_results: usize) -> Vec<CullHit<B>> {
        self.broadphase.cull_segment(from, to, max_results)
    }

    fn body_pairs(bodies: &[B]) -> impl Iterator<Item = (B, B)> + '_ {
        bodies
            .iter()
            .enumerate()
            .flat_map(move |(i, &a)| bodies[i + 1..].iter().map(move |&b| (a, b)))
            .filter(|(a, b)| a != b)
    }

    /// Adds a persistent joint. While it lives, a joint that disables collisions between its
    /// bodies keeps the narrow-phase from running on any pair of them.
    pub fn add_joint<J>(&mut self, joint: J) -> JointHandle
    where
        J: TypedConstraint<B> + 'static,
    {
        if joint.disables_collisions_between_bodies() {
            for (a, b) in Self::body_pairs(joint.bodies()) {
                *self.disabled_pairs.entry((a, b)).or_default() += 1;
                *self.disabled_pairs.entry((b, a)).or_default() += 1;
            }
        }

        let joint: Joint<B> = Box::new(joint);
        let index = match self.free_joints.pop() {
            Some(index) => {
                self.joints[index] = Some(joint);
                index
            }
            None => {
                self.joints.push(Some(joint));
                self.joints.len() - 1
            }
        };

        JointHandle(index)
    }

    pub fn remove_joint(&mut self, handle: JointHandle) -> Result<Joint<B>, PhysicsError> {
        let joint = self
            .joints
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(PhysicsError::InvalidJoint(handle.0))?;
        self.free_joints.push(handle.0);

        if joint.disables_collisions_between_bodies() {
            for (a, b) in Self::body_pairs(joint.bodies()) {
                for key in [(a, b), (b, a)] {
                    if let Some(count) = self.disabled_pairs.get_mut(&key) {
                        *count -= 1;
                        if *count == 0 {
                            self.disabled_pairs.remove(&key);
                        }
                    }
                }
            }
        }

        Ok(joint)
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&dyn TypedConstraint<B>> {
        self.joints.get(handle.0)?.as_deref()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len() - self.free_joints.len()
    }

    /// Whether some joint disables contacts between `a` and `b`.
    #[inline]
    pub fn collisions_disabled(&self, a: B, b: B) -> bool {
        self.disabled_pairs.contains_key(&(a, b))
    }

    /// Runs narrow-phase over every live pair, then solves contacts and joints together.
    ///
    /// Only velocities in `store` change; integrating positions is up to the caller.
    pub fn step<S, N>(
        &mut self,
        store: &mut S,
        narrow_phase: &mut N,
        time_step: f32,
    ) -> Result<StepReport, PhysicsError>
    where
        S: BodyStore<B>,
        N: NarrowPhase<B>,
    {
        if !time_step.is_finite() || time_step <= 0.0 {
            return Err(PhysicsError::InvalidTimeStep(time_step));
        }

        self.broadphase.update();

        let mut found = Vec::new();
        for (pair, candidate) in self.broadphase.pairs_mut() {
            if self.disabled_pairs.contains_key(&(pair.object_a, pair.object_b)) {
                continue;
            }

            let mut manifold = PersistentManifold::new(pair.object_a, pair.object_b);
            narrow_phase.generate_contacts(&pair, &mut manifold);

            candidate.frames_alive = candidate.frames_alive.saturating_add(1);
            candidate.last_contact_count = manifold.num_contacts();

            if manifold.num_contacts() != 0 {
                found.push(((pair.handle_a, pair.handle_b), manifold));
            }
        }

        // pair map order is arbitrary, the solve order should not be
        found.sort_unstable_by_key(|&(handles, _)| handles);
        let mut contacts: Vec<ContactConstraint<B>> = found
            .into_iter()
            .map(|(_, manifold)| ContactConstraint::new(manifold))
            .collect();

        let num_contacts = contacts.len();
        let mut constraints: Vec<&mut dyn TypedConstraint<B>> = contacts
            .iter_mut()
            .map(|contact| contact as &mut dyn TypedConstraint<B>)
            .chain(
                self.joints
                    .iter_mut()
                    .flatten()
                    .map(|joint| &mut **joint as &mut dyn TypedConstraint<B>),
            )
            .collect();

        let report = self.solver.solve(&mut constraints, &[], store, time_step)?;

        self.manifolds = contacts
            .into_iter()
            .map(ContactConstraint::into_manifold)
            .collect();

        if report.skipped_constraints != 0 {
            debug!(
                "{} of {} constraints skipped this step",
                report.skipped_constraints,
                num_contacts + self.joint_count()
            );
        }
        trace!(
            "World step: {} pairs, {} contact manifolds, {} joints",
            self.broadphase.pair_count(),
            num_contacts,
            self.joint_count()
        );

        Ok(report)
    }
}
