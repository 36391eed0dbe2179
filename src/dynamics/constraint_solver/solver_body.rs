use std::hash::Hash;

use ahash::AHashMap;
use glam::{Affine3A, Mat3A, Vec3A};

use crate::{dynamics::rigid_body::BodyState, error::SetupError};

/// Island-local copy of a body. Impulses accumulate in the delta velocities.
#[derive(Clone, Copy, Debug)]
pub struct SolverBody {
    pub world_transform: Affine3A,
    pub delta_linear_velocity: Vec3A,
    pub delta_angular_velocity: Vec3A,
    pub inverse_mass: f32,
    pub inv_mass: Vec3A,
    pub inv_inertia_tensor_world: Mat3A,
    pub linear_velocity: Vec3A,
    pub angular_velocity: Vec3A,
}

impl SolverBody {
    /// The immovable world body that single-body constraints attach to.
    pub const DEFAULT: Self = Self {
        world_transform: Affine3A::IDENTITY,
        delta_linear_velocity: Vec3A::ZERO,
        delta_angular_velocity: Vec3A::ZERO,
        inverse_mass: 0.0,
        inv_mass: Vec3A::ZERO,
        inv_inertia_tensor_world: Mat3A::ZERO,
        linear_velocity: Vec3A::ZERO,
        angular_velocity: Vec3A::ZERO,
    };

    pub fn new(body: &BodyState) -> Self {
        let world_transform = Affine3A {
            matrix3: body.basis,
            translation: body.position,
        };

        if body.is_static() {
            return Self {
                world_transform,
                ..Self::DEFAULT
            };
        }

        Self {
            world_transform,
            delta_linear_velocity: Vec3A::ZERO,
            delta_angular_velocity: Vec3A::ZERO,
            inverse_mass: body.inverse_mass,
            inv_mass: Vec3A::splat(body.inverse_mass),
            inv_inertia_tensor_world: body.inv_inertia_tensor_world,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
        }
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    pub fn internal_apply_impulse(
        &mut self,
        linear_component: Vec3A,
        angular_component: Vec3A,
        impulse_magnitude: f32,
    ) {
        self.delta_linear_velocity += linear_component * impulse_magnitude;
        self.delta_angular_velocity += angular_component * impulse_magnitude;
    }

    #[must_use]
    pub fn get_velocity_in_local_point_no_delta(&self, rel_pos: Vec3A) -> Vec3A {
        self.linear_velocity + self.angular_velocity.cross(rel_pos)
    }

    #[must_use]
    pub fn get_velocity_in_local_point(&self, rel_pos: Vec3A) -> Vec3A {
        (self.linear_velocity + self.delta_linear_velocity)
            + (self.angular_velocity + self.delta_angular_velocity).cross(rel_pos)
    }
}

/// Solver bodies of one island, addressed by dense index.
///
/// Index [`SolverBodies::FIXED_BODY`] is always the world body, which has no id.
pub struct SolverBodies<B> {
    bodies: Vec<SolverBody>,
    ids: Vec<Option<B>>,
    lookup: AHashMap<B, usize>,
}

impl<B: Copy + Eq + Hash> Default for SolverBodies<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Copy + Eq + Hash> SolverBodies<B> {
    pub const FIXED_BODY: usize = 0;

    pub fn new() -> Self {
        Self {
            bodies: vec![SolverBody::DEFAULT],
            ids: vec![None],
            lookup: AHashMap::new(),
        }
    }

    /// Adds `id` unless it is already present, returning its index.
    pub fn get_or_insert(&mut self, id: B, state: &BodyState) -> usize {
        if let Some(&index) = self.lookup.get(&id) {
            return index;
        }

        let index = self.bodies.len();
        self.bodies.push(SolverBody::new(state));
        self.ids.push(Some(id));
        self.lookup.insert(id, index);
        index
    }

    #[inline]
    pub fn index_of(&self, id: B) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    /// Indices of the constraint's bodies, with a lone body paired against the world body.
    pub fn pair_indices(&self, bodies: &[B]) -> Result<(usize, usize), SetupError> {
        let index = |slot: usize| {
            self.index_of(bodies[slot])
                .ok_or(SetupError::MissingBody(slot))
        };

        match bodies.len() {
            0 => Err(SetupError::NoBodies),
            1 => Ok((index(0)?, Self::FIXED_BODY)),
            _ => {
                let (a, b) = (index(0)?, index(1)?);
                if a == b {
                    Err(SetupError::SelfConstraint)
                } else {
                    Ok((a, b))
                }
            }
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&SolverBody> {
        self.bodies.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut SolverBody> {
        self.bodies.get_mut(index)
    }

    /// Two distinct bodies at once. `None` if the indices are equal or out of range.
    #[inline]
    pub fn pair_mut(&mut self, a: usize, b: usize) -> Option<[&mut SolverBody; 2]> {
        self.bodies.get_disjoint_mut([a, b]).ok()
    }

    /// Number of bodies, not counting the world body.
    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every body with an id, alongside that id.
    pub fn iter(&self) -> impl Iterator<Item = (B, &SolverBody)> {
        self.ids
            .iter()
            .zip(&self.bodies)
            .filter_map(|(id, body)| id.map(|id| (id, body)))
    }
}
