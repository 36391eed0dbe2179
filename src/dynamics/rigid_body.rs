use std::hash::{BuildHasher, Hash};

use ahash::AHashMap;
use glam::{Mat3A, Vec3A};

/// Snapshot of one body as the constraint solver sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    /// Center of mass in world space
    pub position: Vec3A,
    pub basis: Mat3A,
    pub linear_velocity: Vec3A,
    pub angular_velocity: Vec3A,
    /// Zero for static bodies
    pub inverse_mass: f32,
    pub inv_inertia_tensor_world: Mat3A,
}

impl Default for BodyState {
    fn default() -> Self {
        Self::STATIC
    }
}

impl BodyState {
    /// An immovable body at the origin.
    pub const STATIC: Self = Self {
        position: Vec3A::ZERO,
        basis: Mat3A::IDENTITY,
        linear_velocity: Vec3A::ZERO,
        angular_velocity: Vec3A::ZERO,
        inverse_mass: 0.0,
        inv_inertia_tensor_world: Mat3A::ZERO,
    };

    pub fn new_static(position: Vec3A) -> Self {
        Self {
            position,
            ..Self::STATIC
        }
    }

    /// A dynamic body, `inv_inertia_local` being the diagonal of the inverse inertia in body
    /// space.
    pub fn new_dynamic(position: Vec3A, basis: Mat3A, mass: f32, inv_inertia_local: Vec3A) -> Self {
        let inverse_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };

        Self {
            position,
            basis,
            linear_velocity: Vec3A::ZERO,
            angular_velocity: Vec3A::ZERO,
            inverse_mass,
            inv_inertia_tensor_world: Self::get_inertia_tensor(basis, inv_inertia_local),
        }
    }

    /// A solid sphere of `radius` and `mass`.
    pub fn sphere(position: Vec3A, mass: f32, radius: f32) -> Self {
        let inertia = 0.4 * mass * radius * radius;
        let inv_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
        Self::new_dynamic(position, Mat3A::IDENTITY, mass, Vec3A::splat(inv_inertia))
    }

    #[must_use]
    pub const fn with_velocity(mut self, linear: Vec3A, angular: Vec3A) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    fn get_inertia_tensor(world_mat: Mat3A, inv_inertia_local: Vec3A) -> Mat3A {
        let mut scaled_mat = world_mat.transpose();
        scaled_mat.x_axis *= inv_inertia_local;
        scaled_mat.y_axis *= inv_inertia_local;
        scaled_mat.z_axis *= inv_inertia_local;

        world_mat * scaled_mat
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    #[must_use]
    pub fn get_velocity_in_local_point(&self, rel_pos: Vec3A) -> Vec3A {
        self.linear_velocity + self.angular_velocity.cross(rel_pos)
    }
}

/// Where the solver reads body states from and writes solved velocities back to.
///
/// Bodies the store does not know are treated as static.
pub trait BodyStore<B> {
    fn body(&self, id: B) -> Option<BodyState>;
    fn set_velocity(&mut self, id: B, linear_velocity: Vec3A, angular_velocity: Vec3A);
}

impl BodyStore<usize> for Vec<BodyState> {
    fn body(&self, id: usize) -> Option<BodyState> {
        self.get(id).copied()
    }

    fn set_velocity(&mut self, id: usize, linear_velocity: Vec3A, angular_velocity: Vec3A) {
        if let Some(body) = self.get_mut(id) {
            body.linear_velocity = linear_velocity;
            body.angular_velocity = angular_velocity;
        }
    }
}

impl<B: Eq + Hash, S: BuildHasher> BodyStore<B> for std::collections::HashMap<B, BodyState, S> {
    fn body(&self, id: B) -> Option<BodyState> {
        self.get(&id).copied()
    }

    fn set_velocity(&mut self, id: B, linear_velocity: Vec3A, angular_velocity: Vec3A) {
        if let Some(body) = self.get_mut(&id) {
            body.linear_velocity = linear_velocity;
            body.angular_velocity = angular_velocity;
        }
    }
}

impl<B: Eq + Hash> BodyStore<B> for AHashMap<B, BodyState> {
    fn body(&self, id: B) -> Option<BodyState> {
        self.get(&id).copied()
    }

    fn set_velocity(&mut self, id: B, linear_velocity: Vec3A, angular_velocity: Vec3A) {
        if let Some(body) = self.get_mut(&id) {
            body.linear_velocity = linear_velocity;
            body.angular_velocity = angular_velocity;
        }
    }
}
