use glam::Vec3A;

use crate::{dynamics::constraint_solver::solver_body::SolverBody, linear_math::plane_space};

/// One contact between two bodies, in world space.
///
/// `normal_world_on_b` points from B towards A. `distance_1` is negative while the bodies
/// penetrate.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ManifoldPoint {
    pub position_world_on_a: Vec3A,
    pub position_world_on_b: Vec3A,
    pub normal_world_on_b: Vec3A,
    pub distance_1: f32,
    pub combined_friction: f32,
    pub combined_restitution: f32,
    /// Normal impulse applied by the last solve
    pub applied_impulse: f32,
    pub lateral_friction_dir_1: Vec3A,
    pub lateral_friction_dir_2: Vec3A,
}

impl ManifoldPoint {
    pub const fn new(
        position_world_on_a: Vec3A,
        position_world_on_b: Vec3A,
        normal: Vec3A,
        distance: f32,
    ) -> Self {
        Self {
            position_world_on_a,
            position_world_on_b,
            normal_world_on_b: normal,
            distance_1: distance,
            combined_friction: 0.0,
            combined_restitution: 0.0,
            applied_impulse: 0.0,
            lateral_friction_dir_1: Vec3A::ZERO,
            lateral_friction_dir_2: Vec3A::ZERO,
        }
    }

    #[must_use]
    pub const fn with_material(mut self, friction: f32, restitution: f32) -> Self {
        self.combined_friction = friction;
        self.combined_restitution = restitution;
        self
    }

    /// Picks the two friction directions, the first along the tangential relative velocity
    /// when there is one.
    pub fn calc_lat_friction_dir(
        &mut self,
        solver_body_a: &SolverBody,
        solver_body_b: &SolverBody,
        rel_pos1: Vec3A,
        rel_pos2: Vec3A,
    ) {
        let vel1 = solver_body_a.get_velocity_in_local_point_no_delta(rel_pos1);
        let vel2 = solver_body_b.get_velocity_in_local_point_no_delta(rel_pos2);

        let vel = vel1 - vel2;
        let rel_vel = self.normal_world_on_b.dot(vel);

        self.lateral_friction_dir_1 = vel - self.normal_world_on_b * rel_vel;
        let lat_rel_vel = self.lateral_friction_dir_1.length_squared();

        if lat_rel_vel > f32::EPSILON {
            self.lateral_friction_dir_1 *= 1.0 / lat_rel_vel.sqrt();
            self.lateral_friction_dir_2 = self
                .lateral_friction_dir_1
                .cross(self.normal_world_on_b)
                .normalize_or_zero();
        } else {
            (self.lateral_friction_dir_1, self.lateral_friction_dir_2) =
                plane_space(self.normal_world_on_b);
        }
    }
}
