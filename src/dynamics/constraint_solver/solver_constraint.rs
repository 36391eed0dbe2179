use glam::Vec3A;

use super::solver_body::SolverBody;
use crate::error::SetupError;

/// One scalar velocity constraint between two solver bodies.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolverConstraint {
    pub rel_pos1_cross_normal: Vec3A,
    pub contact_normal_1: Vec3A,
    pub rel_pos2_cross_normal: Vec3A,
    pub contact_normal_2: Vec3A,
    pub angular_component_a: Vec3A,
    pub angular_component_b: Vec3A,
    pub applied_impulse: f32,
    pub friction: f32,
    pub jac_diag_ab_inv: f32,
    pub rhs: f32,
    pub lower_limit: f32,
    pub upper_limit: f32,
    /// For friction rows, the index of the normal row whose impulse bounds this one
    pub friction_index: usize,
    pub solver_body_id_a: usize,
    pub solver_body_id_b: usize,
}

impl SolverConstraint {
    pub fn restitution_curve(rel_vel: f32, restitution: f32, velocity_threshold: f32) -> f32 {
        if rel_vel.abs() < velocity_threshold {
            0.0
        } else {
            restitution * -rel_vel
        }
    }

    /// A row that pushes body A along `normal` at `rel_pos1` and body B against it at
    /// `rel_pos2`, with the impulse bounded by `lower_limit..=upper_limit`.
    pub fn new_row(
        (solver_body_id_a, solver_body_id_b): (usize, usize),
        (body_a, body_b): (&SolverBody, &SolverBody),
        (rel_pos1, rel_pos2): (Vec3A, Vec3A),
        normal: Vec3A,
        (lower_limit, upper_limit): (f32, f32),
        relaxation: f32,
    ) -> Result<Self, SetupError> {
        let torque_axis_0 = rel_pos1.cross(normal);
        let angular_component_a = body_a.inv_inertia_tensor_world * torque_axis_0;
        let denom0 = body_a.inverse_mass + normal.dot(angular_component_a.cross(rel_pos1));

        let torque_axis_1 = rel_pos2.cross(normal);
        let angular_component_b = body_b.inv_inertia_tensor_world * -torque_axis_1;
        let denom1 = body_b.inverse_mass + normal.dot((-angular_component_b).cross(rel_pos2));

        let denom = denom0 + denom1;
        if !denom.is_finite() || denom <= f32::EPSILON {
            return Err(SetupError::DegenerateJacobian);
        }

        Ok(Self {
            rel_pos1_cross_normal: torque_axis_0,
            contact_normal_1: normal,
            rel_pos2_cross_normal: -torque_axis_1,
            contact_normal_2: -normal,
            angular_component_a,
            angular_component_b,
            jac_diag_ab_inv: relaxation / denom,
            lower_limit,
            upper_limit,
            solver_body_id_a,
            solver_body_id_b,
            ..Default::default()
        })
    }

    /// Velocity of A relative to B along this row, ignoring accumulated deltas.
    pub fn relative_velocity(&self, body_a: &SolverBody, body_b: &SolverBody) -> f32 {
        let vel_1_dot_n = self.contact_normal_1.dot(body_a.linear_velocity)
            + self.rel_pos1_cross_normal.dot(body_a.angular_velocity);
        let vel_2_dot_n = self.contact_normal_2.dot(body_b.linear_velocity)
            + self.rel_pos2_cross_normal.dot(body_b.angular_velocity);

        vel_1_dot_n + vel_2_dot_n
    }

    /// Sets the right-hand side so that solving drives the relative velocity to `target`.
    pub fn set_target_velocity(&mut self, target: f32, body_a: &SolverBody, body_b: &SolverBody) {
        let velocity_error = target - self.relative_velocity(body_a, body_b);
        self.rhs = velocity_error * self.jac_diag_ab_inv;
    }

    /// One Gauss-Seidel update of this row. Returns the residual.
    pub fn resolve_single_constraint_row_generic(
        &mut self,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
    ) -> f32 {
        let mut delta_impulse = self.rhs;

        let delta_vel_1_dot_n = self.contact_normal_1.dot(body_a.delta_linear_velocity)
            + self
                .rel_pos1_cross_normal
                .dot(body_a.delta_angular_velocity);
        let delta_vel_2_dot_n = self.contact_normal_2.dot(body_b.delta_linear_velocity)
            + self
                .rel_pos2_cross_normal
                .dot(body_b.delta_angular_velocity);

        delta_impulse -= delta_vel_1_dot_n * self.jac_diag_ab_inv;
        delta_impulse -= delta_vel_2_dot_n * self.jac_diag_ab_inv;

        let sum = self.applied_impulse + delta_impulse;
        if sum < self.lower_limit {
            delta_impulse = self.lower_limit - self.applied_impulse;
            self.applied_impulse = self.lower_limit;
        } else if sum > self.upper_limit {
            delta_impulse = self.upper_limit - self.applied_impulse;
            self.applied_impulse = self.upper_limit;
        } else {
            self.applied_impulse = sum;
        }

        body_a.internal_apply_impulse(
            self.contact_normal_1 * body_a.inv_mass,
            self.angular_component_a,
            delta_impulse,
        );
        body_b.internal_apply_impulse(
            self.contact_normal_2 * body_b.inv_mass,
            self.angular_component_b,
            delta_impulse,
        );

        delta_impulse / self.jac_diag_ab_inv
    }
}
