use std::hash::Hash;

use arrayvec::ArrayVec;
use glam::Vec3A;

use super::{
    contact_solver_info::ContactSolverInfo,
    solver_body::SolverBodies,
    solver_constraint::SolverConstraint,
    typed_constraint::{ConstraintHeader, TypedConstraint},
};
use crate::error::{PhysicsError, SetupError};

/// Ball-socket joint: keeps a pivot on body A coincident with a pivot on body B.
///
/// Pivots are in body space. With a single body, `pivot_in_b` is a fixed point in world space.
pub struct PointToPointConstraint<B> {
    header: ConstraintHeader<B>,
    pub pivot_in_a: Vec3A,
    pub pivot_in_b: Vec3A,
    rows: ArrayVec<SolverConstraint, 3>,
}

impl<B: Copy> PointToPointConstraint<B> {
    pub fn new(body_a: B, body_b: B, pivot_in_a: Vec3A, pivot_in_b: Vec3A) -> Result<Self, PhysicsError> {
        Ok(Self {
            header: ConstraintHeader::new(&[body_a, body_b])?,
            pivot_in_a,
            pivot_in_b,
            rows: ArrayVec::new(),
        })
    }

    /// Pins `pivot_in_a` to the world point `pivot_world`.
    pub fn new_fixed(body_a: B, pivot_in_a: Vec3A, pivot_world: Vec3A) -> Result<Self, PhysicsError> {
        Ok(Self {
            header: ConstraintHeader::new(&[body_a])?,
            pivot_in_a,
            pivot_in_b: pivot_world,
            rows: ArrayVec::new(),
        })
    }

    /// Impulse applied along each world axis by the last solve.
    pub fn applied_impulse(&self) -> Vec3A {
        let mut impulse = Vec3A::ZERO;
        for (i, row) in self.rows.iter().enumerate() {
            impulse[i] = row.applied_impulse;
        }

        impulse
    }
}

impl<B: Copy + Eq + Hash + Send> TypedConstraint<B> for PointToPointConstraint<B> {
    fn header(&self) -> &ConstraintHeader<B> {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ConstraintHeader<B> {
        &mut self.header
    }

    fn setup(&mut self, bodies: &SolverBodies<B>, info: &ContactSolverInfo) -> Result<(), SetupError> {
        self.rows.clear();

        let (solver_body_id_a, solver_body_id_b) = bodies.pair_indices(&self.header.bodies)?;
        let body_a = bodies
            .get(solver_body_id_a)
            .ok_or(SetupError::MissingBody(0))?;
        let body_b = bodies
            .get(solver_body_id_b)
            .ok_or(SetupError::MissingBody(1))?;

        let pivot_a = body_a.world_transform.transform_point3a(self.pivot_in_a);
        let pivot_b = body_b.world_transform.transform_point3a(self.pivot_in_b);
        let rel_pos1 = pivot_a - body_a.world_transform.translation;
        let rel_pos2 = pivot_b - body_b.world_transform.translation;
        let error = pivot_a - pivot_b;

        for axis in [Vec3A::X, Vec3A::Y, Vec3A::Z] {
            let mut row = SolverConstraint::new_row(
                (solver_body_id_a, solver_body_id_b),
                (body_a, body_b),
                (rel_pos1, rel_pos2),
                axis,
                (f32::MIN, f32::MAX),
                info.sor,
            )?;

            let bias = -error.dot(axis) * info.erp * info.inv_time_step();
            row.set_target_velocity(bias, body_a, body_b);
            self.rows.push(row);
        }

        Ok(())
    }

    fn solve(&mut self, bodies: &mut SolverBodies<B>, _info: &ContactSolverInfo) {
        for row in &mut self.rows {
            if let Some([body_a, body_b]) = bodies.pair_mut(row.solver_body_id_a, row.solver_body_id_b) {
                row.resolve_single_constraint_row_generic(body_a, body_b);
            }
        }
    }
}
