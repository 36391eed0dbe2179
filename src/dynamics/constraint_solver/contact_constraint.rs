use std::hash::Hash;

use arrayvec::ArrayVec;

use super::{
    contact_solver_info::ContactSolverInfo,
    solver_body::SolverBodies,
    solver_constraint::SolverConstraint,
    typed_constraint::{ConstraintHeader, TypedConstraint},
};
use crate::{
    collision::narrowphase::persistent_manifold::{MANIFOLD_CACHE_SIZE, PersistentManifold},
    error::SetupError,
};

const NORMAL_UPPER_LIMIT: f32 = 1e10;

/// Non-penetration and friction between the two bodies of a contact manifold.
///
/// Every point gets one normal row and two friction rows. Friction rows are clamped to the
/// friction coefficient times the normal impulse of their point.
pub struct ContactConstraint<B> {
    header: ConstraintHeader<B>,
    manifold: PersistentManifold<B>,
    contact_rows: ArrayVec<SolverConstraint, MANIFOLD_CACHE_SIZE>,
    friction_rows: ArrayVec<SolverConstraint, { MANIFOLD_CACHE_SIZE * 2 }>,
}

impl<B: Copy> ContactConstraint<B> {
    pub fn new(manifold: PersistentManifold<B>) -> Self {
        let mut bodies = ArrayVec::new();
        bodies.push(manifold.body_a);
        bodies.push(manifold.body_b);

        Self {
            header: ConstraintHeader {
                bodies,
                island_step: 0,
                priority: ConstraintHeader::<B>::DEFAULT_PRIORITY,
                disable_collisions_between_bodies: false,
            },
            manifold,
            contact_rows: ArrayVec::new(),
            friction_rows: ArrayVec::new(),
        }
    }

    #[inline]
    pub const fn manifold(&self) -> &PersistentManifold<B> {
        &self.manifold
    }

    pub fn into_manifold(self) -> PersistentManifold<B> {
        self.manifold
    }

    /// Sum of the normal impulses applied by the last solve.
    pub fn total_normal_impulse(&self) -> f32 {
        self.contact_rows.iter().map(|row| row.applied_impulse).sum()
    }
}

impl<B: Copy + Eq + Hash + Send> TypedConstraint<B> for ContactConstraint<B> {
    fn header(&self) -> &ConstraintHeader<B> {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ConstraintHeader<B> {
        &mut self.header
    }

    fn setup(&mut self, bodies: &SolverBodies<B>, info: &ContactSolverInfo) -> Result<(), SetupError> {
        self.contact_rows.clear();
        self.friction_rows.clear();

        if self.manifold.point_cache.is_empty() {
            return Err(SetupError::EmptyManifold);
        }

        let (solver_body_id_a, solver_body_id_b) = bodies.pair_indices(&self.header.bodies)?;
        let body_a = bodies
            .get(solver_body_id_a)
            .ok_or(SetupError::MissingBody(0))?;
        let body_b = bodies
            .get(solver_body_id_b)
            .ok_or(SetupError::MissingBody(1))?;

        for cp in &mut self.manifold.point_cache {
            let rel_pos1 = cp.position_world_on_a - body_a.world_transform.translation;
            let rel_pos2 = cp.position_world_on_b - body_b.world_transform.translation;

            let mut constraint = SolverConstraint::new_row(
                (solver_body_id_a, solver_body_id_b),
                (body_a, body_b),
                (rel_pos1, rel_pos2),
                cp.normal_world_on_b,
                (0.0, NORMAL_UPPER_LIMIT),
                info.sor,
            )?;
            constraint.friction = cp.combined_friction;

            let rel_vel = constraint.relative_velocity(body_a, body_b);
            let restitution = SolverConstraint::restitution_curve(
                rel_vel,
                cp.combined_restitution,
                info.restitution_velocity_threshold,
            )
            .max(0.0);

            let penetration = cp.distance_1 + info.linear_slop;
            let positional_error = if penetration > 0.0 {
                0.0
            } else {
                -penetration * info.erp * info.inv_time_step()
            };

            constraint.set_target_velocity(restitution + positional_error, body_a, body_b);

            let friction_index = self.contact_rows.len();
            self.contact_rows.push(constraint);

            cp.applied_impulse = 0.0;
            cp.calc_lat_friction_dir(body_a, body_b, rel_pos1, rel_pos2);

            for dir in [cp.lateral_friction_dir_1, cp.lateral_friction_dir_2] {
                let mut constraint = SolverConstraint::new_row(
                    (solver_body_id_a, solver_body_id_b),
                    (body_a, body_b),
                    (rel_pos1, rel_pos2),
                    dir,
                    (-cp.combined_friction, cp.combined_friction),
                    info.sor,
                )?;
                constraint.friction = cp.combined_friction;
                constraint.friction_index = friction_index;
                constraint.set_target_velocity(0.0, body_a, body_b);

                self.friction_rows.push(constraint);
            }
        }

        Ok(())
    }

    fn solve(&mut self, bodies: &mut SolverBodies<B>, _info: &ContactSolverInfo) {
        for (contact, cp) in self
            .contact_rows
            .iter_mut()
            .zip(&mut self.manifold.point_cache)
        {
            let Some([body_a, body_b]) =
                bodies.pair_mut(contact.solver_body_id_a, contact.solver_body_id_b)
            else {
                continue;
            };

            contact.resolve_single_constraint_row_generic(body_a, body_b);
            cp.applied_impulse = contact.applied_impulse;
        }

        for contact in &mut self.friction_rows {
            let total_impulse = self.contact_rows[contact.friction_index].applied_impulse;
            if total_impulse <= 0.0 {
                continue;
            }

            let limit = contact.friction * total_impulse;
            contact.lower_limit = -limit;
            contact.upper_limit = limit;

            let Some([body_a, body_b]) =
                bodies.pair_mut(contact.solver_body_id_a, contact.solver_body_id_b)
            else {
                continue;
            };

            contact.resolve_single_constraint_row_generic(body_a, body_b);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::*;
    use crate::{
        collision::narrowphase::manifold_point::ManifoldPoint, dynamics::rigid_body::BodyState,
    };

    fn resting_sphere(velocity: Vec3A) -> (SolverBodies<u32>, ContactConstraint<u32>) {
        let mut bodies = SolverBodies::new();
        bodies.get_or_insert(
            1,
            &BodyState::sphere(Vec3A::new(0.0, 0.5, 0.0), 1.0, 0.5).with_velocity(velocity, Vec3A::ZERO),
        );
        bodies.get_or_insert(2, &BodyState::STATIC);

        let mut manifold = PersistentManifold::new(1, 2);
        manifold.add_contact_point(
            ManifoldPoint::new(Vec3A::ZERO, Vec3A::ZERO, Vec3A::Y, 0.0).with_material(0.5, 0.0),
        );

        (bodies, ContactConstraint::new(manifold))
    }

    #[test]
    fn empty_manifold_fails_setup() {
        let (bodies, _) = resting_sphere(Vec3A::ZERO);
        let mut contact = ContactConstraint::new(PersistentManifold::new(1, 2));
        assert_eq!(
            contact.setup(&bodies, &ContactSolverInfo::default()),
            Err(SetupError::EmptyManifold)
        );
        assert!(!contact.disables_collisions_between_bodies());
    }

    #[test]
    fn contact_stops_falling_sphere() {
        let (mut bodies, mut contact) = resting_sphere(Vec3A::new(0.0, -2.0, 0.0));
        let info = ContactSolverInfo::default();
        contact.setup(&bodies, &info).unwrap();

        for _ in 0..10 {
            contact.solve(&mut bodies, &info);
        }

        let index = bodies.index_of(1).unwrap();
        let body = bodies.get(index).unwrap();
        assert!((body.linear_velocity.y + body.delta_linear_velocity.y).abs() < 1e-3);
        assert!(contact.total_normal_impulse() > 0.0);
        assert!(contact.manifold().point_cache[0].applied_impulse > 0.0);
    }

    #[test]
    fn friction_is_bounded_by_normal_impulse() {
        let (mut bodies, mut contact) = resting_sphere(Vec3A::new(5.0, -1.0, 0.0));
        let info = ContactSolverInfo::default();
        contact.setup(&bodies, &info).unwrap();

        for _ in 0..10 {
            contact.solve(&mut bodies, &info);
        }

        let normal = contact.total_normal_impulse();
        for row in &contact.friction_rows {
            assert!(row.applied_impulse.abs() <= 0.5 * normal + 1e-4);
        }

        let index = bodies.index_of(1).unwrap();
        let body = bodies.get(index).unwrap();
        let sliding = body.linear_velocity.x + body.delta_linear_velocity.x;
        assert!(sliding < 5.0 && sliding > 0.0);
    }
}
