use arrayvec::ArrayVec;

use super::{contact_solver_info::ContactSolverInfo, solver_body::SolverBodies};
use crate::error::{PhysicsError, SetupError};

pub const MAX_CONSTRAINT_BODIES: usize = 4;

/// State every constraint kind carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintHeader<B> {
    /// Participating bodies, in the order the constraint's rows expect them
    pub bodies: ArrayVec<B, MAX_CONSTRAINT_BODIES>,
    /// Last island build that visited this constraint
    pub island_step: u64,
    /// Higher priorities are solved first, and keep being solved for longer.
    pub priority: i32,
    /// Suppresses contact generation between this constraint's bodies
    pub disable_collisions_between_bodies: bool,
}

impl<B: Clone> ConstraintHeader<B> {
    pub const DEFAULT_PRIORITY: i32 = 1;

    pub fn new(bodies: &[B]) -> Result<Self, PhysicsError> {
        let bodies = ArrayVec::try_from(bodies).map_err(|_| PhysicsError::CapacityExceeded {
            resource: "constraint body",
            limit: MAX_CONSTRAINT_BODIES,
        })?;

        Ok(Self {
            bodies,
            island_step: 0,
            priority: Self::DEFAULT_PRIORITY,
            disable_collisions_between_bodies: true,
        })
    }
}

/// A constraint the island solver can prepare and iterate.
///
/// `setup` runs once per step after the island's bodies are gathered. If it fails the
/// constraint sits out that step's iterations. `solve` then runs once per iteration and applies
/// impulses to the island's solver bodies.
pub trait TypedConstraint<B>: Send {
    fn header(&self) -> &ConstraintHeader<B>;
    fn header_mut(&mut self) -> &mut ConstraintHeader<B>;

    fn setup(&mut self, bodies: &SolverBodies<B>, info: &ContactSolverInfo)
    -> Result<(), SetupError>;

    fn solve(&mut self, bodies: &mut SolverBodies<B>, info: &ContactSolverInfo);

    #[inline]
    fn bodies(&self) -> &[B] {
        &self.header().bodies
    }

    #[inline]
    fn priority(&self) -> i32 {
        self.header().priority
    }

    fn set_priority(&mut self, priority: i32) {
        self.header_mut().priority = priority;
    }

    #[inline]
    fn disables_collisions_between_bodies(&self) -> bool {
        self.header().disable_collisions_between_bodies
    }

    fn set_disable_collisions_between_bodies(&mut self, disabled: bool) {
        self.header_mut().disable_collisions_between_bodies = disabled;
    }
}
