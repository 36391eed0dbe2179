pub use ahash;
pub use glam;

pub mod collision;
pub mod config;
pub mod dynamics;
pub mod error;
pub mod linear_math;
pub mod logging;

pub use collision::{
    broadphase::{CullHit, PairInfo, SpatialIndex, TreeKind, VolumeHandle},
    dispatch::{
        simulation_island_manager::{Island, SimulationIslandManager},
        union_find::DisjointSet,
    },
    narrowphase::{
        manifold_point::ManifoldPoint, narrow_phase::NarrowPhase,
        persistent_manifold::PersistentManifold,
    },
};
pub use config::{BroadphaseConfig, SolverConfig};
pub use dynamics::{
    constraint_solver::{
        contact_constraint::ContactConstraint,
        contact_solver_info::ContactSolverInfo,
        point_to_point_constraint::PointToPointConstraint,
        sequential_impulse_constraint_solver::{IslandSolver, StepReport},
        solver_body::{SolverBodies, SolverBody},
        typed_constraint::{ConstraintHeader, TypedConstraint},
    },
    discrete_dynamics_world::{ContactCandidate, DynamicsWorld, JointHandle},
    rigid_body::{BodyState, BodyStore},
};
pub use error::{PhysicsError, SetupError};
pub use linear_math::Aabb;
