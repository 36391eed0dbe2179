use thiserror::Error;

use crate::collision::broadphase::VolumeHandle;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PhysicsError {
    /// The handle was never issued, or its volume has already been removed.
    #[error("invalid volume handle {0:?}")]
    InvalidHandle(VolumeHandle),
    /// The joint handle was never issued, or the joint has already been removed.
    #[error("invalid joint handle {0}")]
    InvalidJoint(usize),
    /// Boxes must be finite with `min <= max` on every axis.
    #[error("invalid bounding box")]
    InvalidAabb,
    /// `DisjointSet::members` was asked about a key that is not currently a root.
    #[error("key is not the representative of a set")]
    NotARepresentative,
    /// A fixed-size resource ran out (volume slots, constraint body lists).
    #[error("{resource} capacity exceeded (limit = {limit})")]
    CapacityExceeded { resource: &'static str, limit: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("invalid time step {0}")]
    InvalidTimeStep(f32),
}

/// Why a constraint could not be prepared for this step.
///
/// A failed setup only drops the constraint from the current solve pass; it keeps linking its
/// bodies into the same island.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("constraint has no bodies")]
    NoBodies,
    #[error("constraint body {0} is missing from the island")]
    MissingBody(usize),
    #[error("constraint links a body to itself")]
    SelfConstraint,
    #[error("contact constraint has no contact points")]
    EmptyManifold,
    #[error("constraint row has a degenerate jacobian")]
    DegenerateJacobian,
}
