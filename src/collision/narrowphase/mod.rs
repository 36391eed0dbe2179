pub mod manifold_point;
pub mod narrow_phase;
pub mod persistent_manifold;
