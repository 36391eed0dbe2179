pub mod broadphase_proxy;
pub mod bvh_broadphase;
pub(crate) mod dynamic_tree;
pub mod overlapping_pair_cache;

pub use broadphase_proxy::{CullHit, PairInfo, TreeKind, VolumeHandle};
pub use bvh_broadphase::{PairCallback, SpatialIndex, UnpairCallback};
