use std::{fmt, num::NonZeroU32};

use crate::linear_math::Aabb;

/// Opaque id of a volume in a [`SpatialIndex`](super::SpatialIndex).
///
/// Zero is never issued. A handle stays unique for as long as its volume is alive; the slot may
/// be handed out again after `remove`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeHandle(NonZeroU32);

impl VolumeHandle {
    #[inline]
    pub(crate) fn from_slot(slot: usize) -> Option<Self> {
        u32::try_from(slot + 1).ok().and_then(NonZeroU32::new).map(Self)
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0.get() as usize - 1
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VolumeHandle({})", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreeKind {
    Static,
    Dynamic,
}

impl TreeKind {
    #[inline]
    pub const fn of(is_static: bool) -> Self {
        if is_static { Self::Static } else { Self::Dynamic }
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug)]
pub struct BroadphaseProxy<T> {
    pub object: T,
    pub subindex: i32,
    /// Box from the most recent `create`/`move_volume`
    pub aabb: Aabb,
    pub is_static: bool,
    /// Leaf node in the tree selected by `is_static`
    pub(crate) node: u32,
    /// Volumes this one currently has a live pair with
    pub(crate) partners: Vec<VolumeHandle>,
}

impl<T: PartialEq> BroadphaseProxy<T> {
    #[inline]
    pub(crate) const fn tree(&self) -> TreeKind {
        TreeKind::of(self.is_static)
    }

    /// Volumes of the same object never pair, and neither do two static volumes.
    #[inline]
    pub fn can_pair_with(&self, other: &Self) -> bool {
        self.object != other.object && !(self.is_static && other.is_static)
    }

    pub(crate) fn remove_partner(&mut self, partner: VolumeHandle) {
        if let Some(pos) = self.partners.iter().position(|&x| x == partner) {
            self.partners.swap_remove(pos);
        }
    }
}

/// One side-ordered view of a live pair, passed to the pair callbacks.
///
/// `handle_a < handle_b` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairInfo<T> {
    pub handle_a: VolumeHandle,
    pub subindex_a: i32,
    pub object_a: T,
    pub handle_b: VolumeHandle,
    pub subindex_b: i32,
    pub object_b: T,
}

/// A query hit, see [`SpatialIndex::cull_aabb`](super::SpatialIndex::cull_aabb).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CullHit<T> {
    pub handle: VolumeHandle,
    pub object: T,
    pub subindex: i32,
}
