use std::{collections::hash_map::Entry, mem};

use ahash::AHashMap;

use super::broadphase_proxy::VolumeHandle;

/// Live overlapping pairs keyed by the ordered handle pair, each with its user payload.
pub struct HashedOverlappingPairCache<P> {
    hash_table: AHashMap<(VolumeHandle, VolumeHandle), P>,
}

impl<P> Default for HashedOverlappingPairCache<P> {
    fn default() -> Self {
        Self {
            hash_table: AHashMap::with_capacity(2),
        }
    }
}

impl<P> HashedOverlappingPairCache<P> {
    #[inline]
    pub fn key(mut proxy0: VolumeHandle, mut proxy1: VolumeHandle) -> (VolumeHandle, VolumeHandle) {
        if proxy0 > proxy1 {
            mem::swap(&mut proxy0, &mut proxy1);
        }

        (proxy0, proxy1)
    }

    /// Stores `payload` for the pair. Returns `false`, dropping nothing, if the pair was already
    /// live.
    pub fn add_overlapping_pair(
        &mut self,
        proxy0: VolumeHandle,
        proxy1: VolumeHandle,
        payload: P,
    ) -> bool {
        debug_assert_ne!(proxy0, proxy1);

        match self.hash_table.entry(Self::key(proxy0, proxy1)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(payload);
                true
            }
        }
    }

    pub fn remove_overlapping_pair(&mut self, proxy0: VolumeHandle, proxy1: VolumeHandle) -> Option<P> {
        self.hash_table.remove(&Self::key(proxy0, proxy1))
    }

    #[inline]
    pub fn contains_pair(&self, proxy0: VolumeHandle, proxy1: VolumeHandle) -> bool {
        self.hash_table.contains_key(&Self::key(proxy0, proxy1))
    }

    #[inline]
    pub fn get(&self, proxy0: VolumeHandle, proxy1: VolumeHandle) -> Option<&P> {
        self.hash_table.get(&Self::key(proxy0, proxy1))
    }

    #[inline]
    pub fn get_mut(&mut self, proxy0: VolumeHandle, proxy1: VolumeHandle) -> Option<&mut P> {
        self.hash_table.get_mut(&Self::key(proxy0, proxy1))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hash_table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hash_table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VolumeHandle, VolumeHandle, &P)> {
        self.hash_table.iter().map(|(&(a, b), payload)| (a, b, payload))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (VolumeHandle, VolumeHandle, &mut P)> {
        self.hash_table
            .iter_mut()
            .map(|(&(a, b), payload)| (a, b, payload))
    }
}
