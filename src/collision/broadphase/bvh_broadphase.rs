use std::mem;

use glam::Vec3A;
use log::{debug, trace, warn};

use super::{
    broadphase_proxy::{BroadphaseProxy, CullHit, PairInfo, TreeKind, VolumeHandle},
    dynamic_tree::DynamicTree,
    overlapping_pair_cache::HashedOverlappingPairCache,
};
use crate::{config::BroadphaseConfig, error::PhysicsError, linear_math::Aabb};

pub type PairCallback<T, P> = Box<dyn FnMut(&PairInfo<T>) -> P>;
pub type UnpairCallback<T, P> = Box<dyn FnMut(&PairInfo<T>, P)>;

type Proxies<T> = [Option<BroadphaseProxy<T>>];

/// Broad-phase over two AABB trees, one for static and one for dynamic volumes.
///
/// `T` is the owning object reference and `P` the payload that the pair callback attaches to
/// every live pair. Pairs are re-evaluated synchronously inside `create`, `move_volume`,
/// `set_static` and `remove`, so callbacks fire from within those calls.
///
/// Callbacks are boxed closures that own their state. They cannot reach back into the index,
/// so a callback can never mutate the volume that is being processed.
pub struct SpatialIndex<T, P = ()> {
    config: BroadphaseConfig,
    proxies: Vec<Option<BroadphaseProxy<T>>>,
    free_slots: Vec<usize>,
    num_live: usize,
    /// Indexed by [`TreeKind::index`]
    trees: [DynamicTree; 2],
    pair_cache: HashedOverlappingPairCache<P>,
    pair_callback: Option<PairCallback<T, P>>,
    unpair_callback: Option<UnpairCallback<T, P>>,
    update_count: u32,
    scratch: Vec<VolumeHandle>,
}

impl<T: Copy + PartialEq, P: Default> Default for SpatialIndex<T, P> {
    fn default() -> Self {
        Self::with_valid_config(BroadphaseConfig::DEFAULT)
    }
}

#[inline]
fn fatten(aabb: Aabb, is_static: bool, margin: f32) -> Aabb {
    if is_static { aabb } else { aabb.grown(margin) }
}

fn pair_info<T: Copy>(proxies: &Proxies<T>, a: VolumeHandle, b: VolumeHandle) -> Option<PairInfo<T>> {
    let (a, b) = HashedOverlappingPairCache::<()>::key(a, b);
    let proxy_a = proxies.get(a.slot())?.as_ref()?;
    let proxy_b = proxies.get(b.slot())?.as_ref()?;

    Some(PairInfo {
        handle_a: a,
        subindex_a: proxy_a.subindex,
        object_a: proxy_a.object,
        handle_b: b,
        subindex_b: proxy_b.subindex,
        object_b: proxy_b.object,
    })
}

impl<T: Copy + PartialEq, P: Default> SpatialIndex<T, P> {
    pub fn new(config: BroadphaseConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: BroadphaseConfig) -> Self {
        Self {
            config,
            proxies: Vec::with_capacity(32),
            free_slots: Vec::new(),
            num_live: 0,
            trees: [DynamicTree::new(), DynamicTree::new()],
            pair_cache: HashedOverlappingPairCache::default(),
            pair_callback: None,
            unpair_callback: None,
            update_count: 0,
            scratch: Vec::new(),
        }
    }

    #[inline]
    pub const fn config(&self) -> &BroadphaseConfig {
        &self.config
    }

    /// Registers the pair-begin callback, replacing any previous one.
    ///
    /// Its return value is stored with the pair and handed back to the unpair callback. Without
    /// a pair callback every pair gets `P::default()`.
    pub fn set_pair_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&PairInfo<T>) -> P + 'static,
    {
        self.pair_callback = Some(Box::new(callback));
    }

    /// Registers the pair-end callback, replacing any previous one.
    pub fn set_unpair_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&PairInfo<T>, P) + 'static,
    {
        self.unpair_callback = Some(Box::new(callback));
    }

    fn proxy(&self, handle: VolumeHandle) -> Result<&BroadphaseProxy<T>, PhysicsError> {
        self.proxies
            .get(handle.slot())
            .and_then(Option::as_ref)
            .ok_or(PhysicsError::InvalidHandle(handle))
    }

    fn proxy_mut(&mut self, handle: VolumeHandle) -> Result<&mut BroadphaseProxy<T>, PhysicsError> {
        self.proxies
            .get_mut(handle.slot())
            .and_then(Option::as_mut)
            .ok_or(PhysicsError::InvalidHandle(handle))
    }

    /// Inserts a new volume and fires pair-begin for everything it already overlaps.
    pub fn create(
        &mut self,
        object: T,
        subindex: i32,
        aabb: Aabb,
        is_static: bool,
    ) -> Result<VolumeHandle, PhysicsError> {
        if !aabb.is_valid() {
            return Err(PhysicsError::InvalidAabb);
        }

        let capacity_exceeded = PhysicsError::CapacityExceeded {
            resource: "volume",
            limit: self.config.max_volumes,
        };

        if self.num_live >= self.config.max_volumes {
            warn!("SpatialIndex::create(): {capacity_exceeded}");
            return Err(capacity_exceeded);
        }

        let slot = self.free_slots.last().copied().unwrap_or(self.proxies.len());
        let Some(handle) = VolumeHandle::from_slot(slot) else {
            warn!("SpatialIndex::create(): {capacity_exceeded}");
            return Err(capacity_exceeded);
        };

        if slot == self.proxies.len() {
            self.proxies.push(None);
        } else {
            self.free_slots.pop();
        }

        let fat_aabb = fatten(aabb, is_static, self.config.margin);
        let node = self.trees[TreeKind::of(is_static).index()].insert(fat_aabb, slot as u32);

        self.proxies[slot] = Some(BroadphaseProxy {
            object,
            subindex,
            aabb,
            is_static,
            node,
            partners: Vec::new(),
        });
        self.num_live += 1;

        self.refresh_pairs(handle);
        Ok(handle)
    }

    /// Updates the volume's box. The leaf is only reinserted once `aabb` leaves its fat box.
    ///
    /// Moving to the box the volume already has does nothing and fires no callbacks.
    pub fn move_volume(&mut self, handle: VolumeHandle, aabb: Aabb) -> Result<(), PhysicsError> {
        if !aabb.is_valid() {
            return Err(PhysicsError::InvalidAabb);
        }

        let margin = self.config.margin;
        let proxy = self
            .proxies
            .get_mut(handle.slot())
            .and_then(Option::as_mut)
            .ok_or(PhysicsError::InvalidHandle(handle))?;

        if proxy.aabb == aabb {
            return Ok(());
        }

        proxy.aabb = aabb;

        let tree = &mut self.trees[proxy.tree().index()];
        if !tree.leaf_aabb(proxy.node).contains(&aabb) {
            tree.remove(proxy.node);
            proxy.node = tree.insert(fatten(aabb, proxy.is_static, margin), handle.slot() as u32);
        }

        self.refresh_pairs(handle);
        Ok(())
    }

    /// Moves the volume between the static and dynamic trees, keeping its box.
    pub fn set_static(&mut self, handle: VolumeHandle, is_static: bool) -> Result<(), PhysicsError> {
        let margin = self.config.margin;
        let proxy = self
            .proxies
            .get_mut(handle.slot())
            .and_then(Option::as_mut)
            .ok_or(PhysicsError::InvalidHandle(handle))?;

        if proxy.is_static == is_static {
            return Ok(());
        }

        self.trees[proxy.tree().index()].remove(proxy.node);
        proxy.is_static = is_static;
        proxy.node = self.trees[proxy.tree().index()]
            .insert(fatten(proxy.aabb, is_static, margin), handle.slot() as u32);

        self.refresh_pairs(handle);
        Ok(())
    }

    /// Fires pair-end for every pair of the volume, then frees the handle.
    pub fn remove(&mut self, handle: VolumeHandle) -> Result<(), PhysicsError> {
        self.proxy(handle)?;
        let slot = handle.slot();

        while let Some(&partner) = self.proxies[slot]
            .as_ref()
            .and_then(|proxy| proxy.partners.last())
        {
            self.remove_pair(handle, partner);
        }

        if let Some(proxy) = self.proxies[slot].take() {
            self.trees[proxy.tree().index()].remove(proxy.node);
        }

        self.free_slots.push(slot);
        self.num_live -= 1;
        Ok(())
    }

    pub fn object(&self, handle: VolumeHandle) -> Result<T, PhysicsError> {
        self.proxy(handle).map(|proxy| proxy.object)
    }

    pub fn subindex(&self, handle: VolumeHandle) -> Result<i32, PhysicsError> {
        self.proxy(handle).map(|proxy| proxy.subindex)
    }

    pub fn is_static(&self, handle: VolumeHandle) -> Result<bool, PhysicsError> {
        self.proxy(handle).map(|proxy| proxy.is_static)
    }

    /// The box from the volume's most recent `create` or `move_volume`.
    pub fn aabb(&self, handle: VolumeHandle) -> Result<Aabb, PhysicsError> {
        self.proxy(handle).map(|proxy| proxy.aabb)
    }

    #[inline]
    pub fn contains(&self, handle: VolumeHandle) -> bool {
        self.proxy(handle).is_ok()
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.num_live
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.num_live == 0
    }

    #[inline]
    pub fn pair_count(&self) -> usize {
        self.pair_cache.len()
    }

    pub fn pair_payload(&self, a: VolumeHandle, b: VolumeHandle) -> Option<&P> {
        self.pair_cache.get(a, b)
    }

    /// Iterates live pairs in unspecified order.
    pub fn pairs(&self) -> impl Iterator<Item = (PairInfo<T>, &P)> {
        self.pair_cache
            .iter()
            .filter_map(|(a, b, payload)| Some((pair_info(&self.proxies, a, b)?, payload)))
    }

    pub fn pairs_mut(&mut self) -> impl Iterator<Item = (PairInfo<T>, &mut P)> {
        let proxies = &self.proxies;
        self.pair_cache
            .iter_mut()
            .filter_map(move |(a, b, payload)| Some((pair_info(proxies, a, b)?, payload)))
    }

    /// Volumes whose box contains `point`.
    ///
    /// At most `max_results` hits are returned; further matches are dropped without error.
    /// Hit order follows tree traversal and is unspecified.
    pub fn cull_point(&self, point: Vec3A, max_results: usize) -> Vec<CullHit<T>> {
        self.cull(|aabb| aabb.contains_point(point), max_results)
    }

    /// Volumes whose box is crossed by the segment `from -> to`, truncated like [`Self::cull_point`].
    pub fn cull_segment(&self, from: Vec3A, to: Vec3A, max_results: usize) -> Vec<CullHit<T>> {
        self.cull(|aabb| aabb.intersects_segment(from, to), max_results)
    }

    /// Volumes whose box overlaps `query`, truncated like [`Self::cull_point`].
    pub fn cull_aabb(&self, query: &Aabb, max_results: usize) -> Vec<CullHit<T>> {
        self.cull(|aabb| aabb.intersects(query), max_results)
    }

    fn cull<F: Fn(&Aabb) -> bool>(&self, test: F, max_results: usize) -> Vec<CullHit<T>> {
        let mut hits = Vec::new();
        if max_results == 0 {
            return hits;
        }

        for tree in &self.trees {
            tree.query(&test, |item| {
                if let Some(proxy) = &self.proxies[item as usize]
                    && test(&proxy.aabb)
                {
                    hits.extend(VolumeHandle::from_slot(item as usize).map(|handle| CullHit {
                        handle,
                        object: proxy.object,
                        subindex: proxy.subindex,
                    }));
                }

                hits.len() < max_results
            });

            if hits.len() >= max_results {
                break;
            }
        }

        hits
    }

    /// Deferred tree maintenance, meant to be called once per step.
    ///
    /// Every `rebalance_interval` calls the dynamic tree is rebuilt if it grew too deep, and the
    /// static tree is rebuilt if it changed since its last rebuild.
    pub fn update(&mut self) {
        self.update_count = self.update_count.wrapping_add(1);
        if self.update_count % self.config.rebalance_interval != 0 {
            return;
        }

        let dynamic_tree = &self.trees[TreeKind::Dynamic.index()];
        let height_limit =
            self.config.max_height_factor * (dynamic_tree.len().max(2) as f32).log2();
        if dynamic_tree.height() as f32 > height_limit {
            self.rebuild_tree(TreeKind::Dynamic);
        }

        if self.trees[TreeKind::Static.index()].is_dirty() {
            self.rebuild_tree(TreeKind::Static);
        }
    }

    /// Rebuilds both trees from scratch.
    pub fn optimize(&mut self) {
        self.rebuild_tree(TreeKind::Static);
        self.rebuild_tree(TreeKind::Dynamic);
    }

    fn rebuild_tree(&mut self, kind: TreeKind) {
        let proxies = &mut self.proxies;
        let tree = &mut self.trees[kind.index()];
        tree.rebuild(|item, leaf| {
            if let Some(proxy) = proxies[item as usize].as_mut() {
                proxy.node = leaf;
            }
        });

        debug!(
            "Rebuilt {kind:?} tree ({} leaves, height {})",
            tree.len(),
            tree.height()
        );
    }

    /// Re-evaluates every pair of `handle` against both trees and fires the callbacks for the
    /// difference.
    fn refresh_pairs(&mut self, handle: VolumeHandle) {
        let slot = handle.slot();
        let mut found = mem::take(&mut self.scratch);
        found.clear();

        if let Some(proxy) = &self.proxies[slot] {
            // static volumes only ever pair with dynamic ones
            let kinds: &[TreeKind] = if proxy.is_static {
                &[TreeKind::Dynamic]
            } else {
                &[TreeKind::Static, TreeKind::Dynamic]
            };

            for &kind in kinds {
                self.trees[kind.index()].query(
                    |node| node.intersects(&proxy.aabb),
                    |item| {
                        let other_slot = item as usize;
                        if other_slot != slot
                            && let Some(other) = &self.proxies[other_slot]
                            && proxy.can_pair_with(other)
                            && proxy.aabb.intersects(&other.aabb)
                        {
                            found.extend(VolumeHandle::from_slot(other_slot));
                        }

                        true
                    },
                );
            }
        }

        // pairs that separated
        let mut i = 0;
        while let Some(&partner) = self.proxies[slot]
            .as_ref()
            .and_then(|proxy| proxy.partners.get(i))
        {
            if found.contains(&partner) {
                i += 1;
            } else {
                self.remove_pair(handle, partner);
            }
        }

        // pairs that began
        for &other in &found {
            if !self.pair_cache.contains_pair(handle, other) {
                self.add_pair(handle, other);
            }
        }

        self.scratch = found;
    }

    fn add_pair(&mut self, a: VolumeHandle, b: VolumeHandle) {
        let Some(info) = pair_info(&self.proxies, a, b) else {
            return;
        };

        trace!("Pair begin {:?} <-> {:?}", info.handle_a, info.handle_b);

        let payload = match &mut self.pair_callback {
            Some(callback) => callback(&info),
            None => P::default(),
        };

        if self.pair_cache.add_overlapping_pair(a, b, payload) {
            for (this, other) in [(a, b), (b, a)] {
                if let Some(proxy) = self.proxies[this.slot()].as_mut() {
                    proxy.partners.push(other);
                }
            }
        }
    }

    fn remove_pair(&mut self, a: VolumeHandle, b: VolumeHandle) {
        let info = pair_info(&self.proxies, a, b);

        for (this, other) in [(a, b), (b, a)] {
            if let Some(proxy) = self.proxies[this.slot()].as_mut() {
                proxy.remove_partner(other);
            }
        }

        let Some(payload) = self.pair_cache.remove_overlapping_pair(a, b) else {
            return;
        };

        if let Some(info) = info {
            trace!("Pair end {:?} <-> {:?}", info.handle_a, info.handle_b);

            if let Some(callback) = &mut self.unpair_callback {
                callback(&info, payload);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) {
        for tree in &self.trees {
            tree.validate();
        }

        for (slot, proxy) in self.proxies.iter().enumerate() {
            let Some(proxy) = proxy else {
                continue;
            };

            let tree = &self.trees[proxy.tree().index()];
            assert!(tree.leaf_aabb(proxy.node).contains(&proxy.aabb));

            let handle = VolumeHandle::from_slot(slot).unwrap();
            for &partner in &proxy.partners {
                assert!(self.pair_cache.contains_pair(handle, partner));
            }
        }

        let total_partners: usize = self
            .proxies
            .iter()
            .flatten()
            .map(|proxy| proxy.partners.len())
            .sum();
        assert_eq!(total_partners, self.pair_cache.len() * 2);
    }
}
