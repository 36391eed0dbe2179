use arrayvec::ArrayVec;

use super::manifold_point::ManifoldPoint;

pub const MANIFOLD_CACHE_SIZE: usize = 4;

/// Up to [`MANIFOLD_CACHE_SIZE`] contact points between `body_a` and `body_b`.
#[derive(Clone, Debug)]
pub struct PersistentManifold<B> {
    pub body_a: B,
    pub body_b: B,
    pub point_cache: ArrayVec<ManifoldPoint, MANIFOLD_CACHE_SIZE>,
}

impl<B> PersistentManifold<B> {
    pub const fn new(body_a: B, body_b: B) -> Self {
        Self {
            body_a,
            body_b,
            point_cache: ArrayVec::new_const(),
        }
    }

    #[inline]
    pub fn num_contacts(&self) -> usize {
        self.point_cache.len()
    }

    /// Adds a point. A full cache keeps its deepest points, so the new point replaces the
    /// shallowest one only if it is deeper.
    pub fn add_contact_point(&mut self, point: ManifoldPoint) {
        if let Err(err) = self.point_cache.try_push(point) {
            let point = err.element();

            let shallowest = self
                .point_cache
                .iter_mut()
                .max_by(|a, b| a.distance_1.total_cmp(&b.distance_1));

            if let Some(shallowest) = shallowest
                && point.distance_1 < shallowest.distance_1
            {
                *shallowest = point;
            }
        }
    }

    pub fn clear_manifold(&mut self) {
        self.point_cache.clear();
    }
}
