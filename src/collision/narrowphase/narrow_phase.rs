use super::persistent_manifold::PersistentManifold;
use crate::collision::broadphase::PairInfo;

/// Shape-pair contact generation, run by the world for every live broad-phase pair.
///
/// `manifold` arrives empty with `body_a = pair.object_a` and `body_b = pair.object_b`.
/// Leaving it empty means the pair is not touching this step.
pub trait NarrowPhase<B> {
    fn generate_contacts(&mut self, pair: &PairInfo<B>, manifold: &mut PersistentManifold<B>);
}

impl<B, F> NarrowPhase<B> for F
where
    F: FnMut(&PairInfo<B>, &mut PersistentManifold<B>),
{
    fn generate_contacts(&mut self, pair: &PairInfo<B>, manifold: &mut PersistentManifold<B>) {
        self(pair, manifold);
    }
}
