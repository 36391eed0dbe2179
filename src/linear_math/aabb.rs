use std::ops::{Add, AddAssign};

use glam::Vec3A;

use super::LARGE_FLOAT;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3A,
    pub max: Vec3A,
}

impl Aabb {
    pub const ZERO: Self = Self {
        min: Vec3A::ZERO,
        max: Vec3A::ZERO,
    };

    #[inline]
    pub const fn new(min: Vec3A, max: Vec3A) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_point(point: Vec3A) -> Self {
        Self::new(point, point)
    }

    #[inline]
    pub fn center(&self) -> Vec3A {
        (self.min + self.max) * 0.5
    }

    pub fn area(&self) -> f32 {
        let extents = self.max - self.min;
        2.0 * (extents.x * extents.y + extents.x * extents.z + extents.y * extents.z)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    #[inline]
    pub fn intersects(&self, rhs: &Self) -> bool {
        self.min.cmple(rhs.max).all() && self.max.cmpge(rhs.min).all()
    }

    /// Whether `rhs` lies entirely inside `self`.
    #[inline]
    pub fn contains(&self, rhs: &Self) -> bool {
        self.min.cmple(rhs.min).all() && self.max.cmpge(rhs.max).all()
    }

    #[inline]
    pub fn contains_point(&self, point: Vec3A) -> bool {
        self.min.cmple(point).all() && self.max.cmpge(point).all()
    }

    #[inline]
    #[must_use]
    pub fn grown(&self, margin: f32) -> Self {
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// Slab test of the segment `from -> to` against this box.
    pub fn intersects_segment(&self, from: Vec3A, to: Vec3A) -> bool {
        let dir = to - from;

        // replace -inf and inf with LARGE_FLOAT so axis-parallel segments stay well defined
        let mut dir_inv = dir.recip();
        dir_inv = Vec3A::select(
            dir_inv.is_finite_mask(),
            dir_inv,
            const { Vec3A::splat(LARGE_FLOAT) },
        );

        let t0 = (self.min - from) * dir_inv;
        let t1 = (self.max - from) * dir_inv;

        let t_enter = t0.min(t1).max_element();
        let t_exit = t0.max(t1).min_element();

        t_enter <= t_exit && t_exit >= 0.0 && t_enter <= 1.0
    }
}

impl Add for Aabb {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            min: self.min.min(rhs.min),
            max: self.max.max(rhs.max),
        }
    }
}

impl AddAssign for Aabb {
    fn add_assign(&mut self, rhs: Self) {
        self.min = self.min.min(rhs.min);
        self.max = self.max.max(rhs.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Aabb {
        Aabb::new(Vec3A::ZERO, Vec3A::ONE)
    }

    #[test]
    fn touching_boxes_intersect() {
        let other = Aabb::new(Vec3A::new(1.0, 0.0, 0.0), Vec3A::new(2.0, 1.0, 1.0));
        assert!(unit().intersects(&other));

        let apart = Aabb::new(Vec3A::splat(1.5), Vec3A::splat(2.0));
        assert!(!unit().intersects(&apart));
    }

    #[test]
    fn containment() {
        let outer = unit().grown(0.5);
        assert!(outer.contains(&unit()));
        assert!(!unit().contains(&outer));
        assert!(outer.contains_point(Vec3A::splat(-0.25)));
    }

    #[test]
    fn segment_slab_test() {
        let aabb = unit();
        assert!(aabb.intersects_segment(Vec3A::new(-1.0, 0.5, 0.5), Vec3A::new(2.0, 0.5, 0.5)));
        // stops short of the box
        assert!(!aabb.intersects_segment(Vec3A::new(-2.0, 0.5, 0.5), Vec3A::new(-0.5, 0.5, 0.5)));
        // axis parallel and outside on y
        assert!(!aabb.intersects_segment(Vec3A::new(-1.0, 3.0, 0.5), Vec3A::new(2.0, 3.0, 0.5)));
        // starts inside
        assert!(aabb.intersects_segment(Vec3A::splat(0.5), Vec3A::splat(0.6)));
    }

    #[test]
    fn merge() {
        let merged = unit() + Aabb::new(Vec3A::splat(-1.0), Vec3A::ZERO);
        assert_eq!(merged, Aabb::new(Vec3A::splat(-1.0), Vec3A::ONE));
        assert!((unit().area() - 6.0).abs() < 1e-6);
    }
}
