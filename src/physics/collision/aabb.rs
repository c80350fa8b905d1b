use crate::math::{self as m, Vec2};

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AABB {
    pub lower: Vec2,
    pub upper: Vec2,
}

/// A ray segment from `p1` to `p1 + max_fraction * (p2 - p1)`.
#[derive(Clone, Copy, Debug)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f64,
}

/// A ray hit. The hit point is `p1 + fraction * (p2 - p1)`.
#[derive(Clone, Copy, Debug)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f64,
}

impl AABB {
    #[inline]
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    /// The AABB containing both points, in any order.
    #[inline]
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            lower: m::vec_min(a, b),
            upper: m::vec_max(a, b),
        }
    }

    /// Check that the bounds are sorted and finite.
    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= 0.0 && d.y >= 0.0 && m::is_finite(self.lower) && m::is_finite(self.upper)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.lower + self.upper)
    }

    /// Half-widths of the box.
    #[inline]
    pub fn extents(&self) -> Vec2 {
        0.5 * (self.upper - self.lower)
    }

    /// Perimeter of the box, the cost metric used to build the broad phase tree.
    #[inline]
    pub fn perimeter(&self) -> f64 {
        2.0 * ((self.upper.x - self.lower.x) + (self.upper.y - self.lower.y))
    }

    #[inline]
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            lower: m::vec_min(self.lower, other.lower),
            upper: m::vec_max(self.upper, other.upper),
        }
    }

    /// Grow the box by `amount` in every direction.
    #[inline]
    pub fn padded(&self, amount: f64) -> AABB {
        let r = Vec2::new(amount, amount);
        AABB {
            lower: self.lower - r,
            upper: self.upper + r,
        }
    }

    /// Check whether `other` is completely inside this box.
    #[inline]
    pub fn contains(&self, other: &AABB) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        self.lower.x <= p.x && p.x <= self.upper.x && self.lower.y <= p.y && p.y <= self.upper.y
    }

    /// Check whether two boxes overlap. Touching boxes count as overlapping.
    #[inline]
    pub fn overlaps(&self, other: &AABB) -> bool {
        !(other.lower.x > self.upper.x
            || other.lower.y > self.upper.y
            || self.lower.x > other.upper.x
            || self.lower.y > other.upper.y)
    }

    /// Slab test of a ray segment against the box.
    /// Rays starting inside the box don't hit it.
    pub fn raycast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = f64::MIN;
        let mut tmax = f64::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = m::vec_abs(d);
        let mut normal = Vec2::zero();

        for (p_i, d_i, abs_d_i, lower, upper, axis) in [
            (p.x, d.x, abs_d.x, self.lower.x, self.upper.x, Vec2::unit_x()),
            (p.y, d.y, abs_d.y, self.lower.y, self.upper.y, Vec2::unit_y()),
        ] {
            if abs_d_i < f64::EPSILON {
                // parallel to this slab
                if p_i < lower || upper < p_i {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d_i;
                let mut t1 = (lower - p_i) * inv_d;
                let mut t2 = (upper - p_i) * inv_d;
                // sign of the normal
                let mut s = -1.0;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }
                if t1 > tmin {
                    normal = s * axis;
                    tmin = t1;
                }
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }
        Some(RayCastOutput {
            normal,
            fraction: tmin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_and_containment() {
        let a = AABB::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
        let b = AABB::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        let c = AABB::new(Vec2::new(2.5, 0.0), Vec2::new(3.0, 0.5));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.union(&b).contains(&a) && a.union(&b).contains(&b));
        assert!(a.padded(0.1).contains(&a));
        assert!(!a.contains(&a.padded(0.1)));
        assert_eq!(a.perimeter(), 8.0);
    }

    #[test]
    fn raycast_hits_near_face() {
        let b = AABB::new(Vec2::new(1.0, -1.0), Vec2::new(3.0, 1.0));
        let hit = b
            .raycast(&RayCastInput {
                p1: Vec2::new(0.0, 0.0),
                p2: Vec2::new(4.0, 0.0),
                max_fraction: 1.0,
            })
            .expect("Ray should have hit");
        assert!((hit.fraction - 0.25).abs() < 1e-12);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));

        let miss = b.raycast(&RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(4.0, 2.0),
            max_fraction: 1.0,
        });
        assert!(miss.is_none());
    }
}
