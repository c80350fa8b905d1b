//! Acceleration fields that drive dynamic bodies during a step.
//!
//! [`World::step`][crate::World::step] applies a uniform [`Gravity`] taken from
//! the world settings. [`World::step_in_field`][crate::World::step_in_field]
//! accepts any [`ForceField`], and each body scales the sampled value
//! by its gravity scale.

use crate::math::Vec2;

/// Acceleration sampled at a body's center of mass once per step.
pub trait ForceField {
    fn value_at(&self, position: Vec2) -> Vec2;
}

/// Closures work as fields directly.
impl<F> ForceField for F
where
    F: Fn(Vec2) -> Vec2,
{
    #[inline]
    fn value_at(&self, position: Vec2) -> Vec2 {
        self(position)
    }
}

/// No acceleration anywhere. Bodies keep their velocity apart from
/// applied forces, contacts and damping.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoneField;

impl ForceField for NoneField {
    #[inline]
    fn value_at(&self, _: Vec2) -> Vec2 {
        Vec2::zero()
    }
}

/// Two fields superposed.
#[derive(Clone, Copy, Debug)]
pub struct Sum<A, B>(pub A, pub B);

impl<A: ForceField, B: ForceField> ForceField for Sum<A, B> {
    #[inline]
    fn value_at(&self, position: Vec2) -> Vec2 {
        self.0.value_at(position) + self.1.value_at(position)
    }
}

/// The same acceleration everywhere.
#[derive(Clone, Copy, Debug)]
pub struct Gravity(pub Vec2);

impl ForceField for Gravity {
    #[inline]
    fn value_at(&self, _: Vec2) -> Vec2 {
        self.0
    }
}

/// Attraction towards a point, softened so it stays finite near the source:
/// `strength / (falloff * (r² + 1))` along the direction to `position`.
///
/// A negative `strength` repels.
#[derive(Clone, Copy, Debug)]
pub struct PointGravity {
    pub position: Vec2,
    pub strength: f64,
    pub falloff: f64,
}

impl PointGravity {
    pub fn new(position: Vec2, strength: f64) -> Self {
        Self {
            position,
            strength,
            falloff: 1.0,
        }
    }

    pub fn with_falloff(mut self, falloff: f64) -> Self {
        self.falloff = falloff;
        self
    }
}

impl ForceField for PointGravity {
    fn value_at(&self, position: Vec2) -> Vec2 {
        let to_source = self.position - position;
        let dist_sq = to_source.mag_sq();
        if dist_sq == 0.0 {
            // no direction to pull in
            return Vec2::zero();
        }
        let magnitude = self.strength / (self.falloff * (dist_sq + 1.0));
        magnitude * to_source.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_gravity_softens_and_vanishes_at_source() {
        let source = PointGravity::new(Vec2::new(3.0, 0.0), 10.0);
        assert!((source.value_at(Vec2::zero()) - Vec2::new(1.0, 0.0)).mag() < 1e-12);
        let steep = source.with_falloff(2.0);
        assert!((steep.value_at(Vec2::zero()) - Vec2::new(0.5, 0.0)).mag() < 1e-12);
        let repel = PointGravity::new(Vec2::zero(), -2.0);
        assert!((repel.value_at(Vec2::new(0.0, 1.0)) - Vec2::new(0.0, 1.0)).mag() < 1e-12);
        assert_eq!(source.value_at(source.position), Vec2::zero());
    }

    #[test]
    fn closures_are_fields() {
        let swirl = |p: Vec2| Vec2::new(-p.y, p.x);
        let field = Sum(swirl, Gravity(Vec2::new(0.0, -1.0)));
        assert_eq!(field.value_at(Vec2::new(1.0, 0.0)), Vec2::new(0.0, 0.0));
    }
}
