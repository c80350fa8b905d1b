//! Types, aliases and helper operations for doing math with `ultraviolet`.
//!
//! Vectors come straight from `ultraviolet`. Rotations and poses are stored as
//! sine/cosine pairs instead of rotors because the physics code needs both
//! values constantly and never composes more than two rotations in a row.
use std::f64::consts::PI;
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;

/// An angle in either degrees or radians.
/// Default conversion from f64 is in degrees.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}
impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f64 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f64 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }
}
impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}
impl From<Angle> for Rot {
    #[inline]
    fn from(ang: Angle) -> Rot {
        Rot::from_angle(ang.rad())
    }
}
impl From<Rot> for Angle {
    #[inline]
    fn from(rot: Rot) -> Self {
        Angle::Rad(rot.angle())
    }
}

//
// Rotation
//

/// A rotation stored as the sine and cosine of its angle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct Rot {
    pub sin: f64,
    pub cos: f64,
}

impl Rot {
    #[inline]
    pub fn identity() -> Self {
        Self { sin: 0.0, cos: 1.0 }
    }

    /// Counterclockwise rotation by the given angle in radians.
    #[inline]
    pub fn from_angle(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { sin, cos }
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    /// Rotate a vector by the inverse of this rotation.
    #[inline]
    pub fn inv_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x + self.sin * v.y, -self.sin * v.x + self.cos * v.y)
    }

    /// The inverse of this rotation applied after `other`, i.e. `self^-1 * other`.
    #[inline]
    pub fn inv_mul(&self, other: Rot) -> Rot {
        Rot {
            sin: self.cos * other.sin - self.sin * other.cos,
            cos: self.cos * other.cos + self.sin * other.sin,
        }
    }
}

impl Default for Rot {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul<Vec2> for Rot {
    type Output = Vec2;

    #[inline]
    fn mul(self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x - self.sin * v.y, self.sin * v.x + self.cos * v.y)
    }
}

impl std::ops::Mul<Rot> for Rot {
    type Output = Rot;

    #[inline]
    fn mul(self, other: Rot) -> Rot {
        Rot {
            sin: self.sin * other.cos + self.cos * other.sin,
            cos: self.cos * other.cos - self.sin * other.sin,
        }
    }
}

//
// Pose
//

/// A Pose has a rotation and a translation, no scaling.
///
/// The physics engine does not support scaling transforms,
/// so this is the only transformation type used.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct Pose {
    pub translation: Vec2,
    pub rotation: Rot,
}

impl Pose {
    #[inline]
    pub fn new(translation: Vec2, rotation: Rot) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Transform a point from world space into the local space of this pose.
    #[inline]
    pub fn inv_transform(&self, p: Vec2) -> Vec2 {
        self.rotation.inv_rotate(p - self.translation)
    }

    /// `self^-1 * other`: express `other` in the local space of `self`.
    #[inline]
    pub fn inv_mul(&self, other: &Pose) -> Pose {
        Pose {
            translation: self
                .rotation
                .inv_rotate(other.translation - self.translation),
            rotation: self.rotation.inv_mul(other.rotation),
        }
    }
}

impl std::ops::Mul<Vec2> for Pose {
    type Output = Vec2;

    #[inline]
    fn mul(self, p: Vec2) -> Vec2 {
        self.rotation * p + self.translation
    }
}

impl std::ops::Mul<Pose> for Pose {
    type Output = Pose;

    #[inline]
    fn mul(self, other: Pose) -> Pose {
        Pose {
            translation: self.rotation * other.translation + self.translation,
            rotation: self.rotation * other.rotation,
        }
    }
}

/// A builder to create [`Pose`][self::Pose]s.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PoseBuilder {
    position: [f64; 2],
    rotation: Angle,
}
impl PoseBuilder {
    pub fn new() -> Self {
        PoseBuilder {
            position: [0.0, 0.0],
            rotation: Angle::default(),
        }
    }
    #[inline]
    pub fn with_position(mut self, pos: impl Into<[f64; 2]>) -> Self {
        self.position = pos.into();
        self
    }
    #[inline]
    pub fn with_rotation(mut self, angle: Angle) -> Self {
        self.rotation = angle;
        self
    }
    #[inline]
    pub fn build(self) -> Pose {
        Pose::new(
            Vec2::new(self.position[0], self.position[1]),
            self.rotation.into(),
        )
    }
}
impl Default for PoseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
impl From<PoseBuilder> for Pose {
    fn from(pb: PoseBuilder) -> Pose {
        pb.build()
    }
}
impl From<[f64; 2]> for PoseBuilder {
    fn from(vec: [f64; 2]) -> Self {
        PoseBuilder::new().with_position(vec)
    }
}
impl From<Vec2> for PoseBuilder {
    fn from(vec: Vec2) -> Self {
        PoseBuilder::new().with_position(vec)
    }
}
impl From<Pose> for PoseBuilder {
    fn from(pose: Pose) -> Self {
        PoseBuilder::new()
            .with_position(pose.translation)
            .with_rotation(Angle::from(pose.rotation))
    }
}

//
// Sweep
//

/// The motion of a body's centre of mass over a time step,
/// used for continuous collision detection.
///
/// `c0`/`a0` are the centre and angle at time `alpha0`, `c`/`a` at the end of the step.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sweep {
    /// Centre of mass in body-local coordinates.
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f64,
    pub a: f64,
    /// Fraction of the current time step in the range [0,1].
    pub alpha0: f64,
}

impl Sweep {
    /// Get the interpolated body pose at `beta` in [0,1] of the sweep.
    pub fn pose_at(&self, beta: f64) -> Pose {
        let center = (1.0 - beta) * self.c0 + beta * self.c;
        let rotation = Rot::from_angle((1.0 - beta) * self.a0 + beta * self.a);
        Pose::new(center - rotation * self.local_center, rotation)
    }

    /// Advance the sweep start forward to `alpha`, yielding a new initial state.
    pub fn advance(&mut self, alpha: f64) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wrap the angles into [-pi, pi] to keep them from growing without bound.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

//
// 2x2 matrix
//

/// A 2x2 matrix stored as columns, used for block solving contact pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    #[inline]
    pub fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.ex.x * self.ey.y - self.ey.x * self.ex.y
    }

    /// The inverse of the matrix, or a zero matrix if it's singular.
    pub fn inverse(&self) -> Mat22 {
        let det = self.determinant();
        let det = if det != 0.0 { 1.0 / det } else { 0.0 };
        Mat22 {
            ex: Vec2::new(det * self.ey.y, -det * self.ex.y),
            ey: Vec2::new(-det * self.ey.x, det * self.ex.x),
        }
    }

}

impl std::ops::Mul<Vec2> for Mat22 {
    type Output = Vec2;

    #[inline]
    fn mul(self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

// Vec2 utils

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// The z component of the 3D cross product of two vectors lying on the xy plane.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a vector and a scalar (the scalar interpreted as a z-axis vector).
#[inline]
pub fn cross_vs(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar (interpreted as a z-axis vector) and a vector.
#[inline]
pub fn cross_sv(s: f64, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

#[inline]
pub fn vec_min(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x.min(b.x), a.y.min(b.y))
}

#[inline]
pub fn vec_max(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x.max(b.x), a.y.max(b.y))
}

#[inline]
pub fn vec_abs(v: Vec2) -> Vec2 {
    Vec2::new(v.x.abs(), v.y.abs())
}

#[inline]
pub fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Vec2, b: Vec2) -> bool {
        (a - b).mag() < 1e-9
    }

    #[test]
    fn rotation_is_counterclockwise() {
        let r = Rot::from(Angle::Deg(90.0));
        assert!(approx_eq(r * Vec2::unit_x(), Vec2::unit_y()));
        assert!(approx_eq(r.inv_rotate(Vec2::unit_y()), Vec2::unit_x()));
        assert!((Angle::from(r).deg() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn pose_inverse_roundtrip() {
        let pose = PoseBuilder::new()
            .with_position([3.0, -2.0])
            .with_rotation(Angle::Deg(30.0))
            .build();
        let p = Vec2::new(0.5, 1.5);
        assert!(approx_eq(pose.inv_transform(pose * p), p));

        let other = Pose::new(Vec2::new(1.0, 1.0), Rot::from_angle(0.3));
        let rel = pose.inv_mul(&other);
        assert!(approx_eq(pose * (rel * p), other * p));
    }

    #[test]
    fn sweep_interpolation() {
        let mut sweep = Sweep {
            local_center: Vec2::zero(),
            c0: Vec2::zero(),
            c: Vec2::new(2.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };
        let mid = sweep.pose_at(0.5);
        assert!(approx_eq(mid.translation, Vec2::new(1.0, 0.0)));
        assert!((mid.rotation.angle() - 0.5).abs() < 1e-9);

        sweep.advance(0.5);
        assert!(approx_eq(sweep.c0, Vec2::new(1.0, 0.0)));
        assert!((sweep.a0 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn mat22_inverse() {
        let m = Mat22::new(Vec2::new(2.0, 1.0), Vec2::new(1.0, 3.0));
        let x = Vec2::new(0.5, -1.0);
        assert!(approx_eq(m.inverse() * (m * x), x));
        // singular matrices invert to zero
        let singular = Mat22::new(Vec2::new(1.0, 2.0), Vec2::new(2.0, 4.0));
        assert!(approx_eq(singular.inverse() * x, Vec2::zero()));
    }
}
