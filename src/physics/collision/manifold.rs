//! Contact manifolds produced by the narrow phase.

use crate::{
    math::{Pose, Vec2},
    settings::MAX_MANIFOLD_POINTS,
};

/// Whether a contact feature is a vertex or a face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FeatureType {
    #[default]
    Vertex,
    Face,
}

/// The features that intersect to form a contact point.
/// Used to match points between steps so that impulses can be carried over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContactId {
    pub index_a: u8,
    pub index_b: u8,
    pub type_a: FeatureType,
    pub type_b: FeatureType,
}

impl ContactId {
    #[inline]
    pub fn flipped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// A contact point belonging to a manifold.
///
/// The meaning of `local_point` depends on the manifold type:
/// - [`Circles`][ManifoldType::Circles]: the local centre of circle B
/// - [`FaceA`][ManifoldType::FaceA]: the local centre of circle B or the clip point of polygon B
/// - [`FaceB`][ManifoldType::FaceB]: the clip point of polygon A
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// Accumulated non-penetration impulse, kept between steps for warm starting.
    pub normal_impulse: f64,
    /// Accumulated friction impulse.
    pub tangent_impulse: f64,
    pub id: ContactId,
}

/// Which shape's frame a manifold is expressed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// The points of contact between two shapes, stored in local coordinates
/// so that they stay valid while the bodies move during position correction.
///
/// `local_normal` is unused for circles; `local_point` is the circle A centre
/// for circles and the reference face centre for face manifolds.
#[derive(Clone, Copy, Debug, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub kind: ManifoldType,
}

impl Manifold {
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    pub(crate) fn push_point(&mut self, local_point: Vec2, id: ContactId) {
        self.points[self.point_count] = ManifoldPoint {
            local_point,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            id,
        };
        self.point_count += 1;
    }

    /// The same manifold with the roles of shape A and shape B exchanged.
    pub fn flipped(mut self) -> Self {
        match self.kind {
            ManifoldType::Circles => {
                if self.point_count > 0 {
                    std::mem::swap(&mut self.local_point, &mut self.points[0].local_point);
                }
            }
            ManifoldType::FaceA => self.kind = ManifoldType::FaceB,
            ManifoldType::FaceB => self.kind = ManifoldType::FaceA,
        }
        for p in self.points_mut() {
            p.id = p.id.flipped();
        }
        self
    }
}

/// A manifold evaluated in world space.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorldManifold {
    /// World normal pointing from A to B.
    pub normal: Vec2,
    /// World contact points, midway between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when the shapes overlap.
    pub separations: [f64; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        pose_a: &Pose,
        radius_a: f64,
        pose_b: &Pose,
        radius_b: f64,
    ) -> Self {
        let mut wm = WorldManifold {
            point_count: manifold.point_count,
            ..Default::default()
        };
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.kind {
            ManifoldType::Circles => {
                let point_a = *pose_a * manifold.local_point;
                let point_b = *pose_b * manifold.points[0].local_point;
                wm.normal = if (point_b - point_a).mag_sq() > f64::EPSILON * f64::EPSILON {
                    (point_b - point_a).normalized()
                } else {
                    Vec2::unit_x()
                };
                let c_a = point_a + radius_a * wm.normal;
                let c_b = point_b - radius_b * wm.normal;
                wm.points[0] = 0.5 * (c_a + c_b);
                wm.separations[0] = (c_b - c_a).dot(wm.normal);
            }
            ManifoldType::FaceA => {
                wm.normal = pose_a.rotation * manifold.local_normal;
                let plane_point = *pose_a * manifold.local_point;
                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = *pose_b * mp.local_point;
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(wm.normal)) * wm.normal;
                    let c_b = clip_point - radius_b * wm.normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_b - c_a).dot(wm.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = pose_b.rotation * manifold.local_normal;
                let plane_point = *pose_b * manifold.local_point;
                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = *pose_a * mp.local_point;
                    let c_b =
                        clip_point + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_a - c_b).dot(normal);
                }
                // ensure the normal points from A to B
                wm.normal = -normal;
            }
        }
        wm
    }

    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.point_count]
    }
}
