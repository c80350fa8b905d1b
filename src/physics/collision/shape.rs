//! Collision shapes and their geometric properties.
//!
//! Shapes are immutable once created; constructors validate the geometry
//! and refuse anything that would produce NaNs further down the pipeline.

use super::aabb::{RayCastInput, RayCastOutput, AABB};
use crate::{
    error::ShapeError,
    math::{self as m, Pose, Vec2},
    settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS},
};

/// Mass properties of a shape, computed from its density.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MassData {
    pub mass: f64,
    /// Centre of mass relative to the shape's origin.
    pub center: Vec2,
    /// Rotational inertia about the shape's origin.
    pub inertia: f64,
}

/// The geometry of a fixture.
#[derive(Clone, Debug)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
    Edge(Edge),
    Chain(Chain),
}

impl Shape {
    /// Radius of the skin around the shape's core geometry.
    #[inline]
    pub fn radius(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Edge(_) | Shape::Chain(_) => POLYGON_RADIUS,
        }
    }

    /// Number of primitive children. Chains have one per segment, everything else has one.
    #[inline]
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(c) => c.vertices.len() - 1,
            _ => 1,
        }
    }

    /// Check whether a world-space point is inside the shape.
    /// Edges and chains have no area and never contain points.
    pub fn test_point(&self, pose: &Pose, p: Vec2) -> bool {
        match self {
            Shape::Circle(c) => (p - *pose * c.center).mag_sq() <= c.radius * c.radius,
            Shape::Polygon(poly) => {
                let local = pose.inv_transform(p);
                poly.vertices()
                    .iter()
                    .zip(poly.normals())
                    .all(|(v, n)| n.dot(local - *v) <= 0.0)
            }
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    pub fn raycast(
        &self,
        input: &RayCastInput,
        pose: &Pose,
        child: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.raycast(input, pose),
            Shape::Polygon(p) => p.raycast(input, pose),
            Shape::Edge(e) => e.raycast(input, pose),
            Shape::Chain(c) => c.child_edge(child).raycast(input, pose),
        }
    }

    /// Compute the world-space bounding box of a child of the shape.
    pub fn compute_aabb(&self, pose: &Pose, child: usize) -> AABB {
        match self {
            Shape::Circle(c) => {
                let p = *pose * c.center;
                AABB::new(p, p).padded(c.radius)
            }
            Shape::Polygon(poly) => {
                let vs = poly.vertices();
                let first = *pose * vs[0];
                vs[1..]
                    .iter()
                    .fold(AABB::new(first, first), |aabb, v| {
                        let p = *pose * *v;
                        aabb.union(&AABB::new(p, p))
                    })
                    .padded(poly.radius)
            }
            Shape::Edge(e) => AABB::from_points(*pose * e.v1, *pose * e.v2).padded(POLYGON_RADIUS),
            Shape::Chain(c) => {
                let e = c.child_edge(child);
                AABB::from_points(*pose * e.v1, *pose * e.v2).padded(POLYGON_RADIUS)
            }
        }
    }

    /// Compute mass properties with the given density.
    /// Edges and chains have zero mass.
    pub fn compute_mass(&self, density: f64) -> MassData {
        match self {
            Shape::Circle(c) => {
                let mass = density * std::f64::consts::PI * c.radius * c.radius;
                MassData {
                    mass,
                    center: c.center,
                    // inertia about the local origin
                    inertia: mass * (0.5 * c.radius * c.radius + c.center.mag_sq()),
                }
            }
            Shape::Polygon(p) => p.compute_mass(density),
            Shape::Edge(e) => MassData {
                mass: 0.0,
                center: 0.5 * (e.v1 + e.v2),
                inertia: 0.0,
            },
            Shape::Chain(_) => MassData::default(),
        }
    }
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Shape::Circle(c)
    }
}
impl From<Polygon> for Shape {
    fn from(p: Polygon) -> Self {
        Shape::Polygon(p)
    }
}
impl From<Edge> for Shape {
    fn from(e: Edge) -> Self {
        Shape::Edge(e)
    }
}
impl From<Chain> for Shape {
    fn from(c: Chain) -> Self {
        Shape::Chain(c)
    }
}

fn check_finite(points: &[Vec2]) -> Result<(), ShapeError> {
    match points.iter().position(|p| !m::is_finite(*p)) {
        Some(idx) => Err(ShapeError::NonFiniteVertex(idx)),
        None => Ok(()),
    }
}

//
// Circle
//

#[derive(Clone, Copy, Debug)]
pub struct Circle {
    /// Position of the centre relative to the body origin.
    pub center: Vec2,
    pub radius: f64,
}

impl Circle {
    /// A circle centered on the body origin.
    pub fn new(radius: f64) -> Result<Self, ShapeError> {
        Self::with_offset(Vec2::zero(), radius)
    }

    pub fn with_offset(center: Vec2, radius: f64) -> Result<Self, ShapeError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ShapeError::InvalidRadius(radius));
        }
        check_finite(&[center])?;
        Ok(Self { center, radius })
    }

    fn raycast(&self, input: &RayCastInput, pose: &Pose) -> Option<RayCastOutput> {
        let position = *pose * self.center;
        let s = input.p1 - position;
        let b = s.mag_sq() - self.radius * self.radius;

        // solve the quadratic for the first intersection
        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.mag_sq();
        let sigma = c * c - rr * b;

        if sigma < 0.0 || rr < f64::EPSILON {
            return None;
        }

        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            let fraction = a / rr;
            Some(RayCastOutput {
                normal: (s + fraction * r).normalized(),
                fraction,
            })
        } else {
            None
        }
    }
}

//
// Polygon
//

/// A convex polygon with counterclockwise winding.
#[derive(Clone, Copy, Debug)]
pub struct Polygon {
    pub(crate) centroid: Vec2,
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub(crate) radius: f64,
}

impl Polygon {
    /// Create a convex polygon from the convex hull of the given points.
    ///
    /// Points closer together than half of [`LINEAR_SLOP`] are welded together
    /// and collinear points are dropped.
    pub fn new(points: &[Vec2]) -> Result<Self, ShapeError> {
        if points.len() < 3 {
            return Err(ShapeError::TooFewVertices(points.len()));
        }
        if points.len() > MAX_POLYGON_VERTICES {
            return Err(ShapeError::TooManyVertices {
                got: points.len(),
                max: MAX_POLYGON_VERTICES,
            });
        }
        check_finite(points)?;

        // weld close points
        let weld_tol_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut ps: Vec<Vec2> = Vec::with_capacity(points.len());
        for p in points {
            if ps.iter().all(|q| (*p - *q).mag_sq() >= weld_tol_sq) {
                ps.push(*p);
            }
        }
        if ps.len() < 3 {
            return Err(ShapeError::TooFewVertices(ps.len()));
        }

        // gift wrapping, starting from the rightmost (then lowest) point
        let mut i0 = 0;
        for (i, p) in ps.iter().enumerate().skip(1) {
            if p.x > ps[i0].x || (p.x == ps[i0].x && p.y < ps[i0].y) {
                i0 = i;
            }
        }
        let mut hull: Vec<usize> = Vec::with_capacity(ps.len());
        let mut ih = i0;
        loop {
            if hull.len() >= ps.len() {
                // wrapping didn't close, which can only happen with degenerate input
                return Err(ShapeError::DegeneratePolygon);
            }
            hull.push(ih);

            let mut ie = 0;
            for j in 1..ps.len() {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = ps[ie] - ps[ih];
                let v = ps[j] - ps[ih];
                let c = m::cross(r, v);
                // more to the right, or collinear and farther
                if c < 0.0 || (c == 0.0 && v.mag_sq() > r.mag_sq()) {
                    ie = j;
                }
            }
            ih = ie;
            if ie == i0 {
                break;
            }
        }
        if hull.len() < 3 {
            return Err(ShapeError::DegeneratePolygon);
        }

        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        for (v, &h) in vertices.iter_mut().zip(&hull) {
            *v = ps[h];
        }
        Self::from_hull(&vertices[..hull.len()])
    }

    /// Create an axis-aligned box centered on the body origin.
    pub fn new_box(half_width: f64, half_height: f64) -> Result<Self, ShapeError> {
        Self::new_oriented_box(half_width, half_height, Vec2::zero(), 0.0)
    }

    /// Create a box rotated by `angle` radians around `center`.
    pub fn new_oriented_box(
        half_width: f64,
        half_height: f64,
        center: Vec2,
        angle: f64,
    ) -> Result<Self, ShapeError> {
        let (hw, hh) = (half_width, half_height);
        if !(hw.is_finite() && hh.is_finite() && hw > LINEAR_SLOP && hh > LINEAR_SLOP) {
            return Err(ShapeError::InvalidExtents(hw, hh));
        }
        let pose = Pose::new(center, m::Rot::from_angle(angle));
        let corners = [
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ];
        Self::from_hull(&corners.map(|c| pose * c))
    }

    /// Build the polygon from vertices already known to form a
    /// counterclockwise convex hull.
    fn from_hull(hull: &[Vec2]) -> Result<Self, ShapeError> {
        let count = hull.len();
        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::zero(); MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(hull);

        for i in 0..count {
            let edge = vertices[(i + 1) % count] - vertices[i];
            if edge.mag_sq() <= f64::EPSILON * f64::EPSILON {
                return Err(ShapeError::DegeneratePolygon);
            }
            normals[i] = m::right_normal(edge).normalized();
        }

        let centroid = compute_centroid(&vertices[..count]).ok_or(ShapeError::DegeneratePolygon)?;

        Ok(Self {
            centroid,
            vertices,
            normals,
            count,
            radius: POLYGON_RADIUS,
        })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Outward unit normals of the edges. Normal `i` belongs to the edge
    /// from vertex `i` to vertex `i + 1`.
    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    #[inline]
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    fn raycast(&self, input: &RayCastInput, pose: &Pose) -> Option<RayCastOutput> {
        // put the ray into the polygon's frame of reference
        let p1 = pose.inv_transform(input.p1);
        let p2 = pose.inv_transform(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for (i, (v, n)) in self.vertices().iter().zip(self.normals()).enumerate() {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = n.dot(*v - p1);
            let denominator = n.dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // the segment enters this half-space
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // the segment exits this half-space
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            normal: pose.rotation * self.normals[i],
            fraction: lower,
        })
    }

    fn compute_mass(&self, density: f64) -> MassData {
        // triangle fan from the first vertex, which keeps
        // the integrals well-conditioned far from the origin
        let s = self.vertices[0];
        let mut center = Vec2::zero();
        let mut area = 0.0;
        let mut inertia = 0.0;
        let inv3 = 1.0 / 3.0;

        let vs = self.vertices();
        for i in 0..vs.len() {
            let e1 = vs[i] - s;
            let e2 = vs[(i + 1) % vs.len()] - s;
            let d = m::cross(e1, e2);

            let tri_area = 0.5 * d;
            area += tri_area;
            center += tri_area * inv3 * (e1 + e2);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * inv3 * d) * (int_x2 + int_y2);
        }

        let mass = density * area;
        center /= area;
        let world_center = center + s;
        MassData {
            mass,
            center: world_center,
            // shift from the fan origin to the centroid, then to the shape origin
            inertia: density * inertia + mass * (world_center.mag_sq() - center.mag_sq()),
        }
    }
}

fn compute_centroid(vs: &[Vec2]) -> Option<Vec2> {
    let s = vs[0];
    let mut c = Vec2::zero();
    let mut area = 0.0;
    let inv3 = 1.0 / 3.0;
    for i in 0..vs.len() {
        let e1 = vs[i] - s;
        let e2 = vs[(i + 1) % vs.len()] - s;
        let tri_area = 0.5 * m::cross(e1, e2);
        area += tri_area;
        c += tri_area * inv3 * (e1 + e2);
    }
    if area <= f64::EPSILON {
        return None;
    }
    Some(c / area + s)
}

//
// Edge
//

/// A line segment. Edges are two-sided unless they come from a chain,
/// in which case the ghost vertices `v0` and `v3` of the neighboring segments
/// are used to smooth collisions across segment boundaries.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub v1: Vec2,
    pub v2: Vec2,
    pub v0: Option<Vec2>,
    pub v3: Option<Vec2>,
}

impl Edge {
    pub fn new(v1: Vec2, v2: Vec2) -> Result<Self, ShapeError> {
        check_finite(&[v1, v2])?;
        if (v2 - v1).mag_sq() <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(ShapeError::DegenerateEdge);
        }
        Ok(Self {
            v1,
            v2,
            v0: None,
            v3: None,
        })
    }

    fn raycast(&self, input: &RayCastInput, pose: &Pose) -> Option<RayCastOutput> {
        let p1 = pose.inv_transform(input.p1);
        let p2 = pose.inv_transform(input.p2);
        let d = p2 - p1;

        let e = self.v2 - self.v1;
        let normal = m::right_normal(e).normalized();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        let numerator = normal.dot(self.v1 - p1);
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;
        let rr = e.mag_sq();
        if rr == 0.0 {
            return None;
        }
        let s = (q - self.v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let normal = pose.rotation * normal;
        Some(RayCastOutput {
            normal: if numerator > 0.0 { -normal } else { normal },
            fraction: t,
        })
    }
}

//
// Chain
//

/// A chain of line segments, either open or looped.
/// Collides like a series of edges that know about their neighbors.
#[derive(Clone, Debug)]
pub struct Chain {
    vertices: Vec<Vec2>,
    prev_vertex: Option<Vec2>,
    next_vertex: Option<Vec2>,
}

impl Chain {
    /// Create an open chain through the given points.
    pub fn new(points: &[Vec2]) -> Result<Self, ShapeError> {
        if points.len() < 2 {
            return Err(ShapeError::ChainTooShort {
                got: points.len(),
                min: 2,
            });
        }
        Self::check_points(points)?;
        Ok(Self {
            vertices: points.to_vec(),
            prev_vertex: None,
            next_vertex: None,
        })
    }

    /// Create a closed loop through the given points.
    /// The last point is automatically connected to the first.
    pub fn new_loop(points: &[Vec2]) -> Result<Self, ShapeError> {
        if points.len() < 3 {
            return Err(ShapeError::ChainTooShort {
                got: points.len(),
                min: 3,
            });
        }
        Self::check_points(points)?;
        let n = points.len();
        if (points[0] - points[n - 1]).mag_sq() <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(ShapeError::ChainVerticesTooClose(n - 1, 0));
        }
        let mut vertices = points.to_vec();
        vertices.push(points[0]);
        Ok(Self {
            vertices,
            prev_vertex: Some(points[n - 1]),
            next_vertex: Some(points[1]),
        })
    }

    fn check_points(points: &[Vec2]) -> Result<(), ShapeError> {
        check_finite(points)?;
        for i in 1..points.len() {
            if (points[i] - points[i - 1]).mag_sq() <= LINEAR_SLOP * LINEAR_SLOP {
                return Err(ShapeError::ChainVerticesTooClose(i - 1, i));
            }
        }
        Ok(())
    }

    /// Set a ghost vertex before the start of an open chain
    /// to smooth collisions where it connects to other geometry.
    pub fn with_prev_vertex(mut self, v: Vec2) -> Self {
        self.prev_vertex = Some(v);
        self
    }

    /// Set a ghost vertex after the end of an open chain.
    pub fn with_next_vertex(mut self, v: Vec2) -> Self {
        self.next_vertex = Some(v);
        self
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Get a segment of the chain as an edge with ghost vertices.
    pub fn child_edge(&self, idx: usize) -> Edge {
        let vs = &self.vertices;
        Edge {
            v1: vs[idx],
            v2: vs[idx + 1],
            v0: if idx > 0 {
                Some(vs[idx - 1])
            } else {
                self.prev_vertex
            },
            v3: if idx + 2 < vs.len() {
                Some(vs[idx + 2])
            } else {
                self.next_vertex
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_mass_properties() {
        let b = Polygon::new_box(1.0, 0.5).unwrap();
        let md = Shape::from(b).compute_mass(2.0);
        assert!((md.mass - 4.0).abs() < 1e-9);
        assert!(md.center.mag() < 1e-9);
        // m * (w^2 + h^2) / 12
        assert!((md.inertia - 4.0 * (4.0 + 1.0) / 12.0).abs() < 1e-9);

        let offset = Polygon::new_oriented_box(1.0, 0.5, Vec2::new(2.0, 0.0), 0.0).unwrap();
        let md = Shape::from(offset).compute_mass(2.0);
        assert!((md.center - Vec2::new(2.0, 0.0)).mag() < 1e-9);
        assert!((md.inertia - (4.0 * 5.0 / 12.0 + 4.0 * 4.0)).abs() < 1e-9);
    }

    #[test]
    fn hull_from_unordered_points() {
        let poly = Polygon::new(&[
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(0.5, 1.0),
        ])
        .unwrap();
        // interior and collinear points are dropped
        assert_eq!(poly.vertices().len(), 4);
        for (i, v) in poly.vertices().iter().enumerate() {
            let next = poly.vertices()[(i + 1) % 4];
            let after = poly.vertices()[(i + 2) % 4];
            assert!(m::cross(next - *v, after - next) > 0.0, "not counterclockwise");
        }
        assert!(poly.centroid().mag() < 1e-9);
    }

    #[test]
    fn degenerate_shapes_are_rejected() {
        assert_eq!(Circle::new(0.0).unwrap_err(), ShapeError::InvalidRadius(0.0));
        assert!(Circle::new(f64::NAN).is_err());
        assert_eq!(
            Polygon::new(&[Vec2::zero(), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)]).unwrap_err(),
            ShapeError::DegeneratePolygon
        );
        assert_eq!(
            Polygon::new(&[Vec2::zero(), Vec2::new(1.0, 0.0)]).unwrap_err(),
            ShapeError::TooFewVertices(2)
        );
        assert_eq!(
            Polygon::new(&[Vec2::zero(), Vec2::new(0.0001, 0.0), Vec2::new(0.0, 0.0001)])
                .unwrap_err(),
            ShapeError::TooFewVertices(1)
        );
        assert_eq!(
            Edge::new(Vec2::zero(), Vec2::new(0.001, 0.0)).unwrap_err(),
            ShapeError::DegenerateEdge
        );
        assert!(matches!(
            Chain::new(&[Vec2::zero()]),
            Err(ShapeError::ChainTooShort { got: 1, min: 2 })
        ));
        assert_eq!(
            Chain::new(&[Vec2::zero(), Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0)]).unwrap_err(),
            ShapeError::ChainVerticesTooClose(1, 2)
        );
    }

    #[test]
    fn point_tests() {
        let pose = Pose::new(Vec2::new(5.0, 0.0), m::Rot::from_angle(0.3));
        let b = Shape::from(Polygon::new_box(1.0, 1.0).unwrap());
        assert!(b.test_point(&pose, Vec2::new(5.5, 0.5)));
        assert!(!b.test_point(&pose, Vec2::new(7.0, 0.0)));
        let c = Shape::from(Circle::new(1.0).unwrap());
        assert!(c.test_point(&pose, Vec2::new(5.0, 0.9)));
        assert!(!c.test_point(&pose, Vec2::new(5.0, 1.1)));
    }

    #[test]
    fn raycasts() {
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 0.0),
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        let pose = Pose::identity();

        let circle = Shape::from(Circle::new(1.0).unwrap());
        let hit = circle.raycast(&input, &pose, 0).unwrap();
        assert!((hit.fraction - 0.4).abs() < 1e-9);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        let b = Shape::from(Polygon::new_box(2.0, 1.0).unwrap());
        let hit = b.raycast(&input, &pose, 0).unwrap();
        assert!((hit.fraction - 0.3).abs() < 1e-9);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        let edge = Shape::from(Edge::new(Vec2::new(1.0, -1.0), Vec2::new(1.0, 1.0)).unwrap());
        let hit = edge.raycast(&input, &pose, 0).unwrap();
        assert!((hit.fraction - 0.6).abs() < 1e-9);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        let short = RayCastInput {
            max_fraction: 0.2,
            ..input
        };
        assert!(b.raycast(&short, &pose, 0).is_none());
    }

    #[test]
    fn chain_children() {
        let chain = Chain::new_loop(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ])
        .unwrap();
        let shape = Shape::from(chain.clone());
        assert_eq!(shape.child_count(), 3);
        let first = chain.child_edge(0);
        assert_eq!(first.v0, Some(Vec2::new(1.0, 1.0)));
        assert_eq!(first.v3, Some(Vec2::new(1.0, 1.0)));
        let last = chain.child_edge(2);
        assert_eq!(last.v2, Vec2::new(0.0, 0.0));
        assert_eq!(last.v3, Some(Vec2::new(1.0, 0.0)));
    }
}
