//! Narrow phase: exact contact manifolds between pairs of shapes.
//!
//! Manifold points are stored in the local frame of the shape that owns them
//! so that the position solver can re-evaluate separations without
//! re-running collision detection.

use super::{
    manifold::{ContactId, FeatureType, Manifold, ManifoldType},
    shape::{Circle, Edge, Polygon, Shape},
};
use crate::{
    math::{self as m, Pose, Vec2},
    settings::{
        ANGULAR_SLOP, LINEAR_SLOP, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES, POLYGON_RADIUS,
    },
};

use itertools::izip;

/// Compute the contact manifold between children of two shapes.
///
/// Pairs of edges and chains never collide since they have no area.
pub fn collide(
    shape_a: &Shape,
    child_a: usize,
    pose_a: &Pose,
    shape_b: &Shape,
    child_b: usize,
    pose_b: &Pose,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, pose_a, b, pose_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, pose_a, b, pose_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => {
            collide_polygons(&a.view(), pose_a, &b.view(), pose_b)
        }
        (Shape::Edge(e), Shape::Circle(b)) => collide_edge_and_circle(e, pose_a, b, pose_b),
        (Shape::Edge(e), Shape::Polygon(b)) => collide_edge_and_polygon(e, pose_a, b, pose_b),
        (Shape::Chain(c), Shape::Circle(b)) => {
            collide_edge_and_circle(&c.child_edge(child_a), pose_a, b, pose_b)
        }
        (Shape::Chain(c), Shape::Polygon(b)) => {
            collide_edge_and_polygon(&c.child_edge(child_a), pose_a, b, pose_b)
        }
        (Shape::Circle(_), _) | (Shape::Polygon(_), Shape::Edge(_) | Shape::Chain(_)) => {
            collide(shape_b, child_b, pose_b, shape_a, child_a, pose_a).flipped()
        }
        (Shape::Edge(_) | Shape::Chain(_), Shape::Edge(_) | Shape::Chain(_)) => {
            Manifold::default()
        }
    }
}

/// Ordering of shape types used to decide which fixture of a contact is A.
/// The shape with the higher rank is the reference shape.
pub(crate) fn shape_rank(shape: &Shape) -> u8 {
    match shape {
        Shape::Circle(_) => 0,
        Shape::Polygon(_) => 1,
        Shape::Edge(_) => 2,
        Shape::Chain(_) => 3,
    }
}

//
// CIRCLE <-> CIRCLE
//

pub fn collide_circles(circle_a: &Circle, pose_a: &Pose, circle_b: &Circle, pose_b: &Pose) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = *pose_a * circle_a.center;
    let p_b = *pose_b * circle_b.center;
    let dist_sq = (p_b - p_a).mag_sq();
    let r_sum = circle_a.radius + circle_b.radius;
    if dist_sq >= r_sum * r_sum {
        return manifold;
    }

    manifold.kind = ManifoldType::Circles;
    manifold.local_point = circle_a.center;
    manifold.local_normal = Vec2::zero();
    manifold.push_point(circle_b.center, ContactId::default());
    manifold
}

//
// POLYGON <-> CIRCLE
//

pub fn collide_polygon_and_circle(
    poly_a: &Polygon,
    pose_a: &Pose,
    circle_b: &Circle,
    pose_b: &Pose,
) -> Manifold {
    let mut manifold = Manifold::default();

    // circle position in the frame of the polygon
    let c_local = pose_a.inv_transform(*pose_b * circle_b.center);
    let radius = poly_a.radius + circle_b.radius;
    let vertices = poly_a.vertices();
    let normals = poly_a.normals();

    // find the min separating edge
    let mut normal_index = 0;
    let mut separation = f64::MIN;
    for (i, (v, n)) in vertices.iter().zip(normals).enumerate() {
        let s = n.dot(c_local - *v);
        if s > radius {
            // early out
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = vertices[normal_index];
    let v2 = vertices[(normal_index + 1) % vertices.len()];

    manifold.kind = ManifoldType::FaceA;
    if separation < f64::EPSILON {
        // centre is inside the polygon
        manifold.local_normal = normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        manifold.push_point(circle_b.center, ContactId::default());
        return manifold;
    }

    // compute barycentric coordinates to find the Voronoi region
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if (c_local - v1).mag_sq() > radius * radius {
            return manifold;
        }
        manifold.local_normal = (c_local - v1).normalized();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if (c_local - v2).mag_sq() > radius * radius {
            return manifold;
        }
        manifold.local_normal = (c_local - v2).normalized();
        manifold.local_point = v2;
    } else {
        let face_center = 0.5 * (v1 + v2);
        if (c_local - face_center).dot(normals[normal_index]) > radius {
            return manifold;
        }
        manifold.local_normal = normals[normal_index];
        manifold.local_point = face_center;
    }
    manifold.push_point(circle_b.center, ContactId::default());
    manifold
}

//
// POLYGON <-> POLYGON
//

/// Borrowed view of a convex vertex loop and its skin radius.
pub(crate) struct ConvexView<'a> {
    pub vertices: &'a [Vec2],
    pub normals: &'a [Vec2],
    pub radius: f64,
}

impl Polygon {
    pub(crate) fn view(&self) -> ConvexView<'_> {
        ConvexView {
            vertices: self.vertices(),
            normals: self.normals(),
            radius: self.radius,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ClipVertex {
    v: Vec2,
    id: ContactId,
}

/// Find the max separation between `poly1` and `poly2` using the edge normals of `poly1`.
fn find_max_separation(
    poly1: &ConvexView<'_>,
    pose1: &Pose,
    poly2: &ConvexView<'_>,
    pose2: &Pose,
) -> (usize, f64) {
    // work in the frame of poly2
    let pose = pose2.inv_mul(pose1);

    let mut best_index = 0;
    let mut max_separation = f64::MIN;
    for (i, (v1, n1)) in poly1.vertices.iter().zip(poly1.normals).enumerate() {
        let n = pose.rotation * *n1;
        let v1 = pose * *v1;

        // deepest point of poly2 along this normal
        let si = poly2
            .vertices
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .fold(f64::MAX, f64::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

fn find_incident_edge(
    poly1: &ConvexView<'_>,
    pose1: &Pose,
    edge1: usize,
    poly2: &ConvexView<'_>,
    pose2: &Pose,
) -> [ClipVertex; 2] {
    // reference edge normal in the frame of poly2
    let normal1 = pose2
        .rotation
        .inv_rotate(pose1.rotation * poly1.normals[edge1]);

    // the incident edge is the most anti-parallel one
    let mut index = 0;
    let mut min_dot = f64::MAX;
    for (i, n2) in poly2.normals.iter().enumerate() {
        let dot = normal1.dot(*n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (i1 + 1) % poly2.vertices.len();
    let clip_vertex = |i: usize| ClipVertex {
        v: *pose2 * poly2.vertices[i],
        id: ContactId {
            index_a: edge1 as u8,
            index_b: i as u8,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        },
    };
    [clip_vertex(i1), clip_vertex(i2)]
}

/// Sutherland-Hodgman clipping of a segment against the half-plane
/// `dot(normal, x) <= offset`.
fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f64,
    vertex_index_a: usize,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // points behind the plane are kept
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // the points are on different sides of the plane
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count] = ClipVertex {
            v: v_in[0].v + interp * (v_in[1].v - v_in[0].v),
            // vertex A is hitting edge B
            id: ContactId {
                index_a: vertex_index_a as u8,
                index_b: v_in[0].id.index_b,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Face,
            },
        };
        count += 1;
    }

    (v_out, count)
}

/// Find edge normal of max separation on A, then B, and use whichever is larger
/// as the reference face. Clip the incident edge of the other polygon
/// against the reference face's side planes and keep points below the face.
pub(crate) fn collide_polygons(
    poly_a: &ConvexView<'_>,
    pose_a: &Pose,
    poly_b: &ConvexView<'_>,
    pose_b: &Pose,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, pose_a, poly_b, pose_b);
    if separation_a > total_radius {
        return manifold;
    }
    let (edge_b, separation_b) = find_max_separation(poly_b, pose_b, poly_a, pose_a);
    if separation_b > total_radius {
        return manifold;
    }

    // prefer A's face unless B's is clearly better, to avoid flip-flopping
    let tolerance = 0.1 * LINEAR_SLOP;
    let (poly1, pose1, poly2, pose2, edge1, kind, flip) = if separation_b > separation_a + tolerance
    {
        (poly_b, pose_b, poly_a, pose_a, edge_b, ManifoldType::FaceB, true)
    } else {
        (poly_a, pose_a, poly_b, pose_b, edge_a, ManifoldType::FaceA, false)
    };

    let incident_edge = find_incident_edge(poly1, pose1, edge1, poly2, pose2);

    let iv1 = edge1;
    let iv2 = (edge1 + 1) % poly1.vertices.len();
    let v11 = poly1.vertices[iv1];
    let v12 = poly1.vertices[iv2];

    let edge = v12 - v11;
    if edge.mag_sq() <= f64::EPSILON * f64::EPSILON {
        return manifold;
    }
    let local_tangent = edge.normalized();
    let local_normal = m::right_normal(local_tangent);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = pose1.rotation * local_tangent;
    let normal = m::right_normal(tangent);

    let v11 = *pose1 * v11;
    let v12 = *pose1 * v12;

    // face offset
    let front_offset = normal.dot(v11);
    // side offsets, extended by polygon skin thickness
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // clip incident edge against extruded edge1 side edges
    let (clip_points1, count1) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1);
    if count1 < 2 {
        return manifold;
    }
    let (clip_points2, count2) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2);
    if count2 < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;
    manifold.kind = kind;

    for cp in &clip_points2[..count2] {
        let separation = normal.dot(cp.v) - front_offset;
        if separation <= total_radius {
            let id = if flip { cp.id.flipped() } else { cp.id };
            manifold.push_point(pose2.inv_transform(cp.v), id);
        }
    }
    manifold
}

//
// EDGE <-> CIRCLE
//

/// Edges with ghost vertices (chain segments) are one-sided:
/// shapes behind them, against the right-hand normal, are ignored.
#[inline]
fn is_one_sided(edge: &Edge) -> bool {
    edge.v0.is_some() || edge.v3.is_some()
}

pub fn collide_edge_and_circle(
    edge_a: &Edge,
    pose_a: &Pose,
    circle_b: &Circle,
    pose_b: &Pose,
) -> Manifold {
    let mut manifold = Manifold::default();

    // circle in the frame of the edge
    let q = pose_a.inv_transform(*pose_b * circle_b.center);

    let a = edge_a.v1;
    let b = edge_a.v2;
    let e = b - a;

    // normal points to the right when looking from v1 to v2
    let n = m::right_normal(e).normalized();
    let offset = n.dot(q - a);
    if is_one_sided(edge_a) && offset < 0.0 {
        return manifold;
    }

    // barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = POLYGON_RADIUS + circle_b.radius;

    let vertex_contact = |manifold: &mut Manifold, p: Vec2, index_a: u8| {
        manifold.kind = ManifoldType::Circles;
        manifold.local_normal = Vec2::zero();
        manifold.local_point = p;
        manifold.push_point(
            circle_b.center,
            ContactId {
                index_a,
                index_b: 0,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Vertex,
            },
        );
    };

    // region A
    if v <= 0.0 {
        if (q - a).mag_sq() > radius * radius {
            return manifold;
        }
        // is there an edge connected to A, and is the circle in its region?
        if let Some(a1) = edge_a.v0 {
            let e1 = a - a1;
            if e1.dot(a - q) > 0.0 {
                return manifold;
            }
        }
        vertex_contact(&mut manifold, a, 0);
        return manifold;
    }

    // region B
    if u <= 0.0 {
        if (q - b).mag_sq() > radius * radius {
            return manifold;
        }
        if let Some(b2) = edge_a.v3 {
            let e2 = b2 - b;
            if e2.dot(q - b) > 0.0 {
                return manifold;
            }
        }
        vertex_contact(&mut manifold, b, 1);
        return manifold;
    }

    // region AB
    let den = e.mag_sq();
    if den <= f64::EPSILON {
        return manifold;
    }
    let p = (1.0 / den) * (u * a + v * b);
    if (q - p).mag_sq() > radius * radius {
        return manifold;
    }

    manifold.kind = ManifoldType::FaceA;
    manifold.local_normal = if offset < 0.0 { -n } else { n };
    manifold.local_point = a;
    manifold.push_point(
        circle_b.center,
        ContactId {
            index_a: 0,
            index_b: 0,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        },
    );
    manifold
}

//
// EDGE <-> POLYGON
//

/// Which feature an edge-polygon separating axis belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeAxisKind {
    Edge,
    Polygon,
}

#[derive(Clone, Copy, Debug)]
struct EdgeAxis {
    kind: EdgeAxisKind,
    index: usize,
    separation: f64,
}

/// Collision normal chosen for an edge and the range of normals
/// the polygon's faces may take before they are treated as internal.
#[derive(Clone, Copy, Debug)]
struct NormalRange {
    front: bool,
    normal: Vec2,
    lower: Vec2,
    upper: Vec2,
}

impl NormalRange {
    /// Pick the collision side from the polygon centroid's offsets to this edge
    /// and to its neighbours, then limit the admissible normals so that
    /// collinear or concave junctions never produce a sideways normal.
    fn new(edge: &Edge, centroid: Vec2) -> Self {
        let (v1, v2) = (edge.v1, edge.v2);
        let edge1 = (v2 - v1).normalized();
        let normal1 = m::right_normal(edge1);
        let offset1 = normal1.dot(centroid - v1);

        // (neighbour normal, centroid offset, convex junction)
        let prev = edge.v0.map(|v0| {
            let edge0 = (v1 - v0).normalized();
            let normal0 = m::right_normal(edge0);
            (normal0, normal0.dot(centroid - v0), m::cross(edge0, edge1) >= 0.0)
        });
        let next = edge.v3.map(|v3| {
            let edge2 = (v3 - v2).normalized();
            let normal2 = m::right_normal(edge2);
            (normal2, normal2.dot(centroid - v2), m::cross(edge1, edge2) > 0.0)
        });

        let front_range = |lower, upper| Self {
            front: true,
            normal: normal1,
            lower,
            upper,
        };
        let back_range = |lower, upper| Self {
            front: false,
            normal: -normal1,
            lower,
            upper,
        };

        match (prev, next) {
            (Some((normal0, offset0, convex1)), Some((normal2, offset2, convex2))) => {
                match (convex1, convex2) {
                    (true, true) => {
                        if offset0 >= 0.0 || offset1 >= 0.0 || offset2 >= 0.0 {
                            front_range(normal0, normal2)
                        } else {
                            back_range(-normal1, -normal1)
                        }
                    }
                    (true, false) => {
                        if offset0 >= 0.0 || (offset1 >= 0.0 && offset2 >= 0.0) {
                            front_range(normal0, normal1)
                        } else {
                            back_range(-normal2, -normal1)
                        }
                    }
                    (false, true) => {
                        if offset2 >= 0.0 || (offset0 >= 0.0 && offset1 >= 0.0) {
                            front_range(normal1, normal2)
                        } else {
                            back_range(-normal1, -normal0)
                        }
                    }
                    (false, false) => {
                        if offset0 >= 0.0 && offset1 >= 0.0 && offset2 >= 0.0 {
                            front_range(normal1, normal1)
                        } else {
                            back_range(-normal2, -normal0)
                        }
                    }
                }
            }
            (Some((normal0, offset0, convex1)), None) => {
                if convex1 {
                    if offset0 >= 0.0 || offset1 >= 0.0 {
                        front_range(normal0, -normal1)
                    } else {
                        back_range(normal1, -normal1)
                    }
                } else if offset0 >= 0.0 && offset1 >= 0.0 {
                    front_range(normal1, -normal1)
                } else {
                    back_range(normal1, -normal0)
                }
            }
            (None, Some((normal2, offset2, convex2))) => {
                if convex2 {
                    if offset1 >= 0.0 || offset2 >= 0.0 {
                        front_range(-normal1, normal2)
                    } else {
                        back_range(-normal1, normal1)
                    }
                } else if offset1 >= 0.0 && offset2 >= 0.0 {
                    front_range(-normal1, normal1)
                } else {
                    back_range(-normal2, normal1)
                }
            }
            (None, None) => {
                if offset1 >= 0.0 {
                    front_range(-normal1, -normal1)
                } else {
                    back_range(normal1, normal1)
                }
            }
        }
    }

    /// Whether a polygon face whose negated normal is `n` may be the collision normal.
    fn admits(&self, n: Vec2) -> bool {
        let perp = m::left_normal(self.normal);
        let limit = if n.dot(perp) >= 0.0 {
            self.upper
        } else {
            self.lower
        };
        (n - limit).dot(self.normal) >= -ANGULAR_SLOP
    }
}

/// Deepest polygon vertex below the edge along the chosen collision normal.
fn edge_separation(range: &NormalRange, v1: Vec2, poly_vertices: &[Vec2]) -> EdgeAxis {
    let separation = poly_vertices
        .iter()
        .map(|v| range.normal.dot(*v - v1))
        .fold(f64::MAX, f64::min);
    EdgeAxis {
        kind: EdgeAxisKind::Edge,
        index: if range.front { 0 } else { 1 },
        separation,
    }
}

/// Best polygon face axis within the admissible normal range, if any.
/// A face that separates the shapes outright is returned regardless of range.
fn polygon_separation(
    range: &NormalRange,
    v1: Vec2,
    v2: Vec2,
    poly_vertices: &[Vec2],
    poly_normals: &[Vec2],
    total_radius: f64,
) -> Option<EdgeAxis> {
    let mut best: Option<EdgeAxis> = None;
    for (i, (v, n)) in poly_vertices.iter().zip(poly_normals).enumerate() {
        let n = -*n;
        let separation = n.dot(*v - v1).min(n.dot(*v - v2));
        if separation > total_radius {
            return Some(EdgeAxis {
                kind: EdgeAxisKind::Polygon,
                index: i,
                separation,
            });
        }
        if !range.admits(n) {
            continue;
        }
        if best.map_or(true, |axis| separation > axis.separation) {
            best = Some(EdgeAxis {
                kind: EdgeAxisKind::Polygon,
                index: i,
                separation,
            });
        }
    }
    best
}

/// Collide a segment with a polygon. Ghost vertices from a chain limit
/// the admissible collision normals so that polygons slide smoothly over
/// the junctions between segments. Chain segments are one-sided
/// and ignore polygons behind them.
pub fn collide_edge_and_polygon(
    edge_a: &Edge,
    pose_a: &Pose,
    poly_b: &Polygon,
    pose_b: &Pose,
) -> Manifold {
    let mut manifold = Manifold::default();

    let (v1, v2) = (edge_a.v1, edge_a.v2);
    if (v2 - v1).mag_sq() <= f64::EPSILON {
        return manifold;
    }

    // polygon in the frame of the edge
    let xf = pose_a.inv_mul(pose_b);
    let range = NormalRange::new(edge_a, xf * poly_b.centroid);
    if is_one_sided(edge_a) && !range.front {
        return manifold;
    }

    let count = poly_b.vertices().len();
    let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
    let mut normals = [Vec2::zero(); MAX_POLYGON_VERTICES];
    for (v, n, local_v, local_n) in
        izip!(&mut vertices, &mut normals, poly_b.vertices(), poly_b.normals())
    {
        *v = xf * *local_v;
        *n = xf.rotation * *local_n;
    }
    let (vertices, normals) = (&vertices[..count], &normals[..count]);
    let total_radius = POLYGON_RADIUS + poly_b.radius;

    let edge_axis = edge_separation(&range, v1, vertices);
    if edge_axis.separation > total_radius {
        return manifold;
    }
    let polygon_axis = polygon_separation(&range, v1, v2, vertices, normals, total_radius);
    if polygon_axis.map_or(false, |axis| axis.separation > total_radius) {
        return manifold;
    }

    // hysteresis toward the edge face keeps the normal from flip-flopping
    const RELATIVE_TOL: f64 = 0.98;
    const ABSOLUTE_TOL: f64 = 0.001;
    let primary = match polygon_axis {
        Some(axis) if axis.separation > RELATIVE_TOL * edge_axis.separation + ABSOLUTE_TOL => axis,
        _ => edge_axis,
    };

    // incident segment, reference face indices, face vertices and normal
    let (incident, i1, i2, rv1, rv2, ref_normal) = match primary.kind {
        EdgeAxisKind::Edge => {
            manifold.kind = ManifoldType::FaceA;
            // the polygon face most anti-parallel to the edge normal
            let mut best_index = 0;
            let mut best_value = f64::MAX;
            for (i, n) in normals.iter().enumerate() {
                let value = range.normal.dot(*n);
                if value < best_value {
                    best_value = value;
                    best_index = i;
                }
            }
            let clip_vertex = |i: usize| ClipVertex {
                v: vertices[i],
                id: ContactId {
                    index_a: 0,
                    index_b: i as u8,
                    type_a: FeatureType::Face,
                    type_b: FeatureType::Vertex,
                },
            };
            let incident = [clip_vertex(best_index), clip_vertex((best_index + 1) % count)];
            if range.front {
                (incident, 0, 1, v1, v2, range.normal)
            } else {
                (incident, 1, 0, v2, v1, range.normal)
            }
        }
        EdgeAxisKind::Polygon => {
            manifold.kind = ManifoldType::FaceB;
            let clip_vertex = |v: Vec2| ClipVertex {
                v,
                id: ContactId {
                    index_a: 0,
                    index_b: primary.index as u8,
                    type_a: FeatureType::Vertex,
                    type_b: FeatureType::Face,
                },
            };
            let i1 = primary.index;
            let i2 = (i1 + 1) % count;
            (
                [clip_vertex(v1), clip_vertex(v2)],
                i1,
                i2,
                vertices[i1],
                vertices[i2],
                normals[i1],
            )
        }
    };

    // side planes of the reference face
    let side_normal1 = m::right_normal(ref_normal);
    let side_normal2 = -side_normal1;
    let (clip_points1, count1) =
        clip_segment_to_line(&incident, side_normal1, side_normal1.dot(rv1), i1);
    if count1 < MAX_MANIFOLD_POINTS {
        return manifold;
    }
    let (clip_points2, count2) =
        clip_segment_to_line(&clip_points1, side_normal2, side_normal2.dot(rv2), i2);
    if count2 < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    match primary.kind {
        EdgeAxisKind::Edge => {
            manifold.local_normal = ref_normal;
            manifold.local_point = rv1;
        }
        EdgeAxisKind::Polygon => {
            manifold.local_normal = poly_b.normals()[i1];
            manifold.local_point = poly_b.vertices()[i1];
        }
    }

    for cp in &clip_points2[..count2] {
        if ref_normal.dot(cp.v - rv1) <= total_radius {
            match primary.kind {
                // points go in the polygon's frame
                EdgeAxisKind::Edge => manifold.push_point(xf.inv_transform(cp.v), cp.id),
                // points stay in the edge's frame
                EdgeAxisKind::Polygon => manifold.push_point(cp.v, cp.id.flipped()),
            }
        }
    }
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::{manifold::WorldManifold, shape::Chain};

    fn at(x: f64, y: f64) -> Pose {
        Pose::new(Vec2::new(x, y), m::Rot::identity())
    }

    #[test]
    fn circles_touch_iff_closer_than_radius_sum() {
        let a = Shape::from(Circle::new(1.0).unwrap());
        let b = Shape::from(Circle::new(0.5).unwrap());
        for (dist, expect) in [(0.0, 1), (1.0, 1), (1.49, 1), (1.5, 0), (1.51, 0), (10.0, 0)] {
            let manifold = collide(&a, 0, &at(0.0, 0.0), &b, 0, &at(dist, 0.0));
            assert_eq!(manifold.point_count, expect, "at distance {}", dist);
            if expect == 1 {
                assert_eq!(manifold.kind, ManifoldType::Circles);
            }
        }

        let manifold = collide(&a, 0, &at(0.0, 0.0), &b, 0, &at(1.4, 0.0));
        let wm = WorldManifold::new(&manifold, &at(0.0, 0.0), 1.0, &at(1.4, 0.0), 0.5);
        assert!((wm.normal - Vec2::unit_x()).mag() < 1e-12);
        assert!((wm.separations[0] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn box_resting_on_box() {
        let ground = Shape::from(Polygon::new_box(5.0, 0.5).unwrap());
        let b = Shape::from(Polygon::new_box(0.5, 0.5).unwrap());
        // overlapping slightly
        let pose_g = at(0.0, 0.0);
        let pose_b = at(0.0, 0.99);
        let manifold = collide(&ground, 0, &pose_g, &b, 0, &pose_b);
        assert_eq!(manifold.point_count, 2);
        assert_eq!(manifold.kind, ManifoldType::FaceA);
        assert!((manifold.local_normal - Vec2::unit_y()).mag() < 1e-12);
        assert_ne!(manifold.points[0].id, manifold.points[1].id);

        let wm = WorldManifold::new(&manifold, &pose_g, POLYGON_RADIUS, &pose_b, POLYGON_RADIUS);
        for s in &wm.separations[..2] {
            assert!((s - (-0.01 - 2.0 * POLYGON_RADIUS)).abs() < 1e-9);
        }

        // separated by more than the skin
        let manifold = collide(&ground, 0, &pose_g, &b, 0, &at(0.0, 1.1));
        assert!(manifold.is_empty());
    }

    #[test]
    fn reversed_polygon_pair_normal_points_from_a_to_b() {
        let big = Shape::from(Polygon::new_box(5.0, 0.5).unwrap());
        let small = Shape::from(Polygon::new_box(0.5, 0.5).unwrap());
        let manifold = collide(&small, 0, &at(0.0, 0.99), &big, 0, &at(0.0, 0.0));
        assert_eq!(manifold.point_count, 2);
        let wm = WorldManifold::new(
            &manifold,
            &at(0.0, 0.99),
            POLYGON_RADIUS,
            &at(0.0, 0.0),
            POLYGON_RADIUS,
        );
        // normal still points from A to B
        assert!((wm.normal + Vec2::unit_y()).mag() < 1e-9);
    }

    #[test]
    fn circle_against_polygon_regions() {
        let b = Shape::from(Polygon::new_box(1.0, 1.0).unwrap());
        let c = Shape::from(Circle::new(0.5).unwrap());

        // face region
        let manifold = collide(&b, 0, &at(0.0, 0.0), &c, 0, &at(0.0, 1.4));
        assert_eq!(manifold.kind, ManifoldType::FaceA);
        assert_eq!(manifold.point_count, 1);

        // corner region
        let manifold = collide(&b, 0, &at(0.0, 0.0), &c, 0, &at(1.3, 1.3));
        assert_eq!(manifold.point_count, 1);
        assert!((manifold.local_point - Vec2::new(1.0, 1.0)).mag() < 1e-12);
        let manifold = collide(&b, 0, &at(0.0, 0.0), &c, 0, &at(1.4, 1.4));
        assert!(manifold.is_empty());

        // reversed order gives the same contact from the other side
        let manifold = collide(&c, 0, &at(0.0, 1.4), &b, 0, &at(0.0, 0.0));
        assert_eq!(manifold.kind, ManifoldType::FaceB);
        let wm = WorldManifold::new(&manifold, &at(0.0, 1.4), 0.5, &at(0.0, 0.0), POLYGON_RADIUS);
        assert!((wm.normal + Vec2::unit_y()).mag() < 1e-12);
    }

    #[test]
    fn circle_against_edge() {
        let edge = Shape::from(Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap());
        let c = Shape::from(Circle::new(0.5).unwrap());

        // two-sided edge collides from both sides
        let above = collide(&edge, 0, &at(0.0, 0.0), &c, 0, &at(0.0, 0.4));
        assert_eq!(above.kind, ManifoldType::FaceA);
        let below = collide(&edge, 0, &at(0.0, 0.0), &c, 0, &at(0.0, -0.4));
        assert_eq!(below.point_count, 1);
        assert!((below.local_normal - Vec2::new(0.0, -1.0)).mag() < 1e-12);

        // vertex region
        let corner = collide(&edge, 0, &at(0.0, 0.0), &c, 0, &at(1.3, 0.0));
        assert_eq!(corner.kind, ManifoldType::Circles);
        assert_eq!(corner.points[0].id.index_a, 1);
    }

    #[test]
    fn chain_segments_are_one_sided_and_smooth() {
        // counterclockwise square loop, normals point outwards
        let chain = Chain::new_loop(&[
            Vec2::new(-2.0, -2.0),
            Vec2::new(2.0, -2.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(-2.0, 2.0),
        ])
        .unwrap();
        let shape = Shape::from(chain);
        let c = Shape::from(Circle::new(0.5).unwrap());

        // just below the bottom segment, outside the loop
        let outside = collide(&shape, 0, &at(0.0, 0.0), &c, 0, &at(0.0, -2.4));
        assert_eq!(outside.point_count, 1);
        // just above it, inside the loop
        let inside = collide(&shape, 0, &at(0.0, 0.0), &c, 0, &at(0.0, -1.6));
        assert!(inside.is_empty());

        // below the bottom segment near the corner, behind the right segment
        let near_corner = at(1.9, -2.3);
        let count: usize = (0..4)
            .map(|i| collide(&shape, i, &at(0.0, 0.0), &c, 0, &near_corner).point_count)
            .sum();
        assert_eq!(count, 1);

        let b = Shape::from(Polygon::new_box(0.5, 0.5).unwrap());
        let outside = collide(&shape, 0, &at(0.0, 0.0), &b, 0, &at(0.0, -2.45));
        assert_eq!(outside.point_count, 2);
        let inside = collide(&shape, 0, &at(0.0, 0.0), &b, 0, &at(0.0, -1.55));
        assert!(inside.is_empty());
    }

    #[test]
    fn box_corner_at_collinear_chain_junction_gets_face_normal() {
        // right to left so the normals point up
        let chain = Chain::new(&[Vec2::new(2.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(-2.0, 0.0)])
            .unwrap();
        let shape = Shape::from(chain);
        let b = Shape::from(Polygon::new_box(0.5, 0.5).unwrap());
        // sunk slightly, right side barely past the junction at x = 0
        let pose_b = at(-0.495, 0.49);
        let world_normal = |manifold: &Manifold| {
            WorldManifold::new(manifold, &at(0.0, 0.0), POLYGON_RADIUS, &pose_b, POLYGON_RADIUS)
                .normal
        };

        let manifold = collide(&shape, 0, &at(0.0, 0.0), &b, 0, &pose_b);
        assert_eq!(manifold.kind, ManifoldType::FaceA);
        assert_eq!(manifold.point_count, 2);
        let normal = world_normal(&manifold);
        assert!((normal - Vec2::unit_y()).mag() < 1e-12);

        // the neighbouring segment agrees
        let manifold = collide(&shape, 1, &at(0.0, 0.0), &b, 0, &pose_b);
        let normal = world_normal(&manifold);
        assert!((normal - Vec2::unit_y()).mag() < 1e-12);

        // a lone edge has no neighbours and pushes the box sideways
        let lone = Shape::from(Edge::new(Vec2::new(2.0, 0.0), Vec2::new(0.0, 0.0)).unwrap());
        let manifold = collide(&lone, 0, &at(0.0, 0.0), &b, 0, &pose_b);
        assert_eq!(manifold.kind, ManifoldType::FaceB);
        let normal = world_normal(&manifold);
        assert!((normal + Vec2::unit_x()).mag() < 1e-12);
    }

    #[test]
    fn edges_do_not_collide_with_each_other() {
        let e1 = Shape::from(Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap());
        let e2 = Shape::from(Edge::new(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0)).unwrap());
        assert!(collide(&e1, 0, &at(0.0, 0.0), &e2, 0, &at(0.0, 0.0)).is_empty());
    }
}
