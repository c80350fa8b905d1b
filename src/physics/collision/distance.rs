//! Closest points between convex shapes using the GJK algorithm.

use super::shape::Shape;
use crate::{
    math::{self as m, Pose, Vec2},
    settings::MAX_POLYGON_VERTICES,
};

/// A convex vertex set with a skin radius, as seen by GJK.
#[derive(Clone, Copy, Debug)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: f64,
}

impl DistanceProxy {
    /// Build a proxy for a child of a shape.
    pub fn new(shape: &Shape, child: usize) -> Self {
        match shape {
            Shape::Circle(c) => Self::from_points(&[c.center], c.radius),
            Shape::Polygon(p) => Self::from_points(p.vertices(), p.radius),
            Shape::Edge(e) => Self::from_points(&[e.v1, e.v2], shape.radius()),
            Shape::Chain(c) => {
                let e = c.child_edge(child);
                Self::from_points(&[e.v1, e.v2], shape.radius())
            }
        }
    }

    /// Build a proxy from a point set of at most [`MAX_POLYGON_VERTICES`] points.
    pub fn from_points(points: &[Vec2], radius: f64) -> Self {
        debug_assert!(!points.is_empty() && points.len() <= MAX_POLYGON_VERTICES);
        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        vertices[..points.len()].copy_from_slice(points);
        Self {
            vertices,
            count: points.len(),
            radius,
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    #[inline]
    pub fn vertex(&self, idx: usize) -> Vec2 {
        self.vertices[idx]
    }

    /// Index of the vertex furthest along `dir`.
    pub fn support(&self, dir: Vec2) -> usize {
        let mut best = 0;
        let mut best_value = self.vertices[0].dot(dir);
        for (i, v) in self.vertices().iter().enumerate().skip(1) {
            let value = v.dot(dir);
            if value > best_value {
                best = i;
                best_value = value;
            }
        }
        best
    }
}

/// Simplex state carried between calls to warm start GJK.
/// Set `count` to zero on the first call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexCache {
    /// Length or area of the simplex, used to detect stale caches.
    pub metric: f64,
    pub count: usize,
    pub index_a: [usize; 3],
    pub index_b: [usize; 3],
}

#[derive(Clone, Copy, Debug)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub pose_a: Pose,
    pub pose_b: Pose,
    /// Whether to account for the proxies' radii in the result.
    pub use_radii: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DistanceOutput {
    /// Closest point on shape A.
    pub point_a: Vec2,
    /// Closest point on shape B.
    pub point_b: Vec2,
    pub distance: f64,
    /// Number of GJK iterations used.
    pub iterations: usize,
}

const MAX_ITERS: usize = 20;

//
// Simplex
//

#[derive(Clone, Copy, Debug, Default)]
struct SimplexVertex {
    /// Support point in proxy A, world space.
    w_a: Vec2,
    /// Support point in proxy B, world space.
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: f64,
    index_a: usize,
    index_b: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn from_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        pose_a: &Pose,
        proxy_b: &DistanceProxy,
        pose_b: &Pose,
    ) -> Self {
        let mut simplex = Simplex {
            count: cache.count,
            ..Default::default()
        };
        for i in 0..simplex.count {
            let index_a = cache.index_a[i];
            let index_b = cache.index_b[i];
            let w_a = *pose_a * proxy_a.vertex(index_a);
            let w_b = *pose_b * proxy_b.vertex(index_b);
            simplex.v[i] = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 0.0,
                index_a,
                index_b,
            };
        }

        // flush the cache if the simplex shape changed a lot
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f64::EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            let w_a = *pose_a * proxy_a.vertex(0);
            let w_b = *pose_b * proxy_b.vertex(0);
            simplex.v[0] = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 1.0,
                index_a: 0,
                index_b: 0,
            };
            simplex.count = 1;
        }
        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for (i, v) in self.v[..self.count].iter().enumerate() {
            cache.index_a[i] = v.index_a;
            cache.index_b[i] = v.index_b;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = m::cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // origin is left of e12
                    m::cross_sv(1.0, e12)
                } else {
                    m::cross_vs(e12, 1.0)
                }
            }
            _ => Vec2::zero(),
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].a * self.v[0].w + self.v[1].a * self.v[1].w,
            _ => Vec2::zero(),
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].a * self.v[0].w_a + self.v[1].a * self.v[1].w_a,
                self.v[0].a * self.v[0].w_b + self.v[1].a * self.v[1].w_b,
            ),
            _ => {
                let p = self.v[0].a * self.v[0].w_a
                    + self.v[1].a * self.v[1].w_a
                    + self.v[2].a * self.v[2].w_a;
                (p, p)
            }
        }
    }

    fn metric(&self) -> f64 {
        match self.count {
            2 => (self.v[0].w - self.v[1].w).mag(),
            3 => m::cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    /// Closest point on a segment to the origin, using barycentric coordinates.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // must be in e12 region
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest point on a triangle to the origin.
    /// Checks the vertex regions, then the edge regions, then the interior.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = m::cross(e12, e13);
        let d123_1 = n123 * m::cross(w2, w3);
        let d123_2 = n123 * m::cross(w3, w1);
        let d123_3 = n123 * m::cross(w1, w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // must be in triangle123
        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

/// Compute the closest points between two convex proxies.
///
/// The simplex cache is read on input for warm starting and updated on output.
pub fn distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let pose_a = &input.pose_a;
    let pose_b = &input.pose_b;

    let mut simplex = Simplex::from_cache(cache, proxy_a, pose_a, proxy_b, pose_b);

    // vertices of the last simplex, used to detect cycling
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_ITERS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // the origin is inside a triangle, i.e. the shapes overlap
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        // the origin is probably contained by a line segment or triangle
        if d.mag_sq() < f64::EPSILON * f64::EPSILON {
            break;
        }

        // compute a tentative new simplex vertex using support points
        let index_a = proxy_a.support(pose_a.rotation.inv_rotate(-d));
        let index_b = proxy_b.support(pose_b.rotation.inv_rotate(d));
        let w_a = *pose_a * proxy_a.vertex(index_a);
        let w_b = *pose_b * proxy_b.vertex(index_b);

        iter += 1;

        // a duplicate support point means no further progress is possible
        let duplicate = (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if duplicate {
            break;
        }

        simplex.v[simplex.count] = SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 0.0,
            index_a,
            index_b,
        };
        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = (point_b - point_a).mag();
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;
        if dist > r_a + r_b && dist > f64::EPSILON {
            // shapes are still not overlapped, move the witness points to the outer surface
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalized();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // shapes are overlapped when radii are considered,
            // move the witness points to the middle
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// Check whether two shape children overlap, accounting for their skin radii.
pub fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    pose_a: &Pose,
    shape_b: &Shape,
    child_b: usize,
    pose_b: &Pose,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::new(shape_a, child_a),
        proxy_b: DistanceProxy::new(shape_b, child_b),
        pose_a: *pose_a,
        pose_b: *pose_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&input, &mut cache);
    output.distance < 10.0 * f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::shape::{Circle, Polygon};

    fn at(x: f64, y: f64) -> Pose {
        Pose::new(Vec2::new(x, y), m::Rot::identity())
    }

    fn boxes_input(offset: Vec2, angle: f64) -> DistanceInput {
        let b = Shape::from(Polygon::new_box(1.0, 1.0).unwrap());
        DistanceInput {
            proxy_a: DistanceProxy::new(&b, 0),
            proxy_b: DistanceProxy::new(&b, 0),
            pose_a: Pose::identity(),
            pose_b: Pose::new(offset, m::Rot::from_angle(angle)),
            use_radii: false,
        }
    }

    #[test]
    fn separated_boxes() {
        let input = boxes_input(Vec2::new(5.0, 0.5), 0.0);
        let mut cache = SimplexCache::default();
        let output = distance(&input, &mut cache);
        assert!((output.distance - 3.0).abs() < 1e-9);
        assert!((output.point_a.x - 1.0).abs() < 1e-9);
        assert!((output.point_b.x - 4.0).abs() < 1e-9);
        assert!(output.iterations <= MAX_ITERS);

        // a warm started second call converges at least as quickly
        let again = distance(&input, &mut cache);
        assert!((again.distance - 3.0).abs() < 1e-9);
        assert!(again.iterations <= output.iterations);
    }

    #[test]
    fn rotated_box_corner() {
        // corner of the rotated box points at the face of the other
        let offset = 1.0 + 2.0f64.sqrt() + 0.5;
        let input = boxes_input(Vec2::new(offset, 0.0), std::f64::consts::FRAC_PI_4);
        let output = distance(&input, &mut SimplexCache::default());
        assert!((output.distance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn overlapping_shapes_have_zero_distance() {
        let input = boxes_input(Vec2::new(1.5, 0.3), 0.2);
        let output = distance(&input, &mut SimplexCache::default());
        assert!(output.distance < 1e-9);
    }

    #[test]
    fn radii_are_subtracted() {
        let c = Shape::from(Circle::new(0.5).unwrap());
        let input = DistanceInput {
            proxy_a: DistanceProxy::new(&c, 0),
            proxy_b: DistanceProxy::new(&c, 0),
            pose_a: at(0.0, 0.0),
            pose_b: at(3.0, 4.0),
            use_radii: true,
        };
        let output = distance(&input, &mut SimplexCache::default());
        assert!((output.distance - 4.0).abs() < 1e-12);
        assert!((output.point_a - Vec2::new(0.3, 0.4)).mag() < 1e-12);

        assert!(!test_overlap(&c, 0, &at(0.0, 0.0), &c, 0, &at(1.1, 0.0)));
        assert!(test_overlap(&c, 0, &at(0.0, 0.0), &c, 0, &at(0.9, 0.0)));
    }
}
