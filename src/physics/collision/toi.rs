//! Time of impact between two moving shapes using conservative advancement
//! with separating axes from GJK.

use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::{
    math::{self as m, Sweep, Vec2},
    settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES},
};

#[derive(Clone, Copy, Debug)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Upper bound of the sweep interval, in [0,1].
    pub t_max: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToiState {
    /// The root finder ran out of iterations.
    Failed,
    /// The shapes were already overlapping at the start of the interval.
    Overlapped,
    /// The shapes touch at `t`.
    Touching,
    /// The shapes don't touch during the interval.
    Separated,
}

#[derive(Clone, Copy, Debug)]
pub struct ToiOutput {
    pub state: ToiState,
    /// Fraction of the sweep at which the shapes touch.
    pub t: f64,
}

const MAX_ITERS: usize = 20;
const MAX_ROOT_ITERS: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Separating axis between two proxies, found from a GJK simplex
/// and evaluated over the sweeps.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f64,
    ) -> Self {
        debug_assert!(0 < cache.count && cache.count < 3);

        let pose_a = sweep_a.pose_at(t1);
        let pose_b = sweep_b.pose_at(t1);

        let mut f = Self {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            kind: SeparationKind::Points,
            local_point: Vec2::zero(),
            axis: Vec2::zero(),
        };

        if cache.count == 1 {
            let point_a = pose_a * proxy_a.vertex(cache.index_a[0]);
            let point_b = pose_b * proxy_b.vertex(cache.index_b[0]);
            f.axis = (point_b - point_a).normalized();
            return f;
        }

        if cache.index_a[0] == cache.index_a[1] {
            // two points on B and one on A
            f.kind = SeparationKind::FaceB;
            let local_b1 = proxy_b.vertex(cache.index_b[0]);
            let local_b2 = proxy_b.vertex(cache.index_b[1]);

            f.axis = m::cross_vs(local_b2 - local_b1, 1.0).normalized();
            let normal = pose_b.rotation * f.axis;

            f.local_point = 0.5 * (local_b1 + local_b2);
            let point_b = pose_b * f.local_point;
            let point_a = pose_a * proxy_a.vertex(cache.index_a[0]);

            if (point_a - point_b).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        } else {
            // two points on A and one or two points on B
            f.kind = SeparationKind::FaceA;
            let local_a1 = proxy_a.vertex(cache.index_a[0]);
            let local_a2 = proxy_a.vertex(cache.index_a[1]);

            f.axis = m::cross_vs(local_a2 - local_a1, 1.0).normalized();
            let normal = pose_a.rotation * f.axis;

            f.local_point = 0.5 * (local_a1 + local_a2);
            let point_a = pose_a * f.local_point;
            let point_b = pose_b * proxy_b.vertex(cache.index_b[0]);

            if (point_b - point_a).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        }
        f
    }

    /// Find the deepest points at `t` along the axis. Returns their indices and separation.
    fn find_min_separation(&self, t: f64) -> (usize, usize, f64) {
        let pose_a = self.sweep_a.pose_at(t);
        let pose_b = self.sweep_b.pose_at(t);

        match self.kind {
            SeparationKind::Points => {
                let axis_a = pose_a.rotation.inv_rotate(self.axis);
                let axis_b = pose_b.rotation.inv_rotate(-self.axis);
                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);
                let point_a = pose_a * self.proxy_a.vertex(index_a);
                let point_b = pose_b * self.proxy_b.vertex(index_b);
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceA => {
                let normal = pose_a.rotation * self.axis;
                let point_a = pose_a * self.local_point;
                let axis_b = pose_b.rotation.inv_rotate(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = pose_b * self.proxy_b.vertex(index_b);
                (usize::MAX, index_b, (point_b - point_a).dot(normal))
            }
            SeparationKind::FaceB => {
                let normal = pose_b.rotation * self.axis;
                let point_b = pose_b * self.local_point;
                let axis_a = pose_a.rotation.inv_rotate(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = pose_a * self.proxy_a.vertex(index_a);
                (index_a, usize::MAX, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of the given points at `t` along the axis.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f64) -> f64 {
        let pose_a = self.sweep_a.pose_at(t);
        let pose_b = self.sweep_b.pose_at(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = pose_a * self.proxy_a.vertex(index_a);
                let point_b = pose_b * self.proxy_b.vertex(index_b);
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = pose_a.rotation * self.axis;
                let point_a = pose_a * self.local_point;
                let point_b = pose_b * self.proxy_b.vertex(index_b);
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = pose_b.rotation * self.axis;
                let point_b = pose_b * self.local_point;
                let point_a = pose_a * self.proxy_a.vertex(index_a);
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Compute the upper bound on time before two shapes penetrate.
///
/// Time is represented as a fraction in [0, `t_max`].
/// Uses conservative advancement: GJK finds a separating axis,
/// then a root finder advances time until the deepest points on that axis
/// come within a small target distance of each other.
/// This may miss collisions where the shapes pass through each other
/// in a single rotation, but guarantees no tunneling for translation.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let _span = tracy_span!("time of impact", "time_of_impact");

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    // large rotations can make the root finder fail, so normalize the sweep angles
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut cache = SimplexCache::default();

    // the outer loop progressively attempts to compute new separating axes;
    // it terminates when an axis is repeated (no progress is made)
    for _ in 0..MAX_ITERS {
        let dist_input = DistanceInput {
            proxy_a: *proxy_a,
            proxy_b: *proxy_b,
            pose_a: sweep_a.pose_at(t1),
            pose_b: sweep_b.pose_at(t1),
            use_radii: false,
        };
        let dist_output = distance(&dist_input, &mut cache);

        // if the shapes are overlapped, we give up on continuous collision
        if dist_output.distance <= 0.0 {
            return ToiOutput {
                state: ToiState::Overlapped,
                t: 0.0,
            };
        }

        if dist_output.distance < target + tolerance {
            // victory
            return ToiOutput {
                state: ToiState::Touching,
                t: t1,
            };
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // resolve the deepest point on the separating axis.
        // there can be several, so loop until a root is found for each
        let mut t2 = t_max;
        for _ in 0..MAX_POLYGON_VERTICES {
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // final configuration is separated
            if s2 > target + tolerance {
                return ToiOutput {
                    state: ToiState::Separated,
                    t: t_max,
                };
            }

            // has the separation reached tolerance?
            if s2 > target - tolerance {
                // advance the sweeps
                t1 = t2;
                break;
            }

            // compute the initial separation of the witness points
            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // check for initial overlap; this might happen if the root finder runs out of iterations
            if s1 < target - tolerance {
                return ToiOutput {
                    state: ToiState::Failed,
                    t: t1,
                };
            }

            // check for touching
            if s1 <= target + tolerance {
                // victory, t1 should hold the TOI (could be 0)
                return ToiOutput {
                    state: ToiState::Touching,
                    t: t1,
                };
            }

            // 1D root of f(t) - target = 0, mixing bisection and secant steps
            let mut a1 = t1;
            let mut a2 = t2;
            for root_iter in 0..MAX_ROOT_ITERS {
                let t = if root_iter & 1 == 1 {
                    // secant rule to improve convergence
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // ensure we continue to bracket the root
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }
            }
        }
    }

    log::debug!("time of impact did not converge");
    ToiOutput {
        state: ToiState::Failed,
        t: t1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::shape::{Circle, Polygon, Shape};

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            c0: from,
            c: to,
            ..Default::default()
        }
    }

    fn circle_input(from: Vec2, to: Vec2) -> ToiInput {
        let c = Shape::from(Circle::new(0.5).unwrap());
        ToiInput {
            proxy_a: DistanceProxy::new(&c, 0),
            proxy_b: DistanceProxy::new(&c, 0),
            sweep_a: Sweep::default(),
            sweep_b: linear_sweep(from, to),
            t_max: 1.0,
        }
    }

    #[test]
    fn fast_circle_hits_static_circle() {
        let output = time_of_impact(&circle_input(Vec2::new(10.0, 0.0), Vec2::new(-10.0, 0.0)));
        assert_eq!(output.state, ToiState::Touching);
        // centres are one radius sum minus the target slop apart at impact
        let expected = (10.0 - (1.0 - 3.0 * LINEAR_SLOP)) / 20.0;
        assert!((output.t - expected).abs() < 1e-3, "t = {}", output.t);
    }

    #[test]
    fn circles_that_never_meet_are_separated() {
        let output = time_of_impact(&circle_input(Vec2::new(10.0, 0.0), Vec2::new(5.0, 0.0)));
        assert_eq!(output.state, ToiState::Separated);
        assert_eq!(output.t, 1.0);

        // passing by at a distance
        let output = time_of_impact(&circle_input(Vec2::new(10.0, 2.0), Vec2::new(-10.0, 2.0)));
        assert_eq!(output.state, ToiState::Separated);
    }

    #[test]
    fn already_touching_at_start() {
        let output = time_of_impact(&circle_input(Vec2::new(0.98, 0.0), Vec2::new(5.0, 0.0)));
        assert_eq!(output.state, ToiState::Touching);
        assert_eq!(output.t, 0.0);
    }

    #[test]
    fn box_does_not_tunnel_through_thin_wall() {
        let wall = Shape::from(Polygon::new_box(0.1, 5.0).unwrap());
        let bullet = Shape::from(Polygon::new_box(0.25, 0.25).unwrap());
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&wall, 0),
            proxy_b: DistanceProxy::new(&bullet, 0),
            sweep_a: Sweep::default(),
            sweep_b: linear_sweep(Vec2::new(-10.0, 0.3), Vec2::new(10.0, 0.3)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);
        assert!(output.t > 0.0 && output.t < 1.0);

        // the gap between the polygon cores at impact is close to the target
        let x = -10.0 + 20.0 * output.t;
        let gap = -0.1 - (x + 0.25);
        assert!(gap > 0.0 && gap < 2.0 * LINEAR_SLOP, "gap = {}", gap);
    }
}
