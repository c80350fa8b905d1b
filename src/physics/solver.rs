//! Sequential impulse solver for contact constraints.
//!
//! Works on the working buffers of a single island: body positions and
//! velocities are indexed by each body's `island_index`.

use super::{
    collision::{Manifold, ManifoldType, WorldManifold},
    contact::ContactImpulse,
    ContactKey, EntitySet, Velocity,
};
use crate::{
    math::{self as m, Mat22, Pose, Rot, Vec2},
    settings::{WorldSettings, LINEAR_SLOP, MAX_MANIFOLD_POINTS},
};

use itertools::izip;

/// Block solving is only done if the condition number of the
/// 2x2 effective mass matrix is below this.
const MAX_CONDITION_NUMBER: f64 = 1000.0;

/// Timing information of a single step or sub-step.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimeStep {
    pub dt: f64,
    pub inv_dt: f64,
    /// `dt` of this step times `inv_dt` of the previous one,
    /// used to scale warm starting impulses when the step length changes.
    pub dt_ratio: f64,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

/// Position of a body's centre of mass and its angle.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Position {
    pub c: Vec2,
    pub a: f64,
}

impl Position {
    /// The body origin pose, given the centre of mass in local coordinates.
    #[inline]
    pub fn pose(&self, local_center: Vec2) -> Pose {
        let rotation = Rot::from_angle(self.a);
        Pose::new(self.c - rotation * local_center, rotation)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f64,
    tangent_impulse: f64,
    normal_mass: f64,
    tangent_mass: f64,
    velocity_bias: f64,
}

#[derive(Clone, Copy, Debug)]
struct VelocityConstraint {
    contact: ContactKey,
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    point_count: usize,
    normal: Vec2,
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f64,
    inv_mass_b: f64,
    inv_i_a: f64,
    inv_i_b: f64,
    friction: f64,
    restitution: f64,
}

impl VelocityConstraint {
    #[inline]
    fn points(&self) -> &[VelocityConstraintPoint] {
        &self.points[..self.point_count]
    }
}

#[derive(Clone, Copy, Debug)]
struct PositionConstraint {
    manifold: Manifold,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f64,
    inv_mass_b: f64,
    inv_i_a: f64,
    inv_i_b: f64,
    local_center_a: Vec2,
    local_center_b: Vec2,
    radius_a: f64,
    radius_b: f64,
}

/// Apply an impulse `p` at offsets `r_a` and `r_b` in opposite directions.
#[inline]
fn apply_impulse(
    vel_a: &mut Velocity,
    vel_b: &mut Velocity,
    (inv_mass_a, inv_i_a): (f64, f64),
    (inv_mass_b, inv_i_b): (f64, f64),
    r_a: Vec2,
    r_b: Vec2,
    p: Vec2,
) {
    vel_a.linear -= inv_mass_a * p;
    vel_a.angular -= inv_i_a * m::cross(r_a, p);
    vel_b.linear += inv_mass_b * p;
    vel_b.angular += inv_i_b * m::cross(r_b, p);
}

/// Solver for the touching contacts of one island.
pub(crate) struct ContactSolver {
    velocity_threshold: f64,
    baumgarte: f64,
    toi_baumgarte: f64,
    max_linear_correction: f64,
    velocity_constraints: Vec<VelocityConstraint>,
    position_constraints: Vec<PositionConstraint>,
}

impl ContactSolver {
    /// Gather the constraint data of the given contacts.
    /// All bodies of the contacts must have been assigned an island index.
    pub fn new(
        step: TimeStep,
        settings: &WorldSettings,
        set: &EntitySet,
        contacts: &[ContactKey],
    ) -> Self {
        let mut velocity_constraints = Vec::with_capacity(contacts.len());
        let mut position_constraints = Vec::with_capacity(contacts.len());

        for &key in contacts {
            let contact = set.contact(key);
            let body_a = set.body(contact.body_a);
            let body_b = set.body(contact.body_b);
            let manifold = contact.manifold;
            debug_assert!(!manifold.is_empty());

            let mut vc = VelocityConstraint {
                contact: key,
                points: Default::default(),
                point_count: manifold.point_count,
                normal: Vec2::zero(),
                normal_mass: Mat22::default(),
                k: Mat22::default(),
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                friction: contact.friction,
                restitution: contact.restitution,
            };
            if step.warm_starting {
                for (vcp, mp) in vc.points.iter_mut().zip(manifold.points()) {
                    vcp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
            }
            velocity_constraints.push(vc);

            position_constraints.push(PositionConstraint {
                manifold,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                radius_a: set.fixture(contact.fixture_a).shape.radius(),
                radius_b: set.fixture(contact.fixture_b).shape.radius(),
            });
        }

        Self {
            velocity_threshold: settings.velocity_threshold,
            baumgarte: settings.baumgarte,
            toi_baumgarte: settings.toi_baumgarte,
            max_linear_correction: settings.max_linear_correction,
            velocity_constraints,
            position_constraints,
        }
    }

    /// Compute the world-space anchors, effective masses and restitution bias
    /// of every constraint from the positions at the start of the step.
    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        let _span = tracy_span!("initialize contact constraints", "initialize_velocity_constraints");

        for (vc, pc) in izip!(&mut self.velocity_constraints, &self.position_constraints) {
            let pos_a = positions[vc.index_a];
            let pos_b = positions[vc.index_b];
            let vel_a = velocities[vc.index_a];
            let vel_b = velocities[vc.index_b];
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let world_manifold = WorldManifold::new(
                &pc.manifold,
                &pos_a.pose(pc.local_center_a),
                pc.radius_a,
                &pos_b.pose(pc.local_center_b),
                pc.radius_b,
            );
            vc.normal = world_manifold.normal;
            let tangent = m::cross_vs(vc.normal, 1.0);

            for (vcp, &point) in vc.points[..vc.point_count]
                .iter_mut()
                .zip(world_manifold.points())
            {
                vcp.r_a = point - pos_a.c;
                vcp.r_b = point - pos_b.c;

                let rn_a = m::cross(vcp.r_a, vc.normal);
                let rn_b = m::cross(vcp.r_b, vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = m::cross(vcp.r_a, tangent);
                let rt_b = m::cross(vcp.r_b, tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // restitution only applies to fast enough approach
                let v_rel = vc
                    .normal
                    .dot(vel_b.point_velocity(vcp.r_b) - vel_a.point_velocity(vcp.r_a));
                vcp.velocity_bias = if v_rel < -self.velocity_threshold {
                    -vc.restitution * v_rel
                } else {
                    0.0
                };
            }

            if vc.point_count == 2 {
                let (p1, p2) = (vc.points[0], vc.points[1]);
                let rn1_a = m::cross(p1.r_a, vc.normal);
                let rn1_b = m::cross(p1.r_b, vc.normal);
                let rn2_a = m::cross(p2.r_a, vc.normal);
                let rn2_b = m::cross(p2.r_b, vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // the points are redundant, solve only one of them
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Apply the impulses carried over from the previous step.
    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let tangent = m::cross_vs(vc.normal, 1.0);
            let mut vel_a = velocities[vc.index_a];
            let mut vel_b = velocities[vc.index_b];
            for vcp in vc.points() {
                let p = vcp.normal_impulse * vc.normal + vcp.tangent_impulse * tangent;
                apply_impulse(
                    &mut vel_a,
                    &mut vel_b,
                    (vc.inv_mass_a, vc.inv_i_a),
                    (vc.inv_mass_b, vc.inv_i_b),
                    vcp.r_a,
                    vcp.r_b,
                    p,
                );
            }
            velocities[vc.index_a] = vel_a;
            velocities[vc.index_b] = vel_b;
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let mass_a = (vc.inv_mass_a, vc.inv_i_a);
            let mass_b = (vc.inv_mass_b, vc.inv_i_b);
            let mut vel_a = velocities[vc.index_a];
            let mut vel_b = velocities[vc.index_b];
            let normal = vc.normal;
            let tangent = m::cross_vs(normal, 1.0);

            // friction first because non-penetration is more important
            for vcp in vc.points[..vc.point_count].iter_mut() {
                let dv = vel_b.point_velocity(vcp.r_b) - vel_a.point_velocity(vcp.r_a);
                let lambda = -vcp.tangent_mass * dv.dot(tangent);

                let max_friction = vc.friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                apply_impulse(&mut vel_a, &mut vel_b, mass_a, mass_b, vcp.r_a, vcp.r_b, lambda * tangent);
            }

            if vc.point_count == 1 {
                let vcp = &mut vc.points[0];
                let dv = vel_b.point_velocity(vcp.r_b) - vel_a.point_velocity(vcp.r_a);
                let lambda = -vcp.normal_mass * (dv.dot(normal) - vcp.velocity_bias);

                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                apply_impulse(&mut vel_a, &mut vel_b, mass_a, mass_b, vcp.r_a, vcp.r_b, lambda * normal);
            } else {
                // solve both points together as a linear complementarity problem,
                // finding x with vn = A * x + b, vn >= 0, x >= 0, vn_i * x_i = 0
                let (cp1, cp2) = (vc.points[0], vc.points[1]);
                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let dv1 = vel_b.point_velocity(cp1.r_b) - vel_a.point_velocity(cp1.r_a);
                let dv2 = vel_b.point_velocity(cp2.r_b) - vel_a.point_velocity(cp2.r_a);
                let b = Vec2::new(
                    dv1.dot(normal) - cp1.velocity_bias,
                    dv2.dot(normal) - cp2.velocity_bias,
                ) - vc.k * a;

                if let Some(x) = solve_block(vc, b) {
                    let d = x - a;
                    apply_impulse(&mut vel_a, &mut vel_b, mass_a, mass_b, cp1.r_a, cp1.r_b, d.x * normal);
                    apply_impulse(&mut vel_a, &mut vel_b, mass_a, mass_b, cp2.r_a, cp2.r_b, d.y * normal);
                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
            }

            velocities[vc.index_a] = vel_a;
            velocities[vc.index_b] = vel_b;
        }
    }

    /// Write the accumulated impulses back into the contact manifolds
    /// for warm starting the next step.
    pub fn store_impulses(&self, set: &mut EntitySet) {
        for vc in &self.velocity_constraints {
            let manifold = &mut set.contact_mut(vc.contact).manifold;
            for (mp, vcp) in manifold.points_mut().iter_mut().zip(vc.points()) {
                mp.normal_impulse = vcp.normal_impulse;
                mp.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// The impulses applied to each contact, for reporting to listeners.
    pub fn impulses(&self) -> impl Iterator<Item = (ContactKey, ContactImpulse)> + '_ {
        self.velocity_constraints.iter().map(|vc| {
            let mut impulse = ContactImpulse {
                count: vc.point_count,
                ..Default::default()
            };
            for (i, vcp) in vc.points().iter().enumerate() {
                impulse.normal_impulses[i] = vcp.normal_impulse;
                impulse.tangent_impulses[i] = vcp.tangent_impulse;
            }
            (vc.contact, impulse)
        })
    }

    /// Push overlapping shapes apart with pseudo-impulses.
    /// Returns true when the remaining penetration is within tolerance.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let min_separation = self.solve_positions(positions, self.baumgarte, None);
        // we can't expect min_separation >= -LINEAR_SLOP because
        // we don't push the separation above -LINEAR_SLOP
        min_separation >= -3.0 * LINEAR_SLOP
    }

    /// Like [`solve_position_constraints`][Self::solve_position_constraints],
    /// but only moves the two bodies involved in a time of impact event.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let min_separation =
            self.solve_positions(positions, self.toi_baumgarte, Some((toi_index_a, toi_index_b)));
        min_separation >= -1.5 * LINEAR_SLOP
    }

    fn solve_positions(
        &self,
        positions: &mut [Position],
        baumgarte: f64,
        toi_bodies: Option<(usize, usize)>,
    ) -> f64 {
        let mut min_separation: f64 = 0.0;

        for pc in &self.position_constraints {
            // in a time of impact sub-step, every other body is treated as static
            let is_moving = |index: usize| match toi_bodies {
                Some((a, b)) => index == a || index == b,
                None => true,
            };
            let (m_a, i_a) = if is_moving(pc.index_a) {
                (pc.inv_mass_a, pc.inv_i_a)
            } else {
                (0.0, 0.0)
            };
            let (m_b, i_b) = if is_moving(pc.index_b) {
                (pc.inv_mass_b, pc.inv_i_b)
            } else {
                (0.0, 0.0)
            };

            let mut pos_a = positions[pc.index_a];
            let mut pos_b = positions[pc.index_b];

            for index in 0..pc.manifold.point_count {
                let pose_a = pos_a.pose(pc.local_center_a);
                let pose_b = pos_b.pose(pc.local_center_b);
                let (normal, point, separation) = position_solver_point(pc, &pose_a, &pose_b, index);

                let r_a = point - pos_a.c;
                let r_b = point - pos_b.c;

                min_separation = min_separation.min(separation);

                // allow some slop and keep corrections from getting too large
                let c = (baumgarte * (separation + LINEAR_SLOP))
                    .clamp(-self.max_linear_correction, 0.0);

                let rn_a = m::cross(r_a, normal);
                let rn_b = m::cross(r_b, normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = impulse * normal;

                pos_a.c -= m_a * p;
                pos_a.a -= i_a * m::cross(r_a, p);
                pos_b.c += m_b * p;
                pos_b.a += i_b * m::cross(r_b, p);
            }

            positions[pc.index_a] = pos_a;
            positions[pc.index_b] = pos_b;
        }

        min_separation
    }
}

/// Try the cases of the 2-point LCP in order:
/// both points active, only the first, only the second, neither.
/// Returns `None` if no case gives a valid solution,
/// which can happen due to numerical imprecision.
fn solve_block(vc: &VelocityConstraint, b: Vec2) -> Option<Vec2> {
    // case 1: vn = 0 for both
    let x = -(vc.normal_mass * b);
    if x.x >= 0.0 && x.y >= 0.0 {
        return Some(x);
    }

    // case 2: vn1 = 0, x2 = 0
    let x = Vec2::new(-vc.points[0].normal_mass * b.x, 0.0);
    let vn2 = vc.k.ex.y * x.x + b.y;
    if x.x >= 0.0 && vn2 >= 0.0 {
        return Some(x);
    }

    // case 3: vn2 = 0, x1 = 0
    let x = Vec2::new(0.0, -vc.points[1].normal_mass * b.y);
    let vn1 = vc.k.ey.x * x.y + b.x;
    if x.y >= 0.0 && vn1 >= 0.0 {
        return Some(x);
    }

    // case 4: x1 = x2 = 0
    if b.x >= 0.0 && b.y >= 0.0 {
        return Some(Vec2::zero());
    }

    None
}

/// World normal (pointing from A to B), point and separation
/// of one manifold point at the current positions.
fn position_solver_point(
    pc: &PositionConstraint,
    pose_a: &Pose,
    pose_b: &Pose,
    index: usize,
) -> (Vec2, Vec2, f64) {
    let manifold = &pc.manifold;
    let radii = pc.radius_a + pc.radius_b;
    match manifold.kind {
        ManifoldType::Circles => {
            let point_a = *pose_a * manifold.local_point;
            let point_b = *pose_b * manifold.points[0].local_point;
            let d = point_b - point_a;
            let normal = if d.mag_sq() > f64::EPSILON * f64::EPSILON {
                d.normalized()
            } else {
                Vec2::unit_x()
            };
            (normal, 0.5 * (point_a + point_b), d.dot(normal) - radii)
        }
        ManifoldType::FaceA => {
            let normal = pose_a.rotation * manifold.local_normal;
            let plane_point = *pose_a * manifold.local_point;
            let clip_point = *pose_b * manifold.points[index].local_point;
            let separation = (clip_point - plane_point).dot(normal) - radii;
            (normal, clip_point, separation)
        }
        ManifoldType::FaceB => {
            let normal = pose_b.rotation * manifold.local_normal;
            let plane_point = *pose_b * manifold.local_point;
            let clip_point = *pose_a * manifold.points[index].local_point;
            let separation = (clip_point - plane_point).dot(normal) - radii;
            (-normal, clip_point, separation)
        }
    }
}
