use super::{collision::MassData, ContactEdge, FixtureKey, Velocity};
use crate::math::{self as m, Pose, Rot, Sweep, Vec2};

/// How a body responds to forces and collisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    /// Zero velocity, infinite mass, moved only manually.
    #[default]
    Static,
    /// Moves according to its velocity but isn't affected by forces or collisions.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

/// Parameters to create a [`Body`][self::Body] with.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BodyDef {
    pub body_type: BodyType,
    /// World position of the body origin.
    pub position: [f64; 2],
    /// World angle of the body in radians.
    pub angle: f64,
    /// Linear velocity of the body origin in world coordinates.
    pub linear_velocity: [f64; 2],
    pub angular_velocity: f64,
    /// Reduces linear velocity over time, roughly as a fraction per second.
    pub linear_damping: f64,
    pub angular_damping: f64,
    /// Set to false to keep this body from ever falling asleep.
    pub allow_sleep: bool,
    pub awake: bool,
    /// Prevents the body from rotating, useful for characters.
    pub fixed_rotation: bool,
    /// Fast-moving body that should be prevented from tunneling through
    /// other dynamic bodies. Tunneling through static and kinematic bodies
    /// is prevented for all dynamic bodies regardless of this flag.
    pub bullet: bool,
    /// Disabled bodies don't collide and aren't simulated.
    pub enabled: bool,
    /// Multiplier of the gravity applied to this body.
    pub gravity_scale: f64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: [0.0; 2],
            angle: 0.0,
            linear_velocity: [0.0; 2],
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
        }
    }
}

impl BodyDef {
    #[inline]
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Self::default()
        }
    }

    #[inline]
    pub fn new_static() -> Self {
        Self::new(BodyType::Static)
    }

    #[inline]
    pub fn new_kinematic() -> Self {
        Self::new(BodyType::Kinematic)
    }

    #[inline]
    pub fn new_dynamic() -> Self {
        Self::new(BodyType::Dynamic)
    }

    /// Set the position of the body in a builder-like chain.
    pub fn with_position(mut self, position: impl Into<[f64; 2]>) -> Self {
        self.position = position.into();
        self
    }

    pub fn with_angle(mut self, angle: m::Angle) -> Self {
        self.angle = angle.rad();
        self
    }

    /// Set the velocity of the body in a builder-like chain.
    pub fn with_velocity(mut self, vel: Velocity) -> Self {
        self.linear_velocity = [vel.linear.x, vel.linear.y];
        self.angular_velocity = vel.angular;
        self
    }

    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed_rotation: bool) -> Self {
        self.fixed_rotation = fixed_rotation;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f64) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_allow_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A rigid body. Its mass comes from the fixtures attached to it.
///
/// Bodies are created through [`World::create_body`][crate::World::create_body].
/// Operations that only affect the body itself are methods here;
/// ones that also need to update fixtures or contacts
/// (e.g. [`set_transform`][crate::World::set_transform]) are on the world.
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,
    /// Pose of the body origin.
    pub(crate) pose: Pose,
    /// Motion of the centre of mass over the current step.
    pub(crate) sweep: Sweep,
    pub(crate) velocity: Velocity,
    pub(crate) force: Vec2,
    pub(crate) torque: f64,

    pub(crate) mass: f64,
    pub(crate) inv_mass: f64,
    /// Rotational inertia about the centre of mass.
    pub(crate) inertia: f64,
    pub(crate) inv_inertia: f64,

    pub(crate) linear_damping: f64,
    pub(crate) angular_damping: f64,
    pub(crate) gravity_scale: f64,
    pub(crate) sleep_time: f64,

    pub(crate) awake: bool,
    pub(crate) allow_sleep: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) enabled: bool,

    // working state of the solver
    pub(crate) in_island: bool,
    pub(crate) island_index: usize,

    pub(crate) fixtures: Vec<FixtureKey>,
    pub(crate) contact_edges: Vec<ContactEdge>,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let position = Vec2::from(def.position);
        let rotation = Rot::from_angle(def.angle);
        let is_dynamic = def.body_type == BodyType::Dynamic;
        Self {
            body_type: def.body_type,
            pose: Pose::new(position, rotation),
            sweep: Sweep {
                local_center: Vec2::zero(),
                c0: position,
                c: position,
                a0: def.angle,
                a: def.angle,
                alpha0: 0.0,
            },
            velocity: Velocity {
                linear: Vec2::from(def.linear_velocity),
                angular: def.angular_velocity,
            },
            force: Vec2::zero(),
            torque: 0.0,
            // dynamic bodies get unit mass until fixtures are added
            mass: if is_dynamic { 1.0 } else { 0.0 },
            inv_mass: if is_dynamic { 1.0 } else { 0.0 },
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            awake: def.awake,
            allow_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            in_island: false,
            island_index: 0,
            fixtures: Vec::new(),
            contact_edges: Vec::new(),
        }
    }

    //
    // getters
    //

    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Pose of the body origin in world space.
    #[inline]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// World position of the body origin.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pose.translation
    }

    /// Current angle in radians.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.sweep.a
    }

    /// World position of the centre of mass.
    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Centre of mass in body-local coordinates.
    #[inline]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    #[inline]
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    /// Linear velocity of the centre of mass.
    #[inline]
    pub fn linear_velocity(&self) -> Vec2 {
        self.velocity.linear
    }

    #[inline]
    pub fn angular_velocity(&self) -> f64 {
        self.velocity.angular
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Rotational inertia about the body origin.
    #[inline]
    pub fn inertia(&self) -> f64 {
        self.inertia + self.mass * self.sweep.local_center.mag_sq()
    }

    #[inline]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    #[inline]
    pub fn is_sleeping_allowed(&self) -> bool {
        self.allow_sleep
    }

    #[inline]
    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    #[inline]
    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn gravity_scale(&self) -> f64 {
        self.gravity_scale
    }

    #[inline]
    pub fn fixtures(&self) -> &[FixtureKey] {
        &self.fixtures
    }

    /// The contacts this body is part of, with the other body of each.
    #[inline]
    pub fn contact_edges(&self) -> &[ContactEdge] {
        &self.contact_edges
    }

    //
    // transformations
    //

    /// Transform a point from body-local to world coordinates.
    #[inline]
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.pose * local_point
    }

    /// Rotate a vector from body-local to world coordinates.
    #[inline]
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.pose.rotation * local_vector
    }

    #[inline]
    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.pose.inv_transform(world_point)
    }

    #[inline]
    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.pose.rotation.inv_rotate(world_vector)
    }

    /// Velocity of a world point attached to this body.
    #[inline]
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.velocity.point_velocity(world_point - self.sweep.c)
    }

    #[inline]
    pub fn linear_velocity_from_local_point(&self, local_point: Vec2) -> Vec2 {
        self.linear_velocity_from_world_point(self.world_point(local_point))
    }

    //
    // setters that don't affect anything outside the body
    //

    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.mag_sq() > 0.0 {
            self.set_awake(true);
        }
        self.velocity.linear = v;
    }

    pub fn set_angular_velocity(&mut self, w: f64) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.velocity.angular = w;
    }

    /// Wake the body up or put it to sleep.
    /// A sleeping body has zero velocity and no accumulated forces.
    pub fn set_awake(&mut self, awake: bool) {
        if awake {
            if !self.awake {
                self.awake = true;
                self.sleep_time = 0.0;
            }
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.velocity = Velocity::default();
            self.force = Vec2::zero();
            self.torque = 0.0;
        }
    }

    pub fn set_sleeping_allowed(&mut self, allowed: bool) {
        self.allow_sleep = allowed;
        if !allowed {
            self.set_awake(true);
        }
    }

    pub fn set_bullet(&mut self, bullet: bool) {
        self.bullet = bullet;
    }

    pub fn set_damping(&mut self, linear: f64, angular: f64) {
        self.linear_damping = linear;
        self.angular_damping = angular;
    }

    pub fn set_gravity_scale(&mut self, scale: f64) {
        self.gravity_scale = scale;
    }

    //
    // forces
    //

    /// Apply a force at a world point.
    /// If the force is not applied at the centre of mass, it also generates a torque.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_force(wake) {
            return;
        }
        self.force += force;
        self.torque += m::cross(point - self.sweep.c, force);
    }

    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.prepare_for_force(wake) {
            return;
        }
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: f64, wake: bool) {
        if !self.prepare_for_force(wake) {
            return;
        }
        self.torque += torque;
    }

    /// Apply an impulse at a world point, immediately modifying the velocity.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_force(wake) {
            return;
        }
        self.velocity.linear += self.inv_mass * impulse;
        self.velocity.angular += self.inv_inertia * m::cross(point - self.sweep.c, impulse);
    }

    pub fn apply_angular_impulse(&mut self, impulse: f64, wake: bool) {
        if !self.prepare_for_force(wake) {
            return;
        }
        self.velocity.angular += self.inv_inertia * impulse;
    }

    /// Returns whether a force should be accumulated.
    /// Forces on sleeping bodies are dropped unless `wake` is set.
    fn prepare_for_force(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        self.awake
    }

    #[inline]
    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec2::zero();
        self.torque = 0.0;
    }

    //
    // internals
    //

    /// Update the pose from the end state of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.pose.rotation = Rot::from_angle(self.sweep.a);
        self.pose.translation = self.sweep.c - self.pose.rotation * self.sweep.local_center;
    }

    /// Advance the sweep to a fraction of the step and place the body there.
    pub(crate) fn advance(&mut self, alpha: f64) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Pose of the body at the start of the step.
    #[inline]
    pub(crate) fn start_pose(&self) -> Pose {
        let rotation = Rot::from_angle(self.sweep.a0);
        Pose::new(self.sweep.c0 - rotation * self.sweep.local_center, rotation)
    }

    /// Whether this body can touch the other at all.
    /// At least one of the bodies must be dynamic.
    #[inline]
    pub(crate) fn should_collide(&self, other: &Body) -> bool {
        self.body_type == BodyType::Dynamic || other.body_type == BodyType::Dynamic
    }

    /// Set the mass properties from the accumulated mass of the given fixture shapes.
    /// The iterator yields `(density, mass data)` pairs.
    pub(crate) fn set_mass_from(&mut self, masses: impl Iterator<Item = (f64, MassData)>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::zero();

        // static and kinematic bodies have zero mass
        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.pose.translation;
            self.sweep.c = self.pose.translation;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::zero();
        for (density, md) in masses {
            if density == 0.0 {
                continue;
            }
            self.mass += md.mass;
            local_center += md.mass * md.center;
            self.inertia += md.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // force all dynamic bodies to have a positive mass
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.fixed_rotation {
            // centre the inertia about the centre of mass
            self.inertia -= self.mass * local_center.mag_sq();
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // move the centre of mass
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.pose * local_center;
        self.sweep.c0 = self.sweep.c;

        // keep the velocity of the body origin unchanged
        self.velocity.linear += m::cross_sv(self.velocity.angular, self.sweep.c - old_center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_mass(offset: Vec2) -> MassData {
        // 2x2 box with density 1
        let mass = 4.0;
        MassData {
            mass,
            center: offset,
            inertia: mass * (8.0 / 12.0) + mass * offset.mag_sq(),
        }
    }

    #[test]
    fn mass_from_fixtures() {
        let mut body = Body::new(&BodyDef::new_dynamic().with_position([1.0, 2.0]));
        body.set_mass_from([(1.0, unit_box_mass(Vec2::new(1.0, 0.0)))].into_iter());

        assert!((body.mass() - 4.0).abs() < 1e-12);
        assert!((body.local_center() - Vec2::new(1.0, 0.0)).mag() < 1e-12);
        assert!((body.world_center() - Vec2::new(2.0, 2.0)).mag() < 1e-12);
        // inertia is stored about the centre of mass
        assert!((body.inertia - 4.0 * 8.0 / 12.0).abs() < 1e-12);
        assert!((body.inertia() - (4.0 * 8.0 / 12.0 + 4.0)).abs() < 1e-12);

        // zero-density fixtures are ignored and the body falls back to unit mass
        body.set_mass_from([(0.0, unit_box_mass(Vec2::zero()))].into_iter());
        assert_eq!(body.mass(), 1.0);
        assert_eq!(body.inv_inertia, 0.0);
    }

    #[test]
    fn fixed_rotation_has_no_inertia() {
        let mut body = Body::new(&BodyDef::new_dynamic().with_fixed_rotation(true));
        body.set_mass_from([(1.0, unit_box_mass(Vec2::zero()))].into_iter());
        assert_eq!(body.inv_inertia, 0.0);
        body.apply_angular_impulse(10.0, true);
        assert_eq!(body.angular_velocity(), 0.0);
    }

    #[test]
    fn forces_only_affect_awake_dynamic_bodies() {
        let mut stat = Body::new(&BodyDef::new_static());
        stat.apply_force_to_center(Vec2::new(1.0, 0.0), true);
        assert_eq!(stat.force, Vec2::zero());

        let mut body = Body::new(&BodyDef::new_dynamic().with_awake(false));
        body.apply_force_to_center(Vec2::new(1.0, 0.0), false);
        assert_eq!(body.force, Vec2::zero());
        assert!(!body.is_awake());

        // off-centre force generates torque
        body.apply_force(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0), true);
        assert!(body.is_awake());
        assert_eq!(body.force, Vec2::new(0.0, 1.0));
        assert!((body.torque - 1.0).abs() < 1e-12);

        body.set_awake(false);
        assert_eq!(body.force, Vec2::zero());
        assert_eq!(body.torque, 0.0);
    }

    #[test]
    fn point_transformations() {
        let body = Body::new(
            &BodyDef::new_dynamic()
                .with_position([1.0, 0.0])
                .with_angle(m::Angle::Deg(90.0))
                .with_velocity(Velocity {
                    linear: Vec2::zero(),
                    angular: 1.0,
                }),
        );
        let world = body.world_point(Vec2::new(1.0, 0.0));
        assert!((world - Vec2::new(1.0, 1.0)).mag() < 1e-12);
        assert!((body.local_point(world) - Vec2::new(1.0, 0.0)).mag() < 1e-12);
        // a point one unit above the centre moves left when rotating counterclockwise
        let v = body.linear_velocity_from_world_point(world);
        assert!((v - Vec2::new(-1.0, 0.0)).mag() < 1e-12);
    }
}
