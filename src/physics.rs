//! Rigid body simulation: the [`World`] and everything stored in it.

use crate::{
    error::WorldError,
    math::{self as m, Pose, Rot, Vec2},
    settings::WorldSettings,
};

//

pub mod collision;
use collision::{
    time_of_impact, BroadPhase, DistanceProxy, MassData, RayCastInput, ToiInput, ToiState,
    WorldManifold, AABB,
};

mod entity_set;
pub use entity_set::{BodyKey, ContactKey, EntitySet, FixtureKey};

pub mod body;
pub use body::{Body, BodyDef, BodyType};

pub mod fixture;
use fixture::FixtureProxyRef;
pub use fixture::{Filter, Fixture, FixtureDef};

pub mod contact;
use contact::ContactManager;
pub use contact::{
    Contact, ContactEdge, ContactFilter, ContactImpulse, ContactListener, DefaultContactFilter,
};

pub mod forcefield;
pub use forcefield::ForceField;

pub mod hecs_sync;

mod island;
use island::Island;

mod solver;
use solver::TimeStep;

//

/// Velocity of an object.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Velocity {
    /// Linear velocity in metres per second.
    pub linear: Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    #[inline]
    pub fn point_velocity(&self, offset: Vec2) -> Vec2 {
        let tangent = m::left_normal(offset) * self.angular;
        self.linear + tangent
    }
}

/// Number of position iterations used to resolve a time of impact event.
const TOI_POSITION_ITERATIONS: usize = 20;

/// The physics world. Owns all bodies, fixtures and contacts,
/// and advances the simulation with [`step`][Self::step].
pub struct World {
    entity_set: EntitySet,
    contact_manager: ContactManager,
    pub settings: WorldSettings,
    island: Island,
    /// `1 / dt` of the previous step.
    inv_dt0: f64,
    /// Set when a fixture was created, new contacts are then found at the start of the next step.
    new_fixture: bool,
    /// False while time of impact events of the current step are still unsolved,
    /// which only happens with `sub_stepping` enabled.
    step_complete: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

impl World {
    pub fn new(settings: WorldSettings) -> Self {
        Self {
            entity_set: EntitySet::new(),
            contact_manager: ContactManager::default(),
            settings,
            island: Island::default(),
            inv_dt0: 0.0,
            new_fixture: false,
            step_complete: true,
        }
    }

    //
    // access
    //

    /// The storage of all bodies, fixtures and contacts.
    #[inline]
    pub fn entities(&self) -> &EntitySet {
        &self.entity_set
    }

    #[inline]
    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.entity_set.get_body(key)
    }

    /// Mutable access to a body for the operations that only affect the body itself,
    /// such as applying forces and setting velocities.
    #[inline]
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.entity_set.get_body_mut(key)
    }

    #[inline]
    pub fn fixture(&self, key: FixtureKey) -> Option<&Fixture> {
        self.entity_set.get_fixture(key)
    }

    #[inline]
    pub fn fixture_mut(&mut self, key: FixtureKey) -> Option<&mut Fixture> {
        self.entity_set.get_fixture_mut(key)
    }

    #[inline]
    pub fn contact(&self, key: ContactKey) -> Option<&Contact> {
        self.entity_set.get_contact(key)
    }

    #[inline]
    pub fn contact_mut(&mut self, key: ContactKey) -> Option<&mut Contact> {
        self.entity_set.get_contact_mut(key)
    }

    #[inline]
    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &Body)> {
        self.entity_set.bodies()
    }

    #[inline]
    pub fn fixtures(&self) -> impl Iterator<Item = (FixtureKey, &Fixture)> {
        self.entity_set.fixtures()
    }

    #[inline]
    pub fn contacts(&self) -> impl Iterator<Item = (ContactKey, &Contact)> {
        self.entity_set.contacts()
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.entity_set.body_count()
    }

    #[inline]
    pub fn contact_count(&self) -> usize {
        self.entity_set.contact_count()
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    /// Height of the broad phase tree.
    #[inline]
    pub fn tree_height(&self) -> i32 {
        self.contact_manager.broad_phase.tree().height()
    }

    /// Largest height difference between two siblings in the broad phase tree.
    #[inline]
    pub fn tree_balance(&self) -> i32 {
        self.contact_manager.broad_phase.tree().max_balance()
    }

    /// Sum of node perimeters divided by the root perimeter in the broad phase tree.
    #[inline]
    pub fn tree_quality(&self) -> f64 {
        self.contact_manager.broad_phase.tree().area_ratio()
    }

    /// The manifold of a contact in world space.
    pub fn world_manifold(&self, key: ContactKey) -> Option<WorldManifold> {
        let contact = self.entity_set.get_contact(key)?;
        Some(contact::world_manifold(&self.entity_set, contact))
    }

    /// Register a listener for contact events, replacing the previous one.
    pub fn set_contact_listener(&mut self, listener: impl ContactListener + Send + 'static) {
        self.contact_manager.listener = Some(Box::new(listener));
    }

    pub fn clear_contact_listener(&mut self) {
        self.contact_manager.listener = None;
    }

    /// Replace the filter that decides which fixtures can collide.
    pub fn set_contact_filter(&mut self, filter: impl ContactFilter + Send + 'static) {
        self.contact_manager.filter = Box::new(filter);
    }

    //
    // bodies
    //

    pub fn create_body(&mut self, def: &BodyDef) -> BodyKey {
        let key = self.entity_set.insert_body(Body::new(def));
        log::debug!("created {:?} body {:?}", def.body_type, key);
        key
    }

    /// Destroy a body along with its fixtures and contacts.
    /// Bodies touching it are woken up.
    pub fn destroy_body(&mut self, key: BodyKey) -> Result<(), WorldError> {
        let body = self.entity_set.get_body(key).ok_or(WorldError::NoSuchBody)?;
        let contacts: Vec<ContactKey> = body.contact_edges.iter().map(|e| e.contact).collect();
        for contact in contacts {
            self.contact_manager.destroy(&mut self.entity_set, contact);
        }

        let Some(body) = self.entity_set.bodies.remove(key.0) else {
            return Err(WorldError::NoSuchBody);
        };
        for fixture_key in body.fixtures {
            if let Some(mut fixture) = self.entity_set.fixtures.remove(fixture_key.0) {
                fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
            }
        }
        log::debug!("destroyed body {:?}", key);
        Ok(())
    }

    /// Attach a new fixture to a body.
    /// The body's mass is updated if the fixture has a positive density.
    pub fn create_fixture(
        &mut self,
        body_key: BodyKey,
        def: FixtureDef,
    ) -> Result<FixtureKey, WorldError> {
        if !(def.density.is_finite() && def.density >= 0.0) {
            return Err(WorldError::InvalidDensity(def.density));
        }
        let body = self
            .entity_set
            .get_body(body_key)
            .ok_or(WorldError::NoSuchBody)?;
        let (enabled, pose) = (body.enabled, body.pose);
        let has_mass = def.density > 0.0;

        let key = self.entity_set.insert_fixture(Fixture::new(body_key, def));
        if enabled {
            self.entity_set.fixture_mut(key).create_proxies(
                key,
                &mut self.contact_manager.broad_phase,
                &pose,
            );
        }
        self.entity_set.body_mut(body_key).fixtures.push(key);

        if has_mass {
            self.reset_mass_data(body_key)?;
        }

        // contacts for the new fixture are created at the start of the next step
        self.new_fixture = true;

        log::debug!("created fixture {:?} on body {:?}", key, body_key);
        Ok(key)
    }

    /// Remove a fixture from its body, destroying its contacts.
    pub fn destroy_fixture(&mut self, key: FixtureKey) -> Result<(), WorldError> {
        let fixture = self
            .entity_set
            .get_fixture(key)
            .ok_or(WorldError::NoSuchFixture)?;
        let body_key = fixture.body;

        let set = &self.entity_set;
        let contacts: Vec<ContactKey> = set
            .body(body_key)
            .contact_edges
            .iter()
            .map(|e| e.contact)
            .filter(|&c| {
                let c = set.contact(c);
                c.fixture_a == key || c.fixture_b == key
            })
            .collect();
        for contact in contacts {
            self.contact_manager.destroy(&mut self.entity_set, contact);
        }

        if let Some(mut fixture) = self.entity_set.fixtures.remove(key.0) {
            fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
        }
        self.entity_set
            .body_mut(body_key)
            .fixtures
            .retain(|&f| f != key);
        self.reset_mass_data(body_key)?;

        log::debug!("destroyed fixture {:?}", key);
        Ok(())
    }

    /// Recompute the mass, centre of mass and inertia of a body from its fixtures.
    /// Normally this is done automatically when fixtures are added or removed.
    pub fn reset_mass_data(&mut self, key: BodyKey) -> Result<(), WorldError> {
        let set = &mut self.entity_set;
        let body = set.get_body(key).ok_or(WorldError::NoSuchBody)?;
        let masses: Vec<(f64, MassData)> = body
            .fixtures
            .iter()
            .map(|&f| {
                let fixture = set.fixture(f);
                (fixture.density, fixture.shape.compute_mass(fixture.density))
            })
            .collect();
        set.body_mut(key).set_mass_from(masses.into_iter());
        Ok(())
    }

    /// Teleport a body to a new position and angle.
    /// Contacts are updated on the next step.
    pub fn set_transform(&mut self, key: BodyKey, position: Vec2, angle: f64) -> Result<(), WorldError> {
        let body = self
            .entity_set
            .get_body_mut(key)
            .ok_or(WorldError::NoSuchBody)?;
        body.pose = Pose::new(position, Rot::from_angle(angle));
        body.sweep.c = body.pose * body.sweep.local_center;
        body.sweep.a = angle;
        body.sweep.c0 = body.sweep.c;
        body.sweep.a0 = angle;

        let pose = body.pose;
        synchronize_fixtures(
            &mut self.entity_set,
            &mut self.contact_manager.broad_phase,
            key,
            &pose,
            &pose,
        );
        self.contact_manager.find_new_contacts(&mut self.entity_set);
        Ok(())
    }

    /// Change the type of a body, resetting its mass and destroying its contacts.
    pub fn set_type(&mut self, key: BodyKey, body_type: BodyType) -> Result<(), WorldError> {
        let body = self
            .entity_set
            .get_body_mut(key)
            .ok_or(WorldError::NoSuchBody)?;
        if body.body_type == body_type {
            return Ok(());
        }
        body.body_type = body_type;
        self.reset_mass_data(key)?;

        let body = self.entity_set.body_mut(key);
        if body_type == BodyType::Static {
            body.velocity = Velocity::default();
            body.sweep.a0 = body.sweep.a;
            body.sweep.c0 = body.sweep.c;
            let pose = body.pose;
            synchronize_fixtures(
                &mut self.entity_set,
                &mut self.contact_manager.broad_phase,
                key,
                &pose,
                &pose,
            );
        }

        let body = self.entity_set.body_mut(key);
        body.set_awake(true);
        body.clear_forces();

        self.destroy_body_contacts(key);

        // touch the proxies so that new contacts will be created when appropriate
        let set = &self.entity_set;
        for &f in &set.body(key).fixtures {
            for proxy in &set.fixture(f).proxies {
                self.contact_manager.broad_phase.touch_proxy(proxy.proxy_id);
            }
        }
        Ok(())
    }

    /// Enable or disable a body.
    /// A disabled body is not simulated and has no contacts or broad phase proxies.
    pub fn set_enabled(&mut self, key: BodyKey, enabled: bool) -> Result<(), WorldError> {
        let body = self
            .entity_set
            .get_body_mut(key)
            .ok_or(WorldError::NoSuchBody)?;
        if body.enabled == enabled {
            return Ok(());
        }
        body.enabled = enabled;
        let pose = body.pose;

        let EntitySet {
            bodies, fixtures, ..
        } = &mut self.entity_set;
        let broad_phase = &mut self.contact_manager.broad_phase;
        for &f in &bodies[key.0].fixtures {
            if enabled {
                fixtures[f.0].create_proxies(f, broad_phase, &pose);
            } else {
                fixtures[f.0].destroy_proxies(broad_phase);
            }
        }

        if enabled {
            // contacts are created the next time step
            self.new_fixture = true;
        } else {
            self.destroy_body_contacts(key);
        }
        Ok(())
    }

    /// Prevent or allow a body from rotating. Resets the mass data.
    pub fn set_fixed_rotation(&mut self, key: BodyKey, fixed: bool) -> Result<(), WorldError> {
        let body = self
            .entity_set
            .get_body_mut(key)
            .ok_or(WorldError::NoSuchBody)?;
        if body.fixed_rotation == fixed {
            return Ok(());
        }
        body.fixed_rotation = fixed;
        body.velocity.angular = 0.0;
        self.reset_mass_data(key)
    }

    //
    // fixtures
    //

    /// Set the collision filter of a fixture.
    /// Existing contacts are re-checked against the filter on the next step.
    pub fn set_filter(&mut self, key: FixtureKey, filter: Filter) -> Result<(), WorldError> {
        let fixture = self
            .entity_set
            .get_fixture_mut(key)
            .ok_or(WorldError::NoSuchFixture)?;
        fixture.filter = filter;
        let body_key = fixture.body;

        // flag associated contacts for filtering
        let edges = self.entity_set.body(body_key).contact_edges.clone();
        for edge in edges {
            let contact = self.entity_set.contact_mut(edge.contact);
            if contact.fixture_a == key || contact.fixture_b == key {
                contact.filter_dirty = true;
            }
        }

        // touch the proxies so that new pairs may be created
        for proxy in &self.entity_set.fixture(key).proxies {
            self.contact_manager.broad_phase.touch_proxy(proxy.proxy_id);
        }
        Ok(())
    }

    /// Turn a fixture into a sensor or back. Wakes up the body.
    pub fn set_sensor(&mut self, key: FixtureKey, is_sensor: bool) -> Result<(), WorldError> {
        let fixture = self
            .entity_set
            .get_fixture_mut(key)
            .ok_or(WorldError::NoSuchFixture)?;
        if fixture.is_sensor != is_sensor {
            fixture.is_sensor = is_sensor;
            let body_key = fixture.body;
            self.entity_set.body_mut(body_key).set_awake(true);
        }
        Ok(())
    }

    fn destroy_body_contacts(&mut self, key: BodyKey) {
        let contacts: Vec<ContactKey> = self
            .entity_set
            .body(key)
            .contact_edges
            .iter()
            .map(|e| e.contact)
            .collect();
        for contact in contacts {
            self.contact_manager.destroy(&mut self.entity_set, contact);
        }
    }

    //
    // simulation
    //

    /// Advance the simulation by `dt` seconds under the gravity in [`settings`][Self::settings].
    ///
    /// Collision detection, integration and constraint solving all happen here.
    /// Typical iteration counts are 8 for velocity and 3 for position.
    pub fn step(&mut self, dt: f64, velocity_iterations: usize, position_iterations: usize) {
        let gravity = forcefield::Gravity(self.settings.gravity());
        self.step_in_field(dt, velocity_iterations, position_iterations, &gravity);
    }

    /// Like [`step`][Self::step], but with the acceleration of dynamic bodies
    /// given by a force field instead of the constant gravity in the settings.
    pub fn step_in_field(
        &mut self,
        dt: f64,
        velocity_iterations: usize,
        position_iterations: usize,
        forcefield: &impl ForceField,
    ) {
        let _span = tracy_span!("physics step", "step");

        // new fixtures can create new contacts
        if self.new_fixture {
            self.contact_manager.find_new_contacts(&mut self.entity_set);
            self.new_fixture = false;
        }

        let step = TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.settings.warm_starting,
        };

        // update contacts, this is where some of them are destroyed
        self.contact_manager.collide(&mut self.entity_set);

        if self.step_complete && step.dt > 0.0 {
            self.solve(&step, forcefield);
        }

        if self.settings.continuous_physics && step.dt > 0.0 {
            self.solve_toi(&step);
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.settings.auto_clear_forces {
            self.clear_forces();
        }

        log::trace!(
            "stepped {} bodies with {} contacts",
            self.entity_set.body_count(),
            self.entity_set.contact_count()
        );
    }

    /// Find islands of touching bodies and solve each of them.
    fn solve(&mut self, step: &TimeStep, forcefield: &impl ForceField) {
        let _span = tracy_span!("solve islands", "solve");
        let set = &mut self.entity_set;

        for (_, body) in set.bodies.iter_mut() {
            body.in_island = false;
        }
        for (_, contact) in set.contacts.iter_mut() {
            contact.in_island = false;
        }

        let seeds: Vec<BodyKey> = set.bodies().map(|(key, _)| key).collect();
        let mut stack: Vec<BodyKey> = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let body = set.body(seed);
            if body.in_island || !body.awake || !body.enabled {
                continue;
            }
            // the seed can be dynamic or kinematic
            if body.body_type == BodyType::Static {
                continue;
            }

            // depth first search through the contact graph
            self.island.clear();
            stack.push(seed);
            set.body_mut(seed).in_island = true;
            while let Some(key) = stack.pop() {
                debug_assert!(set.body(key).enabled);
                self.island.add_body(set, key);

                // make sure the body is awake without resetting the sleep timer
                let body = set.body_mut(key);
                body.awake = true;

                // don't propagate islands across static bodies, keeps islands small
                if body.body_type == BodyType::Static {
                    continue;
                }

                for edge_idx in 0..set.body(key).contact_edges.len() {
                    let edge = set.body(key).contact_edges[edge_idx];
                    let contact = set.contact(edge.contact);

                    if contact.in_island || !contact.enabled || !contact.touching {
                        continue;
                    }
                    // skip sensors
                    if set.fixture(contact.fixture_a).is_sensor
                        || set.fixture(contact.fixture_b).is_sensor
                    {
                        continue;
                    }

                    set.contact_mut(edge.contact).in_island = true;
                    self.island.add_contact(edge.contact);

                    let other = set.body_mut(edge.other);
                    if other.in_island {
                        continue;
                    }
                    other.in_island = true;
                    stack.push(edge.other);
                }
            }

            self.island.solve(
                set,
                &mut self.contact_manager.listener,
                step,
                &self.settings,
                forcefield,
            );

            // allow static bodies to participate in other islands
            for &key in &self.island.bodies {
                let body = set.body_mut(key);
                if body.body_type == BodyType::Static {
                    body.in_island = false;
                }
            }
        }

        {
            let _span = tracy_span!("synchronize fixtures", "solve");
            let moved: Vec<BodyKey> = set
                .bodies()
                .filter(|(_, b)| b.in_island && b.body_type != BodyType::Static)
                .map(|(key, _)| key)
                .collect();
            for key in moved {
                let body = set.body(key);
                let (pose1, pose2) = (body.start_pose(), body.pose);
                synchronize_fixtures(set, &mut self.contact_manager.broad_phase, key, &pose1, &pose2);
            }
        }

        // look for new contacts
        self.contact_manager.find_new_contacts(set);
    }

    /// Find the earliest time of impact among fast-moving pairs, move the
    /// bodies there and resolve the impact, until no more impacts remain.
    fn solve_toi(&mut self, step: &TimeStep) {
        let _span = tracy_span!("solve time of impact", "solve_toi");

        if self.step_complete {
            let set = &mut self.entity_set;
            for (_, body) in set.bodies.iter_mut() {
                body.in_island = false;
                body.sweep.alpha0 = 0.0;
            }
            for (_, contact) in set.contacts.iter_mut() {
                contact.in_island = false;
                contact.toi_valid = false;
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        loop {
            // find the first impact
            let Some((min_contact, min_alpha)) = self.find_min_toi() else {
                // no more impacts, the step is done
                self.step_complete = true;
                break;
            };

            let set = &mut self.entity_set;
            let (key_a, key_b) = {
                let c = set.contact(min_contact);
                (c.body_a, c.body_b)
            };

            // advance the bodies to the time of impact
            let backup_a = set.body(key_a).sweep;
            let backup_b = set.body(key_b).sweep;
            set.body_mut(key_a).advance(min_alpha);
            set.body_mut(key_b).advance(min_alpha);

            // the contact likely has some new contact points
            self.contact_manager.update(set, min_contact);
            let contact = set.contact_mut(min_contact);
            contact.toi_valid = false;
            contact.toi_count += 1;
            if contact.toi_count > self.settings.max_sub_steps {
                log::warn!(
                    "contact {:?} reached the limit of {} time of impact sub-steps",
                    min_contact,
                    self.settings.max_sub_steps
                );
            }

            // is the contact solid?
            if !contact.enabled || !contact.touching {
                // restore the sweeps
                contact.enabled = false;
                for (key, backup) in [(key_a, backup_a), (key_b, backup_b)] {
                    let body = set.body_mut(key);
                    body.sweep = backup;
                    body.synchronize_transform();
                }
                continue;
            }

            set.body_mut(key_a).set_awake(true);
            set.body_mut(key_b).set_awake(true);

            // build the island
            self.island.clear();
            self.island.add_body(set, key_a);
            self.island.add_body(set, key_b);
            self.island.add_contact(min_contact);
            set.body_mut(key_a).in_island = true;
            set.body_mut(key_b).in_island = true;
            set.contact_mut(min_contact).in_island = true;

            // get contacts on body A and body B
            let max_contacts = self.settings.max_toi_contacts;
            let max_bodies = 2 * max_contacts;
            for body_key in [key_a, key_b] {
                let body = set.body(body_key);
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                let is_bullet = body.bullet;

                for edge_idx in 0..set.body(body_key).contact_edges.len() {
                    if self.island.bodies.len() == max_bodies
                        || self.island.contacts.len() == max_contacts
                    {
                        break;
                    }
                    let edge = set.body(body_key).contact_edges[edge_idx];
                    let contact = set.contact(edge.contact);
                    if contact.in_island {
                        continue;
                    }

                    // only add static, kinematic or bullet bodies
                    let other = set.body(edge.other);
                    if other.body_type == BodyType::Dynamic && !is_bullet && !other.bullet {
                        continue;
                    }

                    // skip sensors
                    if set.fixture(contact.fixture_a).is_sensor
                        || set.fixture(contact.fixture_b).is_sensor
                    {
                        continue;
                    }

                    // tentatively advance the body to the time of impact
                    let backup = other.sweep;
                    let other_in_island = other.in_island;
                    if !other_in_island {
                        set.body_mut(edge.other).advance(min_alpha);
                    }

                    // update the contact points
                    self.contact_manager.update(set, edge.contact);

                    // was the contact disabled by the user, or are there no contact points?
                    let contact = set.contact(edge.contact);
                    if !contact.enabled || !contact.touching {
                        let other = set.body_mut(edge.other);
                        other.sweep = backup;
                        other.synchronize_transform();
                        continue;
                    }

                    // add the contact to the island
                    set.contact_mut(edge.contact).in_island = true;
                    self.island.add_contact(edge.contact);

                    if other_in_island {
                        continue;
                    }
                    // add the other body to the island
                    let other = set.body_mut(edge.other);
                    other.in_island = true;
                    if other.body_type != BodyType::Static {
                        other.set_awake(true);
                    }
                    self.island.add_body(set, edge.other);
                }
            }

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: 1.0 / dt,
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: TOI_POSITION_ITERATIONS,
                warm_starting: false,
            };
            let toi_index_a = set.body(key_a).island_index;
            let toi_index_b = set.body(key_b).island_index;
            self.island.solve_toi(
                set,
                &mut self.contact_manager.listener,
                &sub_step,
                &self.settings,
                toi_index_a,
                toi_index_b,
            );

            // reset island flags and synchronize broad phase proxies
            for &key in &self.island.bodies {
                let body = set.body_mut(key);
                body.in_island = false;
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                let (pose1, pose2) = (body.start_pose(), body.pose);
                synchronize_fixtures(set, &mut self.contact_manager.broad_phase, key, &pose1, &pose2);

                // invalidate all contact impact times on this displaced body
                for edge_idx in 0..set.body(key).contact_edges.len() {
                    let edge = set.body(key).contact_edges[edge_idx];
                    let contact = set.contact_mut(edge.contact);
                    contact.toi_valid = false;
                    contact.in_island = false;
                }
            }

            // commit proxy movements to the broad phase so that new contacts are created,
            // also some contacts can be destroyed
            self.contact_manager.find_new_contacts(set);

            if self.settings.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
    }

    /// The contact with the earliest time of impact this step and that time,
    /// computing and caching the times of contacts that don't have one yet.
    fn find_min_toi(&mut self) -> Option<(ContactKey, f64)> {
        let set = &mut self.entity_set;
        let mut min_contact = None;
        let mut min_alpha = 1.0;

        let keys: Vec<ContactKey> = set.contacts().map(|(key, _)| key).collect();
        for key in keys {
            let contact = set.contact(key);
            if !contact.enabled {
                continue;
            }
            // prevent excessive sub-stepping
            if contact.toi_count > self.settings.max_sub_steps {
                continue;
            }

            let alpha = if contact.toi_valid {
                contact.toi
            } else {
                let Some(alpha) = compute_toi(set, key) else { continue };
                let contact = set.contact_mut(key);
                contact.toi = alpha;
                contact.toi_valid = true;
                alpha
            };

            if alpha < min_alpha {
                min_contact = Some(key);
                min_alpha = alpha;
            }
        }

        match min_contact {
            Some(key) if min_alpha < 1.0 - 10.0 * f64::EPSILON => Some((key, min_alpha)),
            _ => None,
        }
    }

    //
    // queries
    //

    /// Call `callback` with every fixture whose broad phase AABB overlaps `aabb`,
    /// until it returns false.
    pub fn query_aabb(&self, aabb: &AABB, mut callback: impl FnMut(FixtureKey) -> bool) {
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.query(aabb, |proxy| callback(broad_phase.user_data(proxy).fixture));
    }

    /// Cast a ray from `p1` to `p2` against every fixture it passes.
    ///
    /// `callback` gets the fixture, the hit point, the surface normal and the
    /// fraction along the ray. Its return value controls the cast:
    /// `0` terminates, `-1` ignores the fixture and continues,
    /// `fraction` clips the ray to the hit to find the closest one,
    /// and `1` continues without clipping to find all hits.
    pub fn raycast(
        &self,
        p1: Vec2,
        p2: Vec2,
        mut callback: impl FnMut(FixtureKey, Vec2, Vec2, f64) -> f64,
    ) {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };
        let set = &self.entity_set;
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.raycast(&input, |sub_input, proxy| {
            let FixtureProxyRef { fixture, child } = broad_phase.user_data(proxy);
            let fixture_ref = set.fixture(fixture);
            let pose = set.body(fixture_ref.body).pose;
            match fixture_ref.shape.raycast(sub_input, &pose, child) {
                Some(hit) => {
                    let point = (1.0 - hit.fraction) * sub_input.p1 + hit.fraction * sub_input.p2;
                    callback(fixture, point, hit.normal, hit.fraction)
                }
                None => sub_input.max_fraction,
            }
        });
    }

    //
    // misc
    //

    /// Zero the accumulated forces and torques of every body.
    /// Done automatically after each step if `auto_clear_forces` is set.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.entity_set.bodies.iter_mut() {
            body.clear_forces();
        }
    }

    /// Move the world origin, useful for large worlds.
    /// `new_origin` is the position in current coordinates that becomes the origin.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for (_, body) in self.entity_set.bodies.iter_mut() {
            body.pose.translation -= new_origin;
            body.sweep.c0 -= new_origin;
            body.sweep.c -= new_origin;
        }
        for (_, fixture) in self.entity_set.fixtures.iter_mut() {
            for proxy in &mut fixture.proxies {
                proxy.aabb.lower -= new_origin;
                proxy.aabb.upper -= new_origin;
            }
        }
        self.contact_manager.broad_phase.shift_origin(new_origin);
    }

    /// Remove everything from the world.
    /// The contact listener and filter stay registered.
    pub fn clear(&mut self) {
        self.entity_set.clear();
        self.contact_manager.broad_phase = BroadPhase::new();
        self.new_fixture = false;
        self.step_complete = true;
        log::debug!("cleared the physics world");
    }
}

/// Move the broad phase proxies of a body's fixtures to cover the motion between two poses.
fn synchronize_fixtures(
    set: &mut EntitySet,
    broad_phase: &mut BroadPhase<FixtureProxyRef>,
    key: BodyKey,
    pose1: &Pose,
    pose2: &Pose,
) {
    let EntitySet {
        bodies, fixtures, ..
    } = set;
    for &f in &bodies[key.0].fixtures {
        fixtures[f.0].synchronize(broad_phase, pose1, pose2);
    }
}

/// Compute the time of impact of a contact as a fraction of the whole step,
/// or `None` if the pair doesn't need continuous collision.
fn compute_toi(set: &mut EntitySet, key: ContactKey) -> Option<f64> {
    let contact = set.contact(key);
    let fixture_a = set.fixture(contact.fixture_a);
    let fixture_b = set.fixture(contact.fixture_b);

    // sensors don't get continuous collision
    if fixture_a.is_sensor || fixture_b.is_sensor {
        return None;
    }

    let (key_a, key_b) = (contact.body_a, contact.body_b);
    let body_a = set.body(key_a);
    let body_b = set.body(key_b);
    debug_assert!(body_a.body_type == BodyType::Dynamic || body_b.body_type == BodyType::Dynamic);

    let active_a = body_a.awake && body_a.body_type != BodyType::Static;
    let active_b = body_b.awake && body_b.body_type != BodyType::Static;
    // at least one body must be awake and not static
    if !active_a && !active_b {
        return None;
    }

    // non-bullet dynamic bodies only collide continuously with static and kinematic ones
    let collide_a = body_a.bullet || body_a.body_type != BodyType::Dynamic;
    let collide_b = body_b.bullet || body_b.body_type != BodyType::Dynamic;
    if !collide_a && !collide_b {
        return None;
    }

    let proxy_a = DistanceProxy::new(&fixture_a.shape, contact.child_a);
    let proxy_b = DistanceProxy::new(&fixture_b.shape, contact.child_b);

    // put the sweeps onto the same time interval
    let alpha0_a = body_a.sweep.alpha0;
    let alpha0_b = body_b.sweep.alpha0;
    let alpha0 = if alpha0_a < alpha0_b {
        set.body_mut(key_a).sweep.advance(alpha0_b);
        alpha0_b
    } else if alpha0_b < alpha0_a {
        set.body_mut(key_b).sweep.advance(alpha0_a);
        alpha0_a
    } else {
        alpha0_a
    };
    debug_assert!(alpha0 < 1.0);

    let output = time_of_impact(&ToiInput {
        proxy_a,
        proxy_b,
        sweep_a: set.body(key_a).sweep,
        sweep_b: set.body(key_b).sweep,
        t_max: 1.0,
    });

    // beta is the fraction of the remaining portion of the step
    match output.state {
        ToiState::Touching => Some((alpha0 + (1.0 - alpha0) * output.t).min(1.0)),
        ToiState::Failed => {
            log::debug!("time of impact of contact {:?} failed to converge", key);
            Some(1.0)
        }
        _ => Some(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::{collision::*, *};
    use crate::settings::{LINEAR_SLOP, POLYGON_RADIUS};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    const DT: f64 = 1.0 / 60.0;

    fn zero_gravity() -> World {
        World::new(WorldSettings::default().with_gravity(Vec2::zero()))
    }

    fn add_ground(world: &mut World) -> BodyKey {
        let ground = world.create_body(&BodyDef::new_static().with_position([0.0, -0.5]));
        world
            .create_fixture(
                ground,
                FixtureDef::new(Polygon::new_box(20.0, 0.5).unwrap()).with_friction(0.6),
            )
            .unwrap();
        ground
    }

    fn add_box(world: &mut World, position: [f64; 2]) -> BodyKey {
        let body = world.create_body(&BodyDef::new_dynamic().with_position(position));
        world
            .create_fixture(
                body,
                FixtureDef::new(Polygon::new_box(0.5, 0.5).unwrap())
                    .with_density(1.0)
                    .with_friction(0.6),
            )
            .unwrap();
        body
    }

    fn add_circle(world: &mut World, def: BodyDef, radius: f64) -> BodyKey {
        let body = world.create_body(&def);
        world
            .create_fixture(
                body,
                FixtureDef::new(Circle::new(radius).unwrap()).with_density(1.0),
            )
            .unwrap();
        body
    }

    fn touching_contacts(world: &World) -> Vec<ContactKey> {
        world
            .contacts()
            .filter(|(_, c)| c.is_touching())
            .map(|(k, _)| k)
            .collect()
    }

    #[test]
    fn circles_touch_only_when_overlapping() {
        let mut world = zero_gravity();
        add_circle(&mut world, BodyDef::new_static(), 1.0);
        add_circle(&mut world, BodyDef::new_dynamic().with_position([1.5, 0.0]), 1.0);
        add_circle(&mut world, BodyDef::new_dynamic().with_position([-2.5, 0.0]), 1.0);

        world.step(DT, 8, 3);

        let touching = touching_contacts(&world);
        assert_eq!(touching.len(), 1);
        let contact = world.contact(touching[0]).unwrap();
        assert_eq!(contact.manifold().point_count, 1);

        // position correction has pushed the circles partway apart
        let wm = world.world_manifold(touching[0]).unwrap();
        assert!(wm.separations[0] < 0.0 && wm.separations[0] > -0.5);
        assert!((wm.normal.x.abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_fixtures_are_rejected() {
        let mut world = World::default();
        let body = world.create_body(&BodyDef::new_dynamic());
        let circle = Circle::new(1.0).unwrap();
        assert_eq!(
            world.create_fixture(body, FixtureDef::new(circle).with_density(-1.0)),
            Err(WorldError::InvalidDensity(-1.0))
        );
        world.destroy_body(body).unwrap();
        assert_eq!(
            world.create_fixture(body, FixtureDef::new(circle)),
            Err(WorldError::NoSuchBody)
        );
        assert_eq!(world.destroy_body(body), Err(WorldError::NoSuchBody));
    }

    #[test]
    fn stacked_boxes_come_to_rest() {
        let mut world = World::default();
        add_ground(&mut world);
        let bottom = add_box(&mut world, [0.0, 0.5]);
        let top = add_box(&mut world, [0.0, 1.5]);

        for _ in 0..300 {
            world.step(DT, 8, 3);
        }

        let bottom = world.body(bottom).unwrap();
        let top = world.body(top).unwrap();
        for body in [bottom, top] {
            assert!(body.linear_velocity().mag() < 0.01);
            assert!(body.angular_velocity().abs() < 0.01);
            assert!(body.angle().abs() < 0.01);
        }
        // resting contacts settle at a separation of about -LINEAR_SLOP
        // measured between the polygon skins
        let tolerance = 3.0 * LINEAR_SLOP;
        assert!(bottom.position().y > 0.5 + POLYGON_RADIUS - tolerance);
        assert!(top.position().y - bottom.position().y > 1.0 + 2.0 * POLYGON_RADIUS - tolerance);
    }

    #[test]
    fn resting_contact_keeps_ids_and_impulses() {
        let mut world = World::default();
        add_ground(&mut world);
        add_box(&mut world, [0.0, 0.5]);

        world.step(DT, 8, 3);
        world.step(DT, 8, 3);
        let touching = touching_contacts(&world);
        assert_eq!(touching.len(), 1);
        let manifold = *world.contact(touching[0]).unwrap().manifold();
        assert_eq!(manifold.point_count, 2);
        for point in manifold.points() {
            assert!(point.normal_impulse > 0.0);
        }

        world.step(DT, 8, 3);
        // the same contact persists with the same feature ids
        assert_eq!(touching_contacts(&world), touching);
        let next = *world.contact(touching[0]).unwrap().manifold();
        itertools::assert_equal(
            manifold.points().iter().map(|p| p.id),
            next.points().iter().map(|p| p.id),
        );
    }

    #[test]
    fn fast_body_does_not_tunnel_through_thin_wall() {
        let mut world = zero_gravity();
        let wall = world.create_body(&BodyDef::new_static().with_position([5.0, 0.0]));
        world
            .create_fixture(wall, FixtureDef::new(Polygon::new_box(0.05, 2.0).unwrap()))
            .unwrap();

        let bullet = add_circle(
            &mut world,
            BodyDef::new_dynamic().with_bullet(true).with_velocity(Velocity {
                linear: Vec2::new(600.0, 0.0),
                angular: 0.0,
            }),
            0.1,
        );

        // speed is capped at max_translation per step, so the wall is reached on the third step
        for _ in 0..3 {
            world.step(DT, 8, 3);
        }

        let body = world.body(bullet).unwrap();
        let alpha = body.sweep.alpha0;
        assert!(alpha > 0.0 && alpha < 1.0, "no time of impact, alpha {alpha}");
        assert!(body.position().x < 4.95);
        assert!(body.position().x > 4.0);
        assert!(body.linear_velocity().x < 1.0);
    }

    #[test]
    fn destroying_a_body_removes_its_contacts() {
        let mut world = World::default();
        let ground = add_ground(&mut world);
        let left = add_box(&mut world, [-0.5, 0.5]);
        let right = add_box(&mut world, [0.5, 0.5]);

        world.step(DT, 8, 3);
        assert!(world.body(ground).unwrap().contact_edges().len() >= 2);
        assert!(world
            .body(left)
            .unwrap()
            .contact_edges()
            .iter()
            .any(|e| e.other == right));

        world.destroy_body(left).unwrap();

        let still_referenced = |key: BodyKey| {
            world
                .bodies()
                .flat_map(|(_, b)| b.contact_edges().iter())
                .any(|e| e.other == key)
        };
        assert!(!still_referenced(left));
        for (_, contact) in world.contacts() {
            assert!(contact.body_a() != left && contact.body_b() != left);
        }
        // every contact still has exactly one edge on each of its bodies
        for (key, contact) in world.contacts() {
            for body in [contact.body_a(), contact.body_b()] {
                let edges = world.body(body).unwrap().contact_edges();
                assert_eq!(edges.iter().filter(|e| e.contact == key).count(), 1);
            }
        }
        assert_eq!(world.entities().fixture_count(), 2);
        assert!(world.fixtures().all(|(_, f)| f.body() != left));
        assert_eq!(world.proxy_count(), 2);
    }

    #[test]
    fn resting_bodies_sleep_and_wake_neighbours() {
        let mut world = World::default();
        add_ground(&mut world);
        let bottom = add_box(&mut world, [0.0, 0.5]);
        let top = add_box(&mut world, [0.0, 1.5]);

        for _ in 0..300 {
            world.step(DT, 8, 3);
        }
        assert!(!world.body(bottom).unwrap().is_awake());
        assert!(!world.body(top).unwrap().is_awake());

        world.body_mut(top).unwrap().set_awake(true);
        world.step(DT, 8, 3);
        assert!(world.body(bottom).unwrap().is_awake());

        // pushing a sleeping body with a wake flag wakes it too
        for _ in 0..300 {
            world.step(DT, 8, 3);
        }
        assert!(!world.body(top).unwrap().is_awake());
        world
            .body_mut(top)
            .unwrap()
            .apply_linear_impulse(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.5), true);
        assert!(world.body(top).unwrap().is_awake());
    }

    #[test]
    fn filters_prevent_contacts() {
        let mut world = zero_gravity();
        let ghost_filter = Filter {
            group_index: -1,
            ..Filter::default()
        };
        let mut keys = Vec::new();
        for x in [0.0, 0.5] {
            let body = world.create_body(&BodyDef::new_dynamic().with_position([x, 0.0]));
            let fixture = world
                .create_fixture(
                    body,
                    FixtureDef::new(Polygon::new_box(0.5, 0.5).unwrap())
                        .with_density(1.0)
                        .with_filter(ghost_filter),
                )
                .unwrap();
            keys.push((body, fixture));
        }

        world.step(DT, 8, 3);
        assert_eq!(world.contact_count(), 0);
        assert_eq!(world.body(keys[0].0).unwrap().position(), Vec2::zero());

        // changing the filter creates the contact at the end of the next step
        // and it gets its manifold on the step after that
        world.set_filter(keys[1].1, Filter::default()).unwrap();
        world.step(DT, 8, 3);
        assert_eq!(world.contact_count(), 1);
        world.step(DT, 8, 3);
        assert_eq!(touching_contacts(&world).len(), 1);

        // and turning it back destroys the contact
        world.set_filter(keys[1].1, ghost_filter).unwrap();
        world.step(DT, 8, 3);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn static_bodies_never_touch_each_other() {
        let mut world = World::default();
        add_circle(&mut world, BodyDef::new_static(), 1.0);
        add_circle(&mut world, BodyDef::new_kinematic().with_position([0.5, 0.0]), 1.0);
        world.step(DT, 8, 3);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn raycast_finds_the_closest_fixture() {
        let mut world = zero_gravity();
        let mut fixtures = Vec::new();
        for x in [6.0, 2.0, 4.0] {
            let body = world.create_body(&BodyDef::new_static().with_position([x, 0.0]));
            let fixture = world
                .create_fixture(body, FixtureDef::new(Circle::new(0.5).unwrap()))
                .unwrap();
            fixtures.push(fixture);
        }
        let closest_fixture = fixtures[1];

        let mut closest = None;
        world.raycast(Vec2::zero(), Vec2::new(10.0, 0.0), |fixture, point, normal, fraction| {
            closest = Some((fixture, point, normal, fraction));
            fraction
        });
        let (fixture, point, normal, fraction) = closest.unwrap();
        assert_eq!(fixture, closest_fixture);
        assert!((fraction - 0.15).abs() < 1e-9);
        assert!((point - Vec2::new(1.5, 0.0)).mag() < 1e-9);
        assert!((normal - Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        // returning 1 reports every hit
        let mut hits = 0;
        world.raycast(Vec2::zero(), Vec2::new(10.0, 0.0), |_, _, _, _| {
            hits += 1;
            1.0
        });
        assert_eq!(hits, 3);

        let mut found = Vec::new();
        world.query_aabb(
            &AABB::new(Vec2::new(3.0, -1.0), Vec2::new(7.0, 1.0)),
            |fixture| {
                found.push(fixture);
                true
            },
        );
        found.sort_by_key(|f| fixtures.iter().position(|x| x == f));
        itertools::assert_equal(found, [fixtures[0], fixtures[2]]);
    }

    #[derive(Clone, Default)]
    struct CountingListener {
        begin: Arc<AtomicUsize>,
        end: Arc<AtomicUsize>,
        post_solve: Arc<AtomicUsize>,
    }

    impl ContactListener for CountingListener {
        fn begin_contact(&mut self, _contact: &Contact) {
            self.begin.fetch_add(1, Ordering::Relaxed);
        }

        fn end_contact(&mut self, _contact: &Contact) {
            self.end.fetch_add(1, Ordering::Relaxed);
        }

        fn post_solve(&mut self, _contact: &Contact, impulse: &ContactImpulse) {
            assert!(impulse.count > 0);
            self.post_solve.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn listener_sees_contact_lifecycle() {
        let mut world = World::default();
        let listener = CountingListener::default();
        world.set_contact_listener(listener.clone());

        add_ground(&mut world);
        let ball = add_circle(&mut world, BodyDef::new_dynamic().with_position([0.0, 1.0]), 0.5);

        for _ in 0..60 {
            world.step(DT, 8, 3);
        }
        assert_eq!(listener.begin.load(Ordering::Relaxed), 1);
        assert_eq!(listener.end.load(Ordering::Relaxed), 0);
        assert!(listener.post_solve.load(Ordering::Relaxed) > 0);

        world.destroy_body(ball).unwrap();
        assert_eq!(listener.end.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sensors_detect_overlap_without_response() {
        let mut world = World::default();
        let sensor_body = world.create_body(&BodyDef::new_static());
        world
            .create_fixture(
                sensor_body,
                FixtureDef::new(Polygon::new_box(2.0, 2.0).unwrap()).with_sensor(true),
            )
            .unwrap();
        let ball = add_circle(&mut world, BodyDef::new_dynamic().with_position([0.0, 1.0]), 0.5);

        for _ in 0..10 {
            world.step(DT, 8, 3);
        }
        let touching = touching_contacts(&world);
        assert_eq!(touching.len(), 1);
        assert!(world.contact(touching[0]).unwrap().manifold().is_empty());
        // the ball falls freely through the sensor
        let v = world.body(ball).unwrap().linear_velocity();
        assert!((v.y + 10.0 * 10.0 * DT).abs() < 1e-6);
    }

    #[test]
    fn force_field_replaces_gravity() {
        let mut world = World::default();
        let body = add_circle(&mut world, BodyDef::new_dynamic().with_gravity_scale(2.0), 0.5);
        world.step_in_field(DT, 8, 3, &forcefield::Gravity(Vec2::new(1.0, 0.0)));
        let v = world.body(body).unwrap().linear_velocity();
        assert!((v - Vec2::new(2.0 * DT, 0.0)).mag() < 1e-12);
    }

    #[test]
    fn combined_fields_are_sampled_at_each_body() {
        use forcefield::{Gravity, NoneField, PointGravity, Sum};

        let mut world = World::default();
        let near = add_circle(&mut world, BodyDef::new_dynamic(), 0.25);
        let far = add_circle(&mut world, BodyDef::new_dynamic().with_position([0.0, -7.0]), 0.25);

        // a source at (3, 0) pulls `near` with 10 / (9 + 1) = 1
        let field = Sum(
            Gravity(Vec2::new(0.0, -1.0)),
            PointGravity::new(Vec2::new(3.0, 0.0), 10.0),
        );
        world.step_in_field(DT, 8, 3, &field);
        let v_near = world.body(near).unwrap().linear_velocity();
        assert!((v_near - DT * Vec2::new(1.0, -1.0)).mag() < 1e-12);
        let v_far = world.body(far).unwrap().linear_velocity();
        let expected = DT * (Vec2::new(0.0, -1.0) + field.1.value_at(Vec2::new(0.0, -7.0)));
        assert!((v_far - expected).mag() < 1e-12);

        // without a field the bodies coast
        world.step_in_field(DT, 8, 3, &NoneField);
        assert!((world.body(near).unwrap().linear_velocity() - v_near).mag() < 1e-12);
        assert!((world.body(far).unwrap().linear_velocity() - v_far).mag() < 1e-12);
    }

    #[test]
    fn box_slides_smoothly_across_chain_junctions() {
        let mut world = World::default();
        // right to left so the segment normals point up, a junction every metre
        let points: Vec<Vec2> = (0..=20).map(|i| Vec2::new(10.0 - i as f64, 0.0)).collect();
        let ground = world.create_body(&BodyDef::new_static());
        let chain = Chain::new(&points).unwrap();
        world
            .create_fixture(ground, FixtureDef::new(chain).with_friction(0.0))
            .unwrap();

        let speed = 5.0;
        let body = world.create_body(
            &BodyDef::new_dynamic()
                .with_position([-6.0, 0.5 + 2.0 * POLYGON_RADIUS - LINEAR_SLOP])
                .with_velocity(Velocity {
                    linear: Vec2::new(speed, 0.0),
                    angular: 0.0,
                }),
        );
        world
            .create_fixture(
                body,
                FixtureDef::new(Polygon::new_box(0.5, 0.5).unwrap())
                    .with_density(1.0)
                    .with_friction(0.0),
            )
            .unwrap();

        // crosses five junctions
        for _ in 0..60 {
            world.step(DT, 8, 3);
            let b = world.body(body).unwrap();
            assert!(b.linear_velocity().y.abs() < 0.01, "bumped at {:?}", b.position());
            assert!((b.linear_velocity().x - speed).abs() < 1e-3, "snagged at {:?}", b.position());
            assert!(b.angular_velocity().abs() < 0.01);
        }
        let b = world.body(body).unwrap();
        assert!(b.position().x > -1.5);
        assert!((b.position().y - 0.5).abs() < 0.05);
    }

    #[test]
    fn shifting_the_origin_moves_everything() {
        let mut world = World::default();
        add_ground(&mut world);
        let body = add_box(&mut world, [3.0, 0.5]);
        world.step(DT, 8, 3);
        let before = world.body(body).unwrap().position();

        world.shift_origin(Vec2::new(3.0, 0.0));
        let after = world.body(body).unwrap().position();
        assert!((before - after - Vec2::new(3.0, 0.0)).mag() < 1e-12);

        let mut found = false;
        world.query_aabb(&AABB::new(Vec2::new(-0.1, 0.4), Vec2::new(0.1, 0.6)), |f| {
            found |= world.fixture(f).unwrap().body() == body;
            true
        });
        assert!(found);
    }

    #[test]
    fn changing_body_type_resets_mass_and_contacts() {
        let mut world = World::default();
        add_ground(&mut world);
        let body = add_box(&mut world, [0.0, 0.5]);
        world.step(DT, 8, 3);
        assert_eq!(world.contact_count(), 1);

        world.set_type(body, BodyType::Static).unwrap();
        assert_eq!(world.contact_count(), 0);
        assert_eq!(world.body(body).unwrap().mass(), 0.0);
        world.step(DT, 8, 3);
        // two static bodies don't make a contact
        assert_eq!(world.contact_count(), 0);

        world.set_type(body, BodyType::Dynamic).unwrap();
        assert!((world.body(body).unwrap().mass() - 1.0).abs() < 1e-12);
        world.step(DT, 8, 3);
        assert_eq!(world.contact_count(), 1);

        world.set_enabled(body, false).unwrap();
        assert_eq!(world.contact_count(), 0);
        assert_eq!(world.proxy_count(), 1);
        world.set_enabled(body, true).unwrap();
        assert_eq!(world.proxy_count(), 2);
    }
}
