//! Groups of bodies connected by touching contacts, solved together.

use super::{
    contact::Listener,
    forcefield::ForceField,
    solver::{ContactSolver, Position, TimeStep},
    BodyKey, BodyType, ContactKey, EntitySet, Velocity,
};
use crate::settings::WorldSettings;

use itertools::izip;

/// Working buffers of one island. Reused between islands to avoid allocation.
#[derive(Default)]
pub(crate) struct Island {
    pub bodies: Vec<BodyKey>,
    pub contacts: Vec<ContactKey>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    #[inline]
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
    }

    /// Add a body, assigning it an index into the island's buffers.
    pub fn add_body(&mut self, set: &mut EntitySet, key: BodyKey) {
        set.body_mut(key).island_index = self.bodies.len();
        self.bodies.push(key);
    }

    #[inline]
    pub fn add_contact(&mut self, key: ContactKey) {
        self.contacts.push(key);
    }

    /// Load the current sweep end state and velocity of every body.
    fn load_state(&mut self, set: &EntitySet) {
        self.positions.clear();
        self.velocities.clear();
        for &key in &self.bodies {
            let body = set.body(key);
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(body.velocity);
        }
    }

    /// Integrate positions with clamped velocities.
    fn integrate_positions(&mut self, h: f64, settings: &WorldSettings) {
        for (pos, vel) in izip!(&mut self.positions, &mut self.velocities) {
            // limit motion so that tunneling is at least bounded
            let translation = h * vel.linear;
            if translation.mag_sq() > settings.max_translation * settings.max_translation {
                vel.linear *= settings.max_translation / translation.mag();
            }
            let rotation = h * vel.angular;
            if rotation * rotation > settings.max_rotation * settings.max_rotation {
                vel.angular *= settings.max_rotation / rotation.abs();
            }

            pos.c += h * vel.linear;
            pos.a += h * vel.angular;
        }
    }

    /// Copy the solved state back into the bodies.
    fn store_state(&self, set: &mut EntitySet) {
        for (&key, pos, vel) in izip!(&self.bodies, &self.positions, &self.velocities) {
            let body = set.body_mut(key);
            body.sweep.c = pos.c;
            body.sweep.a = pos.a;
            body.velocity = *vel;
            body.synchronize_transform();
        }
    }

    fn report(&self, set: &EntitySet, listener: &mut Listener, solver: &ContactSolver) {
        let Some(listener) = listener else { return };
        for (key, impulse) in solver.impulses() {
            listener.post_solve(set.contact(key), &impulse);
        }
    }

    /// Integrate velocities, solve contacts, integrate positions
    /// and put the island to sleep if it has been still long enough.
    pub fn solve(
        &mut self,
        set: &mut EntitySet,
        listener: &mut Listener,
        step: &TimeStep,
        settings: &WorldSettings,
        forcefield: &impl ForceField,
    ) {
        let _span = tracy_span!("solve island", "solve");
        let h = step.dt;

        // integrate velocities and remember the start of the sweep
        self.positions.clear();
        self.velocities.clear();
        for &key in &self.bodies {
            let body = set.body_mut(key);
            let mut vel = body.velocity;

            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;

            if body.body_type == BodyType::Dynamic {
                let gravity = forcefield.value_at(body.sweep.c);
                vel.linear += h * (body.gravity_scale * gravity + body.inv_mass * body.force);
                vel.angular += h * body.inv_inertia * body.torque;

                // Pade approximation of exponential damping, stable for large dt
                vel.linear *= 1.0 / (1.0 + h * body.linear_damping);
                vel.angular *= 1.0 / (1.0 + h * body.angular_damping);
            }

            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(vel);
        }

        let mut solver = ContactSolver::new(*step, settings, set, &self.contacts);
        solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        if step.warm_starting {
            solver.warm_start(&mut self.velocities);
        }

        {
            let _span = tracy_span!("velocity iterations", "solve");
            for _ in 0..step.velocity_iterations {
                solver.solve_velocity_constraints(&mut self.velocities);
            }
        }
        solver.store_impulses(set);

        self.integrate_positions(h, settings);

        let mut position_solved = false;
        {
            let _span = tracy_span!("position iterations", "solve");
            for _ in 0..step.position_iterations {
                if solver.solve_position_constraints(&mut self.positions) {
                    position_solved = true;
                    break;
                }
            }
        }

        self.store_state(set);
        self.report(set, listener, &solver);

        if settings.allow_sleep {
            let lin_tol_sq = settings.linear_sleep_tolerance * settings.linear_sleep_tolerance;
            let ang_tol_sq = settings.angular_sleep_tolerance * settings.angular_sleep_tolerance;

            let mut min_sleep_time = f64::MAX;
            for &key in &self.bodies {
                let body = set.body_mut(key);
                if body.body_type == BodyType::Static {
                    continue;
                }
                if !body.allow_sleep
                    || body.velocity.angular * body.velocity.angular > ang_tol_sq
                    || body.velocity.linear.mag_sq() > lin_tol_sq
                {
                    body.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    body.sleep_time += h;
                    min_sleep_time = min_sleep_time.min(body.sleep_time);
                }
            }

            if min_sleep_time >= settings.time_to_sleep && position_solved {
                log::debug!("island of {} bodies fell asleep", self.bodies.len());
                for &key in &self.bodies {
                    set.body_mut(key).set_awake(false);
                }
            }
        }
    }

    /// Resolve the overlap of the two bodies at a time of impact
    /// and advance the island through the rest of the sub-step.
    ///
    /// `toi_index_a` and `toi_index_b` are the island indices of the impacting bodies,
    /// only they are moved by position correction.
    pub fn solve_toi(
        &mut self,
        set: &mut EntitySet,
        listener: &mut Listener,
        sub_step: &TimeStep,
        settings: &WorldSettings,
        toi_index_a: usize,
        toi_index_b: usize,
    ) {
        let _span = tracy_span!("solve toi island", "solve_toi");
        debug_assert!(toi_index_a < self.bodies.len() && toi_index_b < self.bodies.len());

        self.load_state(set);

        let mut solver = ContactSolver::new(*sub_step, settings, set, &self.contacts);

        for _ in 0..sub_step.position_iterations {
            if solver.solve_toi_position_constraints(&mut self.positions, toi_index_a, toi_index_b)
            {
                break;
            }
        }

        // leap of faith to the new safe state
        for index in [toi_index_a, toi_index_b] {
            let body = set.body_mut(self.bodies[index]);
            body.sweep.c0 = self.positions[index].c;
            body.sweep.a0 = self.positions[index].a;
        }

        // no warm starting is needed for TOI events because warm
        // starting impulses were applied in the discrete solver
        solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        for _ in 0..sub_step.velocity_iterations {
            solver.solve_velocity_constraints(&mut self.velocities);
        }
        // the TOI impulses are not stored for warm starting
        // because they can be quite large

        self.integrate_positions(sub_step.dt, settings);
        self.store_state(set);
        self.report(set, listener, &solver);
    }
}
