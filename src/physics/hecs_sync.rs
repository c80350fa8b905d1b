use crate::{
    math as m,
    physics::{BodyKey, World},
};

use thunderdome as td;

#[derive(Clone, Copy, Debug)]
pub struct HecsSyncOptions {
    pub hecs_to_physics: bool,
    pub physics_to_hecs: bool,
    pub autodelete: bool,
}

impl HecsSyncOptions {
    #[inline]
    pub fn both_ways() -> Self {
        Self {
            hecs_to_physics: true,
            physics_to_hecs: true,
            autodelete: true,
        }
    }

    #[inline]
    pub fn hecs_to_physics_only() -> Self {
        Self {
            hecs_to_physics: true,
            physics_to_hecs: false,
            autodelete: true,
        }
    }

    #[inline]
    pub fn physics_to_hecs_only() -> Self {
        Self {
            hecs_to_physics: false,
            physics_to_hecs: true,
            autodelete: false,
        }
    }
}

/// Automatically syncs body poses between a [`hecs`][hecs] world
/// and a physics [`World`][super::World].
///
/// Entities are linked to bodies with a [`BodyKey`] component,
/// and the synced component is [`Pose`][m::Pose].
/// A pose written on the hecs side teleports the body,
/// so use it for kinematic control and initial placement rather than every frame.
#[derive(Default, Debug)]
pub struct HecsSyncManager {
    /// If set, automatically uses these options to register all hecs entities
    /// with a [`BodyKey`] component that haven't been registered manually.
    /// None by default.
    pub default_opts: Option<HecsSyncOptions>,
    body_entity_map: td::Arena<(hecs::Entity, HecsSyncOptions)>,
}

impl HecsSyncManager {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn new_autosync(opts: HecsSyncOptions) -> Self {
        Self {
            default_opts: Some(opts),
            ..Self::default()
        }
    }

    #[inline]
    pub fn register_body(&mut self, body: BodyKey, entity: hecs::Entity, opts: HecsSyncOptions) {
        self.body_entity_map.insert_at(body.0, (entity, opts));
    }

    /// Sync data from a hecs world to the physics world.
    /// Call before [`World::step`][World::step].
    pub fn sync_hecs_to_physics(&mut self, physics: &mut World, hecs_world: &mut hecs::World) {
        // auto-register new entities
        if let Some(opts) = self.default_opts {
            for (entity, body_key) in hecs_world.query_mut::<&BodyKey>() {
                if !self.body_entity_map.contains(body_key.0) {
                    self.body_entity_map.insert_at(body_key.0, (entity, opts));
                }
            }
        }
        self.body_entity_map.retain(|body_key, (entity, opts)| {
            let body_key = BodyKey(body_key);
            // auto-delete bodies for entities that don't exist anymore,
            // using the surrounding `retain` to also delete them from this map
            if opts.autodelete && !hecs_world.contains(*entity) {
                if physics.destroy_body(body_key).is_err() {
                    log::warn!("body {:?} was destroyed before its entity", body_key);
                }
                return false;
            }
            if opts.hecs_to_physics {
                let Ok(pose) = hecs_world.query_one_mut::<&m::Pose>(*entity) else { return true };
                let Some(body) = physics.body(body_key) else { return false };
                // only teleport if the pose was changed on the hecs side
                if body.pose() != *pose {
                    let (position, angle) = (pose.translation, pose.rotation.angle());
                    if physics.set_transform(body_key, position, angle).is_err() {
                        return false;
                    }
                }
            }
            true
        });
    }

    /// Sync data from a physics world to a hecs world.
    /// Call after [`World::step`][World::step].
    pub fn sync_physics_to_hecs(&mut self, physics: &World, hecs_world: &mut hecs::World) {
        for (body_key, (entity, opts)) in self.body_entity_map.iter() {
            if !opts.physics_to_hecs {
                continue;
            }
            let Some(body) = physics.body(BodyKey(body_key)) else { continue };
            let Ok(pose) = hecs_world.query_one_mut::<&mut m::Pose>(*entity) else { continue };
            *pose = body.pose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{collision::Circle, BodyDef, FixtureDef};

    #[test]
    fn poses_follow_bodies_and_entities() {
        let mut physics = World::default();
        let mut hecs_world = hecs::World::new();
        let mut sync = HecsSyncManager::new_autosync(HecsSyncOptions::both_ways());

        let body = physics.create_body(&BodyDef::new_dynamic().with_position([1.0, 2.0]));
        physics
            .create_fixture(body, FixtureDef::new(Circle::new(0.5).unwrap()).with_density(1.0))
            .unwrap();
        let entity = hecs_world.spawn((body, physics.body(body).unwrap().pose()));

        sync.sync_hecs_to_physics(&mut physics, &mut hecs_world);
        physics.step(1.0 / 60.0, 8, 3);
        sync.sync_physics_to_hecs(&physics, &mut hecs_world);

        let pose = *hecs_world.get::<&m::Pose>(entity).unwrap();
        assert!(pose.translation.y < 2.0);
        assert_eq!(pose, physics.body(body).unwrap().pose());

        // moving the entity teleports the body
        let target = m::Pose::new(m::Vec2::new(-3.0, 0.0), m::Rot::from_angle(1.0));
        *hecs_world.get::<&mut m::Pose>(entity).unwrap() = target;
        sync.sync_hecs_to_physics(&mut physics, &mut hecs_world);
        let body_pose = physics.body(body).unwrap().pose();
        assert!((body_pose.translation - target.translation).mag() < 1e-12);
        assert!((body_pose.rotation.angle() - 1.0).abs() < 1e-12);

        // despawning the entity destroys the body
        hecs_world.despawn(entity).unwrap();
        sync.sync_hecs_to_physics(&mut physics, &mut hecs_world);
        assert!(physics.body(body).is_none());
        assert_eq!(physics.body_count(), 0);
    }
}
