use super::{
    collision::{BroadPhase, ProxyId, Shape, AABB},
    BodyKey, FixtureKey,
};
use crate::math::Pose;

/// Collision filtering data.
///
/// Two fixtures collide if they share a positive group index,
/// never collide if they share a negative group index,
/// and otherwise collide if each one's category is in the other's mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Filter {
    /// The collision categories this fixture belongs to, usually a single bit.
    pub category_bits: u16,
    /// The categories this fixture accepts collisions with.
    pub mask_bits: u16,
    /// Overrides the category/mask check for fixtures in the same group.
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Parameters to create a [`Fixture`][self::Fixture] with.
#[derive(Clone, Debug)]
pub struct FixtureDef {
    pub shape: Shape,
    /// Mass per unit area. Zero density means the fixture contributes no mass.
    pub density: f64,
    /// Coulomb friction coefficient, usually in [0, 1].
    pub friction: f64,
    /// Elasticity, usually in [0, 1].
    pub restitution: f64,
    /// A sensor detects overlap but produces no collision response.
    pub is_sensor: bool,
    pub filter: Filter,
}

impl FixtureDef {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// What the broad phase stores for each proxy: the fixture child it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FixtureProxyRef {
    pub fixture: FixtureKey,
    pub child: usize,
}

/// A broad phase proxy for one child of a fixture's shape.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FixtureProxy {
    pub aabb: AABB,
    pub proxy_id: ProxyId,
}

/// A shape attached to a body, with material properties.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub(crate) body: BodyKey,
    pub(crate) shape: Shape,
    pub(crate) density: f64,
    pub(crate) friction: f64,
    pub(crate) restitution: f64,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    /// One per shape child while the body is enabled, empty otherwise.
    pub(crate) proxies: Vec<FixtureProxy>,
}

impl Fixture {
    pub(crate) fn new(body: BodyKey, def: FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
        }
    }

    #[inline]
    pub fn body(&self) -> BodyKey {
        self.body
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn density(&self) -> f64 {
        self.density
    }

    #[inline]
    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Set the friction coefficient.
    /// Doesn't affect existing contacts.
    #[inline]
    pub fn set_friction(&mut self, friction: f64) {
        self.friction = friction;
    }

    #[inline]
    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    /// Set the restitution coefficient.
    /// Doesn't affect existing contacts.
    #[inline]
    pub fn set_restitution(&mut self, restitution: f64) {
        self.restitution = restitution;
    }

    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    #[inline]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// The AABB of a shape child covering its motion over the last step,
    /// if the fixture is currently in the broad phase.
    pub fn aabb(&self, child: usize) -> Option<AABB> {
        self.proxies.get(child).map(|p| p.aabb)
    }

    pub(crate) fn create_proxies(
        &mut self,
        key: FixtureKey,
        broad_phase: &mut BroadPhase<FixtureProxyRef>,
        pose: &Pose,
    ) {
        debug_assert!(self.proxies.is_empty());
        self.proxies = (0..self.shape.child_count())
            .map(|child| {
                let aabb = self.shape.compute_aabb(pose, child);
                let proxy_id = broad_phase.create_proxy(
                    aabb,
                    FixtureProxyRef {
                        fixture: key,
                        child,
                    },
                );
                FixtureProxy { aabb, proxy_id }
            })
            .collect();
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<FixtureProxyRef>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Move the proxies to cover the motion from `pose1` to `pose2`.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyRef>,
        pose1: &Pose,
        pose2: &Pose,
    ) {
        for (child, proxy) in self.proxies.iter_mut().enumerate() {
            // the AABB has to cover the swept shape
            let aabb1 = self.shape.compute_aabb(pose1, child);
            let aabb2 = self.shape.compute_aabb(pose2, child);
            proxy.aabb = aabb1.union(&aabb2);

            let displacement = pose2.translation - pose1.translation;
            broad_phase.move_proxy(proxy.proxy_id, proxy.aabb, displacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_rules() {
        let default = Filter::default();
        assert!(default.should_collide(&default));

        let player = Filter {
            category_bits: 0b01,
            mask_bits: 0b10,
            group_index: 0,
        };
        let enemy = Filter {
            category_bits: 0b10,
            mask_bits: 0b01,
            group_index: 0,
        };
        assert!(player.should_collide(&enemy));
        assert!(!player.should_collide(&player));

        // a shared negative group never collides, even if the masks agree
        let ragdoll = Filter {
            group_index: -1,
            ..default
        };
        assert!(!ragdoll.should_collide(&ragdoll));
        // a shared positive group always collides, even if the masks don't
        let friends = Filter {
            group_index: 2,
            ..player
        };
        assert!(friends.should_collide(&friends));
        // different groups fall back to masks
        assert!(!friends.should_collide(&Filter {
            group_index: 3,
            ..player
        }));
    }
}
