//! Global constants of the collision geometry and tunable parameters of the world.
//!
//! The constants here are baked into shapes, the broad phase tree and the
//! narrow phase. Everything the solver can be configured with lives in
//! [`WorldSettings`].

use crate::math::Vec2;
use std::f64::consts::PI;

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening margin added to every proxy AABB in the broad phase,
/// so that proxies can move a little without the tree being updated.
pub const AABB_EXTENSION: f64 = 0.1;

/// Multiplier of the per-step displacement used to predict
/// where a proxy AABB is going to move.
pub const AABB_MULTIPLIER: f64 = 2.0;

/// Collision and constraint tolerance in metres.
pub const LINEAR_SLOP: f64 = 0.005;

/// Collision and constraint tolerance in radians.
pub const ANGULAR_SLOP: f64 = 2.0 / 180.0 * PI;

/// The skin radius around polygons and edges.
pub const POLYGON_RADIUS: f64 = 2.0 * LINEAR_SLOP;

/// Mix the friction coefficients of two fixtures.
#[inline]
pub fn mix_friction(friction1: f64, friction2: f64) -> f64 {
    (friction1 * friction2).sqrt()
}

/// Mix the restitution coefficients of two fixtures.
#[inline]
pub fn mix_restitution(restitution1: f64, restitution2: f64) -> f64 {
    restitution1.max(restitution2)
}

/// Tunable parameters of a [`World`][crate::World].
///
/// The defaults are tuned for objects between 0.1 and 10 metres in size
/// moving at under a couple hundred metres per second.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct WorldSettings {
    /// Constant acceleration applied to every dynamic body.
    pub gravity: [f64; 2],
    /// Relative approach speed under which collisions are treated as inelastic.
    pub velocity_threshold: f64,
    /// How much of the penetration is resolved per step in position correction.
    pub baumgarte: f64,
    /// Same as `baumgarte` but for time of impact sub-steps.
    pub toi_baumgarte: f64,
    /// Maximum linear position correction in one step.
    pub max_linear_correction: f64,
    /// Maximum distance a body can move in one step.
    pub max_translation: f64,
    /// Maximum rotation of a body in one step, in radians.
    pub max_rotation: f64,
    /// Seconds a body needs to be still before it goes to sleep.
    pub time_to_sleep: f64,
    pub linear_sleep_tolerance: f64,
    pub angular_sleep_tolerance: f64,
    /// Maximum number of time of impact sub-steps per contact in one step.
    pub max_sub_steps: u32,
    /// Maximum number of contacts handled in one time of impact island.
    pub max_toi_contacts: usize,
    pub allow_sleep: bool,
    pub warm_starting: bool,
    pub continuous_physics: bool,
    /// Solve only one time of impact event per step, for debugging.
    pub sub_stepping: bool,
    /// Clear accumulated forces after every step.
    pub auto_clear_forces: bool,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: [0.0, -10.0],
            velocity_threshold: 1.0,
            baumgarte: 0.2,
            toi_baumgarte: 0.75,
            max_linear_correction: 0.2,
            max_translation: 2.0,
            max_rotation: 0.5 * PI,
            time_to_sleep: 0.5,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: 2.0 / 180.0 * PI,
            max_sub_steps: 8,
            max_toi_contacts: 32,
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            auto_clear_forces: true,
        }
    }
}

impl WorldSettings {
    #[inline]
    pub fn gravity(&self) -> Vec2 {
        Vec2::new(self.gravity[0], self.gravity[1])
    }

    /// Set gravity in a builder-like chain.
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = [gravity.x, gravity.y];
        self
    }
}

#[cfg(all(test, feature = "serde-types"))]
mod tests {
    use super::*;

    #[test]
    fn deserialize_partial_settings() {
        let settings: WorldSettings = ron::from_str(
            "(gravity: (0.0, -9.81), allow_sleep: false, max_sub_steps: 4)",
        )
        .expect("Failed to parse settings");
        assert_eq!(settings.gravity, [0.0, -9.81]);
        assert!(!settings.allow_sleep);
        assert_eq!(settings.max_sub_steps, 4);
        // unspecified fields keep their defaults
        assert_eq!(settings.baumgarte, WorldSettings::default().baumgarte);
        assert!(settings.continuous_physics);
    }
}
