//! A 2D rigid body physics engine with a dynamic AABB tree broad phase,
//! persistent contact manifolds, an iterative sequential impulse solver,
//! sleeping islands and continuous collision for fast bodies.

/// Open a profiler span that lasts until the returned guard is dropped.
/// Does nothing unless the `tracy` feature is enabled and the profiler is running.
macro_rules! tracy_span {
    ($name:expr, $fn_name:expr) => {
        tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0))
    };
}

pub mod math;
pub use math::{uv, Angle, Pose, PoseBuilder, Rot, Vec2};

pub mod settings;
pub use settings::WorldSettings;

pub mod error;
pub use error::{ShapeError, WorldError};

pub mod physics;
pub use physics::{
    collision::{self, Chain, Circle, Edge, Polygon, RayCastInput, RayCastOutput, Shape, AABB},
    contact::{
        Contact, ContactEdge, ContactFilter, ContactImpulse, ContactListener, DefaultContactFilter,
    },
    forcefield::{self, ForceField},
    hecs_sync::{HecsSyncManager, HecsSyncOptions},
    Body, BodyDef, BodyKey, BodyType, ContactKey, EntitySet, Filter, Fixture, FixtureDef,
    FixtureKey, Velocity, World,
};

// Re-exported hecs to guarantee versions match
pub use hecs;
