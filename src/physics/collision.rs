//! Geometry and collision detection, independent of bodies and the world.

pub mod aabb;
pub use aabb::{RayCastInput, RayCastOutput, AABB};

pub mod shape;
pub use shape::{Chain, Circle, Edge, MassData, Polygon, Shape};

pub mod dynamic_tree;
pub use dynamic_tree::{DynamicTree, ProxyId};

pub mod broadphase;
pub use broadphase::BroadPhase;

pub mod manifold;
pub use manifold::{ContactId, FeatureType, Manifold, ManifoldPoint, ManifoldType, WorldManifold};

pub mod narrowphase;
pub use narrowphase::collide;

pub mod distance;
pub use distance::{distance, test_overlap, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache};

pub mod toi;
pub use toi::{time_of_impact, ToiInput, ToiOutput, ToiState};
