//! Внешние коллабораторы behavior engine (interfaces + headless реализации)
//!
//! - physics: PhysicsWorld / ActorBody контракты, ActorId, RayHit
//! - obstacles: headless PhysicsWorld (AABB препятствия)
//! - registry: снапшот акторов для резолва weak target references
//! - navigation: crowd-navigation backend + strategic points catalog
//! - rapier: PhysicsWorld поверх bevy_rapier3d (feature "rapier")

pub mod navigation;
pub mod obstacles;
pub mod physics;
pub mod registry;

#[cfg(feature = "rapier")]
pub mod rapier;

pub use navigation::*;
pub use obstacles::*;
pub use physics::*;
pub use registry::*;
