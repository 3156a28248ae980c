//! ECS Components акторов
//!
//! - actor: фракция и здоровье (то, что попадает в ActorRegistry)
//! - PhysicsBody живёт в crate::physics, TacticalBrain — в crate::ai::systems

pub mod actor;

pub use actor::*;
