//! Контракты физики, которые потребляет behavior engine.
//!
//! Behavior engine не владеет физикой: только синхронные raycast'ы против
//! общего мира и accessors/mutators своего тела.

use bevy::math::Vec3;
use bevy::prelude::Entity;
use serde::{Deserialize, Serialize};

use crate::shared::forward_from_yaw;

/// Stable handle актора (weak reference, резолвится через `ActorRegistry` каждый тик)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl From<Entity> for ActorId {
    fn from(entity: Entity) -> Self {
        Self(entity.to_bits())
    }
}

impl ActorId {
    /// Только для id, полученных через `From<Entity>`
    pub fn entity(self) -> Entity {
        Entity::from_bits(self.0)
    }
}

/// Во что попал луч
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRef {
    Actor(ActorId),
    Static(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
    pub body: BodyRef,
}

/// Статическое препятствие для dynamic cover discovery
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleInfo {
    pub id: u32,
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl ObstacleInfo {
    /// Высота верхней грани
    pub fn top(&self) -> f32 {
        self.center.y + self.half_extents.y
    }

    /// Горизонтальный "радиус" (половина большей стороны)
    pub fn footprint_radius(&self) -> f32 {
        self.half_extents.x.max(self.half_extents.z)
    }
}

/// Shared physics world (raycasts + static obstacle queries)
pub trait PhysicsWorld {
    /// Ближайшее пересечение отрезка `origin → target`.
    /// `exclude` — тело, которое игнорируется (обычно сам кастующий актор).
    fn raycast_closest(&self, origin: Vec3, target: Vec3, exclude: Option<BodyRef>) -> Option<RayHit>;

    /// Статические препятствия, чей footprint пересекает круг `center`/`radius` (XZ)
    fn obstacles_near(&self, center: Vec3, radius: f32) -> Vec<ObstacleInfo>;
}

/// Физическое тело управляемого актора
///
/// Position = точка у ног (ground level). Forces накапливаются до шага интеграции.
pub trait ActorBody {
    fn position(&self) -> Vec3;
    fn velocity(&self) -> Vec3;
    fn mass(&self) -> f32;
    fn yaw(&self) -> f32;
    fn set_yaw(&mut self, yaw: f32);
    fn is_grounded(&self) -> bool;
    fn apply_force(&mut self, force: Vec3);
    fn apply_impulse(&mut self, impulse: Vec3);
    fn set_position(&mut self, position: Vec3);

    fn forward(&self) -> Vec3 {
        forward_from_yaw(self.yaw())
    }
}
