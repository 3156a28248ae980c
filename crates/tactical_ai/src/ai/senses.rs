//! Perception: vision cone + line-of-sight, short-range fan ("slice the pie")
//!
//! Stateless query objects. Зависят только от raycast примитива PhysicsWorld.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use super::profile::ActorProfile;
use crate::shared::{horizontal, rotate_y};
use crate::world::{ActorId, ActorSnapshot, BodyRef, PhysicsWorld, RayHit};

/// Throttling и геометрия target acquisition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SenseConfig {
    /// Интервал между веерами (секунды)
    pub cone_interval: f32,
    pub cone_radius: f32,
    pub cone_angle_degrees: f32,
    pub cone_rays: usize,
    /// Интервал полного LOS-сканирования hostiles (секунды)
    pub sight_interval: f32,
}

impl Default for SenseConfig {
    fn default() -> Self {
        Self {
            cone_interval: 0.2,
            cone_radius: 8.0,
            cone_angle_degrees: 90.0,
            cone_rays: 7,
            sight_interval: 0.25,
        }
    }
}

/// Точка обзора наблюдателя (есть только у актора с физическим телом)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub id: ActorId,
    /// Ноги
    pub position: Vec3,
    pub forward: Vec3,
}

/// Конус зрения + LOS raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Senses {
    pub sight_range: f32,
    /// cos(fov / 2) — порог dot product
    pub fov_cos: f32,
    pub eye_height: f32,
}

impl Senses {
    pub fn new(sight_range: f32, field_of_view_degrees: f32, eye_height: f32) -> Self {
        Self {
            sight_range,
            fov_cos: (field_of_view_degrees.to_radians() * 0.5).cos(),
            eye_height,
        }
    }

    pub fn from_profile(profile: &ActorProfile) -> Self {
        Self::new(profile.sight_range, profile.field_of_view_degrees, profile.eye_height)
    }

    pub fn eye(&self, viewpoint: &Viewpoint) -> Vec3 {
        viewpoint.position + Vec3::Y * self.eye_height
    }

    /// Видит ли наблюдатель цель.
    /// None у любой стороны = нет физического тела = не видит.
    pub fn can_see(&self, physics: &dyn PhysicsWorld, viewer: Option<&Viewpoint>, target: Option<&ActorSnapshot>) -> bool {
        let (Some(viewer), Some(target)) = (viewer, target) else {
            return false;
        };

        let eye = self.eye(viewer);
        let target_eye = target.eye_position();
        if eye.distance(target_eye) > self.sight_range {
            return false;
        }

        // Горизонтальный угол (вертикаль не ограничиваем)
        let to_target = horizontal(target_eye - eye);
        let forward = horizontal(viewer.forward);
        if to_target.length_squared() > 1e-6 && forward.length_squared() > 1e-6 {
            let dot = forward.normalize().dot(to_target.normalize());
            if dot < self.fov_cos {
                return false;
            }
        }

        match physics.raycast_closest(eye, target_eye, Some(BodyRef::Actor(viewer.id))) {
            None => true,
            Some(hit) => hit.body == BodyRef::Actor(target.id),
        }
    }
}

/// Веер коротких лучей вперёд (дешёвое обнаружение в ближнем радиусе)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeDetector {
    /// Направление, если актор стоит на месте (и follow_facing выключен)
    pub default_direction: Vec3,
    /// Стоящий актор "режет пирог" туда, куда повёрнут, а не в default_direction
    pub follow_facing: bool,
    /// Ниже этой горизонтальной скорости актор считается стоящим
    pub min_speed: f32,
}

impl Default for ConeDetector {
    fn default() -> Self {
        Self {
            default_direction: Vec3::Z,
            follow_facing: true,
            min_speed: 0.1,
        }
    }
}

impl ConeDetector {
    /// Детектор на этот тик: при follow_facing fallback — текущий facing тела
    pub fn for_facing(&self, forward: Vec3) -> Self {
        match horizontal(forward).try_normalize() {
            Some(facing) if self.follow_facing => Self {
                default_direction: facing,
                ..*self
            },
            _ => *self,
        }
    }

    /// Центральное направление веера: по скорости, иначе default
    pub fn cone_direction(&self, velocity: Vec3) -> Vec3 {
        let flat = horizontal(velocity);
        if flat.length() > self.min_speed {
            flat.normalize()
        } else {
            self.default_direction
        }
    }

    /// `ray_count` лучей длиной `radius`, равномерно в `total_angle_degrees`
    pub fn cast_cone(
        &self,
        physics: &dyn PhysicsWorld,
        caster: ActorId,
        origin: Vec3,
        velocity: Vec3,
        radius: f32,
        total_angle_degrees: f32,
        ray_count: usize,
    ) -> Vec<RayHit> {
        if ray_count == 0 {
            return Vec::new();
        }

        let center = self.cone_direction(velocity);
        let total = total_angle_degrees.to_radians();
        let (start, step) = if ray_count == 1 {
            (0.0, 0.0)
        } else {
            (-total * 0.5, total / (ray_count - 1) as f32)
        };

        (0..ray_count)
            .filter_map(|i| {
                let direction = rotate_y(center, start + step * i as f32);
                physics.raycast_closest(origin, origin + direction * radius, Some(BodyRef::Actor(caster)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObstacleField;

    fn viewer() -> Viewpoint {
        Viewpoint {
            id: ActorId(1),
            position: Vec3::ZERO,
            forward: Vec3::Z,
        }
    }

    fn target_at(position: Vec3) -> ActorSnapshot {
        ActorSnapshot {
            id: ActorId(2),
            faction_id: 2,
            position,
            velocity: Vec3::ZERO,
            health: 100.0,
            max_health: 100.0,
            eye_height: 1.6,
        }
    }

    fn field_with_actors(target: &ActorSnapshot) -> ObstacleField {
        let mut field = ObstacleField::new();
        field.set_actor(ActorId(1), Vec3::ZERO, 0.4, 1.8);
        field.set_actor(target.id, target.position, 0.4, 1.8);
        field
    }

    #[test]
    fn test_clear_target_in_range_and_fov_is_visible() {
        let senses = Senses::new(30.0, 120.0, 1.6);
        let target = target_at(Vec3::new(2.0, 0.0, 10.0));
        let field = field_with_actors(&target);
        assert!(senses.can_see(&field, Some(&viewer()), Some(&target)));
    }

    #[test]
    fn test_out_of_range_is_never_visible() {
        let senses = Senses::new(30.0, 360.0, 1.6);
        let target = target_at(Vec3::new(0.0, 0.0, 31.0));
        let field = field_with_actors(&target);
        assert!(!senses.can_see(&field, Some(&viewer()), Some(&target)));
    }

    #[test]
    fn test_outside_fov_is_not_visible() {
        let senses = Senses::new(30.0, 120.0, 1.6);
        // 90° вправо при полном FOV 120°
        let target = target_at(Vec3::new(10.0, 0.0, 0.0));
        let field = field_with_actors(&target);
        assert!(!senses.can_see(&field, Some(&viewer()), Some(&target)));

        // Сзади
        let behind = target_at(Vec3::new(0.0, 0.0, -10.0));
        let field = field_with_actors(&behind);
        assert!(!senses.can_see(&field, Some(&viewer()), Some(&behind)));
    }

    #[test]
    fn test_obstacle_between_blocks_sight() {
        let senses = Senses::new(30.0, 120.0, 1.6);
        let target = target_at(Vec3::new(0.0, 0.0, 12.0));
        let mut field = field_with_actors(&target);
        field.add_block(Vec3::new(0.0, 0.0, 6.0), 2.0, 0.5, 2.5);
        assert!(!senses.can_see(&field, Some(&viewer()), Some(&target)));
    }

    #[test]
    fn test_missing_body_is_not_visible() {
        let senses = Senses::new(30.0, 120.0, 1.6);
        let target = target_at(Vec3::new(0.0, 0.0, 5.0));
        let field = field_with_actors(&target);
        assert!(!senses.can_see(&field, None, Some(&target)));
        assert!(!senses.can_see(&field, Some(&viewer()), None));
    }

    #[test]
    fn test_cone_centered_on_velocity_or_default() {
        let cone = ConeDetector::default();
        assert_eq!(cone.cone_direction(Vec3::new(0.05, 0.0, 0.0)), Vec3::Z);
        let dir = cone.cone_direction(Vec3::new(3.0, -1.0, 0.0));
        assert!((dir - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_idle_fallback_follows_facing_only_when_enabled() {
        let facing = ConeDetector::default().for_facing(Vec3::NEG_X);
        assert_eq!(facing.cone_direction(Vec3::ZERO), Vec3::NEG_X);

        let fixed = ConeDetector {
            default_direction: Vec3::X,
            follow_facing: false,
            ..ConeDetector::default()
        }
        .for_facing(Vec3::NEG_X);
        assert_eq!(fixed.cone_direction(Vec3::ZERO), Vec3::X);
        // Движение всегда важнее fallback'а
        assert!((fixed.cone_direction(Vec3::new(0.0, 0.0, 2.0)) - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_cast_cone_returns_hits_within_fan() {
        let mut field = ObstacleField::new();
        field.set_actor(ActorId(1), Vec3::ZERO, 0.4, 1.8);
        // Стена прямо по курсу
        field.add_block(Vec3::new(0.0, 0.0, 4.0), 1.0, 0.25, 2.0);
        let cone = ConeDetector::default();
        let origin = Vec3::new(0.0, 1.0, 0.0);

        let single = cone.cast_cone(&field, ActorId(1), origin, Vec3::ZERO, 6.0, 90.0, 1);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].body, BodyRef::Static(0));

        // Крайние лучи ±45° проходят мимо узкой стены
        let fan = cone.cast_cone(&field, ActorId(1), origin, Vec3::ZERO, 6.0, 90.0, 5);
        assert!(!fan.is_empty() && fan.len() < 5, "hits = {}", fan.len());
        assert!(fan.iter().all(|hit| hit.distance <= 6.0 + 1e-4));

        let none = cone.cast_cone(&field, ActorId(1), origin, Vec3::ZERO, 6.0, 90.0, 0);
        assert!(none.is_empty());
    }
}
