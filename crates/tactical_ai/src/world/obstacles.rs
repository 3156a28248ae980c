//! Headless physics world: AABB препятствия + box-коллайдеры акторов
//!
//! Используется когда Rapier не подключен (headless симуляция, тесты).
//! Акторы перерегистрируются каждый тик из `ActorRegistry`.

use bevy::math::Vec3;
use bevy::prelude::Resource;

use super::physics::{ActorId, BodyRef, ObstacleInfo, PhysicsWorld, RayHit};
use crate::shared::horizontal_distance;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Slab test для отрезка `origin → end`. Возвращает долю отрезка t ∈ [0, 1] до входа.
    pub fn segment_entry(&self, origin: Vec3, end: Vec3) -> Option<f32> {
        let delta = end - origin;
        let mut t_min = 0.0_f32;
        let mut t_max = 1.0_f32;

        for axis in 0..3 {
            let o = origin[axis];
            let d = delta[axis];
            if d.abs() < 1e-7 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t1 = (self.min[axis] - o) * inv;
            let mut t2 = (self.max[axis] - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}

#[derive(Debug, Clone, Copy)]
struct StaticObstacle {
    id: u32,
    bounds: Aabb,
}

#[derive(Debug, Clone, Copy)]
struct ActorCollider {
    id: ActorId,
    bounds: Aabb,
}

/// Headless PhysicsWorld resource
#[derive(Resource, Debug, Clone, Default)]
pub struct ObstacleField {
    obstacles: Vec<StaticObstacle>,
    actors: Vec<ActorCollider>,
    next_id: u32,
}

impl ObstacleField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить box-препятствие; возвращает его stable id
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.obstacles.push(StaticObstacle {
            id,
            bounds: Aabb::from_center(center, half_extents),
        });
        id
    }

    /// Препятствие стоящее на земле (y = 0) с заданным footprint и высотой
    pub fn add_block(&mut self, ground_center: Vec3, half_width: f32, half_depth: f32, height: f32) -> u32 {
        let center = Vec3::new(ground_center.x, height * 0.5, ground_center.z);
        self.add_box(center, Vec3::new(half_width, height * 0.5, half_depth))
    }

    pub fn static_bounds(&self) -> impl Iterator<Item = &Aabb> + '_ {
        self.obstacles.iter().map(|o| &o.bounds)
    }

    pub fn clear_actors(&mut self) {
        self.actors.clear();
    }

    /// Коллайдер актора: вертикальный box от ног вверх
    pub fn set_actor(&mut self, id: ActorId, feet: Vec3, radius: f32, height: f32) {
        let bounds = Aabb {
            min: Vec3::new(feet.x - radius, feet.y, feet.z - radius),
            max: Vec3::new(feet.x + radius, feet.y + height, feet.z + radius),
        };
        match self.actors.iter_mut().find(|a| a.id == id) {
            Some(existing) => existing.bounds = bounds,
            None => self.actors.push(ActorCollider { id, bounds }),
        }
    }

    pub fn remove_actor(&mut self, id: ActorId) {
        self.actors.retain(|a| a.id != id);
    }

    /// Выталкивание точки (ноги актора с радиусом) из статических препятствий.
    /// Возвращает скорректированную позицию и ось, по которой было выталкивание.
    pub fn resolve_penetration(&self, feet: Vec3, radius: f32, height: f32) -> (Vec3, Option<usize>) {
        let mut position = feet;
        let mut pushed_axis = None;

        for obstacle in &self.obstacles {
            let body = Aabb {
                min: Vec3::new(position.x - radius, position.y, position.z - radius),
                max: Vec3::new(position.x + radius, position.y + height, position.z + radius),
            };
            let overlap_x = body.max.x.min(obstacle.bounds.max.x) - body.min.x.max(obstacle.bounds.min.x);
            let overlap_y = body.max.y.min(obstacle.bounds.max.y) - body.min.y.max(obstacle.bounds.min.y);
            let overlap_z = body.max.z.min(obstacle.bounds.max.z) - body.min.z.max(obstacle.bounds.min.z);
            if overlap_x <= 0.0 || overlap_y <= 0.0 || overlap_z <= 0.0 {
                continue;
            }

            // Выталкиваем по оси минимального перекрытия (только XZ, по Y стоим на земле)
            let center = obstacle.bounds.center();
            if overlap_x < overlap_z {
                position.x += if position.x < center.x { -overlap_x } else { overlap_x };
                pushed_axis = Some(0);
            } else {
                position.z += if position.z < center.z { -overlap_z } else { overlap_z };
                pushed_axis = Some(2);
            }
        }

        (position, pushed_axis)
    }
}

impl PhysicsWorld for ObstacleField {
    fn raycast_closest(&self, origin: Vec3, target: Vec3, exclude: Option<BodyRef>) -> Option<RayHit> {
        let length = origin.distance(target);
        let mut best: Option<(f32, BodyRef)> = None;

        let statics = self
            .obstacles
            .iter()
            .map(|o| (BodyRef::Static(o.id), o.bounds));
        let actors = self.actors.iter().map(|a| (BodyRef::Actor(a.id), a.bounds));

        for (body, bounds) in statics.chain(actors) {
            if Some(body) == exclude {
                continue;
            }
            let Some(t) = bounds.segment_entry(origin, target) else {
                continue;
            };
            if best.map_or(true, |(best_t, _)| t < best_t) {
                best = Some((t, body));
            }
        }

        best.map(|(t, body)| RayHit {
            point: origin.lerp(target, t),
            distance: length * t,
            body,
        })
    }

    fn obstacles_near(&self, center: Vec3, radius: f32) -> Vec<ObstacleInfo> {
        self.obstacles
            .iter()
            .filter_map(|o| {
                let info = ObstacleInfo {
                    id: o.id,
                    center: o.bounds.center(),
                    half_extents: o.bounds.half_extents(),
                };
                (horizontal_distance(center, info.center) <= radius + info.footprint_radius()).then_some(info)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raycast_hits_closest_obstacle() {
        let mut field = ObstacleField::new();
        let near = field.add_block(Vec3::new(0.0, 0.0, 5.0), 1.0, 0.5, 2.0);
        let _far = field.add_block(Vec3::new(0.0, 0.0, 10.0), 1.0, 0.5, 2.0);

        let hit = field
            .raycast_closest(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 20.0), None)
            .expect("должны попасть в препятствие");
        assert_eq!(hit.body, BodyRef::Static(near));
        assert!((hit.distance - 4.5).abs() < 1e-4, "distance = {}", hit.distance);
    }

    #[test]
    fn test_raycast_over_low_obstacle_misses() {
        let mut field = ObstacleField::new();
        field.add_block(Vec3::new(0.0, 0.0, 5.0), 1.0, 0.5, 0.5);

        let hit = field.raycast_closest(Vec3::new(0.0, 1.6, 0.0), Vec3::new(0.0, 1.6, 20.0), None);
        assert!(hit.is_none());
    }

    #[test]
    fn test_raycast_excludes_own_body() {
        let mut field = ObstacleField::new();
        let me = ActorId(1);
        let other = ActorId(2);
        field.set_actor(me, Vec3::ZERO, 0.4, 1.8);
        field.set_actor(other, Vec3::new(0.0, 0.0, 6.0), 0.4, 1.8);

        let hit = field
            .raycast_closest(Vec3::new(0.0, 1.6, 0.0), Vec3::new(0.0, 1.6, 6.0), Some(BodyRef::Actor(me)))
            .expect("должны попасть в другого актора");
        assert_eq!(hit.body, BodyRef::Actor(other));
    }

    #[test]
    fn test_obstacles_near_uses_footprint() {
        let mut field = ObstacleField::new();
        let wide = field.add_block(Vec3::new(12.0, 0.0, 0.0), 3.0, 1.0, 2.0);
        field.add_block(Vec3::new(40.0, 0.0, 0.0), 1.0, 1.0, 2.0);

        let near = field.obstacles_near(Vec3::ZERO, 10.0);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].id, wide);
        assert!((near[0].top() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_resolve_penetration_pushes_out_on_shallow_axis() {
        let mut field = ObstacleField::new();
        field.add_block(Vec3::new(0.0, 0.0, 0.0), 2.0, 2.0, 2.0);

        let (resolved, axis) = field.resolve_penetration(Vec3::new(2.2, 0.0, 0.5), 0.4, 1.8);
        assert_eq!(axis, Some(0));
        assert!((resolved.x - 2.4).abs() < 1e-4, "x = {}", resolved.x);
    }
}
