//! Навигационный backend (crowd navigation) + strategic points catalog
//!
//! Backend опционален: без него Movement работает на direct steering.

use bevy::math::Vec3;
use bevy::prelude::Resource;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::obstacles::Aabb;
use super::physics::ActorId;
use crate::shared::{horizontal, horizontal_direction};

/// Handle зарегистрированного агента
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentRef(pub ActorId);

/// Crowd-navigation backend
pub trait NavigationService {
    /// Backend готов принимать агентов (navmesh построен и т.п.)
    fn is_ready(&self) -> bool;
    fn add_agent(&mut self, id: ActorId, position: Vec3, radius: f32) -> Option<AgentRef>;
    fn remove_agent(&mut self, id: ActorId);
    fn set_agent_target(&mut self, id: ActorId, point: Vec3) -> bool;
    fn agent_velocity(&self, id: ActorId) -> Option<Vec3>;
    fn agent_position(&self, id: ActorId) -> Option<Vec3>;
    fn update_agent_position(&mut self, id: ActorId, point: Vec3);
    /// Случайная navigable точка в радиусе (None если не нашли)
    fn random_point_around(&mut self, point: Vec3, radius: f32) -> Option<Vec3>;

    /// Внутренний шаг симуляции crowd (если backend его требует)
    fn step(&mut self, _dt: f32) {}
}

/// Короткий reborrow backend'а: object lifetime сужается до самого borrow'а,
/// иначе `&mut dyn` (инвариантный) держит исходную ссылку до конца функции.
pub fn reborrow_navigation<'s>(
    navigation: &'s mut Option<&mut dyn NavigationService>,
) -> Option<&'s mut dyn NavigationService> {
    match navigation {
        Some(nav) => Some(&mut **nav),
        None => None,
    }
}

/// ECS resource с активным backend'ом
#[derive(Resource)]
pub struct CrowdNavigation(pub Box<dyn NavigationService + Send + Sync>);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatrolPoint {
    pub position: Vec3,
    pub score: f32,
}

/// Заранее размеченная позиция укрытия.
/// `facing` — направление, куда смотрит занявший укрытие (в сторону угрозы).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverSpot {
    pub position: Vec3,
    pub facing: Vec3,
    pub quality: f32,
}

/// Strategic points catalog (patrol hints + cover hints)
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategicPoints {
    pub patrol_points: Vec<PatrolPoint>,
    pub cover_spots: Vec<CoverSpot>,
}

impl StrategicPoints {
    pub fn is_empty(&self) -> bool {
        self.patrol_points.is_empty() && self.cover_spots.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct CrowdAgent {
    position: Vec3,
    velocity: Vec3,
    target: Option<Vec3>,
    radius: f32,
}

/// Headless crowd backend: агенты едут прямо к цели с простой separation.
///
/// `warmup` имитирует backend, который ещё не готов (navmesh строится):
/// пока он не истёк, `add_agent` возвращает None.
#[derive(Debug, Clone)]
pub struct SimpleCrowd {
    agents: BTreeMap<ActorId, CrowdAgent>,
    blocked: Vec<Aabb>,
    max_speed: f32,
    arrival_radius: f32,
    warmup_remaining: f32,
    rng: ChaCha8Rng,
}

impl SimpleCrowd {
    pub fn new(seed: u64) -> Self {
        Self {
            agents: BTreeMap::new(),
            blocked: Vec::new(),
            max_speed: 4.0,
            arrival_radius: 0.5,
            warmup_remaining: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn with_warmup(mut self, seconds: f32) -> Self {
        self.warmup_remaining = seconds;
        self
    }

    pub fn with_max_speed(mut self, speed: f32) -> Self {
        self.max_speed = speed;
        self
    }

    /// Footprint'ы препятствий (XZ), недоступные для random_point_around
    pub fn with_blocked<'a>(mut self, blocked: impl IntoIterator<Item = &'a Aabb>) -> Self {
        self.blocked.extend(blocked.into_iter().copied());
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    fn is_blocked(&self, point: Vec3, margin: f32) -> bool {
        self.blocked.iter().any(|b| {
            point.x >= b.min.x - margin
                && point.x <= b.max.x + margin
                && point.z >= b.min.z - margin
                && point.z <= b.max.z + margin
        })
    }
}

impl NavigationService for SimpleCrowd {
    fn is_ready(&self) -> bool {
        self.warmup_remaining <= 0.0
    }

    fn add_agent(&mut self, id: ActorId, position: Vec3, radius: f32) -> Option<AgentRef> {
        if !self.is_ready() {
            return None;
        }
        self.agents.insert(
            id,
            CrowdAgent {
                position,
                velocity: Vec3::ZERO,
                target: None,
                radius,
            },
        );
        Some(AgentRef(id))
    }

    fn remove_agent(&mut self, id: ActorId) {
        self.agents.remove(&id);
    }

    fn set_agent_target(&mut self, id: ActorId, point: Vec3) -> bool {
        match self.agents.get_mut(&id) {
            Some(agent) => {
                agent.target = Some(point);
                true
            }
            None => false,
        }
    }

    fn agent_velocity(&self, id: ActorId) -> Option<Vec3> {
        self.agents.get(&id).map(|a| a.velocity)
    }

    fn agent_position(&self, id: ActorId) -> Option<Vec3> {
        self.agents.get(&id).map(|a| a.position)
    }

    fn update_agent_position(&mut self, id: ActorId, point: Vec3) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.position = point;
        }
    }

    fn random_point_around(&mut self, point: Vec3, radius: f32) -> Option<Vec3> {
        const ATTEMPTS: usize = 8;
        const MARGIN: f32 = 0.5;

        for _ in 0..ATTEMPTS {
            let angle = self.rng.gen::<f32>() * std::f32::consts::TAU;
            let distance = radius * self.rng.gen::<f32>().sqrt();
            let candidate = point + Vec3::new(angle.sin() * distance, 0.0, angle.cos() * distance);
            if !self.is_blocked(candidate, MARGIN) {
                return Some(candidate);
            }
        }
        None
    }

    fn step(&mut self, dt: f32) {
        if self.warmup_remaining > 0.0 {
            self.warmup_remaining -= dt;
        }

        let positions: Vec<(ActorId, Vec3, f32)> = self
            .agents
            .iter()
            .map(|(id, a)| (*id, a.position, a.radius))
            .collect();

        let max_speed = self.max_speed;
        let arrival_radius = self.arrival_radius;
        let blocked = self.blocked.clone();

        for (id, agent) in self.agents.iter_mut() {
            let mut desired = Vec3::ZERO;
            if let Some(target) = agent.target {
                if let Some(dir) = horizontal_direction(agent.position, target) {
                    let remaining = horizontal(target - agent.position).length();
                    if remaining > arrival_radius {
                        // Замедляемся в последних 2м
                        let speed = max_speed * (remaining / 2.0).min(1.0);
                        desired = dir * speed;
                    }
                }
            }

            // Separation от соседей
            for &(other_id, other_pos, other_radius) in &positions {
                if other_id == *id {
                    continue;
                }
                let away = horizontal(agent.position - other_pos);
                let distance = away.length();
                let min_distance = agent.radius + other_radius;
                if distance > 1e-3 && distance < min_distance {
                    desired += away / distance * (min_distance - distance) * max_speed;
                }
            }

            // Скользим вдоль препятствий: отбрасываем компоненту, ведущую внутрь
            let mut next = agent.position + desired * dt;
            let inside = |p: Vec3| {
                blocked
                    .iter()
                    .any(|b| p.x >= b.min.x && p.x <= b.max.x && p.z >= b.min.z && p.z <= b.max.z)
            };
            if inside(next) {
                let slide_x = agent.position + Vec3::new(desired.x, 0.0, 0.0) * dt;
                let slide_z = agent.position + Vec3::new(0.0, 0.0, desired.z) * dt;
                if !inside(slide_x) {
                    desired.z = 0.0;
                    next = slide_x;
                } else if !inside(slide_z) {
                    desired.x = 0.0;
                    next = slide_z;
                } else {
                    desired = Vec3::ZERO;
                    next = agent.position;
                }
            }

            agent.velocity = desired;
            agent.position = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_rejects_agents_until_ready() {
        let mut crowd = SimpleCrowd::new(7).with_warmup(1.0);
        assert!(!crowd.is_ready());
        assert!(crowd.add_agent(ActorId(1), Vec3::ZERO, 0.4).is_none());

        crowd.step(0.6);
        crowd.step(0.6);
        assert!(crowd.is_ready());
        assert_eq!(crowd.add_agent(ActorId(1), Vec3::ZERO, 0.4), Some(AgentRef(ActorId(1))));
    }

    #[test]
    fn test_reborrow_keeps_backend_with_caller() {
        let mut crowd = SimpleCrowd::new(5);
        let mut navigation: Option<&mut dyn NavigationService> = Some(&mut crowd);

        if let Some(nav) = reborrow_navigation(&mut navigation) {
            nav.add_agent(ActorId(1), Vec3::ZERO, 0.4);
        }
        let position = reborrow_navigation(&mut navigation).and_then(|nav| nav.agent_position(ActorId(1)));
        assert_eq!(position, Some(Vec3::ZERO));

        let mut empty: Option<&mut dyn NavigationService> = None;
        assert!(reborrow_navigation(&mut empty).is_none());
        assert!(navigation.is_some_and(|nav| nav.is_ready()));
    }

    #[test]
    fn test_agent_moves_toward_target() {
        let mut crowd = SimpleCrowd::new(7);
        crowd.add_agent(ActorId(1), Vec3::ZERO, 0.4);
        assert!(crowd.set_agent_target(ActorId(1), Vec3::new(0.0, 0.0, 10.0)));
        assert!(!crowd.set_agent_target(ActorId(2), Vec3::ZERO));

        for _ in 0..30 {
            crowd.step(1.0 / 30.0);
        }

        let position = crowd.agent_position(ActorId(1)).unwrap_or_default();
        let velocity = crowd.agent_velocity(ActorId(1)).unwrap_or_default();
        assert!(position.z > 3.0, "position = {:?}", position);
        assert!(velocity.z > 0.0);
    }

    #[test]
    fn test_random_point_avoids_blocked_footprint() {
        let blocked = [Aabb::from_center(Vec3::ZERO, Vec3::new(50.0, 1.0, 50.0))];
        let mut crowd = SimpleCrowd::new(3).with_blocked(blocked.iter());
        assert!(crowd.random_point_around(Vec3::ZERO, 5.0).is_none());

        let mut open = SimpleCrowd::new(3);
        let point = open.random_point_around(Vec3::new(10.0, 0.0, 10.0), 5.0);
        let point = point.expect("в открытом поле точка всегда находится");
        assert!(horizontal(point - Vec3::new(10.0, 0.0, 10.0)).length() <= 5.0 + 1e-4);
    }
}
