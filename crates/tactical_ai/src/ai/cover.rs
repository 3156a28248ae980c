//! Cover Finder — поиск и оценка укрытий и flank-позиций
//!
//! Сначала strategic cover spots (размечены заранее), затем dynamic discovery
//! вокруг статических препятствий. Общий мир только читается: два актора
//! могут выбрать одно укрытие в один тик (резервации нет).

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::shared::{horizontal, horizontal_direction, horizontal_distance, left_of};
use crate::world::{ActorId, BodyRef, ObstacleInfo, PhysicsWorld, StrategicPoints};

/// Высота проверочных лучей (присевший актор)
const PROBE_HEIGHT: f32 = 1.0;
/// Высота глаз при выглядывании
const PEEK_HEIGHT: f32 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverConfig {
    pub search_radius: f32,
    /// Минимальный dot(facing, направление на угрозу) для strategic spot
    pub alignment_threshold: f32,
    /// Укрытие принимается только со score строго выше
    pub min_quality: f32,
    pub min_obstacle_height: f32,
    /// Предпочтительная дистанция до угрозы (min, max)
    pub standoff: (f32, f32),
    /// Отступ кандидата от грани препятствия
    pub offset: f32,
    pub flank_distance: f32,
    /// Доля пути, которая должна быть свободна для flank кандидата
    pub flank_clearance: f32,
    /// has_cover_from: луч должен упереться раньше этой доли дистанции
    pub block_fraction: f32,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            search_radius: 15.0,
            alignment_threshold: 0.5,
            min_quality: 0.45,
            min_obstacle_height: 1.0,
            standoff: (8.0, 25.0),
            offset: 1.2,
            flank_distance: 10.0,
            flank_clearance: 0.8,
            block_fraction: 0.9,
        }
    }
}

/// Кандидат укрытия (считается заново на каждый запрос)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPoint {
    pub position: Vec3,
    /// Score ∈ [0, 1]
    pub quality: f32,
    /// Горизонтальная дистанция от актора
    pub distance: f32,
}

/// Угроза: позиция и (если есть) её тело, чтобы лучи от неё не упирались в неё же
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threat {
    pub position: Vec3,
    pub body: Option<ActorId>,
}

impl Threat {
    pub fn at(position: Vec3) -> Self {
        Self { position, body: None }
    }

    fn exclude(&self) -> Option<BodyRef> {
        self.body.map(BodyRef::Actor)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoverFinder {
    pub config: CoverConfig,
}

impl CoverFinder {
    pub fn new(config: CoverConfig) -> Self {
        Self { config }
    }

    /// Лучшее strategic укрытие, иначе первое dynamic выше min_quality
    pub fn find_cover(
        &self,
        physics: &dyn PhysicsWorld,
        strategic: Option<&StrategicPoints>,
        actor: ActorId,
        actor_position: Vec3,
        threat: &Threat,
    ) -> Option<CoverPoint> {
        strategic
            .and_then(|points| self.best_strategic(points, actor_position, threat.position))
            .or_else(|| self.discover_dynamic(physics, actor, actor_position, threat))
    }

    fn best_strategic(&self, points: &StrategicPoints, actor_position: Vec3, threat_position: Vec3) -> Option<CoverPoint> {
        let radius = self.config.search_radius;

        points
            .cover_spots
            .iter()
            .filter_map(|spot| {
                let distance = horizontal_distance(actor_position, spot.position);
                if distance > radius {
                    return None;
                }
                let to_threat = horizontal_direction(spot.position, threat_position)?;
                let facing = horizontal(spot.facing).try_normalize()?;
                let alignment = facing.dot(to_threat);
                if alignment < self.config.alignment_threshold {
                    return None;
                }

                let quality = (spot.quality * alignment * (1.0 - distance / radius)).clamp(0.0, 1.0);
                (quality > self.config.min_quality).then_some(CoverPoint {
                    position: spot.position,
                    quality,
                    distance,
                })
            })
            .max_by(|a, b| a.quality.total_cmp(&b.quality))
    }

    fn discover_dynamic(
        &self,
        physics: &dyn PhysicsWorld,
        actor: ActorId,
        actor_position: Vec3,
        threat: &Threat,
    ) -> Option<CoverPoint> {
        let radius = self.config.search_radius;

        for obstacle in physics.obstacles_near(actor_position, radius) {
            if obstacle.top() < self.config.min_obstacle_height {
                continue;
            }

            // Первый кандидат — сторона, противоположная угрозе
            let away = horizontal_direction(threat.position, obstacle.center).unwrap_or(Vec3::Z);
            let side = left_of(away);
            let ground = Vec3::new(obstacle.center.x, actor_position.y, obstacle.center.z);

            for direction in [away, side, -side, -away] {
                let reach = directional_extent(&obstacle, direction) + self.config.offset;
                let position = ground + direction * reach;

                let distance = horizontal_distance(actor_position, position);
                if distance > radius || !self.reaches_obstacle(physics, actor, position, &obstacle) {
                    continue;
                }

                let quality = self.score_dynamic(physics, actor, position, &obstacle, threat);
                if quality > self.config.min_quality {
                    return Some(CoverPoint {
                        position,
                        quality,
                        distance,
                    });
                }
            }
        }
        None
    }

    /// Кандидат валиден, если луч от него упирается именно в это препятствие
    fn reaches_obstacle(&self, physics: &dyn PhysicsWorld, actor: ActorId, position: Vec3, obstacle: &ObstacleInfo) -> bool {
        let from = position.with_y(PROBE_HEIGHT);
        let to = obstacle.center.with_y(PROBE_HEIGHT.min(obstacle.top() - 0.05));
        physics
            .raycast_closest(from, to, Some(BodyRef::Actor(actor)))
            .is_some_and(|hit| hit.body == BodyRef::Static(obstacle.id))
    }

    fn score_dynamic(
        &self,
        physics: &dyn PhysicsWorld,
        actor: ActorId,
        position: Vec3,
        obstacle: &ObstacleInfo,
        threat: &Threat,
    ) -> f32 {
        let mut score = 0.0;

        // (i) препятствие между угрозой и точкой
        let between = physics
            .raycast_closest(threat.position.with_y(PROBE_HEIGHT), position.with_y(PROBE_HEIGHT), threat.exclude())
            .is_some_and(|hit| hit.body == BodyRef::Static(obstacle.id));
        if between {
            score += 0.5;
        }

        // (ii) дистанция в предпочтительном коридоре
        let standoff = horizontal_distance(position, threat.position);
        let (near, far) = self.config.standoff;
        if (near..=far).contains(&standoff) {
            score += 0.3;
        }

        // (iii) можно выглянуть: сверху или шагом в сторону
        if self.can_peek(physics, actor, position, obstacle, threat) {
            score += 0.2;
        }

        f32::clamp(score, 0.0, 1.0)
    }

    fn can_peek(&self, physics: &dyn PhysicsWorld, actor: ActorId, position: Vec3, obstacle: &ObstacleInfo, threat: &Threat) -> bool {
        let Some(to_threat) = horizontal_direction(position, threat.position) else {
            return true;
        };
        let step = left_of(to_threat) * (obstacle.footprint_radius() + self.config.offset);
        let threat_eye = threat.position.with_y(PEEK_HEIGHT);

        [Vec3::ZERO, step, -step].into_iter().any(|lateral| {
            let eye = (position + lateral).with_y(PEEK_HEIGHT);
            match physics.raycast_closest(eye, threat_eye, Some(BodyRef::Actor(actor))) {
                None => true,
                Some(hit) => threat.body.is_some_and(|body| hit.body == BodyRef::Actor(body)),
            }
        })
    }

    /// Луч от угрозы к актору блокируется заметно раньше актора
    pub fn has_cover_from(&self, physics: &dyn PhysicsWorld, actor: ActorId, actor_position: Vec3, threat: &Threat) -> bool {
        let from = threat.position.with_y(PROBE_HEIGHT);
        let to = actor_position.with_y(actor_position.y + PROBE_HEIGHT);
        let length = from.distance(to);
        if length < 1e-3 {
            return false;
        }

        physics
            .raycast_closest(from, to, threat.exclude())
            .is_some_and(|hit| hit.body != BodyRef::Actor(actor) && hit.distance < length * self.config.block_fraction)
    }

    /// Позиция сбоку от угрозы (слева, затем справа) с относительно свободным путём
    pub fn find_flank_position(&self, physics: &dyn PhysicsWorld, actor: ActorId, actor_position: Vec3, threat_position: Vec3) -> Option<Vec3> {
        let forward = horizontal_direction(actor_position, threat_position)?;
        let side = left_of(forward) * self.config.flank_distance;

        [threat_position + side, threat_position - side]
            .into_iter()
            .map(|candidate| candidate.with_y(actor_position.y))
            .find(|candidate| {
                let from = actor_position + Vec3::Y * PROBE_HEIGHT;
                let to = *candidate + Vec3::Y * PROBE_HEIGHT;
                let length = from.distance(to);
                physics
                    .raycast_closest(from, to, Some(BodyRef::Actor(actor)))
                    .map_or(true, |hit| hit.distance >= length * self.config.flank_clearance)
            })
    }
}

/// Расстояние от центра препятствия до его грани вдоль горизонтального направления
fn directional_extent(obstacle: &ObstacleInfo, direction: Vec3) -> f32 {
    let tx = if direction.x.abs() > 1e-6 { obstacle.half_extents.x / direction.x.abs() } else { f32::INFINITY };
    let tz = if direction.z.abs() > 1e-6 { obstacle.half_extents.z / direction.z.abs() } else { f32::INFINITY };
    tx.min(tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CoverSpot, ObstacleField};

    const ME: ActorId = ActorId(1);

    fn strategic(spots: &[(Vec3, Vec3, f32)]) -> StrategicPoints {
        StrategicPoints {
            patrol_points: Vec::new(),
            cover_spots: spots
                .iter()
                .map(|&(position, facing, quality)| CoverSpot {
                    position,
                    facing,
                    quality,
                })
                .collect(),
        }
    }

    #[test]
    fn test_strategic_prefers_aligned_close_spot() {
        let finder = CoverFinder::default();
        let field = ObstacleField::new();
        let threat = Threat::at(Vec3::new(0.0, 0.0, 30.0));
        let points = strategic(&[
            // Смотрит от угрозы — отбрасывается
            (Vec3::new(1.0, 0.0, 1.0), -Vec3::Z, 1.0),
            // Хорошо выровнен, но далеко
            (Vec3::new(0.0, 0.0, 12.0), Vec3::Z, 1.0),
            // Хорошо выровнен и близко
            (Vec3::new(2.0, 0.0, 2.0), Vec3::Z, 0.9),
        ]);

        let cover = finder
            .find_cover(&field, Some(&points), ME, Vec3::ZERO, &threat)
            .expect("выровненный spot рядом");
        assert_eq!(cover.position, Vec3::new(2.0, 0.0, 2.0));
        assert!(cover.quality > finder.config.min_quality && cover.quality <= 1.0);
    }

    #[test]
    fn test_spots_at_or_below_min_quality_are_never_returned() {
        let finder = CoverFinder::default();
        let field = ObstacleField::new();
        let threat = Threat::at(Vec3::new(0.0, 0.0, 30.0));
        // 0.5 × 1.0 × (1 − 1/15) ≈ 0.47 > 0.45; 0.45 × … ≤ 0.45
        let weak = strategic(&[(Vec3::new(0.0, 0.0, 1.0), Vec3::Z, 0.45)]);
        assert!(finder.find_cover(&field, Some(&weak), ME, Vec3::ZERO, &threat).is_none());

        let ok = strategic(&[(Vec3::new(0.0, 0.0, 1.0), Vec3::Z, 0.5)]);
        let cover = finder.find_cover(&field, Some(&ok), ME, Vec3::ZERO, &threat);
        assert!(cover.is_some_and(|c| c.quality > 0.45));
    }

    #[test]
    fn test_dynamic_cover_behind_obstacle() {
        let finder = CoverFinder::default();
        let mut field = ObstacleField::new();
        let wall = field.add_block(Vec3::new(0.0, 0.0, 5.0), 2.0, 0.5, 1.5);
        let threat = Threat::at(Vec3::new(0.0, 0.0, 20.0));

        let cover = finder
            .find_cover(&field, None, ME, Vec3::ZERO, &threat)
            .expect("за стеной есть укрытие");

        // Сторона стены, дальняя от угрозы
        assert!(cover.position.z < 5.0, "cover = {:?}", cover.position);
        assert!(cover.quality > finder.config.min_quality);
        assert!(finder.has_cover_from(&field, ME, cover.position, &threat));
        assert_eq!(wall, 0);
    }

    #[test]
    fn test_weak_strategic_hints_fall_back_to_dynamic_discovery() {
        let finder = CoverFinder::default();
        let mut field = ObstacleField::new();
        field.add_block(Vec3::new(0.0, 0.0, 5.0), 2.0, 0.5, 1.5);
        let threat = Threat::at(Vec3::new(0.0, 0.0, 20.0));
        // 0.45 × 1.0 × (1 − 1/15) ≈ 0.42 — не проходит min_quality
        let weak_hint = Vec3::new(0.0, 0.0, 1.0);
        let points = strategic(&[(weak_hint, Vec3::Z, 0.45)]);

        let cover = finder
            .find_cover(&field, Some(&points), ME, Vec3::ZERO, &threat)
            .expect("стена рядом даёт dynamic укрытие");

        assert_ne!(cover.position, weak_hint);
        assert!((cover.position - Vec3::new(0.0, 0.0, 3.3)).length() < 1e-4, "cover = {:?}", cover.position);
        assert!(cover.quality > finder.config.min_quality);
    }

    #[test]
    fn test_low_obstacles_are_ignored() {
        let finder = CoverFinder::default();
        let mut field = ObstacleField::new();
        field.add_block(Vec3::new(0.0, 0.0, 5.0), 2.0, 0.5, 0.5);
        let threat = Threat::at(Vec3::new(0.0, 0.0, 20.0));
        assert!(finder.find_cover(&field, None, ME, Vec3::ZERO, &threat).is_none());
    }

    #[test]
    fn test_has_cover_from_open_ground_is_false() {
        let finder = CoverFinder::default();
        let field = ObstacleField::new();
        assert!(!finder.has_cover_from(&field, ME, Vec3::ZERO, &Threat::at(Vec3::new(0.0, 0.0, 10.0))));
    }

    #[test]
    fn test_flank_prefers_left_then_right() {
        let finder = CoverFinder::default();
        let threat = Vec3::new(0.0, 0.0, 20.0);

        let open = ObstacleField::new();
        let left = finder.find_flank_position(&open, ME, Vec3::ZERO, threat).expect("открытое поле");
        assert!((left - Vec3::new(10.0, 0.0, 20.0)).length() < 1e-4, "left = {:?}", left);

        // Блокируем левую сторону рядом с актором
        let mut blocked = ObstacleField::new();
        blocked.add_block(Vec3::new(2.0, 0.0, 3.0), 1.0, 1.0, 3.0);
        let right = finder.find_flank_position(&blocked, ME, Vec3::ZERO, threat).expect("правая сторона свободна");
        assert!((right - Vec3::new(-10.0, 0.0, 20.0)).length() < 1e-4, "right = {:?}", right);
    }
}
