//! NavigationWrapper — stuck detection/recovery + throttled predictive checks
//!
//! Stuck = смещение от anchor меньше порога дольше timeout'а при активном
//! destination. Recovery: stop, боковой импульс, прыжок (если на земле),
//! небольшой сдвиг позиции и окно, в котором behavior не обновляется.

use bevy::math::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::steering::Movement;
use crate::logger;
use crate::shared::{horizontal, horizontal_direction, horizontal_distance, left_of};
use crate::world::{ActorBody, ActorId, BodyRef, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StuckConfig {
    /// Смещение меньше этого считается "стоим на месте" (метры)
    pub displacement_threshold: f32,
    pub stuck_timeout: f32,
    pub recovery_duration: f32,
    /// Δv бокового импульса (m/s)
    pub lateral_impulse: f32,
    /// Δv прыжка (m/s)
    pub jump_impulse: f32,
    pub nudge_distance: f32,
    /// Predictive forward ray: интервал, порог скорости, дальность
    pub predictive_interval: f32,
    pub predictive_speed: f32,
    pub predictive_distance: f32,
    pub jump_check_interval: f32,
    pub knee_height: f32,
    pub chest_height: f32,
    pub jump_probe: f32,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            displacement_threshold: 0.3,
            stuck_timeout: 1.0,
            recovery_duration: 1.5,
            lateral_impulse: 4.0,
            jump_impulse: 4.5,
            nudge_distance: 0.15,
            predictive_interval: 0.25,
            predictive_speed: 3.0,
            predictive_distance: 4.0,
            jump_check_interval: 0.3,
            knee_height: 0.35,
            chest_height: 1.3,
            jump_probe: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationWrapper {
    pub config: StuckConfig,
    id: ActorId,
    anchor: Option<Vec3>,
    anchor_time: f32,
    recovery_remaining: f32,
    recoveries: u32,
    predictive_timer: f32,
    predictive_checks: u32,
    jump_timer: f32,
}

impl NavigationWrapper {
    pub fn new(id: ActorId, config: StuckConfig) -> Self {
        Self {
            config,
            id,
            anchor: None,
            anchor_time: 0.0,
            recovery_remaining: 0.0,
            recoveries: 0,
            predictive_timer: 0.0,
            predictive_checks: 0,
            jump_timer: 0.0,
        }
    }

    pub fn is_recovering(&self) -> bool {
        self.recovery_remaining > 0.0
    }

    /// Сколько раз срабатывала recovery
    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    pub fn predictive_checks(&self) -> u32 {
        self.predictive_checks
    }

    /// Возвращает true, пока идёт recovery (behavior этот тик пропускает)
    pub fn update(
        &mut self,
        dt: f32,
        body: &mut dyn ActorBody,
        movement: &mut Movement,
        physics: &dyn PhysicsWorld,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        if self.recovery_remaining > 0.0 {
            self.recovery_remaining -= dt;
            if self.recovery_remaining > 0.0 {
                return true;
            }
            self.reset_anchor();
        }

        let position = body.position();
        let moving = movement.destination().is_some() && !movement.has_arrived(position);
        if !moving {
            self.reset_anchor();
            return false;
        }

        match self.anchor {
            Some(anchor) if horizontal_distance(anchor, position) <= self.config.displacement_threshold => {
                self.anchor_time += dt;
                if self.anchor_time > self.config.stuck_timeout {
                    self.recover(body, movement, rng);
                    return true;
                }
            }
            _ => {
                self.anchor = Some(position);
                self.anchor_time = 0.0;
            }
        }

        self.predictive_check(dt, body, physics);
        self.jump_check(dt, body, physics);
        false
    }

    fn reset_anchor(&mut self) {
        self.anchor = None;
        self.anchor_time = 0.0;
    }

    fn recover(&mut self, body: &mut dyn ActorBody, movement: &mut Movement, rng: &mut ChaCha8Rng) {
        let position = body.position();
        let heading = movement
            .destination()
            .and_then(|destination| horizontal_direction(position, destination))
            .unwrap_or_else(|| body.forward());
        let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let lateral = left_of(heading) * side;
        let strength = self.config.lateral_impulse * rng.gen_range(0.7..1.0);
        let mass = body.mass();

        movement.stop();
        body.apply_impulse(lateral * strength * mass);
        let jumped = body.is_grounded();
        if jumped {
            body.apply_impulse(Vec3::Y * self.config.jump_impulse * mass);
        }
        body.set_position(position + lateral * self.config.nudge_distance);

        self.recoveries += 1;
        self.recovery_remaining = self.config.recovery_duration;
        self.reset_anchor();

        logger::log_warning(&format!(
            "🪤 {:?}: stuck at ({:.1}, {:.1}), recovery #{} (jump: {})",
            self.id, position.x, position.z, self.recoveries, jumped
        ));
    }

    /// Forward ray на высокой скорости; при препятствии впереди сбрасываем часть скорости
    fn predictive_check(&mut self, dt: f32, body: &mut dyn ActorBody, physics: &dyn PhysicsWorld) {
        self.predictive_timer -= dt;
        let velocity = horizontal(body.velocity());
        let speed = velocity.length();
        if self.predictive_timer > 0.0 || speed <= self.config.predictive_speed {
            return;
        }
        self.predictive_timer = self.config.predictive_interval;
        self.predictive_checks += 1;

        let origin = body.position() + Vec3::Y * self.config.chest_height;
        let target = origin + velocity / speed * self.config.predictive_distance;
        if let Some(hit) = physics.raycast_closest(origin, target, Some(BodyRef::Actor(self.id))) {
            if matches!(hit.body, BodyRef::Static(_)) {
                body.apply_impulse(-velocity * 0.3 * body.mass());
            }
        }
    }

    /// Колено упирается, грудь свободна → низкое препятствие, прыгаем
    fn jump_check(&mut self, dt: f32, body: &mut dyn ActorBody, physics: &dyn PhysicsWorld) {
        self.jump_timer -= dt;
        if self.jump_timer > 0.0 || !body.is_grounded() {
            return;
        }
        let Some(direction) = horizontal(body.velocity()).try_normalize() else {
            return;
        };
        if body.velocity().length() < 0.5 {
            return;
        }
        self.jump_timer = self.config.jump_check_interval;

        let position = body.position();
        let exclude = Some(BodyRef::Actor(self.id));
        let cast = |height: f32| {
            let origin = position + Vec3::Y * height;
            physics.raycast_closest(origin, origin + direction * self.config.jump_probe, exclude)
        };

        let knee_blocked = cast(self.config.knee_height).is_some_and(|hit| matches!(hit.body, BodyRef::Static(_)));
        if knee_blocked && cast(self.config.chest_height).is_none() {
            body.apply_impulse(Vec3::Y * self.config.jump_impulse * body.mass());
            logger::log(&format!("🦘 {:?}: jumping over low obstacle", self.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MovementConfig;
    use crate::physics::FreeBody;
    use crate::world::ObstacleField;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn setup() -> (NavigationWrapper, Movement, ChaCha8Rng) {
        (
            NavigationWrapper::new(ActorId(1), StuckConfig::default()),
            Movement::new(ActorId(1), 0.4, MovementConfig::default()),
            ChaCha8Rng::seed_from_u64(9),
        )
    }

    #[test]
    fn test_stuck_triggers_recovery_once_per_window() {
        let field = ObstacleField::new();
        let (mut nav, mut movement, mut rng) = setup();
        // Тело не интегрируется: скорость 0, позиция не меняется (кроме nudge)
        let mut body = FreeBody::at(Vec3::ZERO);

        let mut suspended_ticks = 0;
        for _ in 0..(60 * 2 + 20) {
            movement.move_to(Vec3::new(0.0, 0.0, 10.0), 3.0, false);
            if nav.update(DT, &mut body, &mut movement, &field, &mut rng) {
                suspended_ticks += 1;
            }
        }

        // ~1.0s до срабатывания, затем окно 1.5s
        assert_eq!(nav.recoveries(), 1);
        assert!(nav.is_recovering());
        assert!(suspended_ticks > 60, "suspended = {}", suspended_ticks);
        assert!(body.body.impulse.y > 0.0, "jump impulse when grounded");
        assert!(horizontal(body.body.impulse).length() > 0.0);
    }

    #[test]
    fn test_no_stuck_without_destination() {
        let field = ObstacleField::new();
        let (mut nav, mut movement, mut rng) = setup();
        let mut body = FreeBody::at(Vec3::ZERO);

        for _ in 0..300 {
            assert!(!nav.update(DT, &mut body, &mut movement, &field, &mut rng));
        }
        assert_eq!(nav.recoveries(), 0);
    }

    #[test]
    fn test_moving_actor_is_not_stuck() {
        let field = ObstacleField::new();
        let (mut nav, mut movement, mut rng) = setup();
        let mut body = FreeBody::at(Vec3::ZERO);

        movement.move_to(Vec3::new(0.0, 0.0, 50.0), 4.0, true);
        for _ in 0..240 {
            nav.update(DT, &mut body, &mut movement, &field, &mut rng);
            movement.update(DT, &mut body, &field, None);
            body.step(DT, Some(&field));
        }
        assert_eq!(nav.recoveries(), 0);
    }

    #[test]
    fn test_predictive_checks_are_throttled() {
        let field = ObstacleField::new();
        let (mut nav, mut movement, mut rng) = setup();
        let mut body = FreeBody::at(Vec3::ZERO);
        body.body.velocity = Vec3::new(0.0, 0.0, 5.0);

        movement.move_to(Vec3::new(0.0, 0.0, 100.0), 5.0, true);
        for _ in 0..60 {
            body.position += body.body.velocity * DT;
            nav.update(DT, &mut body, &mut movement, &field, &mut rng);
        }
        // 1s при интервале 0.25s: 4 проверки, а не 60
        assert_eq!(nav.predictive_checks(), 4);
    }

    #[test]
    fn test_jump_over_low_obstacle_only() {
        let (mut nav, mut movement, mut rng) = setup();
        movement.move_to(Vec3::new(0.0, 0.0, 20.0), 3.0, false);

        let mut low = ObstacleField::new();
        low.add_block(Vec3::new(0.0, 0.0, 1.0), 1.0, 0.2, 0.6);
        let mut body = FreeBody::at(Vec3::ZERO);
        body.body.velocity = Vec3::new(0.0, 0.0, 2.0);
        nav.update(DT, &mut body, &mut movement, &low, &mut rng);
        assert!(body.body.impulse.y > 0.0);

        let (mut nav, _, _) = setup();
        let mut wall = ObstacleField::new();
        wall.add_block(Vec3::new(0.0, 0.0, 1.0), 1.0, 0.2, 3.0);
        let mut body = FreeBody::at(Vec3::ZERO);
        body.body.velocity = Vec3::new(0.0, 0.0, 2.0);
        nav.update(DT, &mut body, &mut movement, &wall, &mut rng);
        assert_eq!(body.body.impulse.y, 0.0);
    }
}
