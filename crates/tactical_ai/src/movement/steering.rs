//! Movement — desired destination → physics forces
//!
//! Два режима:
//! - backend-driven: crowd agent задаёт velocity, мы догоняем её силой
//! - direct steering: направление на цель + obstacle avoidance
//!
//! `move_to`/`stop`/`look_at` только фиксируют намерение, силы применяются в `update`.
//! Velocity никогда не ставится напрямую (P-контроллер через apply_force),
//! иначе коллизии в физике теряют смысл.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::logger;
use crate::shared::{horizontal, horizontal_direction, horizontal_distance, left_of, rotate_y, yaw_of};
use crate::world::{reborrow_navigation, ActorBody, ActorId, AgentRef, BodyRef, NavigationService, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Усиление P-контроллера скорости (1/s)
    pub steering_gain: f32,
    pub braking_gain: f32,
    /// Множители agent velocity при беге/ходьбе
    pub run_multiplier: f32,
    pub walk_multiplier: f32,
    pub arrival_radius: f32,
    /// Дистанция торможения перед точкой (direct steering)
    pub slowdown_distance: f32,
    /// Resync позиции агента, если разошлась больше (метры)
    pub drift_tolerance: f32,
    pub resync_interval: f32,
    /// Дальность луча obstacle avoidance
    pub avoidance_probe: f32,
    /// Угол боковых лучей avoidance (градусы)
    pub avoidance_whisker_degrees: f32,
    pub max_pitch_degrees: f32,
    pub pitch_smoothing: f32,
    /// Backoff регистрации в navigation backend
    pub registration_initial_delay: f32,
    pub registration_max_delay: f32,
    pub registration_max_attempts: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            steering_gain: 6.0,
            braking_gain: 8.0,
            run_multiplier: 1.2,
            walk_multiplier: 0.6,
            arrival_radius: 0.6,
            slowdown_distance: 1.5,
            drift_tolerance: 1.0,
            resync_interval: 0.5,
            avoidance_probe: 3.0,
            avoidance_whisker_degrees: 35.0,
            max_pitch_degrees: 60.0,
            pitch_smoothing: 8.0,
            registration_initial_delay: 0.5,
            registration_max_delay: 4.0,
            registration_max_attempts: 8,
        }
    }
}

/// Состояние регистрации в crowd backend (явный countdown, без callback'ов)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Registration {
    Pending { countdown: f32, delay: f32, attempts: u32 },
    Registered(AgentRef),
    /// Попытки исчерпаны — direct steering до конца жизни актора
    Abandoned,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MoveOrder {
    destination: Vec3,
    speed: f32,
    running: bool,
}

#[derive(Debug, Clone)]
pub struct Movement {
    pub config: MovementConfig,
    id: ActorId,
    radius: f32,
    registration: Registration,
    order: Option<MoveOrder>,
    braking: bool,
    /// Последняя цель, отправленная агенту
    agent_target: Option<Vec3>,
    resync_timer: f32,
    looked_this_tick: bool,
    pitch: f32,
    target_pitch: f32,
}

impl Movement {
    pub fn new(id: ActorId, radius: f32, config: MovementConfig) -> Self {
        Self {
            config,
            id,
            radius,
            registration: Registration::Pending {
                countdown: 0.0,
                delay: config.registration_initial_delay,
                attempts: 0,
            },
            order: None,
            braking: false,
            agent_target: None,
            resync_timer: 0.0,
            looked_this_tick: false,
            pitch: 0.0,
            target_pitch: 0.0,
        }
    }

    pub fn registration(&self) -> Registration {
        self.registration
    }

    pub fn is_backend_driven(&self) -> bool {
        matches!(self.registration, Registration::Registered(_))
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.order.map(|o| o.destination)
    }

    pub fn has_arrived(&self, position: Vec3) -> bool {
        self.order
            .is_some_and(|o| horizontal_distance(position, o.destination) <= self.config.arrival_radius)
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn move_to(&mut self, destination: Vec3, speed: f32, running: bool) {
        self.order = Some(MoveOrder {
            destination,
            speed,
            running,
        });
        self.braking = false;
    }

    pub fn stop(&mut self) {
        self.order = None;
        self.agent_target = None;
        self.braking = true;
    }

    /// Yaw ставится сразу, pitch сглаживается в update
    pub fn look_at(&mut self, body: &mut dyn ActorBody, point: Vec3) {
        let position = body.position();
        if let Some(direction) = horizontal_direction(position, point) {
            body.set_yaw(yaw_of(direction));
            self.looked_this_tick = true;
        }

        let flat = horizontal_distance(position, point);
        let max_pitch = self.config.max_pitch_degrees.to_radians();
        self.target_pitch = (point.y - position.y).atan2(flat.max(1e-3)).clamp(-max_pitch, max_pitch);
    }

    pub fn update(
        &mut self,
        dt: f32,
        body: &mut dyn ActorBody,
        physics: &dyn PhysicsWorld,
        mut navigation: Option<&mut dyn NavigationService>,
    ) {
        self.poll_registration(dt, body.position(), reborrow_navigation(&mut navigation));

        let position = body.position();
        let velocity = horizontal(body.velocity());
        let mass = body.mass();

        match self.order {
            Some(order) if !self.has_arrived(position) => {
                let backend = match (self.registration, reborrow_navigation(&mut navigation)) {
                    (Registration::Registered(agent), Some(nav)) => self.backend_velocity(dt, agent, order, position, nav),
                    _ => None,
                };
                let desired = match backend {
                    Some(desired) => desired,
                    None => self.direct_velocity(physics, order, position),
                };
                body.apply_force((desired - velocity) * self.config.steering_gain * mass);

                if !self.looked_this_tick {
                    if let Some(direction) = horizontal_direction(Vec3::ZERO, desired) {
                        body.set_yaw(yaw_of(direction));
                    }
                }
            }
            Some(_) => {
                // На месте: тормозим, но destination держим (handler сам решит что дальше)
                body.apply_force(-velocity * self.config.braking_gain * mass);
            }
            None => {
                if self.braking {
                    body.apply_force(-velocity * self.config.braking_gain * mass);
                    if velocity.length() < 0.05 {
                        self.braking = false;
                    }
                }
            }
        }

        let blend = (self.config.pitch_smoothing * dt).min(1.0);
        self.pitch += (self.target_pitch - self.pitch) * blend;
        if !self.looked_this_tick {
            self.target_pitch = 0.0;
        }
        self.looked_this_tick = false;
    }

    /// Освобождает агента; дальнейшая регистрация не выполняется
    pub fn dispose(&mut self, navigation: Option<&mut dyn NavigationService>) {
        if let (Registration::Registered(agent), Some(nav)) = (self.registration, navigation) {
            nav.remove_agent(agent.0);
        }
        self.registration = Registration::Disposed;
        self.order = None;
        self.agent_target = None;
    }

    fn poll_registration(&mut self, dt: f32, position: Vec3, navigation: Option<&mut dyn NavigationService>) {
        let Registration::Pending {
            mut countdown,
            mut delay,
            mut attempts,
        } = self.registration
        else {
            return;
        };
        // Нет backend'а вообще — просто direct steering, попытки не тратим
        let Some(nav) = navigation else {
            return;
        };

        countdown -= dt;
        if countdown > 0.0 {
            self.registration = Registration::Pending {
                countdown,
                delay,
                attempts,
            };
            return;
        }

        let agent = if nav.is_ready() {
            nav.add_agent(self.id, position, self.radius)
        } else {
            None
        };

        self.registration = match agent {
            Some(agent) => {
                logger::log(&format!("🧭 {:?}: navigation agent registered", self.id));
                self.agent_target = None;
                Registration::Registered(agent)
            }
            None => {
                attempts += 1;
                if attempts >= self.config.registration_max_attempts {
                    logger::log_warning(&format!(
                        "🧭 {:?}: navigation registration failed {} times, staying on direct steering",
                        self.id, attempts
                    ));
                    Registration::Abandoned
                } else {
                    logger::log(&format!(
                        "🧭 {:?}: navigation backend not ready (attempt {}), retry in {:.1}s",
                        self.id, attempts, delay
                    ));
                    countdown = delay;
                    delay = (delay * 2.0).min(self.config.registration_max_delay);
                    Registration::Pending {
                        countdown,
                        delay,
                        attempts,
                    }
                }
            }
        };
    }

    /// Desired velocity от crowd agent'а; None — агент потерян (fallback на direct)
    fn backend_velocity(
        &mut self,
        dt: f32,
        agent: AgentRef,
        order: MoveOrder,
        position: Vec3,
        nav: &mut dyn NavigationService,
    ) -> Option<Vec3> {
        let moved = self
            .agent_target
            .map_or(true, |target| target.distance(order.destination) > 0.25);
        if moved {
            if !nav.set_agent_target(agent.0, order.destination) {
                logger::log_warning(&format!("🧭 {:?}: agent rejected target, re-registering", self.id));
                self.registration = Registration::Pending {
                    countdown: self.config.registration_initial_delay,
                    delay: self.config.registration_initial_delay,
                    attempts: 0,
                };
                self.agent_target = None;
                return None;
            }
            self.agent_target = Some(order.destination);
        }

        // Resync не каждый тик: телепорт агента сбрасывает его внутреннюю velocity
        self.resync_timer -= dt;
        if self.resync_timer <= 0.0 {
            self.resync_timer = self.config.resync_interval;
            if let Some(agent_position) = nav.agent_position(agent.0) {
                if horizontal_distance(agent_position, position) > self.config.drift_tolerance {
                    nav.update_agent_position(agent.0, position);
                }
            }
        }

        let multiplier = if order.running {
            self.config.run_multiplier
        } else {
            self.config.walk_multiplier
        };
        let desired = horizontal(nav.agent_velocity(agent.0)?) * multiplier;
        Some(desired.clamp_length_max(order.speed))
    }

    fn direct_velocity(&self, physics: &dyn PhysicsWorld, order: MoveOrder, position: Vec3) -> Vec3 {
        let Some(direction) = horizontal_direction(position, order.destination) else {
            return Vec3::ZERO;
        };
        let remaining = horizontal_distance(position, order.destination);
        let direction = self.avoid_obstacles(physics, position, direction, remaining);
        let speed = order.speed * (remaining / self.config.slowdown_distance).min(1.0);
        direction * speed
    }

    /// Луч вперёд; при блокировке уходим в сторону с большим clearance,
    /// смешивая с исходным направлением пропорционально серьёзности
    fn avoid_obstacles(&self, physics: &dyn PhysicsWorld, position: Vec3, direction: Vec3, remaining: f32) -> Vec3 {
        let probe = self.config.avoidance_probe;
        let origin = position + Vec3::Y * 0.9;
        let exclude = Some(BodyRef::Actor(self.id));

        let Some(hit) = physics.raycast_closest(origin, origin + direction * probe, exclude) else {
            return direction;
        };
        if hit.distance >= remaining {
            return direction;
        }

        let clearance = |angle: f32| {
            let whisker = rotate_y(direction, angle);
            physics
                .raycast_closest(origin, origin + whisker * probe, exclude)
                .map_or(probe, |h| h.distance)
        };
        let whisker = self.config.avoidance_whisker_degrees.to_radians();
        let left = left_of(direction);
        let side = if clearance(whisker) >= clearance(-whisker) { left } else { -left };

        let severity = (1.0 - hit.distance / probe).clamp(0.0, 1.0);
        (direction * (1.0 - severity) + side * severity)
            .try_normalize()
            .unwrap_or(side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::FreeBody;
    use crate::world::{ObstacleField, SimpleCrowd};

    const DT: f32 = 1.0 / 60.0;

    fn run(movement: &mut Movement, body: &mut FreeBody, field: &ObstacleField, ticks: usize) {
        for _ in 0..ticks {
            movement.update(DT, body, field, None);
            body.step(DT, Some(field));
        }
    }

    #[test]
    fn test_direct_steering_reaches_destination() {
        let field = ObstacleField::new();
        let mut body = FreeBody::at(Vec3::ZERO);
        let mut movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        movement.move_to(Vec3::new(0.0, 0.0, 6.0), 3.0, false);
        run(&mut movement, &mut body, &field, 300);

        assert!(movement.has_arrived(body.position), "position = {:?}", body.position);
        // Смотрим по ходу движения (+Z)
        assert!(body.forward().z > 0.9);
    }

    #[test]
    fn test_force_is_proportional_not_instant() {
        let field = ObstacleField::new();
        let mut body = FreeBody::at(Vec3::ZERO);
        let mut movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        movement.move_to(Vec3::new(0.0, 0.0, 20.0), 5.0, true);
        run(&mut movement, &mut body, &field, 1);
        let speed = body.body.velocity.length();
        assert!(speed > 0.0 && speed < 5.0, "speed = {}", speed);
    }

    #[test]
    fn test_stop_brakes_gradually() {
        let field = ObstacleField::new();
        let mut body = FreeBody::at(Vec3::ZERO);
        body.body.velocity = Vec3::new(4.0, 0.0, 0.0);
        let mut movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        movement.stop();
        run(&mut movement, &mut body, &field, 1);
        let after_one = body.body.velocity.x;
        assert!(after_one > 0.0 && after_one < 4.0);

        run(&mut movement, &mut body, &field, 120);
        assert!(body.body.velocity.length() < 0.1);
    }

    #[test]
    fn test_avoidance_steers_around_wall() {
        let mut field = ObstacleField::new();
        field.add_block(Vec3::new(0.0, 0.0, 1.5), 1.5, 0.25, 2.0);
        let movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        let direction = movement.avoid_obstacles(&field, Vec3::ZERO, Vec3::Z, 10.0);
        assert!(direction.x.abs() > 0.3, "direction = {:?}", direction);
        assert!((direction.length() - 1.0).abs() < 1e-4);

        // Цель ближе препятствия — не сворачиваем
        let direction = movement.avoid_obstacles(&field, Vec3::ZERO, Vec3::Z, 1.0);
        assert_eq!(direction, Vec3::Z);
    }

    #[test]
    fn test_look_at_sets_yaw_and_clamps_pitch() {
        let mut body = FreeBody::at(Vec3::ZERO);
        let mut movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        movement.look_at(&mut body, Vec3::new(5.0, 100.0, 0.0));
        assert!((body.forward() - Vec3::X).length() < 1e-4);

        let field = ObstacleField::new();
        for _ in 0..120 {
            movement.look_at(&mut body, Vec3::new(5.0, 100.0, 0.0));
            movement.update(DT, &mut body, &field, None);
        }
        let max_pitch = movement.config.max_pitch_degrees.to_radians();
        assert!(movement.pitch() <= max_pitch + 1e-4);
        assert!(movement.pitch() > max_pitch * 0.9);
    }

    #[test]
    fn test_registration_retries_with_backoff_then_registers() {
        let field = ObstacleField::new();
        let mut body = FreeBody::at(Vec3::ZERO);
        // Backend готов через 1.2s: попытки на 0.0, 0.5, 1.5
        let mut crowd = SimpleCrowd::new(1).with_warmup(1.2);
        let mut movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        let mut attempts_seen = Vec::new();
        for _ in 0..120 {
            movement.update(DT, &mut body, &field, Some(&mut crowd));
            crowd.step(DT);
            if let Registration::Pending { attempts, .. } = movement.registration() {
                if attempts_seen.last() != Some(&attempts) {
                    attempts_seen.push(attempts);
                }
            }
        }

        assert!(movement.is_backend_driven());
        assert_eq!(crowd.agent_count(), 1);
        assert_eq!(attempts_seen, vec![1, 2]);
    }

    #[test]
    fn test_registration_gives_up_after_max_attempts() {
        let field = ObstacleField::new();
        let mut body = FreeBody::at(Vec3::ZERO);
        let mut crowd = SimpleCrowd::new(1).with_warmup(f32::INFINITY);
        let mut movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        // 0.5 + 1 + 2 + 4×4 = 19.5s до восьмой попытки
        for _ in 0..(60 * 30) {
            movement.update(DT, &mut body, &field, Some(&mut crowd));
        }
        assert_eq!(movement.registration(), Registration::Abandoned);

        // Direct steering продолжает работать
        movement.move_to(Vec3::new(0.0, 0.0, 5.0), 3.0, false);
        movement.update(DT, &mut body, &field, Some(&mut crowd));
        assert!(body.body.force.z > 0.0);
    }

    #[test]
    fn test_backend_drives_and_dispose_releases_agent() {
        let field = ObstacleField::new();
        let mut body = FreeBody::at(Vec3::ZERO);
        let mut crowd = SimpleCrowd::new(1);
        let mut movement = Movement::new(ActorId(1), 0.4, MovementConfig::default());

        movement.move_to(Vec3::new(0.0, 0.0, 10.0), 5.0, true);
        for _ in 0..60 {
            movement.update(DT, &mut body, &field, Some(&mut crowd));
            crowd.step(DT);
            body.step(DT, Some(&field));
        }
        assert!(movement.is_backend_driven());
        assert!(body.position.z > 1.0, "z = {}", body.position.z);

        movement.dispose(Some(&mut crowd));
        assert_eq!(crowd.agent_count(), 0);
        assert_eq!(movement.registration(), Registration::Disposed);
    }
}
