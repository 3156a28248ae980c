//! Headless физика тел акторов
//!
//! Архитектура:
//! - Behavior engine пишет forces/impulses в PhysicsBody (никогда не ставит velocity напрямую)
//! - integrate_bodies интегрирует F = m·a, gravity, ground clamp, выталкивание из препятствий
//! - С Rapier (feature "rapier") velocity дополнительно синхронизируется в rapier Velocity
//!
//! Детерминизм: fixed timestep, никаких thread_rng.

use bevy::prelude::*;

use crate::shared::forward_from_yaw;
use crate::world::{ActorBody, ObstacleField};

pub const GRAVITY: f32 = -9.81;

/// Тело актора (custom velocity integration)
#[derive(Component, Debug, Clone, Copy)]
pub struct PhysicsBody {
    pub velocity: Vec3,
    pub mass: f32,
    /// Накопленная сила за тик (сбрасывается после интеграции)
    pub force: Vec3,
    /// Накопленный импульс за тик
    pub impulse: Vec3,
    pub yaw: f32,
    pub grounded: bool,
    pub radius: f32,
    pub height: f32,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            mass: 70.0,
            force: Vec3::ZERO,
            impulse: Vec3::ZERO,
            yaw: 0.0,
            grounded: true,
            radius: 0.4,
            height: 1.8,
        }
    }
}

/// Один шаг интеграции тела (общий для ECS системы и standalone тел)
pub fn integrate(translation: &mut Vec3, body: &mut PhysicsBody, dt: f32, field: Option<&ObstacleField>) {
    let mass = body.mass.max(0.01);
    body.velocity += body.force / mass * dt + body.impulse / mass;
    body.force = Vec3::ZERO;
    body.impulse = Vec3::ZERO;

    if !body.grounded {
        body.velocity.y += GRAVITY * dt;
    }

    *translation += body.velocity * dt;

    // Пол на y = 0
    if translation.y <= 0.0 {
        translation.y = 0.0;
        if body.velocity.y < 0.0 {
            body.velocity.y = 0.0;
        }
        body.grounded = true;
    } else {
        body.grounded = translation.y < 0.05;
    }

    if let Some(field) = field {
        let (resolved, axis) = field.resolve_penetration(*translation, body.radius, body.height);
        *translation = resolved;
        match axis {
            Some(0) => body.velocity.x = 0.0,
            Some(2) => body.velocity.z = 0.0,
            _ => {}
        }
    }
}

/// Система интеграции всех тел (headless режим)
pub fn integrate_bodies(
    mut query: Query<(&mut Transform, &mut PhysicsBody)>,
    field: Option<Res<ObstacleField>>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();
    let field = field.as_deref();

    for (mut transform, mut body) in query.iter_mut() {
        integrate(&mut transform.translation, &mut body, delta, field);
        transform.rotation = Quat::from_rotation_y(body.yaw);
    }
}

/// ActorBody поверх ECS компонентов
pub struct BodyAdapter<'a> {
    pub transform: &'a mut Transform,
    pub body: &'a mut PhysicsBody,
}

impl ActorBody for BodyAdapter<'_> {
    fn position(&self) -> Vec3 {
        self.transform.translation
    }

    fn velocity(&self) -> Vec3 {
        self.body.velocity
    }

    fn mass(&self) -> f32 {
        self.body.mass
    }

    fn yaw(&self) -> f32 {
        self.body.yaw
    }

    fn set_yaw(&mut self, yaw: f32) {
        self.body.yaw = yaw;
        self.transform.rotation = Quat::from_rotation_y(yaw);
    }

    fn is_grounded(&self) -> bool {
        self.body.grounded
    }

    fn apply_force(&mut self, force: Vec3) {
        self.body.force += force;
    }

    fn apply_impulse(&mut self, impulse: Vec3) {
        self.body.impulse += impulse;
    }

    fn set_position(&mut self, position: Vec3) {
        self.transform.translation = position;
    }
}

/// Тело вне ECS (тесты, headless бинарь без App)
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeBody {
    pub position: Vec3,
    pub body: PhysicsBody,
}

impl FreeBody {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            body: PhysicsBody::default(),
        }
    }

    pub fn step(&mut self, dt: f32, field: Option<&ObstacleField>) {
        integrate(&mut self.position, &mut self.body, dt, field);
    }
}

impl ActorBody for FreeBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.body.velocity
    }

    fn mass(&self) -> f32 {
        self.body.mass
    }

    fn yaw(&self) -> f32 {
        self.body.yaw
    }

    fn set_yaw(&mut self, yaw: f32) {
        self.body.yaw = yaw;
    }

    fn is_grounded(&self) -> bool {
        self.body.grounded
    }

    fn apply_force(&mut self, force: Vec3) {
        self.body.force += force;
    }

    fn apply_impulse(&mut self, impulse: Vec3) {
        self.body.impulse += impulse;
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn forward(&self) -> Vec3 {
        forward_from_yaw(self.body.yaw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_integration_logic() {
        let mut body = FreeBody::at(Vec3::ZERO);
        let delta = 1.0 / 60.0;

        // 70 кг, сила 700 Н → 10 m/s² → после 1 тика 10/60 m/s
        body.apply_force(Vec3::new(700.0, 0.0, 0.0));
        body.step(delta, None);

        assert!((body.body.velocity.x - 10.0 / 60.0).abs() < 1e-4, "vx = {}", body.body.velocity.x);
        assert_eq!(body.body.force, Vec3::ZERO);
    }

    #[test]
    fn test_jump_impulse_then_gravity_lands() {
        let mut body = FreeBody::at(Vec3::ZERO);
        body.apply_impulse(Vec3::new(0.0, 70.0 * 4.0, 0.0)); // 4 m/s вверх

        body.step(1.0 / 60.0, None);
        assert!(body.position.y > 0.0);
        assert!(!body.body.grounded);

        for _ in 0..120 {
            body.step(1.0 / 60.0, None);
        }
        assert_eq!(body.position.y, 0.0);
        assert!(body.body.grounded);
    }

    #[test]
    fn test_obstacle_blocks_body() {
        let mut field = ObstacleField::new();
        field.add_block(Vec3::new(0.0, 0.0, 2.0), 2.0, 0.5, 2.0);

        let mut body = FreeBody::at(Vec3::ZERO);
        body.body.velocity = Vec3::new(0.0, 0.0, 5.0);
        for _ in 0..60 {
            body.step(1.0 / 60.0, Some(&field));
        }

        // Передняя грань препятствия z = 1.5, радиус тела 0.4
        assert!(body.position.z <= 1.1 + 1e-3, "z = {}", body.position.z);
    }
}
