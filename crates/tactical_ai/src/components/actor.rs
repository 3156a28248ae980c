//! Базовые компоненты акторов: Actor, Health

use bevy::prelude::*;

use crate::physics::PhysicsBody;

/// Актор (NPC, игрок) — всё, что может быть целью или наблюдателем
///
/// Автоматически добавляет Health и PhysicsBody через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(Health, PhysicsBody, Transform)]
pub struct Actor {
    /// Stable ID фракции (разные фракции враждебны)
    pub faction_id: u64,
}

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    pub fn heal(&mut self, amount: u32) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }

    /// current / max (0 при max == 0)
    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            0.0
        } else {
            self.current as f32 / self.max as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage() {
        let mut health = Health::new(100);
        health.take_damage(30);
        assert_eq!(health.current, 70);
        assert!(health.is_alive());
        assert!((health.fraction() - 0.7).abs() < 1e-6);

        health.take_damage(100); // Saturating sub
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_health_heal() {
        let mut health = Health::new(100);
        health.take_damage(50);
        health.heal(30);
        assert_eq!(health.current, 80);

        health.heal(100); // Clamped to max
        assert_eq!(health.current, 100);

        health.heal(u32::MAX); // Без переполнения
        assert_eq!(health.current, 100);
    }

    #[test]
    fn test_zero_max_health_fraction() {
        assert_eq!(Health { current: 0, max: 0 }.fraction(), 0.0);
    }
}
