//! Tactical AI events — вход (звук, урон) и выход (намерение выстрелить)
//!
//! Баллистика, патроны и применение урона — снаружи. Хост пишет
//! SoundEmitted/DamageTaken, читает WeaponFireIntent.

use bevy::prelude::*;

/// Event: где-то прозвучал звук (выстрел, шаги, взрыв)
///
/// Доставляется всем TacticalBrain в пределах их hearing_range.
#[derive(Event, Debug, Clone)]
pub struct SoundEmitted {
    pub position: Vec3,
    /// Важность 0..1 (Alert расследует самый важный)
    pub importance: f32,
    /// Источник звука сам себя не слышит
    pub source: Option<Entity>,
}

/// Event: актор получил урон
#[derive(Event, Debug, Clone)]
pub struct DamageTaken {
    pub victim: Entity,
    /// Кто стрелял (None — окружение, неизвестный источник)
    pub attacker: Option<Entity>,
    /// Откуда прилетело
    pub from: Vec3,
}

/// Event: актор ХОЧЕТ выстрелить в точку (weapon collaborator решает остальное)
#[derive(Event, Debug, Clone)]
pub struct WeaponFireIntent {
    pub shooter: Entity,
    pub target_point: Vec3,
}
