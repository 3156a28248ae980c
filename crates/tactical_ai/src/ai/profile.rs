//! Параметры актора по архетипам (тюнинг AI)

use serde::{Deserialize, Serialize};

/// Тип поведения в бою (tagged variant, не наследование)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Personality {
    /// Сокращает дистанцию на ходу, любит Advance
    Aggressive,
    /// Стоит и целится
    #[default]
    Marksman,
    /// Стрейфит короткими рывками
    Skirmisher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Archetype {
    Grunt,
    Sniper,
    Assault,
    Companion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub personality: Personality,
    /// Дальность зрения (метры)
    pub sight_range: f32,
    /// Полный угол обзора (градусы)
    pub field_of_view_degrees: f32,
    pub eye_height: f32,
    pub hearing_range: f32,
    /// Дистанция атаки (метры)
    pub attack_range: f32,
    /// Множитель допуска на attack_range в Attack
    pub attack_range_tolerance: f32,
    pub walk_speed: f32,
    pub run_speed: f32,
    pub body_radius: f32,
    /// Health fraction ниже которой ищем укрытие
    pub cover_health_threshold: f32,
    /// Health fraction ниже которой отступаем
    pub retreat_health_threshold: f32,
    /// Сколько можно не видеть цель в Chase до перехода в Search (секунды)
    pub search_grace_period: f32,
    /// Минимальный интервал между выстрелами (секунды)
    pub fire_interval: f32,
    /// Желаемый коридор дистанции до лидера (min, max)
    pub follow_distance: (f32, f32),
    /// Шанс в секунду уйти во Flank из Chase на средней/дальней дистанции
    pub flank_chance: f32,
    /// Шанс в секунду осторожно занять укрытие из Chase на средней дистанции
    pub caution_chance: f32,
}

impl Default for ActorProfile {
    fn default() -> Self {
        Self {
            personality: Personality::Marksman,
            sight_range: 30.0,
            field_of_view_degrees: 120.0,
            eye_height: 1.6,
            hearing_range: 25.0,
            attack_range: 15.0,
            attack_range_tolerance: 1.2,
            walk_speed: 2.5,
            run_speed: 5.0,
            body_radius: 0.4,
            cover_health_threshold: 0.35,
            retreat_health_threshold: 0.15,
            search_grace_period: 3.0,
            fire_interval: 0.5,
            follow_distance: (3.0, 7.0),
            flank_chance: 0.15,
            caution_chance: 0.1,
        }
    }
}

impl ActorProfile {
    pub fn for_archetype(archetype: Archetype) -> Self {
        let base = Self::default();
        match archetype {
            Archetype::Grunt => Self {
                personality: Personality::Skirmisher,
                ..base
            },
            Archetype::Sniper => Self {
                personality: Personality::Marksman,
                sight_range: 60.0,
                field_of_view_degrees: 70.0,
                attack_range: 40.0,
                fire_interval: 1.5,
                cover_health_threshold: 0.5,
                flank_chance: 0.0,
                caution_chance: 0.3,
                ..base
            },
            Archetype::Assault => Self {
                personality: Personality::Aggressive,
                attack_range: 10.0,
                run_speed: 6.0,
                fire_interval: 0.25,
                cover_health_threshold: 0.25,
                retreat_health_threshold: 0.1,
                flank_chance: 0.3,
                caution_chance: 0.0,
                ..base
            },
            Archetype::Companion => Self {
                personality: Personality::Skirmisher,
                field_of_view_degrees: 160.0,
                follow_distance: (2.5, 6.0),
                ..base
            },
        }
    }

    pub fn speed(&self, running: bool) -> f32 {
        if running {
            self.run_speed
        } else {
            self.walk_speed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archetype_presets() {
        let sniper = ActorProfile::for_archetype(Archetype::Sniper);
        assert!(sniper.sight_range > ActorProfile::default().sight_range);
        assert!(sniper.field_of_view_degrees < ActorProfile::default().field_of_view_degrees);
        assert_eq!(sniper.personality, Personality::Marksman);

        let assault = ActorProfile::for_archetype(Archetype::Assault);
        assert_eq!(assault.personality, Personality::Aggressive);
        assert!(assault.retreat_health_threshold < assault.cover_health_threshold);
    }

    #[test]
    fn test_speed_selection() {
        let profile = ActorProfile::default();
        assert_eq!(profile.speed(true), profile.run_speed);
        assert_eq!(profile.speed(false), profile.walk_speed);
    }
}
