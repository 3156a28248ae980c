//! Blackboard — per-actor память
//!
//! Принадлежит ровно одному актору. Хранит последние наблюдения, события
//! урона/звука, cover/destination bookkeeping и elapsed-time счётчики.

use bevy::math::Vec3;

use super::fsm::TransitionListener;
use super::state::StateId;

/// Максимум звуков в очереди (старые и тихие вытесняются)
const MAX_HEARD_SOUNDS: usize = 8;
/// Destination считается "тем же", если сдвинулся меньше (метры)
const DESTINATION_EPSILON: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeardSound {
    pub position: Vec3,
    pub importance: f32,
}

#[derive(Debug, Clone)]
pub struct Blackboard {
    pub last_known_target_position: Option<Vec3>,
    pub time_since_damaged: f32,
    pub time_since_target_seen: f32,
    pub time_since_fired: f32,
    /// Последний поиск укрытия ничего не нашёл
    pub time_since_cover_failed: f32,
    /// Откуда прилетел последний урон
    pub last_damage_source: Option<Vec3>,
    /// Стимул, который сейчас расследует Alert
    pub stimulus_position: Option<Vec3>,
    pub cover_position: Option<Vec3>,
    /// Время, потраченное на текущий destination
    pub move_time: f32,
    destination: Option<Vec3>,
    heard_sounds: Vec<HeardSound>,
    pub previous_state: Option<StateId>,
    pub state_changes: u32,
}

impl Default for Blackboard {
    fn default() -> Self {
        Self {
            last_known_target_position: None,
            time_since_damaged: f32::INFINITY,
            time_since_target_seen: f32::INFINITY,
            time_since_fired: f32::INFINITY,
            time_since_cover_failed: f32::INFINITY,
            last_damage_source: None,
            stimulus_position: None,
            cover_position: None,
            move_time: 0.0,
            destination: None,
            heard_sounds: Vec::new(),
            previous_state: None,
            state_changes: 0,
        }
    }
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Продвигает все таймеры
    pub fn tick(&mut self, dt: f32) {
        self.time_since_damaged += dt;
        self.time_since_target_seen += dt;
        self.time_since_fired += dt;
        self.time_since_cover_failed += dt;
        if self.destination.is_some() {
            self.move_time += dt;
        }
    }

    pub fn record_sighting(&mut self, position: Vec3) {
        self.last_known_target_position = Some(position);
        self.time_since_target_seen = 0.0;
    }

    pub fn record_damage(&mut self, from_position: Vec3) {
        self.last_damage_source = Some(from_position);
        self.time_since_damaged = 0.0;
    }

    pub fn record_shot(&mut self) {
        self.time_since_fired = 0.0;
    }

    pub fn record_cover_failure(&mut self) {
        self.time_since_cover_failed = 0.0;
    }

    pub fn recently_damaged(&self, window: f32) -> bool {
        self.time_since_damaged < window
    }

    pub fn hear_sound(&mut self, position: Vec3, importance: f32) {
        if self.heard_sounds.len() == MAX_HEARD_SOUNDS {
            // Вытесняем самый тихий (при равенстве — самый старый)
            if let Some(index) = self
                .heard_sounds
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.importance.total_cmp(&b.1.importance))
                .map(|(i, _)| i)
            {
                self.heard_sounds.remove(index);
            }
        }
        self.heard_sounds.push(HeardSound { position, importance });
    }

    pub fn has_pending_sound(&self) -> bool {
        !self.heard_sounds.is_empty()
    }

    pub fn heard_sounds(&self) -> &[HeardSound] {
        &self.heard_sounds
    }

    /// Забирает самый важный звук (при равенстве — самый свежий) и очищает очередь
    pub fn take_most_important_sound(&mut self) -> Option<HeardSound> {
        let best = self
            .heard_sounds
            .iter()
            .copied()
            .reduce(|best, sound| if sound.importance >= best.importance { sound } else { best });
        self.heard_sounds.clear();
        best
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Новый destination сбрасывает move_time; тот же (в пределах epsilon) — нет
    pub fn set_destination(&mut self, destination: Vec3) {
        let same = self
            .destination
            .is_some_and(|current| current.distance(destination) < DESTINATION_EPSILON);
        if !same {
            self.move_time = 0.0;
        }
        self.destination = Some(destination);
    }

    pub fn clear_destination(&mut self) {
        self.destination = None;
        self.move_time = 0.0;
    }

    /// Цель забыта (despawn/смерть) — последняя позиция остаётся для Search
    pub fn forget_target(&mut self) {
        self.time_since_target_seen = f32::INFINITY;
    }
}

impl TransitionListener for Blackboard {
    fn on_state_changed(&mut self, from: StateId, _to: StateId) {
        self.previous_state = Some(from);
        self.state_changes += 1;
        self.clear_destination();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_advance_and_reset() {
        let mut board = Blackboard::new();
        assert!(!board.recently_damaged(5.0));

        board.record_damage(Vec3::X);
        board.tick(1.5);
        assert!(board.recently_damaged(2.0));
        assert!(!board.recently_damaged(1.0));
        assert_eq!(board.last_damage_source, Some(Vec3::X));

        board.record_sighting(Vec3::Z);
        board.tick(0.5);
        assert_eq!(board.time_since_target_seen, 0.5);
        assert_eq!(board.last_known_target_position, Some(Vec3::Z));
    }

    #[test]
    fn test_sounds_consumed_most_important_first() {
        let mut board = Blackboard::new();
        board.hear_sound(Vec3::X, 0.3);
        board.hear_sound(Vec3::Y, 1.0);
        board.hear_sound(Vec3::Z, 0.5);
        assert!(board.has_pending_sound());

        let sound = board.take_most_important_sound();
        assert_eq!(sound.map(|s| s.position), Some(Vec3::Y));
        assert!(!board.has_pending_sound());
        assert_eq!(board.take_most_important_sound(), None);
    }

    #[test]
    fn test_sound_queue_is_bounded() {
        let mut board = Blackboard::new();
        for i in 0..12 {
            board.hear_sound(Vec3::splat(i as f32), i as f32);
        }
        assert_eq!(board.heard_sounds().len(), MAX_HEARD_SOUNDS);
        // Самые тихие (0..4) вытеснены
        assert!(board.heard_sounds().iter().all(|s| s.importance >= 4.0));
    }

    #[test]
    fn test_move_time_tracks_destination() {
        let mut board = Blackboard::new();
        board.tick(1.0);
        assert_eq!(board.move_time, 0.0);

        board.set_destination(Vec3::new(10.0, 0.0, 0.0));
        board.tick(1.0);
        board.set_destination(Vec3::new(10.2, 0.0, 0.0));
        board.tick(1.0);
        assert_eq!(board.move_time, 2.0);

        board.set_destination(Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(board.move_time, 0.0);
    }

    #[test]
    fn test_state_change_notification() {
        let mut board = Blackboard::new();
        board.set_destination(Vec3::X);
        board.on_state_changed(StateId::Patrol, StateId::Chase);
        assert_eq!(board.previous_state, Some(StateId::Patrol));
        assert_eq!(board.state_changes, 1);
        assert_eq!(board.destination(), None);
    }
}
