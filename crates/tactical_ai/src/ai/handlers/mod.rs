//! State handlers — одно поведение на StateId
//!
//! Каждый актор получает собственный экземпляр каждого handler'а:
//! handler'ы держат working memory (patrol queue, выбранное укрытие).

mod advance;
mod alert;
mod attack;
mod chase;
mod flank;
mod follow;
mod idle;
mod patrol;
mod retreat;
mod search;
mod take_cover;

pub use advance::AdvanceHandler;
pub use alert::AlertHandler;
pub use attack::AttackHandler;
pub use chase::ChaseHandler;
pub use flank::FlankHandler;
pub use follow::FollowHandler;
pub use idle::IdleHandler;
pub use patrol::PatrolHandler;
pub use retreat::RetreatHandler;
pub use search::SearchHandler;
pub use take_cover::TakeCoverHandler;

use bevy::math::Vec3;

use super::context::{ActorCtx, TacticalFamily};
use super::fsm::StateMachine;
use super::state::StateId;
use crate::shared::{horizontal_direction, horizontal_distance, rotate_y};

/// Пауза перед повторным поиском укрытия, если прошлый ничего не дал (секунды)
const COVER_RETRY_DELAY: f32 = 5.0;

/// Регистрирует полный набор handler'ов в машине одного актора
pub fn register_tactical_handlers(machine: &mut StateMachine<TacticalFamily>) {
    machine.register_handler(Box::new(IdleHandler::default()));
    machine.register_handler(Box::new(PatrolHandler::default()));
    machine.register_handler(Box::new(ChaseHandler));
    machine.register_handler(Box::new(AttackHandler::default()));
    machine.register_handler(Box::new(AlertHandler::default()));
    machine.register_handler(Box::new(SearchHandler::default()));
    machine.register_handler(Box::new(TakeCoverHandler::default()));
    machine.register_handler(Box::new(FlankHandler::default()));
    machine.register_handler(Box::new(AdvanceHandler::default()));
    machine.register_handler(Box::new(FollowHandler::default()));
    machine.register_handler(Box::new(RetreatHandler::default()));
}

/// Реакция "мирных" состояний: видим цель → Chase, слышим звук → Alert
fn react_to_stimuli(ctx: &ActorCtx<'_>) -> Option<StateId> {
    if ctx.sees_target() {
        Some(StateId::Chase)
    } else if ctx.blackboard.has_pending_sound() {
        Some(StateId::Alert)
    } else {
        None
    }
}

pub(crate) fn may_seek_cover(ctx: &ActorCtx<'_>) -> bool {
    ctx.blackboard.time_since_cover_failed > COVER_RETRY_DELAY
}

/// Точка подхода к `goal` на дистанции `standoff`, повёрнутая на угловой слот актора
fn slot_point(goal: Vec3, position: Vec3, slot_angle: f32, standoff: f32) -> Vec3 {
    let from_goal = horizontal_direction(goal, position).unwrap_or(Vec3::Z);
    let standoff = standoff.min(horizontal_distance(goal, position));
    goal + rotate_y(from_goal, slot_angle) * standoff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_point_keeps_standoff_and_rotates() {
        let goal = Vec3::new(0.0, 0.0, 10.0);
        let straight = slot_point(goal, Vec3::ZERO, 0.0, 4.0);
        assert!((straight - Vec3::new(0.0, 0.0, 6.0)).length() < 1e-4);

        let rotated = slot_point(goal, Vec3::ZERO, 0.5, 4.0);
        assert!((horizontal_distance(goal, rotated) - 4.0).abs() < 1e-4);
        assert!(rotated.x.abs() > 0.5);

        // Ближе standoff — точка не дальше актора
        let close = slot_point(goal, Vec3::new(0.0, 0.0, 8.0), 0.0, 4.0);
        assert!((close - Vec3::new(0.0, 0.0, 8.0)).length() < 1e-4);
    }
}
