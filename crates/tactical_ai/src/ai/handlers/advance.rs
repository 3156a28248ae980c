use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::shared::horizontal_distance;

use super::may_seek_cover;

/// Фазы bounding overwatch (секунды)
const MOVE_PHASE: f32 = 1.5;
const HOLD_PHASE: f32 = 1.0;
/// Внутри этой доли attack_range переходим в Attack
const ENGAGE_FRACTION: f32 = 0.6;
const DAMAGE_MEMORY: f32 = 1.0;

/// Сближение перебежками с огнём
#[derive(Debug, Default)]
pub struct AdvanceHandler {
    phase_timer: f32,
    moving: bool,
}

impl StateHandler<TacticalFamily> for AdvanceHandler {
    fn state(&self) -> StateId {
        StateId::Advance
    }

    fn enter(&mut self, _ctx: &mut ActorCtx<'_>) {
        self.moving = true;
        self.phase_timer = MOVE_PHASE;
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, dt: f32) -> Option<StateId> {
        let Some(target) = ctx.target else {
            return Some(StateId::Search);
        };
        if ctx.blackboard.recently_damaged(DAMAGE_MEMORY) && may_seek_cover(ctx) {
            return Some(StateId::TakeCover);
        }
        if !ctx.target_visible && ctx.blackboard.time_since_target_seen > ctx.profile.search_grace_period {
            return Some(StateId::Search);
        }
        if horizontal_distance(ctx.position(), target.position) <= ctx.profile.attack_range * ENGAGE_FRACTION {
            return Some(StateId::Attack);
        }

        self.phase_timer -= dt;
        if self.phase_timer <= 0.0 {
            self.moving = !self.moving;
            self.phase_timer = if self.moving { MOVE_PHASE } else { HOLD_PHASE };
        }

        if self.moving {
            ctx.move_to(target.position, true);
        } else {
            ctx.stop();
        }
        ctx.fire_at_target();
        None
    }
}
