use rand::Rng;

use super::react_to_stimuli;
use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;

/// Стоим, короткая случайная пауза, затем Patrol (или Follow при наличии лидера)
#[derive(Debug, Default)]
pub struct IdleHandler {
    wait: f32,
}

impl StateHandler<TacticalFamily> for IdleHandler {
    fn state(&self) -> StateId {
        StateId::Idle
    }

    fn enter(&mut self, ctx: &mut ActorCtx<'_>) {
        ctx.stop();
        self.wait = ctx.rng.gen_range(0.5..1.5);
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, dt: f32) -> Option<StateId> {
        if let Some(next) = react_to_stimuli(ctx) {
            return Some(next);
        }
        if ctx.leader.is_some() {
            return Some(StateId::Follow);
        }

        self.wait -= dt;
        (self.wait <= 0.0).then_some(StateId::Patrol)
    }
}
