use bevy::math::Vec3;

use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::logger;
use crate::shared::horizontal_distance;

const ARRIVAL_RADIUS: f32 = 1.0;

/// Выход на фланг с огнём на ходу
#[derive(Debug, Default)]
pub struct FlankHandler {
    position: Option<Vec3>,
}

impl StateHandler<TacticalFamily> for FlankHandler {
    fn state(&self) -> StateId {
        StateId::Flank
    }

    fn enter(&mut self, ctx: &mut ActorCtx<'_>) {
        let position = ctx.position();
        self.position = ctx
            .engagement_point()
            .and_then(|threat| ctx.cover.find_flank_position(ctx.world.physics, ctx.id, position, threat));
        if self.position.is_none() {
            logger::log(&format!("↪️ {:?}: no flank route, engaging directly", ctx.id));
        }
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, _dt: f32) -> Option<StateId> {
        let Some(flank) = self.position else {
            return Some(if ctx.sees_target() { StateId::Attack } else { StateId::Chase });
        };
        if ctx.target.is_none() {
            return Some(StateId::Attack);
        }
        if !ctx.target_visible && ctx.blackboard.time_since_target_seen > ctx.profile.search_grace_period {
            return Some(StateId::Attack);
        }
        if horizontal_distance(ctx.position(), flank) <= ARRIVAL_RADIUS {
            return Some(StateId::Attack);
        }

        ctx.move_to(flank, true);
        ctx.fire_at_target();
        None
    }

    fn exit(&mut self, _ctx: &mut ActorCtx<'_>) {
        self.position = None;
    }
}
