use bevy::math::Vec3;

use super::react_to_stimuli;
use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::shared::{horizontal_direction, horizontal_distance, rotate_y};

/// Держим коридор дистанции до лидера
#[derive(Debug, Default)]
pub struct FollowHandler {
    moving: bool,
}

impl StateHandler<TacticalFamily> for FollowHandler {
    fn state(&self) -> StateId {
        StateId::Follow
    }

    fn enter(&mut self, _ctx: &mut ActorCtx<'_>) {
        self.moving = false;
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, _dt: f32) -> Option<StateId> {
        if let Some(next) = react_to_stimuli(ctx) {
            return Some(next);
        }
        let Some(leader) = ctx.leader else {
            return Some(StateId::Idle);
        };

        let (near, far) = ctx.profile.follow_distance;
        let position = ctx.position();
        let distance = horizontal_distance(position, leader.position);
        let from_leader = horizontal_direction(leader.position, position).unwrap_or(-Vec3::Z);

        if distance > far || (self.moving && !ctx.has_arrived()) {
            // Место в строю: середина коридора, повёрнутая на свой слот
            let spot = leader.position + rotate_y(from_leader, ctx.slot_angle) * ((near + far) * 0.5);
            ctx.move_to(spot, distance > far * 1.5);
            self.moving = true;
        } else if distance < near {
            ctx.move_to(leader.position + from_leader * (near + 0.5), false);
            self.moving = true;
        } else {
            ctx.stop();
            self.moving = false;
        }
        None
    }
}
