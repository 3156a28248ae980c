use bevy::math::Vec3;
use rand::Rng;

use super::may_seek_cover;
use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::profile::Personality;
use crate::ai::state::StateId;
use crate::shared::{horizontal_distance, left_of};

/// Aggressive сближается до этой доли attack_range
const CLOSE_IN: f32 = 0.4;
/// Длина одного шага стрейфа (метры)
const STRAFE_STEP: f32 = 2.5;
/// Доля cover threshold, ниже которой бросаем атаку ради укрытия
const COVER_FRACTION: f32 = 0.75;

/// Огонь по видимой цели; движение зависит от Personality
#[derive(Debug, Default)]
pub struct AttackHandler {
    strafe_timer: f32,
    strafe_side: f32,
    strafing: bool,
}

impl AttackHandler {
    fn strafe(&mut self, ctx: &mut ActorCtx<'_>, target: Vec3, dt: f32) {
        self.strafe_timer -= dt;
        if self.strafe_timer <= 0.0 {
            self.strafe_timer = ctx.rng.gen_range(0.8..1.6);
            self.strafing = ctx.rng.gen_bool(0.6);
            self.strafe_side = if ctx.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        }

        match ctx.direction_to(target) {
            Some(direction) if self.strafing => {
                let step = ctx.position() + left_of(direction) * self.strafe_side * STRAFE_STEP;
                ctx.move_to(step, false);
            }
            _ => ctx.stop(),
        }
    }
}

impl StateHandler<TacticalFamily> for AttackHandler {
    fn state(&self) -> StateId {
        StateId::Attack
    }

    fn enter(&mut self, _ctx: &mut ActorCtx<'_>) {
        self.strafe_timer = 0.0;
        self.strafing = false;
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, dt: f32) -> Option<StateId> {
        // Цель потеряна: Chase дойдёт до последней позиции и решит про Search
        let Some(target) = ctx.target else {
            return Some(StateId::Chase);
        };
        let profile = ctx.profile;

        if ctx.health_fraction < profile.retreat_health_threshold {
            return Some(StateId::Retreat);
        }
        if ctx.health_fraction < profile.cover_health_threshold * COVER_FRACTION && may_seek_cover(ctx) {
            return Some(StateId::TakeCover);
        }
        if !ctx.target_visible {
            return Some(StateId::Chase);
        }
        let distance = horizontal_distance(ctx.position(), target.position);
        if distance > profile.attack_range * profile.attack_range_tolerance {
            return Some(StateId::Chase);
        }

        match profile.personality {
            Personality::Aggressive => {
                if distance > profile.attack_range * CLOSE_IN {
                    ctx.move_to(target.position, false);
                } else {
                    ctx.stop();
                }
            }
            Personality::Marksman => ctx.stop(),
            Personality::Skirmisher => self.strafe(ctx, target.position, dt),
        }
        ctx.fire_at_target();
        None
    }
}
