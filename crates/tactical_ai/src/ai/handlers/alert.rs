use bevy::math::Vec3;

use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::logger;
use crate::shared::horizontal_distance;

/// Сколько расследуем стимул без новых данных (секунды)
const ALERT_DURATION: f32 = 6.0;
const ARRIVAL_RADIUS: f32 = 1.5;
/// Скорость осмотра на месте (рад/с)
const SCAN_RATE: f32 = 1.5;

/// Идём к запомненному стимулу, осматриваемся, сдаёмся по countdown
#[derive(Debug, Default)]
pub struct AlertHandler {
    countdown: f32,
}

impl AlertHandler {
    /// Забирает самый важный звук в stimulus
    fn absorb_sound(ctx: &mut ActorCtx<'_>) -> bool {
        match ctx.blackboard.take_most_important_sound() {
            Some(sound) => {
                ctx.blackboard.stimulus_position = Some(sound.position);
                true
            }
            None => false,
        }
    }
}

impl StateHandler<TacticalFamily> for AlertHandler {
    fn state(&self) -> StateId {
        StateId::Alert
    }

    fn enter(&mut self, ctx: &mut ActorCtx<'_>) {
        if !Self::absorb_sound(ctx) && ctx.blackboard.stimulus_position.is_none() {
            ctx.blackboard.stimulus_position = ctx
                .blackboard
                .last_damage_source
                .or(ctx.blackboard.last_known_target_position);
        }
        self.countdown = ALERT_DURATION;

        let stimulus = ctx.blackboard.stimulus_position.unwrap_or(Vec3::ZERO);
        logger::log(&format!(
            "❗ {:?}: alerted, investigating ({:.1}, {:.1})",
            ctx.id, stimulus.x, stimulus.z
        ));
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, dt: f32) -> Option<StateId> {
        if ctx.sees_target() {
            return Some(StateId::Chase);
        }
        if Self::absorb_sound(ctx) {
            self.countdown = ALERT_DURATION;
        }

        match ctx.blackboard.stimulus_position {
            Some(stimulus) if horizontal_distance(ctx.position(), stimulus) > ARRIVAL_RADIUS => {
                ctx.move_to(stimulus, false);
            }
            _ => {
                ctx.stop();
                let yaw = ctx.body.yaw() + SCAN_RATE * dt;
                ctx.body.set_yaw(yaw);
            }
        }

        self.countdown -= dt;
        (self.countdown <= 0.0).then_some(StateId::Patrol)
    }

    fn exit(&mut self, ctx: &mut ActorCtx<'_>) {
        ctx.blackboard.stimulus_position = None;
    }
}
