use bevy::math::Vec3;
use rand::Rng;

use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::logger;
use crate::shared::horizontal_distance;

const COVER_RADIUS: f32 = 0.8;
/// Минимум в укрытии, прежде чем возвращаться в бой
const MIN_HOLD: f32 = 2.0;
const PEEK_TIME: f32 = 0.8;
/// Без урона столько секунд — можно выходить
const QUIET_PERIOD: f32 = 3.0;

/// Бежим в укрытие, держим позицию, периодически выглядываем и стреляем
#[derive(Debug, Default)]
pub struct TakeCoverHandler {
    cover: Option<Vec3>,
    hold_time: f32,
    peek_timer: f32,
    peeking: bool,
}

impl StateHandler<TacticalFamily> for TakeCoverHandler {
    fn state(&self) -> StateId {
        StateId::TakeCover
    }

    fn enter(&mut self, ctx: &mut ActorCtx<'_>) {
        let position = ctx.position();
        self.cover = ctx
            .threat()
            .and_then(|threat| {
                ctx.cover
                    .find_cover(ctx.world.physics, ctx.world.strategic, ctx.id, position, &threat)
            })
            .map(|point| point.position);
        ctx.blackboard.cover_position = self.cover;
        self.hold_time = 0.0;
        self.peek_timer = ctx.rng.gen_range(1.2..2.5);
        self.peeking = false;

        match self.cover {
            Some(cover) => logger::log(&format!(
                "🛡️ {:?}: taking cover at ({:.1}, {:.1})",
                ctx.id, cover.x, cover.z
            )),
            None => {
                ctx.blackboard.record_cover_failure();
                logger::log(&format!("🛡️ {:?}: no cover found, engaging directly", ctx.id));
            }
        }
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, dt: f32) -> Option<StateId> {
        let Some(cover) = self.cover else {
            return Some(if ctx.sees_target() { StateId::Attack } else { StateId::Chase });
        };
        let profile = ctx.profile;

        if ctx.health_fraction < profile.retreat_health_threshold
            && ctx.blackboard.previous_state != Some(StateId::Retreat)
        {
            return Some(StateId::Retreat);
        }

        if horizontal_distance(ctx.position(), cover) > COVER_RADIUS {
            ctx.move_to(cover, true);
            return None;
        }

        ctx.stop();
        self.hold_time += dt;
        if let Some(threat) = ctx.threat() {
            ctx.look_at(threat.position + Vec3::Y * profile.eye_height);
        }

        self.peek_timer -= dt;
        if self.peek_timer <= 0.0 {
            self.peeking = !self.peeking;
            self.peek_timer = if self.peeking {
                PEEK_TIME
            } else {
                ctx.rng.gen_range(1.2..2.5)
            };
        }
        if self.peeking {
            ctx.fire_at_target();
        }

        let recovered = ctx.health_fraction > profile.cover_health_threshold
            && !ctx.blackboard.recently_damaged(QUIET_PERIOD);
        (recovered && self.hold_time >= MIN_HOLD).then_some(StateId::Attack)
    }

    fn exit(&mut self, ctx: &mut ActorCtx<'_>) {
        self.cover = None;
        ctx.blackboard.cover_position = None;
    }
}
