use super::{may_seek_cover, slot_point};
use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::profile::Personality;
use crate::ai::state::StateId;
use crate::shared::horizontal_distance;

/// "Недавно" для реакции на урон в Chase (секунды)
const DAMAGE_MEMORY: f32 = 2.0;
/// Доля attack_range, на которой держим слот подхода
const APPROACH_STANDOFF: f32 = 0.8;

/// Тактическое сближение с целью по угловому слоту актора
#[derive(Debug, Default)]
pub struct ChaseHandler;

impl StateHandler<TacticalFamily> for ChaseHandler {
    fn state(&self) -> StateId {
        StateId::Chase
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, dt: f32) -> Option<StateId> {
        let Some(goal) = ctx.engagement_point() else {
            return Some(StateId::Patrol);
        };
        // Цель мертва или пропала — остаётся только последняя позиция
        if ctx.target.is_none() {
            return Some(StateId::Search);
        }

        let profile = ctx.profile;
        let distance = horizontal_distance(ctx.position(), goal);

        if ctx.target_visible {
            let hurt = ctx.blackboard.recently_damaged(DAMAGE_MEMORY)
                || ctx.health_fraction < profile.cover_health_threshold;
            let medium = distance > profile.attack_range && distance < profile.attack_range * 2.0;

            if may_seek_cover(ctx) {
                if hurt && !ctx.has_cover_from_threat() {
                    return Some(StateId::TakeCover);
                }
                if medium && ctx.chance_per_second(profile.caution_chance, dt) {
                    return Some(StateId::TakeCover);
                }
            }
            if distance <= profile.attack_range {
                return Some(StateId::Attack);
            }
            if medium && profile.personality == Personality::Aggressive {
                return Some(StateId::Advance);
            }
            if distance > profile.attack_range * APPROACH_STANDOFF && ctx.chance_per_second(profile.flank_chance, dt) {
                return Some(StateId::Flank);
            }

            let approach = slot_point(goal, ctx.position(), ctx.slot_angle, profile.attack_range * APPROACH_STANDOFF);
            ctx.move_to(approach, true);
            if let Some(target) = ctx.target {
                ctx.look_at(target.eye_position());
            }
        } else {
            if ctx.blackboard.time_since_target_seen > profile.search_grace_period {
                return Some(StateId::Search);
            }
            ctx.move_to(goal, true);
        }
        None
    }
}
