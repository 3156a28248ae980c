use bevy::math::Vec3;

use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::logger;
use crate::shared::{horizontal_direction, horizontal_distance};
use crate::world::BodyRef;

const RETREAT_DISTANCE: f32 = 12.0;
/// Радиус snap'а к navigable точке
const SNAP_RADIUS: f32 = 2.0;
const ARRIVAL_RADIUS: f32 = 1.0;

/// Отход от угрозы, затем укрытие
#[derive(Debug, Default)]
pub struct RetreatHandler {
    point: Option<Vec3>,
}

impl StateHandler<TacticalFamily> for RetreatHandler {
    fn state(&self) -> StateId {
        StateId::Retreat
    }

    fn enter(&mut self, ctx: &mut ActorCtx<'_>) {
        let position = ctx.position();
        let away = ctx
            .threat()
            .and_then(|threat| horizontal_direction(threat.position, position))
            .unwrap_or_else(|| -ctx.body.forward());

        // Не убегаем сквозь стену: обрезаем по первому препятствию
        let mut distance = RETREAT_DISTANCE;
        let probe = Vec3::Y * 1.0;
        if let Some(hit) = ctx.world.physics.raycast_closest(
            position + probe,
            position + probe + away * RETREAT_DISTANCE,
            Some(BodyRef::Actor(ctx.id)),
        ) {
            distance = (hit.distance - ctx.profile.body_radius * 2.0).max(0.0);
        }

        let point = ctx.snap_to_navigable(position + away * distance, SNAP_RADIUS);
        self.point = Some(point);
        logger::log(&format!(
            "🏃 {:?}: retreating to ({:.1}, {:.1})",
            ctx.id, point.x, point.z
        ));
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, _dt: f32) -> Option<StateId> {
        let Some(point) = self.point else {
            return Some(StateId::TakeCover);
        };
        if horizontal_distance(ctx.position(), point) <= ARRIVAL_RADIUS {
            return Some(StateId::TakeCover);
        }
        ctx.move_to(point, true);
        None
    }

    fn exit(&mut self, _ctx: &mut ActorCtx<'_>) {
        self.point = None;
    }
}
