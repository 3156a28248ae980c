use bevy::math::Vec3;

use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::shared::horizontal_distance;

const SEARCH_POINTS: usize = 4;
const SEARCH_RADIUS: f32 = 6.0;
const POINT_RADIUS: f32 = 1.2;

/// Обходим несколько точек вокруг последней известной позиции цели
#[derive(Debug, Default)]
pub struct SearchHandler {
    points: Vec<Vec3>,
    index: usize,
}

impl StateHandler<TacticalFamily> for SearchHandler {
    fn state(&self) -> StateId {
        StateId::Search
    }

    fn enter(&mut self, ctx: &mut ActorCtx<'_>) {
        let center = ctx
            .blackboard
            .last_known_target_position
            .unwrap_or_else(|| ctx.position());
        self.points.clear();
        self.index = 0;
        for _ in 0..SEARCH_POINTS {
            if let Some(point) = ctx.random_point_around(center, SEARCH_RADIUS) {
                self.points.push(point);
            }
        }
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, _dt: f32) -> Option<StateId> {
        if ctx.sees_target() {
            return Some(StateId::Chase);
        }
        if ctx.blackboard.has_pending_sound() {
            return Some(StateId::Alert);
        }

        let Some(point) = self.points.get(self.index).copied() else {
            return Some(StateId::Patrol);
        };
        if horizontal_distance(ctx.position(), point) <= POINT_RADIUS {
            self.index += 1;
            return None;
        }
        ctx.move_to(point, false);
        None
    }

    fn exit(&mut self, _ctx: &mut ActorCtx<'_>) {
        self.points.clear();
        self.index = 0;
    }
}
