use bevy::math::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

use super::react_to_stimuli;
use crate::ai::context::{ActorCtx, TacticalFamily};
use crate::ai::fsm::StateHandler;
use crate::ai::state::StateId;
use crate::logger;
use crate::shared::horizontal_distance;
use crate::world::PatrolPoint;

/// Сколько waypoint'ов держим впереди
const LOOKAHEAD: usize = 3;
/// Ниже — пополняем очередь
const LOW_WATER: usize = 1;
const WAYPOINT_RADIUS: f32 = 1.0;
const WANDER_RADIUS: f32 = 12.0;
/// Медленнее этого дольше STUCK_WINDOW — очередь перестраивается
const STUCK_SPEED: f32 = 0.3;
const STUCK_WINDOW: f32 = 3.0;

#[derive(Debug, Default)]
pub struct PatrolHandler {
    queue: VecDeque<Vec3>,
    slow_time: f32,
}

impl PatrolHandler {
    fn refill(&mut self, ctx: &mut ActorCtx<'_>) {
        let strategic = ctx.world.strategic.filter(|points| !points.patrol_points.is_empty());
        let mut anchor = self.queue.back().copied().unwrap_or_else(|| ctx.position());

        while self.queue.len() < LOOKAHEAD {
            let next = match strategic {
                Some(points) => pick_weighted(&points.patrol_points, ctx.rng, self.queue.back().copied()),
                None => ctx.random_point_around(anchor, WANDER_RADIUS),
            };
            let Some(point) = next else {
                break;
            };
            self.queue.push_back(point);
            anchor = point;
        }
    }
}

/// Weighted-random по score; повторять последний waypoint избегаем
fn pick_weighted(points: &[PatrolPoint], rng: &mut ChaCha8Rng, avoid: Option<Vec3>) -> Option<Vec3> {
    if points.is_empty() {
        return None;
    }
    let total: f32 = points.iter().map(|p| p.score.max(0.0)).sum();
    let mut roll = || -> Option<Vec3> {
        if total <= 0.0 {
            return points.get(rng.gen_range(0..points.len())).map(|p| p.position);
        }
        let mut remaining = rng.gen::<f32>() * total;
        for point in points {
            remaining -= point.score.max(0.0);
            if remaining <= 0.0 {
                return Some(point.position);
            }
        }
        points.last().map(|p| p.position)
    };

    let mut choice = roll();
    for _ in 0..3 {
        if points.len() < 2 || choice != avoid {
            break;
        }
        choice = roll();
    }
    choice
}

impl StateHandler<TacticalFamily> for PatrolHandler {
    fn state(&self) -> StateId {
        StateId::Patrol
    }

    fn enter(&mut self, ctx: &mut ActorCtx<'_>) {
        self.queue.clear();
        self.slow_time = 0.0;
        self.refill(ctx);
    }

    fn update(&mut self, ctx: &mut ActorCtx<'_>, dt: f32) -> Option<StateId> {
        if let Some(next) = react_to_stimuli(ctx) {
            self.queue.clear();
            return Some(next);
        }
        if ctx.leader.is_some() {
            self.queue.clear();
            return Some(StateId::Follow);
        }

        let position = ctx.position();
        if self
            .queue
            .front()
            .is_some_and(|waypoint| horizontal_distance(position, *waypoint) <= WAYPOINT_RADIUS)
        {
            self.queue.pop_front();
        }
        if self.queue.len() <= LOW_WATER {
            self.refill(ctx);
        }

        if ctx.speed() < STUCK_SPEED {
            self.slow_time += dt;
        } else {
            self.slow_time = 0.0;
        }
        if self.slow_time > STUCK_WINDOW {
            logger::log(&format!("🚶 {:?}: patrol not progressing, refreshing waypoints", ctx.id));
            self.queue.clear();
            self.refill(ctx);
            self.slow_time = 0.0;
        }

        match self.queue.front().copied() {
            Some(waypoint) => ctx.move_to(waypoint, false),
            None => ctx.stop(),
        }
        None
    }

    fn exit(&mut self, _ctx: &mut ActorCtx<'_>) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_weighted_pick_follows_scores() {
        let points = [
            PatrolPoint {
                position: Vec3::X,
                score: 0.0,
            },
            PatrolPoint {
                position: Vec3::Z,
                score: 5.0,
            },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(pick_weighted(&points, &mut rng, None), Some(Vec3::Z));
        }
        assert_eq!(pick_weighted(&[], &mut rng, None), None);
    }
}
