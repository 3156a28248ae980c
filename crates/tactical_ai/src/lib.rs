//! Tactical AI Core
//!
//! Behavior engine для NPC: interruptible FSM, blackboard, perception,
//! cover/flank reasoning, navigation-integrated locomotion со stuck recovery.
//!
//! Ядро (ai, movement, world) — plain Rust поверх узких трейтов
//! (PhysicsWorld, ActorBody, NavigationService, WeaponPort).
//! Bevy ECS слой (TacticalAIPlugin) гоняет его из FixedUpdate.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod ai;
pub mod components;
pub mod error;
pub mod logger;
pub mod movement;
pub mod physics;
pub mod shared;
pub mod world;

// Re-exports для удобства
pub use ai::{
    ActorController, ActorProfile, Archetype, DamageTaken, Personality, SoundEmitted, StateId, StateTable,
    TacticalAIPlugin, TacticalBrain, WeaponFireIntent,
};
pub use components::{Actor, Health};
pub use error::BehaviorError;
pub use logger::init_logger;
pub use physics::{FreeBody, PhysicsBody};
pub use world::{ActorId, CrowdNavigation, ObstacleField, SimpleCrowd, StrategicPoints};

/// Главный plugin: fixed timestep + tactical AI
pub struct TacticalSimulationPlugin;

impl Plugin for TacticalSimulationPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .add_plugins(TacticalAIPlugin);
    }
}

/// Детерминистичный RNG resource (seeded)
///
/// Per-actor потоки выводятся из `seed` и ActorId, `rng` — для хоста.
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Один fixed тик вручную (без wall clock → воспроизводимо)
pub fn advance_fixed_tick(app: &mut App) {
    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    app.world_mut().resource_mut::<Time<Fixed>>().advance_by(timestep);
    app.world_mut().run_schedule(FixedUpdate);
}

/// Snapshot мозгов для сравнения детерминизма: (entity, state, position)
pub fn tactical_snapshot(world: &mut World) -> Vec<(Entity, StateId, Vec3)> {
    let mut query = world.query::<(Entity, &TacticalBrain, &Transform)>();
    let mut snapshot: Vec<_> = query
        .iter(world)
        .map(|(entity, brain, transform)| (entity, brain.state(), transform.translation))
        .collect();

    // Сортируем по Entity для детерминизма
    snapshot.sort_by_key(|(entity, ..)| *entity);
    snapshot
}
