//! ECS слой: TacticalBrain component + системы FixedUpdate
//!
//! Контроллер создаётся лениво при первом обращении: ActorId выводится
//! из Entity, per-actor RNG — из глобального seed (DeterministicRng) и id.

use bevy::prelude::*;

#[cfg(feature = "rapier")]
use bevy_rapier3d::prelude::ReadRapierContext;

use super::context::WorldView;
use super::controller::ActorController;
use super::events::{DamageTaken, SoundEmitted, WeaponFireIntent};
use super::profile::ActorProfile;
use super::state::StateId;
use crate::components::{Actor, Health};
use crate::logger;
use crate::physics::{BodyAdapter, PhysicsBody};
use crate::world::{
    ActorBody, ActorId, ActorRegistry, ActorSnapshot, CrowdNavigation, NavigationService, ObstacleField,
    PhysicsWorld, StrategicPoints,
};
use crate::DeterministicRng;

#[cfg(feature = "rapier")]
use crate::world::rapier::{index_obstacle_colliders, ObstacleColliders, RapierPhysicsWorld};

/// Высота глаз для акторов без мозга (игрок и т.п.)
const DEFAULT_EYE_HEIGHT: f32 = 1.6;

/// Тактический "мозг" актора
#[derive(Component)]
pub struct TacticalBrain {
    profile: ActorProfile,
    start_state: StateId,
    leader: Option<Entity>,
    controller: Option<ActorController>,
}

impl TacticalBrain {
    pub fn new(profile: ActorProfile) -> Self {
        Self {
            profile,
            start_state: StateId::Idle,
            leader: None,
            controller: None,
        }
    }

    pub fn with_start_state(mut self, state: StateId) -> Self {
        self.start_state = state;
        self
    }

    /// Держаться рядом с лидером (Follow)
    pub fn following(mut self, leader: Entity) -> Self {
        self.leader = Some(leader);
        self
    }

    pub fn profile(&self) -> &ActorProfile {
        &self.profile
    }

    /// None до первого FixedUpdate тика
    pub fn controller(&self) -> Option<&ActorController> {
        self.controller.as_ref()
    }

    pub fn state(&self) -> StateId {
        self.controller.as_ref().map_or(self.start_state, |c| c.get_state())
    }

    fn controller_mut(&mut self, entity: Entity, faction_id: u64, seed: u64) -> &mut ActorController {
        self.controller.get_or_insert_with(|| {
            let mut controller = ActorController::new(ActorId::from(entity), faction_id, self.profile.clone(), seed)
                .with_start_state(self.start_state);
            controller.set_leader(self.leader.map(ActorId::from));
            controller
        })
    }
}

/// Tactical AI Plugin
///
/// Порядок в FixedUpdate (chain, детерминизм):
/// 1. release_removed_brains — despawned мозги отдают navigation agent
/// 2. sync_actor_registry — snapshot акторов + коллайдеры акторов в ObstacleField
/// 3. deliver_sound_events — SoundEmitted → on_hear_sound (в радиусе слышимости)
/// 4. deliver_damage_events — DamageTaken → on_take_damage
/// 5. dispose_dead_brains — мёртвые отдают navigation agent
/// 6. tick_tactical_brains — update каждого живого мозга (ascending Entity)
/// 7. step_crowd_navigation — шаг crowd backend'а
/// 8. integrate_bodies — headless интеграция сил
pub struct TacticalAIPlugin;

impl Plugin for TacticalAIPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }

        app.init_resource::<ActorRegistry>()
            .init_resource::<ObstacleField>()
            .add_event::<SoundEmitted>()
            .add_event::<DamageTaken>()
            .add_event::<WeaponFireIntent>()
            .add_systems(
                FixedUpdate,
                (
                    release_removed_brains,
                    sync_actor_registry,
                    deliver_sound_events,
                    deliver_damage_events,
                    dispose_dead_brains,
                    tick_tactical_brains,
                    step_crowd_navigation,
                    crate::physics::integrate_bodies,
                )
                    .chain(),
            );

        #[cfg(feature = "rapier")]
        app.init_resource::<ObstacleColliders>().add_systems(
            FixedUpdate,
            (
                index_obstacle_colliders.before(sync_actor_registry),
                crate::world::rapier::sync_velocity_to_rapier.after(crate::physics::integrate_bodies),
            ),
        );
    }
}

fn backend<'a>(navigation: &'a mut Option<ResMut<'_, CrowdNavigation>>) -> Option<&'a mut dyn NavigationService> {
    match navigation {
        Some(nav) => Some(&mut *nav.0),
        None => None,
    }
}

/// System: despawned TacticalBrain → освобождаем navigation agent
pub fn release_removed_brains(
    mut removed: RemovedComponents<TacticalBrain>,
    mut navigation: Option<ResMut<CrowdNavigation>>,
    mut field: ResMut<ObstacleField>,
) {
    for entity in removed.read() {
        let id = ActorId::from(entity);
        if let Some(nav) = backend(&mut navigation) {
            nav.remove_agent(id);
        }
        field.remove_actor(id);
        logger::log(&format!("🧹 {:?}: brain removed, navigation agent released", id));
    }
}

/// System: пересобрать ActorRegistry и коллайдеры акторов
pub fn sync_actor_registry(
    actors: Query<(Entity, &Actor, &Transform, &Health, Option<&PhysicsBody>, Option<&TacticalBrain>)>,
    mut registry: ResMut<ActorRegistry>,
    mut field: ResMut<ObstacleField>,
) {
    registry.clear();
    field.clear_actors();

    for (entity, actor, transform, health, body, brain) in actors.iter() {
        let id = ActorId::from(entity);
        let position = transform.translation;
        registry.upsert(ActorSnapshot {
            id,
            faction_id: actor.faction_id,
            position,
            velocity: body.map_or(Vec3::ZERO, |b| b.velocity),
            health: health.current as f32,
            max_health: health.max as f32,
            eye_height: brain.map_or(DEFAULT_EYE_HEIGHT, |b| b.profile.eye_height),
        });

        // Мёртвые не блокируют лучи
        if let (Some(body), true) = (body, health.is_alive()) {
            field.set_actor(id, position, body.radius, body.height);
        }
    }
}

/// System: звуки → мозги в радиусе слышимости
pub fn deliver_sound_events(
    mut sounds: EventReader<SoundEmitted>,
    mut brains: Query<(Entity, &Actor, &Transform, &mut TacticalBrain)>,
    rng: Res<DeterministicRng>,
) {
    for sound in sounds.read() {
        for (entity, actor, transform, mut brain) in brains.iter_mut() {
            if sound.source == Some(entity) {
                continue;
            }
            let distance = transform.translation.distance(sound.position);
            if distance > brain.profile.hearing_range {
                continue;
            }
            brain
                .controller_mut(entity, actor.faction_id, rng.seed)
                .on_hear_sound(sound.position, sound.importance);
        }
    }
}

/// System: урон → мозг жертвы
pub fn deliver_damage_events(
    mut damage: EventReader<DamageTaken>,
    mut brains: Query<(&Actor, &mut TacticalBrain)>,
    rng: Res<DeterministicRng>,
) {
    for event in damage.read() {
        let Ok((actor, mut brain)) = brains.get_mut(event.victim) else {
            continue;
        };
        brain
            .controller_mut(event.victim, actor.faction_id, rng.seed)
            .on_take_damage(event.from, event.attacker.map(ActorId::from));
    }
}

/// System: health == 0 → dispose (agent освобождается, таймеры сбрасываются)
pub fn dispose_dead_brains(
    mut brains: Query<(&Health, &mut TacticalBrain)>,
    mut navigation: Option<ResMut<CrowdNavigation>>,
) {
    for (health, mut brain) in brains.iter_mut() {
        if health.is_alive() {
            continue;
        }
        if let Some(controller) = brain.controller.as_mut() {
            if !controller.is_disposed() {
                controller.dispose(backend(&mut navigation));
            }
        }
    }
}

/// System: один update на живой мозг, в порядке возрастания Entity
#[allow(clippy::too_many_arguments)]
pub fn tick_tactical_brains(
    mut brains: Query<(
        Entity,
        &Actor,
        &Health,
        &mut TacticalBrain,
        Option<&mut Transform>,
        Option<&mut PhysicsBody>,
    )>,
    registry: Res<ActorRegistry>,
    field: Res<ObstacleField>,
    strategic: Option<Res<StrategicPoints>>,
    mut navigation: Option<ResMut<CrowdNavigation>>,
    mut fire_intents: EventWriter<WeaponFireIntent>,
    rng: Res<DeterministicRng>,
    time: Res<Time<Fixed>>,
    #[cfg(feature = "rapier")] rapier: ReadRapierContext,
    #[cfg(feature = "rapier")] colliders: Res<ObstacleColliders>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }

    #[cfg(feature = "rapier")]
    let rapier_context = rapier.single().ok();
    #[cfg(feature = "rapier")]
    let rapier_world = rapier_context
        .as_ref()
        .map(|context| RapierPhysicsWorld::new(context, &registry, &field, &colliders));
    #[cfg(feature = "rapier")]
    let physics: &dyn PhysicsWorld = match rapier_world.as_ref() {
        Some(world) => world,
        None => &*field,
    };
    #[cfg(not(feature = "rapier"))]
    let physics: &dyn PhysicsWorld = &*field;

    let world = WorldView {
        physics,
        registry: &registry,
        strategic: strategic.as_deref(),
    };

    let mut order: Vec<Entity> = brains.iter().map(|(entity, ..)| entity).collect();
    order.sort_unstable();

    for entity in order {
        let Ok((entity, actor, health, mut brain, transform, body)) = brains.get_mut(entity) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }

        let mut adapter = match (transform, body) {
            (Some(transform), Some(body)) => Some(BodyAdapter {
                transform: transform.into_inner(),
                body: body.into_inner(),
            }),
            _ => None,
        };

        let mut shots: Vec<Vec3> = Vec::new();
        brain.controller_mut(entity, actor.faction_id, rng.seed).update(
            dt,
            adapter.as_mut().map(|a| a as &mut dyn ActorBody),
            world,
            backend(&mut navigation),
            &mut shots,
        );

        for target_point in shots {
            fire_intents.write(WeaponFireIntent {
                shooter: entity,
                target_point,
            });
        }
    }
}

/// System: шаг crowd backend'а (если он есть)
pub fn step_crowd_navigation(navigation: Option<ResMut<CrowdNavigation>>, time: Res<Time<Fixed>>) {
    if let Some(mut navigation) = navigation {
        navigation.0.step(time.delta_secs());
    }
}
