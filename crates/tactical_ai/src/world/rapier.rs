//! PhysicsWorld поверх bevy_rapier3d
//!
//! Raycast'ы идут в rapier query pipeline, статический каталог препятствий
//! (для dynamic cover discovery) остаётся в `ObstacleField` — он зеркалит
//! level geometry и не меняется в рантайме. Collider entity уровня несёт
//! `ObstacleId`, чтобы попадание луча сопоставлялось с id каталога.

use std::collections::BTreeMap;

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use super::obstacles::ObstacleField;
use super::physics::{ActorId, BodyRef, ObstacleInfo, PhysicsWorld, RayHit};
use super::registry::ActorRegistry;
use crate::physics::PhysicsBody;

/// Статика без `ObstacleId` (пол, декор): в cover discovery не участвует
pub const UNCATALOGUED: u32 = u32::MAX;

/// Id препятствия в `ObstacleField` для его rapier collider'а
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObstacleId(pub u32);

/// Collider entity → id каталога (ведёт `index_obstacle_colliders`)
#[derive(Resource, Debug, Default)]
pub struct ObstacleColliders(BTreeMap<Entity, u32>);

impl ObstacleColliders {
    pub fn get(&self, entity: Entity) -> Option<u32> {
        self.0.get(&entity).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Во что попал луч: актор из registry, препятствие каталога или прочая статика
pub fn classify_hit(entity: Entity, actors: &ActorRegistry, colliders: &ObstacleColliders) -> BodyRef {
    let id = ActorId::from(entity);
    if actors.resolve(id).is_some() {
        return BodyRef::Actor(id);
    }
    BodyRef::Static(colliders.get(entity).unwrap_or(UNCATALOGUED))
}

pub struct RapierPhysicsWorld<'a, 'w> {
    context: &'a RapierContext<'w>,
    actors: &'a ActorRegistry,
    catalog: &'a ObstacleField,
    colliders: &'a ObstacleColliders,
}

impl<'a, 'w> RapierPhysicsWorld<'a, 'w> {
    pub fn new(
        context: &'a RapierContext<'w>,
        actors: &'a ActorRegistry,
        catalog: &'a ObstacleField,
        colliders: &'a ObstacleColliders,
    ) -> Self {
        Self {
            context,
            actors,
            catalog,
            colliders,
        }
    }
}

impl PhysicsWorld for RapierPhysicsWorld<'_, '_> {
    fn raycast_closest(&self, origin: Vec3, target: Vec3, exclude: Option<BodyRef>) -> Option<RayHit> {
        let delta = target - origin;
        let length = delta.length();
        if length < 1e-6 {
            return None;
        }
        let direction = delta / length;

        let mut filter = QueryFilter::default();
        if let Some(BodyRef::Actor(id)) = exclude {
            filter = filter.exclude_rigid_body(id.entity());
        }

        let (entity, toi) = self.context.cast_ray(origin, direction, length, true, filter)?;
        Some(RayHit {
            point: origin + direction * toi,
            distance: toi,
            body: classify_hit(entity, self.actors, self.colliders),
        })
    }

    fn obstacles_near(&self, center: Vec3, radius: f32) -> Vec<ObstacleInfo> {
        self.catalog.obstacles_near(center, radius)
    }
}

/// Блок уровня: регистрирует его в каталоге и отдаёт компоненты collider entity
pub fn static_obstacle_bundle(
    field: &mut ObstacleField,
    ground_center: Vec3,
    half_width: f32,
    half_depth: f32,
    height: f32,
) -> (ObstacleId, RigidBody, Collider, Transform) {
    let id = field.add_block(ground_center, half_width, half_depth, height);
    (
        ObstacleId(id),
        RigidBody::Fixed,
        Collider::cuboid(half_width, height * 0.5, half_depth),
        Transform::from_xyz(ground_center.x, height * 0.5, ground_center.z),
    )
}

/// System: поддерживает ObstacleColliders в актуальном состоянии
pub fn index_obstacle_colliders(
    added: Query<(Entity, &ObstacleId), Added<ObstacleId>>,
    mut removed: RemovedComponents<ObstacleId>,
    mut colliders: ResMut<ObstacleColliders>,
) {
    for entity in removed.read() {
        colliders.0.remove(&entity);
    }
    for (entity, id) in added.iter() {
        colliders.0.insert(entity, id.0);
    }
}

/// Синхронизация нашего PhysicsBody.velocity → rapier Velocity
pub fn sync_velocity_to_rapier(mut query: Query<(&PhysicsBody, &mut Velocity)>) {
    for (body, mut rapier_velocity) in query.iter_mut() {
        rapier_velocity.linvel = body.velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ActorSnapshot;

    #[test]
    fn test_obstacle_bundle_matches_catalog() {
        let mut field = ObstacleField::new();
        field.add_block(Vec3::new(20.0, 0.0, 0.0), 1.0, 1.0, 1.0);

        let (id, _, _, transform) = static_obstacle_bundle(&mut field, Vec3::new(0.0, 0.0, 5.0), 2.0, 0.5, 1.5);
        assert_eq!(id, ObstacleId(1));
        assert_eq!(transform.translation, Vec3::new(0.0, 0.75, 5.0));

        let near = field.obstacles_near(Vec3::new(0.0, 0.0, 5.0), 1.0);
        assert!(near.iter().any(|o| o.id == id.0));
    }

    #[test]
    fn test_static_hits_resolve_to_catalog_ids() {
        let mut app = App::new();
        app.init_resource::<ObstacleColliders>()
            .add_systems(Update, index_obstacle_colliders);

        // Entity index и id каталога намеренно расходятся
        let decor = app.world_mut().spawn(Transform::default()).id();
        let wall = app.world_mut().spawn(ObstacleId(7)).id();
        let actor = app.world_mut().spawn(Transform::default()).id();
        app.update();

        let mut registry = ActorRegistry::new();
        registry.upsert(ActorSnapshot {
            id: ActorId::from(actor),
            faction_id: 1,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            health: 100.0,
            max_health: 100.0,
            eye_height: 1.6,
        });

        let colliders = app.world().resource::<ObstacleColliders>();
        assert_eq!(classify_hit(wall, &registry, colliders), BodyRef::Static(7));
        assert_eq!(classify_hit(decor, &registry, colliders), BodyRef::Static(UNCATALOGUED));
        assert_eq!(classify_hit(actor, &registry, colliders), BodyRef::Actor(ActorId::from(actor)));

        assert!(app.world_mut().despawn(wall));
        app.update();
        assert!(app.world().resource::<ObstacleColliders>().is_empty());
    }
}
