//! ActorRegistry — снапшот всех акторов на текущий тик
//!
//! Target linkage хранится как `ActorId` и резолвится здесь каждый тик:
//! despawned или мёртвый актор просто не резолвится.

use bevy::math::Vec3;
use bevy::prelude::Resource;
use std::collections::BTreeMap;

use super::physics::ActorId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub faction_id: u64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub health: f32,
    pub max_health: f32,
    pub eye_height: f32,
}

impl ActorSnapshot {
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::Y * self.eye_height
    }
}

/// BTreeMap — детерминированный порядок итерации (ascending id)
#[derive(Resource, Debug, Clone, Default)]
pub struct ActorRegistry {
    actors: BTreeMap<ActorId, ActorSnapshot>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, snapshot: ActorSnapshot) {
        self.actors.insert(snapshot.id, snapshot);
    }

    pub fn remove(&mut self, id: ActorId) {
        self.actors.remove(&id);
    }

    pub fn clear(&mut self) {
        self.actors.clear();
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Snapshot независимо от health
    pub fn get(&self, id: ActorId) -> Option<&ActorSnapshot> {
        self.actors.get(&id)
    }

    /// Snapshot живого актора; None если despawned или health <= 0
    pub fn resolve(&self, id: ActorId) -> Option<&ActorSnapshot> {
        self.actors.get(&id).filter(|a| a.is_alive())
    }

    /// Живые акторы другой фракции, кроме `observer`
    pub fn hostiles_of<'a>(&'a self, observer: ActorId, faction_id: u64) -> impl Iterator<Item = &'a ActorSnapshot> + 'a {
        self.actors
            .values()
            .filter(move |a| a.id != observer && a.faction_id != faction_id && a.is_alive())
    }

    pub fn is_hostile(&self, faction_id: u64, other: ActorId) -> bool {
        self.resolve(other).is_some_and(|a| a.faction_id != faction_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActorSnapshot> + '_ {
        self.actors.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: u64, faction_id: u64, health: f32) -> ActorSnapshot {
        ActorSnapshot {
            id: ActorId(id),
            faction_id,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            health,
            max_health: 100.0,
            eye_height: 1.6,
        }
    }

    #[test]
    fn test_dead_actor_does_not_resolve() {
        let mut registry = ActorRegistry::new();
        registry.upsert(snapshot(1, 1, 50.0));
        registry.upsert(snapshot(2, 2, 0.0));

        assert!(registry.resolve(ActorId(1)).is_some());
        assert!(registry.resolve(ActorId(2)).is_none());
        assert!(registry.resolve(ActorId(3)).is_none());
    }

    #[test]
    fn test_hostiles_filter_faction_and_self() {
        let mut registry = ActorRegistry::new();
        registry.upsert(snapshot(1, 1, 100.0));
        registry.upsert(snapshot(2, 1, 100.0));
        registry.upsert(snapshot(3, 2, 100.0));
        registry.upsert(snapshot(4, 2, 0.0));

        let hostiles: Vec<_> = registry.hostiles_of(ActorId(1), 1).map(|a| a.id).collect();
        assert_eq!(hostiles, vec![ActorId(3)]);
        assert!(registry.is_hostile(1, ActorId(3)));
        assert!(!registry.is_hostile(1, ActorId(2)));
    }
}
