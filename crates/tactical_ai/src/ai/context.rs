//! ActorCtx — всё, что handler видит за один тик
//!
//! Заимствует части контроллера (blackboard, movement, rng) и мир
//! (physics, registry, navigation) на время одного update.

use bevy::math::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::blackboard::Blackboard;
use super::cover::{CoverFinder, Threat};
use super::fsm::{ContextFamily, TransitionListener};
use super::profile::ActorProfile;
use super::senses::{Senses, Viewpoint};
use super::state::StateId;
use crate::movement::Movement;
use crate::shared::{horizontal_distance, horizontal_direction};
use crate::world::{ActorBody, ActorId, ActorRegistry, ActorSnapshot, NavigationService, PhysicsWorld, StrategicPoints};

/// Weapon collaborator (баллистика и патроны — не наша забота)
pub trait WeaponPort {
    fn pull_trigger(&mut self, target_point: Vec3);
}

/// Выстрелы копятся и отдаются хосту после тика
impl WeaponPort for Vec<Vec3> {
    fn pull_trigger(&mut self, target_point: Vec3) {
        self.push(target_point);
    }
}

/// Read-only мир на тик
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    pub physics: &'a dyn PhysicsWorld,
    pub registry: &'a ActorRegistry,
    pub strategic: Option<&'a StrategicPoints>,
}

pub struct TacticalFamily;

impl ContextFamily for TacticalFamily {
    type Context<'a> = ActorCtx<'a>;
}

pub struct ActorCtx<'a> {
    pub id: ActorId,
    pub faction_id: u64,
    pub profile: &'a ActorProfile,
    pub health_fraction: f32,
    pub blackboard: &'a mut Blackboard,
    pub movement: &'a mut Movement,
    pub body: &'a mut dyn ActorBody,
    /// Цель, уже резолвнутая через registry в этом тике
    pub target: Option<ActorSnapshot>,
    pub target_visible: bool,
    pub leader: Option<ActorSnapshot>,
    pub world: WorldView<'a>,
    pub navigation: Option<&'a mut dyn NavigationService>,
    pub weapon: &'a mut dyn WeaponPort,
    pub rng: &'a mut ChaCha8Rng,
    pub senses: Senses,
    pub cover: &'a CoverFinder,
    /// Угловой слот подхода (радианы), чтобы толпа не сбивалась в кучу
    pub slot_angle: f32,
}

impl TransitionListener for ActorCtx<'_> {
    fn on_state_changed(&mut self, from: StateId, to: StateId) {
        self.blackboard.on_state_changed(from, to);
    }
}

impl ActorCtx<'_> {
    pub fn position(&self) -> Vec3 {
        self.body.position()
    }

    pub fn speed(&self) -> f32 {
        self.body.velocity().length()
    }

    pub fn move_to(&mut self, destination: Vec3, running: bool) {
        self.blackboard.set_destination(destination);
        self.movement.move_to(destination, self.profile.speed(running), running);
    }

    pub fn stop(&mut self) {
        self.blackboard.clear_destination();
        self.movement.stop();
    }

    pub fn look_at(&mut self, point: Vec3) {
        self.movement.look_at(self.body, point);
    }

    pub fn has_arrived(&self) -> bool {
        self.movement.has_arrived(self.position())
    }

    pub fn viewpoint(&self) -> Viewpoint {
        Viewpoint {
            id: self.id,
            position: self.body.position(),
            forward: self.body.forward(),
        }
    }

    pub fn can_see(&self, other: &ActorSnapshot) -> bool {
        self.senses.can_see(self.world.physics, Some(&self.viewpoint()), Some(other))
    }

    /// Цель видна прямо сейчас
    pub fn sees_target(&self) -> bool {
        self.target.is_some() && self.target_visible
    }

    pub fn target_position(&self) -> Option<Vec3> {
        self.target.map(|t| t.position)
    }

    /// Видимая позиция цели, иначе последняя известная
    pub fn engagement_point(&self) -> Option<Vec3> {
        match self.target {
            Some(target) if self.target_visible => Some(target.position),
            _ => self.blackboard.last_known_target_position,
        }
    }

    pub fn target_distance(&self) -> Option<f32> {
        self.engagement_point().map(|p| horizontal_distance(self.position(), p))
    }

    /// Откуда исходит угроза: цель, последняя позиция, источник урона
    pub fn threat(&self) -> Option<Threat> {
        let position = self
            .engagement_point()
            .or(self.blackboard.last_damage_source)?;
        Some(Threat {
            position,
            body: self.target.map(|t| t.id),
        })
    }

    pub fn has_cover_from_threat(&self) -> bool {
        self.threat()
            .is_some_and(|threat| self.cover.has_cover_from(self.world.physics, self.id, self.position(), &threat))
    }

    /// Выстрел в точку, не чаще fire_interval
    pub fn fire_at(&mut self, point: Vec3) -> bool {
        if self.blackboard.time_since_fired < self.profile.fire_interval {
            return false;
        }
        self.weapon.pull_trigger(point);
        self.blackboard.record_shot();
        true
    }

    /// Огонь по видимой цели (в глаза)
    pub fn fire_at_target(&mut self) -> bool {
        match self.target {
            Some(target) if self.target_visible => {
                let aim = target.eye_position();
                self.look_at(aim);
                self.fire_at(aim)
            }
            _ => false,
        }
    }

    /// Navigable точка в радиусе: backend, иначе равномерная выборка в круге
    pub fn random_point_around(&mut self, center: Vec3, radius: f32) -> Option<Vec3> {
        if let Some(nav) = self.navigation.as_deref_mut() {
            if nav.is_ready() {
                return nav.random_point_around(center, radius);
            }
        }
        let angle = self.rng.gen::<f32>() * std::f32::consts::TAU;
        let distance = radius * self.rng.gen::<f32>().sqrt();
        Some(center + Vec3::new(angle.sin() * distance, 0.0, angle.cos() * distance))
    }

    /// Ближайшая navigable точка рядом (без backend'а — сама точка)
    pub fn snap_to_navigable(&mut self, point: Vec3, radius: f32) -> Vec3 {
        self.navigation
            .as_deref_mut()
            .filter(|nav| nav.is_ready())
            .and_then(|nav| nav.random_point_around(point, radius))
            .unwrap_or(point)
    }

    /// Событие с вероятностью `rate` в секунду
    pub fn chance_per_second(&mut self, rate: f32, dt: f32) -> bool {
        rate > 0.0 && self.rng.gen::<f32>() < rate * dt
    }

    pub fn direction_to(&self, point: Vec3) -> Option<Vec3> {
        horizontal_direction(self.position(), point)
    }
}
