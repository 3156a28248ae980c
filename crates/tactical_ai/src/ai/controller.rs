//! ActorController — связывает FSM, blackboard, senses, movement и stuck recovery
//!
//! Порядок тика:
//! 1. blackboard таймеры
//! 2. stuck recovery (пока активна — behavior пропускается)
//! 3. target: резолв weak ref, cone/sight acquisition, видимость
//! 4. FSM (initialize при первом тике, damage interrupt, update)
//! 5. movement (силы, look direction, pitch)

use bevy::math::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::blackboard::Blackboard;
use super::context::{ActorCtx, TacticalFamily, WeaponPort, WorldView};
use super::cover::{CoverConfig, CoverFinder};
use super::fsm::{StateMachine, TransitionRecord};
use super::handlers::{may_seek_cover, register_tactical_handlers};
use super::profile::ActorProfile;
use super::senses::{ConeDetector, SenseConfig, Senses, Viewpoint};
use super::state::{StateId, StateTable};
use crate::logger;
use crate::movement::{Movement, MovementConfig, NavigationWrapper, StuckConfig};
use crate::world::{reborrow_navigation, ActorBody, ActorId, ActorSnapshot, BodyRef, NavigationService};

/// Раз в сколько секунд можно повторить warning про осцилляцию
const OSCILLATION_LOG_INTERVAL: f32 = 2.0;
/// Разброс углового слота подхода (радианы)
const SLOT_SPREAD: f32 = 0.6;
/// Высота, с которой кастуется веер (грудь)
const CONE_HEIGHT: f32 = 1.2;

/// Отложенная реакция на урон (применяется в начале следующего update)
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingDamage {
    attacker: Option<ActorId>,
}

pub struct ActorController {
    id: ActorId,
    faction_id: u64,
    profile: ActorProfile,
    machine: StateMachine<TacticalFamily>,
    start_state: StateId,
    blackboard: Blackboard,
    movement: Movement,
    navigator: NavigationWrapper,
    senses: Senses,
    sense_config: SenseConfig,
    cone: ConeDetector,
    cover: CoverFinder,
    rng: ChaCha8Rng,
    target: Option<ActorId>,
    leader: Option<ActorId>,
    slot_angle: f32,
    cone_timer: f32,
    sight_timer: f32,
    oscillation_log_timer: f32,
    pending_damage: Option<PendingDamage>,
    disposed: bool,
}

impl ActorController {
    /// `seed` — глобальный seed симуляции; поток актора выводится из него и id
    pub fn new(id: ActorId, faction_id: u64, profile: ActorProfile, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let slot_angle = rng.gen_range(-SLOT_SPREAD..SLOT_SPREAD);

        let mut machine = StateMachine::new(StateTable::tactical());
        register_tactical_handlers(&mut machine);

        Self {
            id,
            faction_id,
            senses: Senses::from_profile(&profile),
            movement: Movement::new(id, profile.body_radius, MovementConfig::default()),
            navigator: NavigationWrapper::new(id, StuckConfig::default()),
            profile,
            machine,
            start_state: StateId::Idle,
            blackboard: Blackboard::new(),
            sense_config: SenseConfig::default(),
            cone: ConeDetector::default(),
            cover: CoverFinder::default(),
            rng,
            target: None,
            leader: None,
            slot_angle,
            cone_timer: 0.0,
            sight_timer: 0.0,
            oscillation_log_timer: 0.0,
            pending_damage: None,
            disposed: false,
        }
    }

    pub fn with_start_state(mut self, state: StateId) -> Self {
        self.start_state = state;
        self
    }

    /// Заменяет таблицу состояний (до первого update)
    pub fn with_state_table(mut self, table: StateTable) -> Self {
        let mut machine = StateMachine::new(table);
        register_tactical_handlers(&mut machine);
        self.machine = machine;
        self
    }

    pub fn with_movement_config(mut self, config: MovementConfig) -> Self {
        self.movement = Movement::new(self.id, self.profile.body_radius, config);
        self
    }

    pub fn with_stuck_config(mut self, config: StuckConfig) -> Self {
        self.navigator = NavigationWrapper::new(self.id, config);
        self
    }

    pub fn with_cover_config(mut self, config: CoverConfig) -> Self {
        self.cover = CoverFinder::new(config);
        self
    }

    pub fn with_cone_detector(mut self, cone: ConeDetector) -> Self {
        self.cone = cone;
        self
    }

    pub fn with_sense_config(mut self, config: SenseConfig) -> Self {
        self.sense_config = config;
        self
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn faction_id(&self) -> u64 {
        self.faction_id
    }

    pub fn profile(&self) -> &ActorProfile {
        &self.profile
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn movement(&self) -> &Movement {
        &self.movement
    }

    pub fn target(&self) -> Option<ActorId> {
        self.target
    }

    /// Явно назначить цель (None — забыть)
    pub fn set_target(&mut self, target: Option<ActorId>) {
        self.target = target;
    }

    pub fn leader(&self) -> Option<ActorId> {
        self.leader
    }

    pub fn set_leader(&mut self, leader: Option<ActorId>) {
        self.leader = leader;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // === Introspection ===

    pub fn get_state(&self) -> StateId {
        self.machine.state()
    }

    pub fn get_state_name(&self) -> &'static str {
        self.machine.state().name()
    }

    pub fn state_time(&self) -> f32 {
        self.machine.state_time()
    }

    pub fn transition_history(&self) -> impl ExactSizeIterator<Item = &TransitionRecord> + '_ {
        self.machine.transition_history()
    }

    pub fn is_oscillating(&self) -> bool {
        self.machine.is_oscillating()
    }

    pub fn stuck_recoveries(&self) -> u32 {
        self.navigator.recoveries()
    }

    pub fn is_recovering(&self) -> bool {
        self.navigator.is_recovering()
    }

    // === Events ===

    /// Звук в точке `position`; разбирается Patrol/Idle/Search при следующем update
    pub fn on_hear_sound(&mut self, position: Vec3, importance: f32) {
        if self.disposed {
            return;
        }
        self.blackboard.hear_sound(position, importance);
    }

    /// Урон из `from_position`. Hostile attacker становится целью, если её нет.
    pub fn on_take_damage(&mut self, from_position: Vec3, attacker: Option<ActorId>) {
        if self.disposed {
            return;
        }
        self.blackboard.record_damage(from_position);
        if self.target.is_none() || self.target == attacker {
            // Стрелка не видим — преследуем точку выстрела
            self.blackboard.last_known_target_position = Some(from_position);
        }
        self.pending_damage = Some(PendingDamage { attacker });
    }

    /// Освобождает navigation agent и сбрасывает таймеры; дальше update — no-op
    pub fn dispose(&mut self, navigation: Option<&mut dyn NavigationService>) {
        if self.disposed {
            return;
        }
        self.movement.dispose(navigation);
        self.disposed = true;
        self.target = None;
        self.pending_damage = None;
        self.cone_timer = 0.0;
        self.sight_timer = 0.0;
        self.oscillation_log_timer = 0.0;
        logger::log_info(&format!("🪦 {:?}: controller disposed in {}", self.id, self.machine.state()));
    }

    // === Tick ===

    /// Один шаг симуляции. Без физического тела — no-op.
    pub fn update(
        &mut self,
        dt: f32,
        body: Option<&mut dyn ActorBody>,
        world: WorldView<'_>,
        mut navigation: Option<&mut dyn NavigationService>,
        weapon: &mut dyn WeaponPort,
    ) {
        if self.disposed {
            return;
        }
        let Some(body) = body else {
            return;
        };

        // Мёртвые не думают; без записи в registry считаем себя здоровыми
        let health_fraction = match world.registry.get(self.id) {
            Some(me) if !me.is_alive() => return,
            Some(me) if me.max_health > 0.0 => (me.health / me.max_health).clamp(0.0, 1.0),
            _ => 1.0,
        };

        self.blackboard.tick(dt);
        self.oscillation_log_timer -= dt;

        if self.navigator.update(dt, body, &mut self.movement, world.physics, &mut self.rng) {
            return;
        }

        self.refresh_target(dt, body, world);

        let viewpoint = Viewpoint {
            id: self.id,
            position: body.position(),
            forward: body.forward(),
        };
        let target = self.target.and_then(|id| world.registry.resolve(id)).copied();
        let target_visible = target
            .as_ref()
            .is_some_and(|t| self.senses.can_see(world.physics, Some(&viewpoint), Some(t)));
        if let (Some(t), true) = (target, target_visible) {
            self.blackboard.record_sighting(t.position);
        }
        let leader = self.leader.and_then(|id| world.registry.resolve(id)).copied();

        {
            let mut ctx = ActorCtx {
                id: self.id,
                faction_id: self.faction_id,
                profile: &self.profile,
                health_fraction,
                blackboard: &mut self.blackboard,
                movement: &mut self.movement,
                body: &mut *body,
                target,
                target_visible,
                leader,
                world,
                navigation: reborrow_navigation(&mut navigation),
                weapon: &mut *weapon,
                rng: &mut self.rng,
                senses: self.senses,
                cover: &self.cover,
                slot_angle: self.slot_angle,
            };

            if !self.machine.is_initialized() {
                if let Err(error) = self.machine.initialize(&mut ctx, self.start_state) {
                    logger::log_error(&format!("{:?}: {}", self.id, error));
                    return;
                }
            }

            if let Some(damage) = self.pending_damage.take() {
                if let Some(to) = damage_interrupt(self.machine.state(), &ctx) {
                    let attacker = damage.attacker.map_or_else(|| "unknown".to_string(), |a| format!("{:?}", a));
                    logger::log(&format!("💥 {:?}: damage interrupt → {} (attacker {})", self.id, to, attacker));
                    self.machine.force_transition(&mut ctx, to, "damage");
                }
            }

            self.machine.update(&mut ctx, dt);
        }

        self.movement.update(dt, body, world.physics, navigation);

        if self.machine.is_oscillating() && self.oscillation_log_timer <= 0.0 {
            self.oscillation_log_timer = OSCILLATION_LOG_INTERVAL;
            let history = self.machine.transition_history();
            let skip = history.len().saturating_sub(4);
            let tail: Vec<String> = history.skip(skip).map(|r| format!("{}→{}", r.from, r.to)).collect();
            logger::log_warning(&format!("🔁 {:?}: state oscillation [{}]", self.id, tail.join(", ")));
        }
    }

    /// Резолв weak target reference + acquisition (cone часто, полный LOS реже)
    fn refresh_target(&mut self, dt: f32, body: &dyn ActorBody, world: WorldView<'_>) {
        if let Some(id) = self.target {
            if world.registry.resolve(id).is_none() {
                logger::log_info(&format!("❌ {:?}: target {:?} lost (dead or despawned)", self.id, id));
                self.target = None;
                self.blackboard.forget_target();
            }
        }

        if let Some(attacker) = self.pending_damage.and_then(|d| d.attacker) {
            if self.target.is_none() && world.registry.is_hostile(self.faction_id, attacker) {
                self.acquire(attacker, "attacked");
            }
        }

        self.cone_timer -= dt;
        self.sight_timer -= dt;
        if self.target.is_some() {
            return;
        }

        if self.cone_timer <= 0.0 {
            self.cone_timer = self.sense_config.cone_interval;
            let cone = self.cone.for_facing(body.forward());
            let hits = cone.cast_cone(
                world.physics,
                self.id,
                body.position() + Vec3::Y * CONE_HEIGHT,
                body.velocity(),
                self.sense_config.cone_radius,
                self.sense_config.cone_angle_degrees,
                self.sense_config.cone_rays,
            );
            let spotted = hits.iter().find_map(|hit| match hit.body {
                BodyRef::Actor(other) if world.registry.is_hostile(self.faction_id, other) => Some(other),
                _ => None,
            });
            if let Some(other) = spotted {
                self.acquire(other, "cone");
                return;
            }
        }

        if self.sight_timer <= 0.0 {
            self.sight_timer = self.sense_config.sight_interval;
            let viewpoint = Viewpoint {
                id: self.id,
                position: body.position(),
                forward: body.forward(),
            };
            let position = body.position();
            let nearest = world
                .registry
                .hostiles_of(self.id, self.faction_id)
                .filter(|other| self.senses.can_see(world.physics, Some(&viewpoint), Some(*other)))
                .min_by(|a, b| distance_sq(a, position).total_cmp(&distance_sq(b, position)))
                .map(|other| other.id);
            if let Some(other) = nearest {
                self.acquire(other, "sight");
            }
        }
    }

    fn acquire(&mut self, other: ActorId, how: &str) {
        self.target = Some(other);
        logger::log(&format!("🎯 {:?}: acquired {:?} ({})", self.id, other, how));
    }
}

fn distance_sq(snapshot: &ActorSnapshot, position: Vec3) -> f32 {
    snapshot.position.distance_squared(position)
}

/// Куда бросает урон: низкое здоровье → укрытие (если не в укрытии/отступлении),
/// иначе из мирных состояний → Chase
fn damage_interrupt(state: StateId, ctx: &ActorCtx<'_>) -> Option<StateId> {
    let wounded = ctx.health_fraction < ctx.profile.cover_health_threshold;
    match state {
        StateId::TakeCover | StateId::Retreat => None,
        _ if wounded && may_seek_cover(ctx) => Some(StateId::TakeCover),
        StateId::Idle | StateId::Patrol | StateId::Alert | StateId::Search | StateId::Follow => Some(StateId::Chase),
        _ => None,
    }
}
