//! Tactical AI: FSM + handlers + perception + cover reasoning
//!
//! - fsm/state: generic interruptible state machine и таблица состояний
//! - handlers: по одному поведению на StateId (экземпляры per-actor)
//! - blackboard: память актора
//! - senses/cover: perception и пространственные запросы
//! - controller: склейка всего в один update(dt)
//! - systems/events: Bevy ECS слой (TacticalAIPlugin)

pub mod blackboard;
pub mod context;
pub mod controller;
pub mod cover;
pub mod events;
pub mod fsm;
pub mod handlers;
pub mod profile;
pub mod senses;
pub mod state;
pub mod systems;


pub use blackboard::{Blackboard, HeardSound};
pub use context::{ActorCtx, TacticalFamily, WeaponPort, WorldView};
pub use controller::ActorController;
pub use cover::{CoverConfig, CoverFinder, CoverPoint, Threat};
pub use events::{DamageTaken, SoundEmitted, WeaponFireIntent};
pub use fsm::{ContextFamily, StateHandler, StateMachine, TransitionListener, TransitionRecord, HISTORY_LIMIT};
pub use profile::{ActorProfile, Archetype, Personality};
pub use senses::{ConeDetector, SenseConfig, Senses, Viewpoint};
pub use state::{StateConfig, StateId, StateSet, StateTable};
pub use systems::{TacticalAIPlugin, TacticalBrain};
