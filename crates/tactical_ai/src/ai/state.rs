//! StateId, StateConfig, таблица переходов
//!
//! Статическая конфигурация, read-only в рантайме.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Тактические состояния (закрытый набор)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateId {
    Idle,
    Patrol,
    Chase,
    Attack,
    Alert,
    Search,
    TakeCover,
    Flank,
    Advance,
    Follow,
    Retreat,
}

pub const STATE_COUNT: usize = 11;

impl StateId {
    pub const ALL: [StateId; STATE_COUNT] = [
        StateId::Idle,
        StateId::Patrol,
        StateId::Chase,
        StateId::Attack,
        StateId::Alert,
        StateId::Search,
        StateId::TakeCover,
        StateId::Flank,
        StateId::Advance,
        StateId::Follow,
        StateId::Retreat,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StateId::Idle => "Idle",
            StateId::Patrol => "Patrol",
            StateId::Chase => "Chase",
            StateId::Attack => "Attack",
            StateId::Alert => "Alert",
            StateId::Search => "Search",
            StateId::TakeCover => "TakeCover",
            StateId::Flank => "Flank",
            StateId::Advance => "Advance",
            StateId::Follow => "Follow",
            StateId::Retreat => "Retreat",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Битовое множество StateId (Copy, без аллокаций)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSet(u16);

impl StateSet {
    pub const EMPTY: StateSet = StateSet(0);

    pub fn of(states: &[StateId]) -> Self {
        states.iter().fold(Self::EMPTY, |set, s| set.with(*s))
    }

    pub fn with(self, state: StateId) -> Self {
        Self(self.0 | (1 << state.index()))
    }

    pub fn contains(self, state: StateId) -> bool {
        self.0 & (1 << state.index()) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = StateId> {
        StateId::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

/// Конфигурация одного состояния
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Секунды, 0 = без таймаута
    pub timeout: f32,
    pub timeout_target: StateId,
    pub interruptible: bool,
    /// Выше = сложнее прервать
    pub priority: i32,
    pub valid_transitions: StateSet,
}

impl StateConfig {
    fn new(priority: i32, valid: &[StateId]) -> Self {
        Self {
            timeout: 0.0,
            timeout_target: StateId::Idle,
            interruptible: true,
            priority,
            valid_transitions: StateSet::of(valid),
        }
    }

    fn timeout(mut self, seconds: f32, target: StateId) -> Self {
        self.timeout = seconds;
        self.timeout_target = target;
        self
    }

    fn uninterruptible(mut self) -> Self {
        self.interruptible = false;
        self
    }
}

/// Таблица конфигураций, индексируется StateId
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTable {
    configs: Vec<StateConfig>,
}

impl Default for StateTable {
    fn default() -> Self {
        Self::tactical()
    }
}

impl StateTable {
    /// Дефолтная тактическая таблица
    pub fn tactical() -> Self {
        use StateId::*;

        let configs = vec![
            // Idle
            StateConfig::new(0, &[Patrol, Chase, Alert, Follow, Attack, TakeCover, Retreat]),
            // Patrol
            StateConfig::new(1, &[Idle, Chase, Alert, Attack, TakeCover, Follow, Retreat]),
            // Chase
            StateConfig::new(3, &[Attack, TakeCover, Flank, Advance, Search, Retreat, Patrol, Idle])
                .timeout(30.0, Search),
            // Attack
            StateConfig::new(4, &[Chase, TakeCover, Flank, Advance, Search, Retreat, Patrol]),
            // Alert
            StateConfig::new(2, &[Chase, Patrol, Search, Attack, TakeCover, Idle]).timeout(15.0, Patrol),
            // Search
            StateConfig::new(2, &[Chase, Patrol, Alert, Attack, TakeCover, Idle]).timeout(20.0, Patrol),
            // TakeCover
            StateConfig::new(4, &[Attack, Chase, Flank, Advance, Search, Retreat]).timeout(15.0, Attack),
            // Flank
            StateConfig::new(3, &[Attack, Chase, TakeCover, Search, Retreat]).timeout(10.0, Attack),
            // Advance
            StateConfig::new(3, &[Attack, TakeCover, Chase, Flank, Search, Retreat]).timeout(8.0, Attack),
            // Follow
            StateConfig::new(1, &[Chase, Attack, Alert, TakeCover, Idle, Patrol, Retreat]),
            // Retreat: committed, прерывается только после выхода
            StateConfig::new(5, &[TakeCover, Attack, Chase, Search, Patrol])
                .timeout(8.0, TakeCover)
                .uninterruptible(),
        ];

        Self { configs }
    }

    pub fn get(&self, state: StateId) -> &StateConfig {
        &self.configs[state.index()]
    }

    pub fn set(&mut self, state: StateId, config: StateConfig) {
        self.configs[state.index()] = config;
    }

    pub fn can_transition(&self, from: StateId, to: StateId) -> bool {
        from != to && self.get(from).valid_transitions.contains(to)
    }
}
