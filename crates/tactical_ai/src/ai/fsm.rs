//! Generic interruptible FSM
//!
//! Один экземпляр на актора, вместе с полным набором handler'ов
//! (handler'ы держат per-actor working memory между update'ами).
//!
//! Порядок выполнения перехода:
//! 1. запись в history
//! 2. exit старого handler'а
//! 3. current = to, state_time = 0
//! 4. уведомление контекста (Blackboard)
//! 5. enter нового handler'а
//!
//! Контекст handler'ов заимствует мир на один тик, поэтому машина
//! параметризована "семейством" контекстов (GAT), а не конкретным типом.

use std::borrow::Cow;
use std::collections::VecDeque;

use super::state::{StateId, StateTable, STATE_COUNT};
use crate::error::BehaviorError;
use crate::logger;

/// Максимум записей в history (oldest evicted)
pub const HISTORY_LIMIT: usize = 20;
/// Окно детектора back-and-forth (секунды)
pub const OSCILLATION_WINDOW: f32 = 5.0;

/// Получатель уведомлений о смене состояния (Blackboard)
pub trait TransitionListener {
    fn on_state_changed(&mut self, from: StateId, to: StateId);
}

/// Семейство контекстов, которые машина передаёт handler'ам
pub trait ContextFamily: 'static {
    type Context<'a>: TransitionListener;
}

/// Поведение одного состояния
pub trait StateHandler<F: ContextFamily>: Send + Sync {
    fn state(&self) -> StateId;

    fn enter(&mut self, _ctx: &mut F::Context<'_>) {}

    /// Some(next) — запрос перехода (проверяется по valid_transitions)
    fn update(&mut self, ctx: &mut F::Context<'_>, dt: f32) -> Option<StateId>;

    fn exit(&mut self, _ctx: &mut F::Context<'_>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub from: StateId,
    pub to: StateId,
    /// Время машины (сумма dt) в момент перехода
    pub timestamp: f32,
    pub reason: Cow<'static, str>,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingTransition {
    to: StateId,
    reason: Cow<'static, str>,
}

pub struct StateMachine<F: ContextFamily> {
    table: StateTable,
    handlers: Vec<Option<Box<dyn StateHandler<F>>>>,
    current: StateId,
    initialized: bool,
    state_time: f32,
    clock: f32,
    pending: Option<PendingTransition>,
    history: VecDeque<TransitionRecord>,
}

impl<F: ContextFamily> StateMachine<F> {
    pub fn new(table: StateTable) -> Self {
        Self {
            table,
            handlers: (0..STATE_COUNT).map(|_| None).collect(),
            current: StateId::Idle,
            initialized: false,
            state_time: 0.0,
            clock: 0.0,
            pending: None,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    /// Регистрирует handler (заменяет ранее зарегистрированный для того же состояния)
    pub fn register_handler(&mut self, handler: Box<dyn StateHandler<F>>) {
        let index = handler.state().index();
        if self.handlers[index].is_some() {
            logger::log(&format!("FSM: replacing handler for {}", handler.state()));
        }
        self.handlers[index] = Some(handler);
    }

    pub fn has_handler(&self, state: StateId) -> bool {
        self.handlers[state.index()].is_some()
    }

    /// Ставит стартовое состояние и вызывает его enter
    pub fn initialize(&mut self, ctx: &mut F::Context<'_>, start: StateId) -> Result<(), BehaviorError> {
        if self.initialized {
            return Err(BehaviorError::AlreadyInitialized(self.current));
        }
        if !self.has_handler(start) {
            return Err(BehaviorError::MissingHandler(start));
        }

        self.current = start;
        self.state_time = 0.0;
        self.initialized = true;
        if let Some(handler) = self.handlers[start.index()].as_mut() {
            handler.enter(ctx);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn state(&self) -> StateId {
        self.current
    }

    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn table(&self) -> &StateTable {
        &self.table
    }

    pub fn transition_history(&self) -> impl ExactSizeIterator<Item = &TransitionRecord> + '_ {
        self.history.iter()
    }

    /// Ожидающий forced переход (если current non-interruptible)
    pub fn pending_transition(&self) -> Option<StateId> {
        self.pending.as_ref().map(|p| p.to)
    }

    /// Обычный переход: только если `to` ∈ valid_transitions[current]
    pub fn request_transition(
        &mut self,
        ctx: &mut F::Context<'_>,
        to: StateId,
        reason: impl Into<Cow<'static, str>>,
    ) -> bool {
        self.try_transition(ctx, to, reason.into(), true)
    }

    /// Forced переход в обход valid_transitions.
    /// Non-interruptible current → запрос встаёт в очередь (заменяя предыдущий).
    pub fn force_transition(&mut self, ctx: &mut F::Context<'_>, to: StateId, reason: impl Into<Cow<'static, str>>) {
        if !self.initialized || to == self.current {
            return;
        }
        let reason = reason.into();

        if !self.table.get(self.current).interruptible {
            if let Some(previous) = &self.pending {
                logger::log_warning(&format!(
                    "FSM: queued forced {} → {} ({}) overwritten by {} ({})",
                    self.current, previous.to, previous.reason, to, reason
                ));
            }
            logger::log(&format!("FSM: {} is not interruptible, queueing forced → {} ({})", self.current, to, reason));
            self.pending = Some(PendingTransition { to, reason });
            return;
        }

        // Более новый forced запрос отменяет ещё не применённый
        self.pending = None;
        self.execute(ctx, to, reason);
    }

    pub fn update(&mut self, ctx: &mut F::Context<'_>, dt: f32) {
        if !self.initialized {
            return;
        }

        self.clock += dt;
        self.state_time += dt;

        // (b) очередь forced переходов
        if self.table.get(self.current).interruptible {
            if let Some(pending) = self.pending.take() {
                if pending.to != self.current {
                    self.execute(ctx, pending.to, pending.reason);
                }
                return;
            }
        }

        // (c) timeout — выходит и из non-interruptible состояний
        let config = *self.table.get(self.current);
        if config.timeout > 0.0 && self.state_time > config.timeout {
            if config.timeout_target == self.current {
                self.state_time = 0.0;
            } else {
                self.execute(ctx, config.timeout_target, Cow::Borrowed("timeout"));
            }
            return;
        }

        // (d) логика состояния
        let next = match self.handlers[self.current.index()].as_mut() {
            Some(handler) => handler.update(ctx, dt),
            None => None,
        };
        if let Some(next) = next {
            if next != self.current {
                self.try_transition(ctx, next, Cow::Borrowed("state-logic"), false);
            }
        }
    }

    /// Back-and-forth детектор: последние 4 перехода в пределах окна,
    /// цели [0]==[2] и [1]==[3]
    pub fn is_oscillating(&self) -> bool {
        if self.history.len() < 4 {
            return false;
        }
        let last: Vec<&TransitionRecord> = self.history.iter().skip(self.history.len() - 4).collect();
        let within_window = last[3].timestamp - last[0].timestamp <= OSCILLATION_WINDOW;

        within_window && last[0].to == last[2].to && last[1].to == last[3].to && last[0].to != last[1].to
    }

    fn try_transition(&mut self, ctx: &mut F::Context<'_>, to: StateId, reason: Cow<'static, str>, log_rejection: bool) -> bool {
        if !self.initialized || to == self.current {
            return false;
        }
        if !self.table.can_transition(self.current, to) {
            if log_rejection {
                logger::log_warning(&format!("FSM: rejected transition {} → {} ({})", self.current, to, reason));
            }
            return false;
        }
        self.execute(ctx, to, reason);
        true
    }

    fn execute(&mut self, ctx: &mut F::Context<'_>, to: StateId, reason: Cow<'static, str>) {
        let from = self.current;

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        logger::log(&format!("FSM: {} → {} ({})", from, to, reason));
        self.history.push_back(TransitionRecord {
            from,
            to,
            timestamp: self.clock,
            reason,
        });

        if let Some(handler) = self.handlers[from.index()].as_mut() {
            handler.exit(ctx);
        }

        self.current = to;
        self.state_time = 0.0;
        ctx.on_state_changed(from, to);

        match self.handlers[to.index()].as_mut() {
            Some(handler) => handler.enter(ctx),
            None => logger::log_warning(&format!("FSM: no handler registered for {}", to)),
        }
    }
}
