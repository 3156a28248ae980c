//! Ошибки setup-фазы state machine.
//!
//! Per-tick пути ошибок не возвращают: отсутствующие prerequisites
//! превращаются в logged no-op или fallback state.

use crate::ai::StateId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BehaviorError {
    #[error("no handler registered for start state {0}")]
    MissingHandler(StateId),

    #[error("state machine already initialized (current state {0})")]
    AlreadyInitialized(StateId),
}
