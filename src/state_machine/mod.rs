// State machine module for the order matching lifecycle
//
// Pure transition validation: callers check the edge with `assert_transition`
// and persist the new status themselves once the check passes.

pub mod states;
pub mod transitions;

pub use states::{
    AgentStatus, ExecutionPhase, ExecutionStatus, OrderStatus, QueueItemStatus, TaskStatus,
};
pub use transitions::{assert_transition, TransitionError};
