use super::states::OrderStatus;
use thiserror::Error;

/// Error raised when an order status change is not on the allow-list.
///
/// These always propagate to the caller: an illegal edge means either a logic
/// bug or a lost race that has to be investigated, never something to swallow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid order transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Edges the matching core is allowed to take.
///
/// Settlement-side edges (anything into or out of Completed/Cancelled) are
/// intentionally absent, so terminal states are rejected as sources here.
const ALLOWED: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Standby, OrderStatus::Pairing),
    (OrderStatus::Standby, OrderStatus::Executing),
    (OrderStatus::Pairing, OrderStatus::InProgress),
    (OrderStatus::Pairing, OrderStatus::Standby),
    (OrderStatus::Executing, OrderStatus::Selecting),
];

/// Validate an order status transition against the fixed allow-list.
///
/// Pure check with no side effects; callers persist the new status themselves
/// once this returns `Ok`.
pub fn assert_transition(from: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
    if ALLOWED.contains(&(from, to)) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}
