//! Application layer orchestrating the domain.
//!
//! `EntitlementStore` serializes every change to a user's record,
//! `ConversationEngine` drives the per-user state machine, `PaymentCorrelator`
//! applies payment callbacks and `JobDispatcher` runs transformation jobs on a
//! pool of `tokio` workers.

pub mod conversation;
pub mod dispatcher;
pub mod entitlements;
pub mod messages;
pub mod payments;
