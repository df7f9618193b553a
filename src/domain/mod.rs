//! Domain model: users and their entitlements, services and packages, payment
//! orders, conversation phases and transformation jobs, plus the ports the
//! application layer talks to.

pub mod conversation;
pub mod entitlement;
pub mod job;
pub mod package;
pub mod payment;
pub mod ports;
pub mod service;
pub mod user;
