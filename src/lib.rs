//! Deadline propagation for message consumers.
//!
//! A processing deadline arrives on an inbound message header (or comes from a
//! configured default budget), is published to the handler's task as a live
//! [`Countdown`], and bounds the handler's execution. Messages already past
//! their deadline never reach the handler.

pub mod broker;
pub mod config;
pub mod deadline;
pub mod lifecycle;
pub mod middleware;
pub mod observability;

pub use config::AppConfig;
pub use deadline::{context, Countdown, DeadlineError, DeadlineResolver, ExpiryPhase};
pub use middleware::{DeadlineLayer, DeadlineMiddleware};
