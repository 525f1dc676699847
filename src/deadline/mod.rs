//! Deadline subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound message attributes
//!     → resolver.rs (header lookup, timestamp parse, default budget)
//!     → Deadline (absolute DateTime<Utc>)
//!     → countdown.rs (live remaining-seconds view)
//!     → context.rs (task-local slot read by nested handler code)
//! ```
//!
//! # Design Decisions
//! - A malformed deadline never fails the message; it degrades to the default budget
//! - The resolver never judges expiry; enforcement does
//! - The ambient slot is per task, never a process-wide global

pub mod context;
pub mod countdown;
pub mod error;
pub mod resolver;

pub use countdown::Countdown;
pub use error::{DeadlineError, ExpiryPhase};
pub use resolver::{
    parse_deadline, Attributes, DeadlineResolver, DeadlineSource, Resolution, DEFAULT_HEADER,
};

/// Absolute point in time by which a message must be fully processed.
pub type Deadline = chrono::DateTime<chrono::Utc>;
