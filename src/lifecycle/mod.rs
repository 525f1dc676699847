//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → consumer stops pulling → in-flight messages drain → exit
//! ```
//!
//! # Design Decisions
//! - In-flight messages are never abandoned by shutdown; their own deadlines bound them

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_signal;
