//! In-memory message broker and consumer.
//!
//! # Data Flow
//! ```text
//! Publisher::publish(Envelope)
//!     → bounded mpsc queue (backpressure)
//!     → Consumer::run pulls envelopes
//!     → one task per envelope, bounded by max_in_flight
//!     → tower Service (DeadlineLayer + handler)
//!     → outcome logged and counted
//! ```
//!
//! # Design Decisions
//! - Stands in for a real broker; the middleware only sees `Attributes`
//! - Each message runs on its own task so ambient deadlines never mix
//! - Shutdown stops intake but lets in-flight messages finish

pub mod channel;
pub mod consumer;
pub mod envelope;

pub use channel::{channel, BrokerError, Publisher, Subscription};
pub use consumer::{Consumer, ConsumerStats, Outcome};
pub use envelope::Envelope;
