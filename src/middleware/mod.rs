//! Deadline enforcement middleware.
//!
//! # Data Flow
//! ```text
//! Inbound message
//!     → enforce.rs (resolve deadline, publish countdown, pre-flight check)
//!     → tokio::time::timeout around the rest of the pipeline
//!     → handler outcome, or DeadlineError::Expired
//! ```
//!
//! Two entry points share the same logic: [`DeadlineMiddleware::consume_scope`]
//! for closure-based pipelines and [`DeadlineLayer`] for tower services.
//!
//! # Design Decisions
//! - A message already past its deadline never reaches the handler
//! - The bound is sampled once on entry; the timer governs from then on
//! - Handler failures pass through untouched; only expiry is translated

pub mod enforce;
pub mod layer;

pub use enforce::{enforce, DeadlineMiddleware};
pub use layer::{DeadlineLayer, DeadlineService};
