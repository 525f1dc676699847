//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Deadline resolution and enforcement produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (header, value, deadline, message_id) for machine parsing
//! - Metrics are cheap; without an installed recorder they are no-ops
//! - Exporter is optional and off by default

pub mod logging;
pub mod metrics;
