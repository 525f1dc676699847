//! Enforcement failures.

use std::fmt;

use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::deadline::Deadline;

/// When the deadline was found to have passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPhase {
    /// Already past before the handler was invoked. The handler never ran.
    BeforeStart,
    /// Passed while the handler was running. The handler was cancelled.
    InFlight,
}

impl ExpiryPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryPhase::BeforeStart => "before_start",
            ExpiryPhase::InFlight => "in_flight",
        }
    }
}

impl fmt::Display for ExpiryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryPhase::BeforeStart => write!(f, "before processing started"),
            ExpiryPhase::InFlight => write!(f, "during processing"),
        }
    }
}

/// Outcome of a deadline-enforced handler call that did not succeed.
///
/// Expiry is kept apart from the handler's own failures so that retry and
/// acknowledgement logic can tell "budget exhausted" from "handler failed".
#[derive(Debug, Error)]
pub enum DeadlineError<E> {
    /// The message's time budget ran out.
    #[error("deadline {deadline} expired {phase}")]
    Expired {
        deadline: Deadline,
        phase: ExpiryPhase,
        /// The elapsed timer, for in-flight expiry.
        #[source]
        source: Option<Elapsed>,
    },

    /// The handler failed on its own; passed through untouched.
    #[error(transparent)]
    Handler(E),
}

impl<E> DeadlineError<E> {
    pub fn is_expired(&self) -> bool {
        matches!(self, DeadlineError::Expired { .. })
    }

    /// Expiry phase, or `None` for handler failures.
    pub fn phase(&self) -> Option<ExpiryPhase> {
        match self {
            DeadlineError::Expired { phase, .. } => Some(*phase),
            DeadlineError::Handler(_) => None,
        }
    }

    pub fn handler(&self) -> Option<&E> {
        match self {
            DeadlineError::Handler(err) => Some(err),
            DeadlineError::Expired { .. } => None,
        }
    }

    pub fn into_handler(self) -> Option<E> {
        match self {
            DeadlineError::Handler(err) => Some(err),
            DeadlineError::Expired { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::time::Duration;
    use chrono::{TimeZone, Utc};

    #[derive(Debug, Error)]
    #[error("database unavailable")]
    struct HandlerFailure;

    #[test]
    fn test_before_start_has_no_source() {
        let err: DeadlineError<HandlerFailure> = DeadlineError::Expired {
            deadline: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            phase: ExpiryPhase::BeforeStart,
            source: None,
        };

        assert!(err.is_expired());
        assert_eq!(err.phase(), Some(ExpiryPhase::BeforeStart));
        assert!(err.source().is_none());
        assert_eq!(
            err.to_string(),
            "deadline 2024-05-01 12:00:00 UTC expired before processing started"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_keeps_elapsed_source() {
        let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        let err: DeadlineError<HandlerFailure> = DeadlineError::Expired {
            deadline: Utc::now(),
            phase: ExpiryPhase::InFlight,
            source: Some(elapsed),
        };

        assert_eq!(err.phase(), Some(ExpiryPhase::InFlight));
        assert!(err.source().is_some_and(|source| source.is::<Elapsed>()));
    }

    #[test]
    fn test_handler_error_is_transparent() {
        let err = DeadlineError::Handler(HandlerFailure);

        assert!(!err.is_expired());
        assert_eq!(err.phase(), None);
        assert_eq!(err.to_string(), "database unavailable");
        assert!(err.handler().is_some());
        assert!(err.into_handler().is_some());
    }
}
