//! Deadline enforcement around a single handler invocation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DeadlineConfig;
use crate::deadline::{
    context, Attributes, Countdown, Deadline, DeadlineError, DeadlineResolver, ExpiryPhase,
};
use crate::observability::metrics;

/// Resolves each message's deadline and bounds the rest of the pipeline by it.
#[derive(Debug, Clone)]
pub struct DeadlineMiddleware {
    resolver: Arc<DeadlineResolver>,
}

impl DeadlineMiddleware {
    pub fn new(resolver: DeadlineResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    pub fn from_config(config: &DeadlineConfig) -> Self {
        Self::new(DeadlineResolver::from_config(config))
    }

    pub fn resolver(&self) -> &DeadlineResolver {
        &self.resolver
    }

    /// Process one message: resolve its deadline from `attributes`, then run
    /// `call_next` under it.
    pub async fn consume_scope<A, F, Fut, T, E>(
        &self,
        attributes: &A,
        call_next: F,
    ) -> Result<T, DeadlineError<E>>
    where
        A: Attributes + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let deadline = self.resolver.resolve(attributes);
        enforce(deadline, call_next).await
    }
}

impl Default for DeadlineMiddleware {
    fn default() -> Self {
        Self::new(DeadlineResolver::default())
    }
}

/// Run `call_next` bounded by `deadline`.
///
/// Without a deadline the call runs unbounded and its result is returned as is.
/// Otherwise the countdown is published to [`context`] for the duration of the
/// call, an already expired deadline fails without calling `call_next`, and a
/// call still running when the budget runs out is dropped.
pub async fn enforce<F, Fut, T, E>(
    deadline: Option<Deadline>,
    call_next: F,
) -> Result<T, DeadlineError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let Some(deadline) = deadline else {
        return call_next().await.map_err(DeadlineError::Handler);
    };

    let countdown = Countdown::new(deadline);
    context::scope(countdown, async move {
        let remaining_secs = countdown.remaining_secs();
        metrics::record_remaining(remaining_secs);

        if remaining_secs <= 0.0 {
            tracing::warn!(%deadline, remaining_secs, "Deadline expired before processing started");
            metrics::record_deadline_expired(ExpiryPhase::BeforeStart);
            return Err(DeadlineError::Expired {
                deadline,
                phase: ExpiryPhase::BeforeStart,
                source: None,
            });
        }

        let budget = Duration::try_from_secs_f64(remaining_secs).unwrap_or(Duration::MAX);
        match tokio::time::timeout(budget, call_next()).await {
            Ok(result) => result.map_err(DeadlineError::Handler),
            Err(elapsed) => {
                tracing::warn!(
                    %deadline,
                    budget_secs = remaining_secs,
                    "Deadline expired during processing"
                );
                metrics::record_deadline_expired(ExpiryPhase::InFlight);
                Err(DeadlineError::Expired {
                    deadline,
                    phase: ExpiryPhase::InFlight,
                    source: Some(elapsed),
                })
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use chrono::{TimeDelta, Utc};
    use crate::deadline::DEFAULT_HEADER;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("rejected")]
    struct Rejected;

    fn attrs(value: Option<String>) -> HashMap<String, String> {
        value.into_iter().map(|v| (DEFAULT_HEADER.to_string(), v)).collect()
    }

    #[tokio::test]
    async fn test_no_deadline_runs_unbounded() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<_, DeadlineError<Rejected>> = enforce(None, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(context::current())
        })
        .await;

        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(context::current().is_none());
    }

    #[tokio::test]
    async fn test_past_deadline_never_calls_handler() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let deadline = Utc::now() - TimeDelta::seconds(1);

        let result: Result<(), _> = enforce(Some(deadline), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Rejected)
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.phase(), Some(ExpiryPhase::BeforeStart));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let deadline = Utc::now() + TimeDelta::seconds(30);
        let result: Result<(), _> = enforce(Some(deadline), || async { Err(Rejected) }).await;

        assert_eq!(result.unwrap_err().into_handler(), Some(Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_is_cancelled() {
        let finished = AtomicUsize::new(0);
        let counter = &finished;
        let deadline = Utc::now() + TimeDelta::seconds(2);

        let result: Result<(), DeadlineError<Rejected>> =
            enforce(Some(deadline), move || async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.phase(), Some(ExpiryPhase::InFlight));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_consume_scope_publishes_countdown() {
        let middleware = DeadlineMiddleware::default();
        let deadline = Utc::now() + TimeDelta::seconds(20);
        let headers = attrs(Some(deadline.to_rfc3339()));

        let seen: Result<_, DeadlineError<Rejected>> = middleware
            .consume_scope(&headers, || async { Ok(context::current()) })
            .await;

        let countdown = seen.unwrap().unwrap();
        // RFC 3339 rendering keeps full sub-second precision.
        assert_eq!(countdown.deadline(), deadline);
        let remaining = countdown.remaining_secs();
        assert!(remaining > 19.0 && remaining <= 20.0);
        assert!(context::current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_scope_applies_default() {
        let middleware = DeadlineMiddleware::new(DeadlineResolver::new(
            DEFAULT_HEADER,
            Some(Duration::from_secs(5)),
        ));

        let result: Result<&str, DeadlineError<Rejected>> = middleware
            .consume_scope(&attrs(None), || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok("done")
            })
            .await;

        assert!(result.unwrap_err().is_expired());
    }
}
