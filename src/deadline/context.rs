//! Ambient access to the current message's countdown.
//!
//! Code running anywhere inside a handler can ask how much time is left
//! without the deadline being threaded through every call signature. The slot
//! is task-local: concurrent messages never see each other's countdown, and
//! nothing is visible outside an enforcement scope.

use std::future::Future;
use std::time::Duration;

use crate::deadline::Countdown;

tokio::task_local! {
    static COUNTDOWN: Countdown;
}

/// Run `fut` with `countdown` installed as the ambient countdown.
pub async fn scope<F: Future>(countdown: Countdown, fut: F) -> F::Output {
    COUNTDOWN.scope(countdown, fut).await
}

/// Countdown of the message being processed by the current task, if any.
pub fn current() -> Option<Countdown> {
    COUNTDOWN.try_with(|countdown| *countdown).ok()
}

/// Seconds left for the current message, or `None` when no deadline applies.
pub fn remaining_secs() -> Option<f64> {
    current().map(|countdown| countdown.remaining_secs())
}

/// Time left for the current message.
///
/// `None` when no deadline applies. `Some(Duration::ZERO)` once it has expired.
pub fn remaining() -> Option<Duration> {
    current().map(|countdown| countdown.remaining())
}

/// Whether the current message's deadline has passed. False without a deadline.
pub fn is_expired() -> bool {
    current().is_some_and(|countdown| countdown.is_expired())
}

/// Carry the current countdown into a future that will run on another task.
///
/// Task-locals do not follow `tokio::spawn`; wrap the spawned future with this
/// so that background work started by a handler sees the same deadline.
pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    let countdown = current();
    async move {
        match countdown {
            Some(countdown) => COUNTDOWN.scope(countdown, fut).await,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    fn countdown_in(secs: i64) -> Countdown {
        Countdown::new(Utc::now() + TimeDelta::seconds(secs))
    }

    #[tokio::test]
    async fn test_nothing_outside_scope() {
        assert!(current().is_none());
        assert!(remaining_secs().is_none());
        assert!(remaining().is_none());
        assert!(!is_expired());
    }

    #[tokio::test]
    async fn test_visible_in_nested_calls() {
        async fn nested() -> Option<f64> {
            tokio::task::yield_now().await;
            remaining_secs()
        }

        let countdown = countdown_in(10);
        let seen = scope(countdown, async { (current(), nested().await) }).await;

        assert_eq!(seen.0, Some(countdown));
        let secs = seen.1.unwrap();
        assert!(secs > 9.0 && secs <= 10.0);
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_expired_countdown_reports_zero() {
        let countdown = countdown_in(-1);
        scope(countdown, async {
            assert!(is_expired());
            assert_eq!(remaining(), Some(Duration::ZERO));
            assert_eq!(remaining(), Some(countdown.remaining()));
        })
        .await;
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let a = countdown_in(100);
        let b = countdown_in(200);

        let (seen_a, seen_b) = tokio::join!(
            scope(a, async {
                tokio::task::yield_now().await;
                current()
            }),
            scope(b, async {
                tokio::task::yield_now().await;
                current()
            }),
        );

        assert_eq!(seen_a, Some(a));
        assert_eq!(seen_b, Some(b));
    }

    #[tokio::test]
    async fn test_spawned_task_needs_propagate() {
        let countdown = countdown_in(30);

        let (plain, propagated) = scope(countdown, async {
            let plain = tokio::spawn(async { current() });
            let propagated = tokio::spawn(propagate(async { current() }));
            (plain.await.unwrap(), propagated.await.unwrap())
        })
        .await;

        assert_eq!(plain, None);
        assert_eq!(propagated, Some(countdown));
    }

    #[tokio::test]
    async fn test_propagate_without_countdown() {
        let seen = tokio::spawn(propagate(async { current() })).await.unwrap();
        assert!(seen.is_none());
    }
}
