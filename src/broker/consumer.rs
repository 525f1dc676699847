//! Message consumer driving deadline-enforced handlers.
//!
//! # Responsibilities
//! - Pull envelopes from a subscription
//! - Run each envelope on its own task through the service stack
//! - Cap concurrent messages at `max_in_flight`
//! - Classify outcomes: success, handler failure, deadline expiry
//!
//! # Design Decisions
//! - Expiry is reported apart from handler failure so redelivery policy can differ
//! - Shutdown stops intake; already running messages are awaited

use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tower::{Service, ServiceExt};
use tracing::Instrument;

use crate::broker::channel::Subscription;
use crate::broker::envelope::Envelope;
use crate::config::ConsumerConfig;
use crate::deadline::DeadlineError;
use crate::observability::metrics;

/// Result of processing a single envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    HandlerFailed,
    Expired,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "ok",
            Outcome::HandlerFailed => "handler_error",
            Outcome::Expired => "expired",
        }
    }
}

/// Tally of processed envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub succeeded: u64,
    pub handler_failed: u64,
    pub expired: u64,
    /// Handler tasks that panicked.
    pub panicked: u64,
}

impl ConsumerStats {
    fn record(&mut self, joined: Result<Outcome, JoinError>) {
        match joined {
            Ok(Outcome::Succeeded) => self.succeeded += 1,
            Ok(Outcome::HandlerFailed) => self.handler_failed += 1,
            Ok(Outcome::Expired) => self.expired += 1,
            Err(e) => {
                tracing::error!(error = %e, "Message task panicked");
                self.panicked += 1;
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.handler_failed + self.expired + self.panicked
    }
}

/// Pulls envelopes from a subscription and feeds them to a service.
pub struct Consumer<S> {
    service: S,
    config: ConsumerConfig,
}

impl<S, E> Consumer<S>
where
    S: Service<Envelope, Error = DeadlineError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    E: Display + Send + 'static,
{
    pub fn new(service: S, config: ConsumerConfig) -> Self {
        Self { service, config }
    }

    /// Consume until the subscription ends or shutdown is signalled, then wait
    /// for in-flight messages.
    ///
    /// A concurrency permit is acquired before an envelope is taken, so at most
    /// `max_in_flight` envelopes ever leave the subscription ahead of shutdown.
    pub async fn run(
        self,
        mut subscription: Subscription,
        mut shutdown: broadcast::Receiver<()>,
    ) -> ConsumerStats {
        let limit = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut tasks = JoinSet::new();
        let mut stats = ConsumerStats::default();
        let mut permit: Option<OwnedSemaphorePermit> = None;

        tracing::info!(max_in_flight = self.config.max_in_flight, "Consumer started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Consumer received shutdown signal, stopping intake");
                    break;
                }
                Some(joined) = tasks.join_next() => stats.record(joined),
                acquired = limit.clone().acquire_owned(), if permit.is_none() => {
                    match acquired {
                        Ok(acquired) => permit = Some(acquired),
                        Err(_) => break,
                    }
                }
                next = subscription.next(), if permit.is_some() => {
                    let Some(envelope) = next else {
                        tracing::info!("Subscription closed");
                        break;
                    };
                    let Some(permit) = permit.take() else {
                        continue;
                    };
                    let service = self.service.clone();
                    let span = tracing::info_span!("message", message_id = %envelope.id);
                    tasks.spawn(
                        async move {
                            let outcome = process(service, envelope).await;
                            drop(permit);
                            outcome
                        }
                        .instrument(span),
                    );
                }
            }
        }

        if !tasks.is_empty() {
            tracing::info!(in_flight = tasks.len(), "Waiting for in-flight messages");
        }
        while let Some(joined) = tasks.join_next().await {
            stats.record(joined);
        }

        tracing::info!(
            succeeded = stats.succeeded,
            handler_failed = stats.handler_failed,
            expired = stats.expired,
            "Consumer stopped"
        );
        stats
    }
}

async fn process<S, E>(service: S, envelope: Envelope) -> Outcome
where
    S: Service<Envelope, Error = DeadlineError<E>>,
    E: Display,
{
    let outcome = match service.oneshot(envelope).await {
        Ok(_) => {
            tracing::debug!("Message processed");
            Outcome::Succeeded
        }
        Err(err @ DeadlineError::Expired { .. }) => {
            tracing::warn!(error = %err, "Message dropped: deadline expired");
            Outcome::Expired
        }
        Err(DeadlineError::Handler(e)) => {
            tracing::warn!(error = %e, "Handler failed");
            Outcome::HandlerFailed
        }
    };
    metrics::record_message_processed(outcome.as_str());
    outcome
}
