//! Bounded in-memory queue between producers and the consumer.

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::broker::envelope::Envelope;

/// Errors raised by the in-memory broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The consumer side is gone; the envelope was not delivered.
    #[error("broker closed, message {0} not delivered")]
    Closed(Uuid),
}

/// Create a broker queue holding at most `capacity` undelivered envelopes.
pub fn channel(capacity: usize) -> (Publisher, Subscription) {
    let (tx, rx) = mpsc::channel(capacity);
    (Publisher { tx }, Subscription { rx })
}

/// Producer handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Envelope>,
}

impl Publisher {
    /// Enqueue an envelope, waiting for room when the queue is full.
    pub async fn publish(&self, envelope: Envelope) -> Result<(), BrokerError> {
        let id = envelope.id;
        self.tx.send(envelope).await.map_err(|_| BrokerError::Closed(id))?;
        tracing::trace!(message_id = %id, "Message published");
        Ok(())
    }
}

/// Consumer handle. Ends once every publisher has been dropped and the queue is drained.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Envelope>,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive_in_order() {
        let (publisher, mut subscription) = channel(4);
        publisher.publish(Envelope::new("a")).await.unwrap();
        publisher.publish(Envelope::new("b")).await.unwrap();
        drop(publisher);

        assert_eq!(subscription.next().await.unwrap().payload, "a");
        assert_eq!(subscription.next().await.unwrap().payload, "b");
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_after_consumer_gone() {
        let (publisher, subscription) = channel(1);
        drop(subscription);

        let envelope = Envelope::new("lost");
        let id = envelope.id;
        match publisher.publish(envelope).await {
            Err(BrokerError::Closed(closed)) => assert_eq!(closed, id),
            other => panic!("expected Closed, got {other:?}"),
        }
    }
}
