//! Shared helpers for deadline integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use deadline_propagation::broker::Envelope;
use deadline_propagation::{context, Countdown};

#[derive(Debug, thiserror::Error)]
#[error("handler failed: {0}")]
pub struct HandlerFailure(pub String);

/// Envelope carrying `deadline` in the default header.
pub fn envelope_with_deadline(deadline: DateTime<Utc>) -> Envelope {
    Envelope::new("job").with_deadline(deadline)
}

/// Wall-clock instant `secs` seconds from now (negative for the past).
pub fn in_secs(secs: i64) -> DateTime<Utc> {
    Utc::now() + TimeDelta::seconds(secs)
}

/// Records how often a handler ran and which countdown it saw.
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Option<Countdown>>>>,
}

#[allow(dead_code)]
impl CallRecorder {
    /// Handler body: record the ambient countdown, then work for `work`.
    pub async fn run(&self, work: Duration) -> Result<&'static str, HandlerFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(context::current());
        tokio::time::sleep(work).await;
        Ok("handled")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Option<Countdown>> {
        self.seen.lock().unwrap().clone()
    }
}
