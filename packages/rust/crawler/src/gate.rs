//! Politeness gate shared by all workers.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sitekb_shared::FetchError;

/// Fixed-delay gate: a request may start only once `delay` has passed since
/// the previous request completed (or, with several workers, started).
///
/// The delay is a floor. Slow fetches do not add to it.
#[derive(Debug)]
pub struct PolitenessGate {
    delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl PolitenessGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    /// Wait for this request's turn. Starts are serialized through the gate.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        let mut last = self.last.lock().await;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if let Some(prev) = *last {
            let ready = prev + self.delay;
            tokio::select! {
                _ = tokio::time::sleep_until(ready) => {}
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }

    /// Record that a request finished.
    pub async fn complete(&self) {
        *self.last.lock().await = Some(Instant::now());
    }
}
