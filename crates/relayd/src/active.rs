//! Active request registry and cooperative cancellation.
//!
//! Each in-flight generation registers a watch handle; the administrative
//! cancel endpoint flips it. Client disconnect is equivalent to cancel.

use std::collections::HashMap;
use tokio::sync::{watch, Mutex};
use tracing::info;

/// requestId -> cancel sender.
#[derive(Default)]
pub struct ActiveRequests {
    inner: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request; returns the receiver the supervisor selects on.
    pub async fn register(&self, request_id: &str) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.inner.lock().await.insert(request_id.to_string(), tx);
        rx
    }

    /// Deregister on completion or error.
    pub async fn deregister(&self, request_id: &str) {
        self.inner.lock().await.remove(request_id);
    }

    /// Cancel a request. False when the id is unknown (already finished or
    /// never existed).
    pub async fn cancel(&self, request_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.remove(request_id) {
            Some(tx) => {
                info!("cancelling request {}", request_id);
                let _ = tx.send(true);
                true
            }
            None => false,
        }
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_flow() {
        let active = ActiveRequests::new();
        let mut rx = active.register("r1").await;
        assert_eq!(active.count().await, 1);
        assert!(!*rx.borrow());

        assert!(active.cancel("r1").await);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());

        // Second cancel finds nothing.
        assert!(!active.cancel("r1").await);
        assert_eq!(active.count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_cancel() {
        let active = ActiveRequests::new();
        assert!(!active.cancel("ghost").await);
    }

    #[tokio::test]
    async fn test_deregister() {
        let active = ActiveRequests::new();
        let _rx = active.register("r2").await;
        active.deregister("r2").await;
        assert!(!active.cancel("r2").await);
    }
}
