//! Shutdown coordination for the gateway.

use std::time::Duration;
use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// The HTTP server and any background task subscribe; a single trigger
/// tells all of them to stop.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of subscribers that have not yet finished.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until every subscriber has dropped its receiver, or `grace`
    /// elapses. Returns whether all subscribers finished in time.
    pub async fn drained(&self, grace: Duration) -> bool {
        let poll = async {
            while self.receiver_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(grace, poll).await.is_ok()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let task = tokio::spawn(async move {
            rx.recv().await.is_ok()
        });

        shutdown.trigger();
        assert!(task.await.unwrap());
        assert!(shutdown.drained(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_grace() {
        let shutdown = Shutdown::new();
        let _held = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);
        assert!(!shutdown.drained(Duration::from_secs(2)).await);
    }
}
