//! Forwarding received snapshots to the broker.

use stepwatch_forwarder::{Forwarder, Publisher};
use stepwatch_types::ActivitySnapshot;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Counts for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded: u64,
    pub failed: u64,
}

/// Forward every snapshot from `rx` until all senders are gone.
///
/// A failed publish is logged and counted; the next snapshot is still
/// attempted.
pub async fn relay<P: Publisher>(
    mut rx: mpsc::Receiver<ActivitySnapshot>,
    forwarder: &mut Forwarder<P>,
) -> RelayStats {
    let mut stats = RelayStats::default();

    while let Some(snapshot) = rx.recv().await {
        match forwarder.forward(&snapshot).await {
            Ok(()) => stats.forwarded += 1,
            Err(e) => {
                stats.failed += 1;
                error!(
                    error = %e,
                    timestamp_ms = snapshot.timestamp_ms,
                    "Failed to forward snapshot"
                );
            }
        }
    }

    debug!(forwarded = stats.forwarded, failed = stats.failed, "Relay finished");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use stepwatch_forwarder::{ChannelPublisher, ForwarderError};

    /// Publisher that rejects every other payload.
    #[derive(Default)]
    struct FlakyPublisher {
        calls: AtomicU64,
    }

    #[async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish(&self, _payload: &str) -> Result<(), ForwarderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(ForwarderError::Publish("broker unavailable".to_string()));
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), ForwarderError> {
            Ok(())
        }
    }

    fn snapshot(timestamp_ms: u64) -> ActivitySnapshot {
        ActivitySnapshot::with_timestamp(timestamp_ms)
    }

    #[tokio::test]
    async fn forwards_until_senders_drop() {
        let (publisher, mut published) = ChannelPublisher::create();
        let mut forwarder = Forwarder::new(publisher);
        let (tx, rx) = mpsc::channel(8);

        for ts in 1..=3 {
            tx.send(snapshot(ts)).await.unwrap();
        }
        drop(tx);

        let stats = relay(rx, &mut forwarder).await;

        assert_eq!(stats, RelayStats { forwarded: 3, failed: 0 });
        for _ in 0..3 {
            assert!(published.recv().await.unwrap().contains("datetimestamp"));
        }
    }

    #[tokio::test]
    async fn publish_failures_do_not_stop_the_relay() {
        let mut forwarder = Forwarder::new(FlakyPublisher::default());
        let (tx, rx) = mpsc::channel(8);

        for ts in 1..=4 {
            tx.send(snapshot(ts)).await.unwrap();
        }
        drop(tx);

        let stats = relay(rx, &mut forwarder).await;

        assert_eq!(stats, RelayStats { forwarded: 2, failed: 2 });
        assert_eq!(forwarder.publisher().calls.load(Ordering::SeqCst), 4);
        assert_eq!(forwarder.forwarded(), 2);
    }
}
