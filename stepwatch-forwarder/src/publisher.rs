//! Publishing forward documents.

use async_trait::async_trait;
use stepwatch_types::ActivitySnapshot;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::document::ForwardDocument;
use crate::error::ForwarderError;

/// A destination for serialized forward documents.
///
/// Implementations are expected to be cheap to call repeatedly; connection
/// setup belongs in their constructor.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one JSON payload.
    async fn publish(&self, payload: &str) -> Result<(), ForwarderError>;

    /// Release the underlying connection. Later publishes fail.
    async fn close(&self) -> Result<(), ForwarderError>;
}

/// Turns snapshots into forward documents and hands them to a [`Publisher`].
#[derive(Debug)]
pub struct Forwarder<P> {
    publisher: P,
    forwarded: u64,
}

impl<P: Publisher> Forwarder<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            forwarded: 0,
        }
    }

    /// Serialize and publish one snapshot.
    pub async fn forward(&mut self, snapshot: &ActivitySnapshot) -> Result<(), ForwarderError> {
        let payload = ForwardDocument::from_snapshot(snapshot).to_json()?;
        self.publisher.publish(&payload).await?;
        self.forwarded += 1;
        debug!(
            adapters = snapshot.len(),
            bytes = payload.len(),
            "Forwarded snapshot"
        );
        Ok(())
    }

    /// Number of snapshots published so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Close the publisher.
    pub async fn close(self) -> Result<(), ForwarderError> {
        info!(forwarded = self.forwarded, "Closing forwarder");
        self.publisher.close().await
    }
}

/// Publishes payloads into an in-process channel.
///
/// Useful for tests and for bridging into another transport.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiver its payloads arrive on.
    pub fn create() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, payload: &str) -> Result<(), ForwarderError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| ForwarderError::Closed)
    }

    async fn close(&self) -> Result<(), ForwarderError> {
        Ok(())
    }
}
