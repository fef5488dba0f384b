//! # stepwatch-forwarder
//!
//! Forwards activity snapshots to a message broker.
//!
//! Each snapshot is reshaped into a [`ForwardDocument`], a timestamped
//! camelCase JSON document, and handed to a [`Publisher`]. The AMQP
//! publisher (`amqp` feature) delivers documents to a RabbitMQ queue;
//! [`ChannelPublisher`] keeps them in process.
//!
//! ## Quick Start
//!
//! ```rust
//! use stepwatch_forwarder::{ChannelPublisher, Forwarder};
//! use stepwatch_types::ActivitySnapshot;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (publisher, mut rx) = ChannelPublisher::create();
//! let mut forwarder = Forwarder::new(publisher);
//!
//! forwarder.forward(&ActivitySnapshot::new()).await.unwrap();
//! let payload = rx.recv().await.unwrap();
//! assert!(payload.contains("adapterMetrics"));
//! # }
//! ```

pub mod document;
pub mod error;
pub mod publisher;

#[cfg(feature = "amqp")]
pub mod amqp;

pub use document::ForwardDocument;
pub use error::ForwarderError;
pub use publisher::{ChannelPublisher, Forwarder, Publisher};

#[cfg(feature = "amqp")]
pub use amqp::{AmqpPublisher, BrokerConfig};
