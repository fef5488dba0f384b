//! # stepwatch
//!
//! Relay between stepwatch agents and a message broker.
//!
//! Agents emit activity snapshots as newline-delimited JSON over TCP
//! (`stepwatch_agent::Output::tcp`). The relay accepts those connections,
//! parses each snapshot, and forwards it to an AMQP queue as a timestamped
//! JSON document for dashboards to consume.
//!
//! ```text
//!  agent ──tcp──▶ SnapshotListener ──mpsc──▶ relay() ──▶ Forwarder ──amqp──▶ queue
//!  agent ──tcp──▶        │
//! ```
//!
//! ## Usage
//!
//! ```bash
//! stepwatch-relay --config relay.toml
//! stepwatch-relay --listen 0.0.0.0:7450 --broker-url amqp://broker:5672/%2f --queue activity
//! ```
//!
//! ## As a library
//!
//! ```no_run
//! use stepwatch::{relay, SnapshotListener};
//! use stepwatch_forwarder::{ChannelPublisher, Forwarder};
//! use tokio::sync::mpsc;
//!
//! # tokio_test::block_on(async {
//! let listener = SnapshotListener::bind("127.0.0.1:7450").await.unwrap();
//! let (tx, rx) = mpsc::channel(64);
//! tokio::spawn(listener.run(tx));
//!
//! let (publisher, _payloads) = ChannelPublisher::create();
//! let mut forwarder = Forwarder::new(publisher);
//! relay(rx, &mut forwarder).await;
//! # });
//! ```

pub mod config;
pub mod listener;
pub mod relay;

pub use config::{Overrides, RelayConfig};
pub use listener::{read_snapshots, SnapshotListener, StreamStats};
pub use relay::{relay, RelayStats};
