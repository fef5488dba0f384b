//! # stepwatch-types
//!
//! Snapshot types for message-flow activity monitoring. This crate defines the
//! schema an agent emits and a relay consumes: a tree of adapters, channels,
//! workflows, services, producers and consumers, each carrying throughput and
//! latency statistics.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use stepwatch_types::ActivitySnapshot;
//!
//! let snapshot = ActivitySnapshot::builder()
//!     .adapter("adapter-1", |a| {
//!         a.channel("orders", |c| {
//!             c.workflow("orders-in", |w| {
//!                 w.message_id("m1")
//!                     .consumer("jms-in", |p| p.destination("queue://orders").step("m1", 4))
//!                     .service("validate", |s| s.class_name("XmlValidator").step("m1", 9))
//!             })
//!         })
//!     })
//!     .build();
//!
//! assert_eq!(snapshot.total_messages(), 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod activity;
mod snapshot;
mod stats;

pub use activity::*;
pub use snapshot::*;
pub use stats::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const SCHEMA_VERSION: u32 = 1;
