//! Error types for discovery and ingestion.

use thiserror::Error;

use crate::event::ComponentKind;

/// Errors that abort topology discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Discovery was started from something other than an adapter.
    #[error("cannot build an activity map from {kind} component '{unique_id}': the root must be an adapter")]
    NotAnAdapter {
        kind: ComponentKind,
        unique_id: String,
    },
}

/// Errors raised while folding a single process step into the tree.
///
/// These never escape [`ActivityMap::ingest`](crate::ActivityMap::ingest);
/// the offending step is logged and skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The component's parent chain is shorter than its kind requires.
    #[error("{kind} component '{unique_id}' has no ancestor {hops} level(s) up")]
    MissingAncestor {
        kind: ComponentKind,
        unique_id: String,
        hops: usize,
    },
}

/// A live component could not enumerate its attributes.
///
/// Raised by [`LiveComponent::attributes`](crate::LiveComponent::attributes)
/// implementations; discovery abandons the nested subtree of that component.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to introspect '{unique_id}': {reason}")]
pub struct IntrospectionError {
    pub unique_id: String,
    pub reason: String,
}

impl IntrospectionError {
    pub fn new(unique_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            reason: reason.into(),
        }
    }
}
