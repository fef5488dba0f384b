//! Per-component step statistics.

use alloc::string::String;
use alloc::vec::Vec;

/// Throughput and latency statistics for a single component.
///
/// Latencies are kept in full: the list only grows, and `avg_ms_taken` is
/// always the truncated integer mean of every latency recorded so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct StepStats {
    /// Number of process steps observed.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub message_count: u64,

    /// Latency of every observed step in milliseconds, in arrival order.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(1))]
    pub ms_taken: Vec<u64>,

    /// Mean of `ms_taken`, truncated toward zero.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub avg_ms_taken: u64,

    /// Message identifier of every observed step, in arrival order.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub message_ids: Vec<String>,
}

impl StepStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one process step into the statistics.
    ///
    /// Appends the message id and latency, bumps the count and recomputes the
    /// running mean from the full latency list.
    pub fn record(&mut self, message_id: impl Into<String>, ms_taken: u64) {
        self.add_message(message_id, ms_taken);
        self.increment_count();
        self.recompute_average();
    }

    /// Append a message id together with the time its step took.
    pub fn add_message(&mut self, message_id: impl Into<String>, ms_taken: u64) {
        self.message_ids.push(message_id.into());
        self.ms_taken.push(ms_taken);
    }

    /// Increment the message count by one.
    pub fn increment_count(&mut self) {
        self.message_count += 1;
    }

    /// Recompute `avg_ms_taken` from the latency list.
    pub fn recompute_average(&mut self) {
        self.avg_ms_taken = average_ms(&self.ms_taken);
    }

    /// Sum of all recorded latencies, saturating at `u64::MAX`.
    pub fn total_ms(&self) -> u64 {
        self.ms_taken
            .iter()
            .fold(0u64, |total, &ms| total.saturating_add(ms))
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.message_count == 0 && self.ms_taken.is_empty()
    }
}

/// Integer mean of a latency list. An empty list averages to zero.
///
/// Summed in `u128`, so large latencies cannot overflow; the mean of `u64`
/// values always fits back into a `u64`.
pub fn average_ms(ms_taken: &[u64]) -> u64 {
    if ms_taken.is_empty() {
        return 0;
    }
    let total: u128 = ms_taken.iter().map(|&ms| u128::from(ms)).sum();
    (total / ms_taken.len() as u128) as u64
}
