//! Monitor lifecycle events

use std::time::Duration;

/// Event published on the monitor's broadcast channel
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A collecting pass finished
    Collected {
        elapsed: Duration,
        /// Entries removed by the expiration trim
        trimmed: usize,
    },

    /// A sample was added to the accumulator
    Sampled { timestamp: i64 },

    /// Drained batches were handed to the sender
    Sent { batches: usize, samples: usize },

    /// The sender rejected a batch
    SendFailed { reason: String },

    /// The monitor was closed
    Closed,
}
