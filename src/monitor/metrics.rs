//! Monitor run metrics

use std::time::Duration;

/// Timings and counters of the monitor's pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorMetrics {
    /// Wall time spent in the last `collect()`
    pub collecting_time: Duration,
    /// Wall time spent in the last `sample()`
    pub sampling_time: Duration,
    /// Wall time spent in the last `send()`
    pub sending_time: Duration,
    /// Clock time of the last finished collect
    pub last_collected: Option<i64>,
    /// Clock time of the last sample
    pub last_sampled: Option<i64>,
    /// Clock time of the last send
    pub last_sent: Option<i64>,
    /// Samples made since creation
    pub samples_made: u64,
    /// Batches handed to the sender, heartbeats included
    pub batches_sent: u64,
    /// Batches the sender rejected
    pub send_failures: u64,
    /// Entries removed by expiration trims
    pub trimmed_entries: u64,
}

impl MonitorMetrics {
    pub(super) fn record_collect(&mut self, elapsed: Duration, now: i64, trimmed: usize) {
        self.collecting_time = elapsed;
        self.last_collected = Some(now);
        self.trimmed_entries += trimmed as u64;
    }

    pub(super) fn record_sample(&mut self, elapsed: Duration, now: i64) {
        self.sampling_time = elapsed;
        self.last_sampled = Some(now);
        self.samples_made += 1;
    }

    pub(super) fn record_send(&mut self, elapsed: Duration, now: i64, sent: usize, failed: usize) {
        self.sending_time = elapsed;
        self.last_sent = Some(now);
        self.batches_sent += sent as u64;
        self.send_failures += failed as u64;
    }
}
