//! Monitor configuration

use std::time::Duration;

use serde::Deserialize;

use crate::accumulator::AccumulatorConfig;
use crate::sampler::config::local_offset_hours;
use crate::sampler::SamplerConfig;

/// Monitor configuration options
///
/// Periods are in milliseconds so the struct can be embedded in a host
/// server's own config file; a period of 0 disables that timer in
/// `run_until`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Identifier of the monitored SFU
    pub sfu_id: String,

    /// Time between collector sweeps
    pub collecting_period_ms: u64,

    /// Time between samples
    pub sampling_period_ms: u64,

    /// Time between sends
    pub sending_period_ms: u64,

    /// Entries not touched for this long are trimmed after each sweep (0 = never)
    pub stats_expiration_ms: u64,

    /// Only report entries written since the previous sample
    pub incremental_sampling: bool,

    /// Samples per batch (0 = unbounded)
    pub max_samples_per_batch: usize,

    /// Send a heartbeat when there is nothing to send
    pub forward_if_empty: bool,

    /// Capacity of the monitor event channel
    pub event_capacity: usize,

    /// Time zone offset stamped on every sample
    pub time_zone_offset_in_hours: Option<f64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sfu_id: String::new(),
            collecting_period_ms: 5_000,
            sampling_period_ms: 15_000,
            sending_period_ms: 30_000,
            stats_expiration_ms: 60_000,
            incremental_sampling: true,
            max_samples_per_batch: 100,
            forward_if_empty: false,
            event_capacity: 64,
            time_zone_offset_in_hours: None,
        }
    }
}

impl MonitorConfig {
    /// Create a config for `sfu_id`
    pub fn new(sfu_id: impl Into<String>) -> Self {
        Self {
            sfu_id: sfu_id.into(),
            ..Default::default()
        }
    }

    /// Set the collecting period
    pub fn collecting_period(mut self, period: Duration) -> Self {
        self.collecting_period_ms = millis(period);
        self
    }

    /// Set the sampling period
    pub fn sampling_period(mut self, period: Duration) -> Self {
        self.sampling_period_ms = millis(period);
        self
    }

    /// Set the sending period
    pub fn sending_period(mut self, period: Duration) -> Self {
        self.sending_period_ms = millis(period);
        self
    }

    /// Set the stats expiration
    pub fn stats_expiration(mut self, expiration: Duration) -> Self {
        self.stats_expiration_ms = millis(expiration);
        self
    }

    /// Enable or disable incremental sampling
    pub fn incremental_sampling(mut self, enabled: bool) -> Self {
        self.incremental_sampling = enabled;
        self
    }

    /// Set the batch size limit
    pub fn max_samples_per_batch(mut self, max: usize) -> Self {
        self.max_samples_per_batch = max;
        self
    }

    /// Enable or disable heartbeats
    pub fn forward_if_empty(mut self, enabled: bool) -> Self {
        self.forward_if_empty = enabled;
        self
    }

    /// Report a fixed time zone offset
    pub fn time_zone_offset_in_hours(mut self, hours: f64) -> Self {
        self.time_zone_offset_in_hours = Some(hours);
        self
    }

    /// Report the host's current local offset
    pub fn local_time_zone(mut self) -> Self {
        self.time_zone_offset_in_hours = Some(local_offset_hours());
        self
    }

    pub(super) fn sampler_config(&self) -> SamplerConfig {
        let config =
            SamplerConfig::new(self.sfu_id.clone()).incremental_sampling(self.incremental_sampling);
        match self.time_zone_offset_in_hours {
            Some(hours) => config.time_zone_offset_in_hours(hours),
            None => config,
        }
    }

    pub(super) fn accumulator_config(&self) -> AccumulatorConfig {
        AccumulatorConfig::default()
            .max_samples_per_batch(self.max_samples_per_batch)
            .forward_if_empty(self.forward_if_empty)
    }

    pub(super) fn collecting_interval(&self) -> Option<Duration> {
        period(self.collecting_period_ms)
    }

    pub(super) fn sampling_interval(&self) -> Option<Duration> {
        period(self.sampling_period_ms)
    }

    pub(super) fn sending_interval(&self) -> Option<Duration> {
        period(self.sending_period_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn period(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();

        assert_eq!(config.collecting_period_ms, 5_000);
        assert_eq!(config.stats_expiration_ms, 60_000);
        assert!(config.incremental_sampling);
        assert_eq!(config.max_samples_per_batch, 100);
    }

    #[test]
    fn test_builder_chaining() {
        let config = MonitorConfig::new("sfu-1")
            .sampling_period(Duration::from_secs(2))
            .sending_period(Duration::ZERO)
            .forward_if_empty(true);

        assert_eq!(config.sfu_id, "sfu-1");
        assert_eq!(config.sampling_interval(), Some(Duration::from_secs(2)));
        assert_eq!(config.sending_interval(), None);
        assert!(config.accumulator_config().forward_if_empty);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{ "sfuId": "sfu-7", "samplingPeriodMs": 1000, "maxSamplesPerBatch": 0 }"#,
        )
        .unwrap();

        assert_eq!(config.sfu_id, "sfu-7");
        assert_eq!(config.sampling_period_ms, 1_000);
        assert_eq!(config.max_samples_per_batch, 0);
        assert_eq!(config.sending_period_ms, 30_000);
        assert_eq!(config.sampler_config().sfu_id, "sfu-7");
        assert_eq!(config.sampler_config().time_zone_offset_in_hours, None);
    }

    #[test]
    fn test_time_zone_passed_to_sampler() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{ "sfuId": "sfu-7", "timeZoneOffsetInHours": 5.5 }"#).unwrap();
        assert_eq!(config.time_zone_offset_in_hours, Some(5.5));
        assert_eq!(config.sampler_config().time_zone_offset_in_hours, Some(5.5));

        let config = MonitorConfig::new("sfu-1").time_zone_offset_in_hours(-3.0);
        assert_eq!(config.sampler_config().time_zone_offset_in_hours, Some(-3.0));
    }
}
