//! Sampler configuration

use chrono::{Local, Offset};

/// Sampler configuration options
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Identifier of the SFU, stamped on every sample
    pub sfu_id: String,

    /// Only report entries written since the previous sample
    pub incremental_sampling: bool,

    /// Time zone offset reported with every sample
    pub time_zone_offset_in_hours: Option<f64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sfu_id: String::new(),
            incremental_sampling: true,
            time_zone_offset_in_hours: None,
        }
    }
}

impl SamplerConfig {
    /// Create a config for `sfu_id`
    pub fn new(sfu_id: impl Into<String>) -> Self {
        Self {
            sfu_id: sfu_id.into(),
            ..Default::default()
        }
    }

    /// Enable or disable incremental sampling
    pub fn incremental_sampling(mut self, enabled: bool) -> Self {
        self.incremental_sampling = enabled;
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
}

/// Current UTC offset of the host in hours
pub(crate) fn local_offset_hours() -> f64 {
    let seconds = Local::now().offset().fix().local_minus_utc();
    f64::from(seconds) / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SamplerConfig::default();

        assert!(config.sfu_id.is_empty());
        assert!(config.incremental_sampling);
        assert!(config.time_zone_offset_in_hours.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = SamplerConfig::new("sfu-1")
            .incremental_sampling(false)
            .time_zone_offset_in_hours(5.5);

        assert_eq!(config.sfu_id, "sfu-1");
        assert!(!config.incremental_sampling);
        assert_eq!(config.time_zone_offset_in_hours, Some(5.5));
    }

    #[test]
    fn test_local_time_zone_in_range() {
        let config = SamplerConfig::new("sfu-1").local_time_zone();
        let hours = config.time_zone_offset_in_hours.unwrap();

        assert!((-12.0..=14.0).contains(&hours));
    }
}
