//! Sampler
//!
//! Turns the current store contents into one immutable [`Sample`] per call.
//! In incremental mode only entries touched after the previous sample are
//! included; a store with no writes in between yields a sample with no entity
//! lists at all.

pub mod config;
pub mod sample;

pub use config::SamplerConfig;
pub use sample::{decode_batch, encode_batch, ExtensionStats, Sample};

use crate::clock::{system_clock, SharedClock};
use crate::error::{Error, Result};
use crate::storage::{StatsEntry, StatsReader};

/// Produces samples from a store
pub struct Sampler {
    config: SamplerConfig,
    clock: SharedClock,
    last_sampled: Option<i64>,
    extension_stats: Vec<ExtensionStats>,
    marker: Option<String>,
    closed: bool,
}

impl Sampler {
    /// Create a sampler using the system clock
    pub fn new(config: SamplerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Create a sampler reading time from `clock`
    pub fn with_clock(config: SamplerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            last_sampled: None,
            extension_stats: Vec::new(),
            marker: None,
            closed: false,
        }
    }

    /// Get the sampler configuration
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Timestamp of the last sample made, if any
    pub fn last_sampled(&self) -> Option<i64> {
        self.last_sampled
    }

    /// Queue an extension record for the next sample
    pub fn add_extension_stats(&mut self, stats: ExtensionStats) {
        self.extension_stats.push(stats);
    }

    /// Set or clear the marker attached to every following sample
    pub fn set_marker(&mut self, marker: Option<String>) {
        self.marker = marker;
    }

    /// Get the current marker
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Make a sample from `reader`
    ///
    /// Pending extension stats are consumed; the marker is kept.
    pub fn make<R: StatsReader + ?Sized>(&mut self, reader: &R) -> Result<Sample> {
        if self.closed {
            return Err(Error::SamplerClosed);
        }

        let now = self.clock.now_ms();
        let since = if self.config.incremental_sampling {
            self.last_sampled
        } else {
            None
        };

        let mut sample = Sample::new(self.config.sfu_id.clone(), now);
        sample.time_zone_offset_in_hours = self.config.time_zone_offset_in_hours;
        sample.marker = self.marker.clone();
        sample.transports = collect_stats(reader.transports(), since);
        sample.inbound_pads = collect_stats(reader.inbound_pads(), since);
        sample.outbound_pads = collect_stats(reader.outbound_pads(), since);
        sample.sctp_channels = collect_stats(reader.sctp_channels(), since);

        if !self.extension_stats.is_empty() {
            sample.extension_stats = Some(std::mem::take(&mut self.extension_stats));
        }

        self.last_sampled = Some(now);

        tracing::debug!(
            sfu_id = %sample.sfu_id,
            timestamp = now,
            transports = sample.transports.as_ref().map_or(0, Vec::len),
            inbound_pads = sample.inbound_pads.as_ref().map_or(0, Vec::len),
            outbound_pads = sample.outbound_pads.as_ref().map_or(0, Vec::len),
            sctp_channels = sample.sctp_channels.as_ref().map_or(0, Vec::len),
            "Sample made"
        );

        Ok(sample)
    }

    /// Close the sampler; later `make()` calls fail
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.extension_stats.clear();
            tracing::debug!(sfu_id = %self.config.sfu_id, "Sampler closed");
        }
    }

    /// Whether `close()` was called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Copy the stats of entries touched after `since` (all when `None`)
fn collect_stats<'a, S>(
    entries: impl Iterator<Item = &'a StatsEntry<S>>,
    since: Option<i64>,
) -> Option<Vec<S>>
where
    S: Clone + 'a,
{
    let stats: Vec<S> = entries
        .filter(|entry| since.map_or(true, |since| entry.touched > since))
        .map(|entry| entry.stats.clone())
        .collect();

    (!stats.is_empty()).then_some(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::stats::{InboundPadStats, MediaKind, TransportStats};
    use crate::storage::{StatsStorage, StatsWriter};

    fn setup(incremental: bool) -> (StatsStorage, Sampler, ManualClock) {
        let clock = ManualClock::new(1_000);
        let storage = StatsStorage::with_clock(Arc::new(clock.clone()));
        let config = SamplerConfig::new("sfu-1").incremental_sampling(incremental);
        let sampler = Sampler::with_clock(config, Arc::new(clock.clone()));
        (storage, sampler, clock)
    }

    #[test]
    fn test_make_includes_written_entries() {
        let (mut storage, mut sampler, clock) = setup(true);

        storage.update_transport(TransportStats::new("t1"), None).unwrap();
        storage
            .update_inbound_pad(
                InboundPadStats::new("t1", "p1").with_stream("s1", MediaKind::Audio),
                None,
            )
            .unwrap();
        clock.advance(10);

        let sample = sampler.make(&storage).unwrap();

        assert_eq!(sample.sfu_id, "sfu-1");
        assert_eq!(sample.timestamp, 1_010);
        assert_eq!(sample.transports, Some(vec![TransportStats::new("t1")]));
        let pads = sample.inbound_pads.unwrap();
        assert_eq!(pads.len(), 1);
        assert_eq!(pads[0].pad_id, "p1");
        assert!(sample.outbound_pads.is_none());
        assert!(sample.sctp_channels.is_none());
        assert_eq!(sampler.last_sampled(), Some(1_010));
    }

    #[test]
    fn test_incremental_skips_untouched_entries() {
        let (mut storage, mut sampler, clock) = setup(true);

        storage
            .update_inbound_pad(InboundPadStats::new("t1", "p1"), None)
            .unwrap();
        clock.advance(10);
        sampler.make(&storage).unwrap();

        clock.advance(10);
        let second = sampler.make(&storage).unwrap();
        assert!(second.inbound_pads.is_none());
        assert!(second.is_empty());

        // A no-op rewrite still counts as touched
        clock.advance(10);
        storage
            .update_inbound_pad(InboundPadStats::new("t1", "p1"), None)
            .unwrap();
        clock.advance(10);
        let third = sampler.make(&storage).unwrap();
        assert_eq!(third.inbound_pads.map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_full_sampling_reports_everything() {
        let (mut storage, mut sampler, clock) = setup(false);

        storage.update_transport(TransportStats::new("t1"), None).unwrap();
        storage.update_transport(TransportStats::new("t2"), None).unwrap();

        for _ in 0..3 {
            clock.advance(100);
            let sample = sampler.make(&storage).unwrap();
            assert_eq!(sample.transports.map(|t| t.len()), Some(2));
        }
    }

    #[test]
    fn test_sample_does_not_alias_store() {
        let (mut storage, mut sampler, clock) = setup(false);

        let mut stats = TransportStats::new("t1");
        stats.rtp_packets_received = Some(1);
        storage.update_transport(stats.clone(), None).unwrap();

        clock.advance(1);
        let sample = sampler.make(&storage).unwrap();

        stats.rtp_packets_received = Some(2);
        storage.update_transport(stats, None).unwrap();

        assert_eq!(
            sample.transports.unwrap()[0].rtp_packets_received,
            Some(1)
        );
    }

    #[test]
    fn test_extension_stats_consumed_once_marker_sticky() {
        let (storage, mut sampler, clock) = setup(true);

        sampler.set_marker(Some("run-1".into()));
        sampler.add_extension_stats(ExtensionStats::new("room", "{}"));

        clock.advance(1);
        let first = sampler.make(&storage).unwrap();
        assert_eq!(first.extension_stats.map(|e| e.len()), Some(1));
        assert_eq!(first.marker.as_deref(), Some("run-1"));

        clock.advance(1);
        let second = sampler.make(&storage).unwrap();
        assert!(second.extension_stats.is_none());
        assert_eq!(second.marker.as_deref(), Some("run-1"));

        sampler.set_marker(None);
        clock.advance(1);
        assert!(sampler.make(&storage).unwrap().marker.is_none());
    }

    #[test]
    fn test_make_after_close_fails() {
        let (storage, mut sampler, _) = setup(true);

        sampler.close();
        assert!(sampler.is_closed());
        assert!(matches!(sampler.make(&storage), Err(Error::SamplerClosed)));
    }

    #[test]
    fn test_time_zone_offset_attached() {
        let clock = ManualClock::new(0);
        let storage = StatsStorage::with_clock(Arc::new(clock.clone()));
        let config = SamplerConfig::new("sfu-1").time_zone_offset_in_hours(-3.0);
        let mut sampler = Sampler::with_clock(config, Arc::new(clock));

        let sample = sampler.make(&storage).unwrap();
        assert_eq!(sample.time_zone_offset_in_hours, Some(-3.0));
    }
}
