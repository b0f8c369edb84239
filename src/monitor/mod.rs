//! SFU monitor
//!
//! Wires the pipeline together and drives it on timers:
//!
//! ```text
//!   collecting tick            sampling tick             sending tick
//!        │                          │                         │
//!        ▼                          ▼                         ▼
//!   [Collectors] ──write──► [StatsStorage] ──read──► [Sampler] ──► [Accumulator] ──drain──► [Sender]
//!        │
//!        └── trim entries untouched for `stats_expiration`
//! ```
//!
//! Every step can also be called by hand, which is how embedding servers
//! that already own a scheduler use it.

pub mod config;
pub mod events;
pub mod metrics;

use std::future::Future;

use tokio::sync::broadcast;
use tokio::time::{Instant, Interval, MissedTickBehavior};

pub use config::MonitorConfig;
pub use events::MonitorEvent;
pub use metrics::MonitorMetrics;

use crate::accumulator::Accumulator;
use crate::clock::{system_clock, SharedClock};
use crate::collector::Collector;
use crate::error::{Error, Result};
use crate::sampler::{ExtensionStats, Sampler};
use crate::sender::Sender;
use crate::storage::{shared, SharedStorage, StatsStorage};

/// Telemetry pipeline for one SFU
pub struct SfuMonitor {
    config: MonitorConfig,
    clock: SharedClock,
    storage: SharedStorage,
    sampler: Sampler,
    accumulator: Accumulator,
    collectors: Vec<Box<dyn Collector>>,
    sender: Option<Box<dyn Sender>>,
    metrics: MonitorMetrics,
    events: broadcast::Sender<MonitorEvent>,
    closed: bool,
}

impl SfuMonitor {
    /// Create a monitor using the system clock
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Create a monitor reading time from `clock`
    pub fn with_clock(config: MonitorConfig, clock: SharedClock) -> Self {
        let storage = shared(StatsStorage::with_clock(clock.clone()));
        let sampler = Sampler::with_clock(config.sampler_config(), clock.clone());
        let accumulator = Accumulator::new(config.accumulator_config());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        tracing::info!(sfu_id = %config.sfu_id, "SFU monitor created");

        Self {
            config,
            clock,
            storage,
            sampler,
            accumulator,
            collectors: Vec::new(),
            sender: None,
            metrics: MonitorMetrics::default(),
            events,
            closed: false,
        }
    }

    /// Get the monitor configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Get the shared store
    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Get the pipeline metrics
    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    /// Subscribe to monitor events
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Whether `close()` was called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of attached collectors
    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Attach a collector and hand it the store
    ///
    /// A collector with the same id is closed and replaced.
    pub fn add_collector<C: Collector + 'static>(&mut self, collector: C) -> Result<()> {
        self.ensure_open()?;

        if let Some(mut previous) = self.remove_collector(collector.id()) {
            tracing::debug!(collector_id = %previous.id(), "Replacing collector");
            previous.close();
        }

        let mut collector: Box<dyn Collector> = Box::new(collector);
        collector.set_writer(Some(self.storage.clone()));
        tracing::debug!(collector_id = %collector.id(), "Collector added");
        self.collectors.push(collector);
        Ok(())
    }

    /// Detach a collector, taking its writer away
    pub fn remove_collector(&mut self, collector_id: &str) -> Option<Box<dyn Collector>> {
        let index = self
            .collectors
            .iter()
            .position(|collector| collector.id() == collector_id)?;

        let mut collector = self.collectors.remove(index);
        collector.set_writer(None);
        tracing::debug!(collector_id = %collector_id, "Collector removed");
        Some(collector)
    }

    /// Set the sender that receives drained batches
    pub fn set_sender<S: Sender + 'static>(&mut self, sender: S) {
        if let Some(mut previous) = self.sender.replace(Box::new(sender)) {
            previous.close();
        }
    }

    /// Queue an extension record for the next sample
    pub fn add_extension_stats(&mut self, stats: ExtensionStats) {
        self.sampler.add_extension_stats(stats);
    }

    /// Set or clear the marker stamped on every following sample
    pub fn set_marker(&mut self, marker: Option<String>) {
        self.sampler.set_marker(marker);
    }

    /// Run every open collector, then trim expired entries
    ///
    /// Closed collectors are dropped first. A collector failing with an I/O
    /// error is logged and skipped; contract violations are returned.
    pub async fn collect(&mut self) -> Result<()> {
        self.ensure_open()?;
        let started = Instant::now();

        self.collectors.retain(|collector| {
            if collector.is_closed() {
                tracing::debug!(collector_id = %collector.id(), "Dropping closed collector");
            }
            !collector.is_closed()
        });

        for collector in self.collectors.iter_mut() {
            if let Err(error) = collector.collect().await {
                if error.is_contract_violation() {
                    return Err(error);
                }
                tracing::warn!(
                    collector_id = %collector.id(),
                    error = %error,
                    "Collector failed"
                );
            }
        }

        let now = self.clock.now_ms();
        let trimmed = match self.config.stats_expiration_ms {
            0 => 0,
            expiration => {
                let expiration = i64::try_from(expiration).unwrap_or(i64::MAX);
                self.storage
                    .write()
                    .await
                    .trim(now.saturating_sub(expiration))
            }
        };

        let elapsed = started.elapsed();
        self.metrics.record_collect(elapsed, now, trimmed);
        self.emit(MonitorEvent::Collected { elapsed, trimmed });
        Ok(())
    }

    /// Make a sample and add it to the accumulator
    pub async fn sample(&mut self) -> Result<()> {
        self.ensure_open()?;
        let started = Instant::now();

        let sample = {
            let storage = self.storage.read().await;
            self.sampler.make(&*storage)?
        };
        let timestamp = sample.timestamp;
        self.accumulator.add_sample(sample)?;

        self.metrics.record_sample(started.elapsed(), timestamp);
        self.emit(MonitorEvent::Sampled { timestamp });
        Ok(())
    }

    /// Drain the accumulator into the sender
    ///
    /// A heartbeat from the accumulator goes out as an empty batch. Every
    /// drained batch is offered to the sender even if an earlier one failed;
    /// the first failure is returned. Without a sender this is a no-op and
    /// the accumulated samples wait for the next call.
    pub async fn send(&mut self) -> Result<()> {
        self.ensure_open()?;
        let started = Instant::now();

        // Samples stay accumulated until a sender is attached
        let Some(sender) = self.sender.as_mut() else {
            tracing::debug!("No sender attached, keeping samples");
            return Ok(());
        };

        let mut batches = Vec::new();
        self.accumulator
            .drain_to(|batch| batches.push(batch.unwrap_or_default()))?;

        if batches.is_empty() {
            return Ok(());
        }

        let mut sent = 0usize;
        let mut samples = 0usize;
        let mut failed = 0usize;
        let mut first_error = None;

        for batch in batches {
            let size = batch.len();
            match sender.send(batch).await {
                Ok(()) => {
                    sent += 1;
                    samples += size;
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!(samples = size, error = %error, "Failed to send batch");
                    let _ = self.events.send(MonitorEvent::SendFailed {
                        reason: error.to_string(),
                    });
                    first_error.get_or_insert(error);
                }
            }
        }

        self.metrics
            .record_send(started.elapsed(), self.clock.now_ms(), sent, failed);
        self.emit(MonitorEvent::Sent {
            batches: sent,
            samples,
        });

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Drive collect, sample, and send on their periods until `shutdown`
    ///
    /// Failures of a single step are logged and the loop keeps going; only a
    /// closed monitor ends it early.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.ensure_open()?;
        tokio::pin!(shutdown);

        let mut collecting = ticker(self.config.collecting_interval());
        let mut sampling = ticker(self.config.sampling_interval());
        let mut sending = ticker(self.config.sending_interval());

        tracing::info!(sfu_id = %self.config.sfu_id, "SFU monitor running");

        loop {
            let step = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(sfu_id = %self.config.sfu_id, "Shutdown signal received");
                    return Ok(());
                }
                _ = tick(&mut collecting) => self.collect().await,
                _ = tick(&mut sampling) => self.sample().await,
                _ = tick(&mut sending) => self.send().await,
            };

            match step {
                Ok(()) => {}
                Err(Error::MonitorClosed) => return Err(Error::MonitorClosed),
                Err(error) => {
                    tracing::warn!(error = %error, "Monitor step failed");
                }
            }
        }
    }

    /// Close collectors, sampler, accumulator, and sender
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for mut collector in self.collectors.drain(..) {
            collector.close();
        }
        self.sampler.close();
        self.accumulator.close();
        if let Some(mut sender) = self.sender.take() {
            sender.close();
        }

        self.emit(MonitorEvent::Closed);
        tracing::info!(sfu_id = %self.config.sfu_id, "SFU monitor closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::MonitorClosed);
        }
        Ok(())
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Drop for SfuMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SfuMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SfuMonitor")
            .field("sfu_id", &self.config.sfu_id)
            .field("collectors", &self.collectors.len())
            .field("pending_samples", &self.accumulator.sample_count())
            .field("closed", &self.closed)
            .finish()
    }
}

fn ticker(period: Option<std::time::Duration>) -> Option<Interval> {
    period.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
