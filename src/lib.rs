//! In-process telemetry agent for SFU media servers
//!
//! Collectors write per-entity WebRTC stats (transports, RTP pads, SCTP
//! channels) into a relational in-memory store. The sampler distills the
//! store into timestamped samples, the accumulator batches them, and a
//! sender ships the batches to an observability backend.
//!
//! ```text
//!   Collector ──► StatsWriter ──► StatsStorage ──► Sampler::make ──► Sample
//!                                                                      │
//!                                   Sender::send ◄── drain_to ◄── Accumulator
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use sfu_monitor::{ChannelSender, MonitorConfig, SfuMonitor};
//!
//! # async fn run() -> sfu_monitor::Result<()> {
//! let config = MonitorConfig::new("sfu-eu-1")
//!     .sampling_period(Duration::from_secs(10))
//!     .sending_period(Duration::from_secs(30));
//!
//! let mut monitor = SfuMonitor::new(config);
//! let (sender, mut batches) = ChannelSender::channel(16);
//! monitor.set_sender(sender);
//!
//! tokio::spawn(async move {
//!     while let Some(payload) = batches.recv().await {
//!         // Forward `payload` to the backend
//!         let _ = payload;
//!     }
//! });
//!
//! monitor.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod clock;
pub mod collector;
pub mod error;
pub mod fetch;
pub mod monitor;
pub mod sampler;
pub mod sender;
pub mod stats;
pub mod storage;

pub use accumulator::{Accumulator, AccumulatorConfig};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use collector::{Collector, SourceCollector, StatsSource, StatsUpdate};
pub use error::{Error, Result};
pub use fetch::{BatchedFetch, FetchConfig, FetchError};
pub use monitor::{MonitorConfig, MonitorEvent, MonitorMetrics, SfuMonitor};
pub use sampler::{encode_batch, ExtensionStats, Sample, Sampler, SamplerConfig};
pub use sender::{ChannelSender, Sender};
pub use stats::{
    Appendix, ContentHash, EntityKind, InboundPadStats, MediaKind, OutboundPadStats,
    SctpChannelStats, TransportStats,
};
pub use storage::{
    MediaSinkKey, MediaStreamKey, SharedStorage, StatsReader, StatsStorage, StatsWriter,
};
