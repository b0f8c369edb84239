//! Polling collector over many stats sources
//!
//! Each registered [`StatsSource`] is polled once per cycle through the
//! batched fetch primitive. Sources are expected to fail routinely (a pad
//! closing mid-poll, a transport already gone), so a failing source is logged
//! and skipped while the rest of the sweep continues.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;

use crate::error::{Error, Result};
use crate::fetch::{BatchedFetch, FetchConfig};
use crate::stats::{Appendix, InboundPadStats, OutboundPadStats, SctpChannelStats, TransportStats};
use crate::storage::{SharedStorage, StatsWriter};

use super::{BoxFuture, Collector};

/// One store mutation produced by a source
#[derive(Debug, Clone, PartialEq)]
pub enum StatsUpdate {
    Transport(TransportStats, Option<Appendix>),
    InboundPad(InboundPadStats, Option<Appendix>),
    OutboundPad(OutboundPadStats, Option<Appendix>),
    SctpChannel(SctpChannelStats, Option<Appendix>),
    RemoveTransport(String),
    RemoveInboundPad(String),
    RemoveOutboundPad(String),
    RemoveSctpChannel(String),
}

impl StatsUpdate {
    /// Apply this update to `writer`
    pub fn apply<W: StatsWriter + ?Sized>(self, writer: &mut W) -> Result<()> {
        match self {
            StatsUpdate::Transport(stats, appendix) => writer.update_transport(stats, appendix),
            StatsUpdate::InboundPad(stats, appendix) => writer.update_inbound_pad(stats, appendix),
            StatsUpdate::OutboundPad(stats, appendix) => {
                writer.update_outbound_pad(stats, appendix)
            }
            StatsUpdate::SctpChannel(stats, appendix) => {
                writer.update_sctp_channel(stats, appendix)
            }
            StatsUpdate::RemoveTransport(id) => {
                writer.remove_transport(&id);
                Ok(())
            }
            StatsUpdate::RemoveInboundPad(id) => {
                writer.remove_inbound_pad(&id);
                Ok(())
            }
            StatsUpdate::RemoveOutboundPad(id) => {
                writer.remove_outbound_pad(&id);
                Ok(())
            }
            StatsUpdate::RemoveSctpChannel(id) => {
                writer.remove_sctp_channel(&id);
                Ok(())
            }
        }
    }
}

impl From<TransportStats> for StatsUpdate {
    fn from(stats: TransportStats) -> Self {
        StatsUpdate::Transport(stats, None)
    }
}

impl From<InboundPadStats> for StatsUpdate {
    fn from(stats: InboundPadStats) -> Self {
        StatsUpdate::InboundPad(stats, None)
    }
}

impl From<OutboundPadStats> for StatsUpdate {
    fn from(stats: OutboundPadStats) -> Self {
        StatsUpdate::OutboundPad(stats, None)
    }
}

impl From<SctpChannelStats> for StatsUpdate {
    fn from(stats: SctpChannelStats) -> Self {
        StatsUpdate::SctpChannel(stats, None)
    }
}

/// A live object that can be asked for its current stats
pub trait StatsSource: Send + Sync {
    /// Source identifier, used in logs
    fn id(&self) -> &str;

    /// Fetch the source's current stats
    fn poll(&self) -> BoxFuture<'_, Result<Vec<StatsUpdate>>>;
}

/// Collector polling a set of [`StatsSource`]s
pub struct SourceCollector {
    id: String,
    fetch_config: FetchConfig,
    sources: Vec<Arc<dyn StatsSource>>,
    writer: Option<SharedStorage>,
    failures: Arc<AtomicU64>,
    closed: bool,
}

impl SourceCollector {
    /// Create an empty collector
    pub fn new(id: impl Into<String>, fetch_config: FetchConfig) -> Self {
        Self {
            id: id.into(),
            fetch_config,
            sources: Vec::new(),
            writer: None,
            failures: Arc::new(AtomicU64::new(0)),
            closed: false,
        }
    }

    /// Register a source
    pub fn add_source(&mut self, source: Arc<dyn StatsSource>) {
        tracing::trace!(collector_id = %self.id, source_id = %source.id(), "Source added");
        self.sources.push(source);
    }

    /// Unregister every source with `source_id`
    ///
    /// Returns true if anything was removed.
    pub fn remove_source(&mut self, source_id: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.id() != source_id);
        before != self.sources.len()
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Total number of failed polls since creation
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    async fn sweep(&self, writer: SharedStorage) -> Result<()> {
        let collector_id = self.id.clone();
        let source_ids: Vec<String> = self.sources.iter().map(|s| s.id().to_string()).collect();
        let failures = Arc::clone(&self.failures);

        let fetch = BatchedFetch::new(self.fetch_config.clone()).isolate(
            move |error: Error, index| {
                failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    collector_id = %collector_id,
                    source_id = source_ids.get(index).map_or("?", String::as_str),
                    error = %error,
                    "Stats source poll failed"
                );
            },
        );

        let windows = fetch.fetch(self.sources.iter().map(|source| source.poll()));
        futures::pin_mut!(windows);

        let mut applied = 0usize;
        while let Some(window) = windows.next().await {
            let window = window.map_err(|e| e.error)?;

            let mut storage = writer.write().await;
            for update in window.into_iter().flatten() {
                update.apply(&mut *storage)?;
                applied += 1;
            }
        }

        tracing::debug!(
            collector_id = %self.id,
            sources = self.sources.len(),
            updates = applied,
            "Collection sweep finished"
        );
        Ok(())
    }
}

impl Collector for SourceCollector {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn set_writer(&mut self, writer: Option<SharedStorage>) {
        self.writer = writer;
    }

    fn collect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.closed {
                return Err(Error::Collector {
                    id: self.id.clone(),
                    reason: "collector is closed".into(),
                });
            }

            let Some(writer) = self.writer.clone() else {
                tracing::debug!(collector_id = %self.id, "No writer attached, skipping sweep");
                return Ok(());
            };

            self.sweep(writer).await
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.writer = None;
            self.sources.clear();
            tracing::debug!(collector_id = %self.id, "Collector closed");
        }
    }
}

impl std::fmt::Debug for SourceCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCollector")
            .field("id", &self.id)
            .field("sources", &self.sources.len())
            .field("closed", &self.closed)
            .finish()
    }
}
