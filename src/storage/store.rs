//! Stats storage implementation
//!
//! Flat tables keyed by id, one per entity kind, plus id-set indexes for the
//! transport -> child and stream -> pad/sink -> pad relationships. All
//! navigation goes through the storage handle; entries never point at each
//! other.

use std::collections::HashMap;

use crate::clock::{system_clock, SharedClock};
use crate::error::Result;
use crate::stats::{
    Appendix, ContentHash, EntityKind, InboundPadStats, OutboundPadStats, SctpChannelStats,
    StatsRecord, TransportStats,
};

use super::access::{Entries, StatsReader, StatsWriter};
use super::entry::{
    InboundPadEntry, MediaSinkEntry, MediaSinkKey, MediaStreamEntry, MediaStreamKey,
    OutboundPadEntry, SctpChannelEntry, StatsEntry, TransportEntry, TransportLinks,
};

/// The relations a base record takes part in
///
/// Only the binding of a stored record is compared on update, so an update
/// never copies the record it replaces.
trait Bound: StatsRecord {
    type Binding: PartialEq;

    fn binding(&self) -> Self::Binding;
}

impl Bound for TransportStats {
    type Binding = ();

    fn binding(&self) -> Self::Binding {}
}

#[derive(Debug, PartialEq)]
struct InboundBinding {
    transport_id: String,
    stream: Option<MediaStreamKey>,
}

impl Bound for InboundPadStats {
    type Binding = InboundBinding;

    fn binding(&self) -> Self::Binding {
        InboundBinding {
            transport_id: self.transport_id.clone(),
            stream: self
                .stream_id
                .as_deref()
                .map(|stream_id| MediaStreamKey::new(stream_id, self.media_type)),
        }
    }
}

#[derive(Debug, PartialEq)]
struct OutboundBinding {
    transport_id: String,
    sink: Option<MediaSinkKey>,
}

impl Bound for OutboundPadStats {
    type Binding = OutboundBinding;

    fn binding(&self) -> Self::Binding {
        OutboundBinding {
            transport_id: self.transport_id.clone(),
            sink: self.sink_id.as_deref().map(|sink_id| {
                MediaSinkKey::new(sink_id, self.stream_id.as_deref(), self.media_type)
            }),
        }
    }
}

impl Bound for SctpChannelStats {
    /// Owning transport id
    type Binding = String;

    fn binding(&self) -> Self::Binding {
        self.transport_id.clone()
    }
}

/// Outcome of an upsert into a base table
enum Upsert<B> {
    /// The id was new
    Created(B),
    /// The id existed with the same binding
    Kept,
    /// The id existed; its binding changed
    Moved { from: B, to: B },
}

/// Insert or update `stats` in `table`
fn upsert<S: Bound>(
    table: &mut HashMap<String, StatsEntry<S>>,
    stats: S,
    appendix: Option<Appendix>,
    now: i64,
) -> Result<Upsert<S::Binding>> {
    stats.validate()?;
    let hash = ContentHash::of(&stats)?;
    let binding = stats.binding();

    if let Some(entry) = table.get_mut(stats.id()) {
        let previous = entry.stats.binding();
        let changed = entry.apply(stats, appendix, hash, now);
        tracing::trace!(kind = %S::KIND, id = %entry.id, changed, "Entry updated");
        if previous == binding {
            return Ok(Upsert::Kept);
        }
        return Ok(Upsert::Moved {
            from: previous,
            to: binding,
        });
    }

    let entry = StatsEntry::new(stats, appendix, hash, now);
    tracing::trace!(kind = %S::KIND, id = %entry.id, "Entry created");
    table.insert(entry.id.clone(), entry);
    Ok(Upsert::Created(binding))
}

/// In-memory relational snapshot of an SFU's stats
///
/// Not synchronized. Share it behind a single lock (see
/// [`SharedStorage`](super::SharedStorage)) or confine it to one task.
pub struct StatsStorage {
    transports: HashMap<String, TransportEntry>,
    inbound_pads: HashMap<String, InboundPadEntry>,
    outbound_pads: HashMap<String, OutboundPadEntry>,
    sctp_channels: HashMap<String, SctpChannelEntry>,
    media_streams: HashMap<MediaStreamKey, MediaStreamEntry>,
    media_sinks: HashMap<MediaSinkKey, MediaSinkEntry>,
    transport_links: HashMap<String, TransportLinks>,
    clock: SharedClock,
}

impl StatsStorage {
    /// Create an empty storage using the system clock
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty storage reading time from `clock`
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            transports: HashMap::new(),
            inbound_pads: HashMap::new(),
            outbound_pads: HashMap::new(),
            sctp_channels: HashMap::new(),
            media_streams: HashMap::new(),
            media_sinks: HashMap::new(),
            transport_links: HashMap::new(),
            clock,
        }
    }

    /// Clock used for entry timestamps
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn transport(&self, transport_id: &str) -> Option<&TransportEntry> {
        self.transports.get(transport_id)
    }

    pub fn inbound_pad(&self, pad_id: &str) -> Option<&InboundPadEntry> {
        self.inbound_pads.get(pad_id)
    }

    pub fn outbound_pad(&self, pad_id: &str) -> Option<&OutboundPadEntry> {
        self.outbound_pads.get(pad_id)
    }

    pub fn sctp_channel(&self, channel_id: &str) -> Option<&SctpChannelEntry> {
        self.sctp_channels.get(channel_id)
    }

    pub fn media_stream(&self, key: &MediaStreamKey) -> Option<&MediaStreamEntry> {
        self.media_streams.get(key)
    }

    pub fn media_sink(&self, key: &MediaSinkKey) -> Option<&MediaSinkEntry> {
        self.media_sinks.get(key)
    }

    /// Streams reported under `stream_id`, one per media kind
    pub fn media_streams_by_id<'a>(
        &'a self,
        stream_id: &str,
    ) -> Entries<'a, MediaStreamEntry, MediaStreamKey> {
        Entries::from_ids(
            &self.media_streams,
            self.media_streams
                .keys()
                .filter(|key| key.stream_id == stream_id),
        )
    }

    /// Sinks reported under `sink_id`, one per forwarded stream
    pub fn media_sinks_by_id<'a>(
        &'a self,
        sink_id: &str,
    ) -> Entries<'a, MediaSinkEntry, MediaSinkKey> {
        Entries::from_ids(
            &self.media_sinks,
            self.media_sinks.keys().filter(|key| key.sink_id == sink_id),
        )
    }

    /// Inbound pads registered under a transport
    pub fn transport_inbound_pads(&self, transport_id: &str) -> Entries<'_, InboundPadEntry> {
        match self.transport_links.get(transport_id) {
            Some(links) => Entries::from_ids(&self.inbound_pads, &links.inbound_pad_ids),
            None => Entries::empty(&self.inbound_pads),
        }
    }

    /// Outbound pads registered under a transport
    pub fn transport_outbound_pads(&self, transport_id: &str) -> Entries<'_, OutboundPadEntry> {
        match self.transport_links.get(transport_id) {
            Some(links) => Entries::from_ids(&self.outbound_pads, &links.outbound_pad_ids),
            None => Entries::empty(&self.outbound_pads),
        }
    }

    /// SCTP channels registered under a transport
    pub fn transport_sctp_channels(&self, transport_id: &str) -> Entries<'_, SctpChannelEntry> {
        match self.transport_links.get(transport_id) {
            Some(links) => Entries::from_ids(&self.sctp_channels, &links.sctp_channel_ids),
            None => Entries::empty(&self.sctp_channels),
        }
    }

    /// Inbound pads feeding a media stream
    pub fn media_stream_inbound_pads(&self, key: &MediaStreamKey) -> Entries<'_, InboundPadEntry> {
        match self.media_streams.get(key) {
            Some(stream) => Entries::from_ids(&self.inbound_pads, stream.inbound_pad_ids()),
            None => Entries::empty(&self.inbound_pads),
        }
    }

    /// Sinks forwarding a media stream
    pub fn media_stream_sinks(
        &self,
        key: &MediaStreamKey,
    ) -> Entries<'_, MediaSinkEntry, MediaSinkKey> {
        match self.media_streams.get(key) {
            Some(stream) => Entries::from_ids(&self.media_sinks, stream.sink_keys()),
            None => Entries::empty(&self.media_sinks),
        }
    }

    /// Outbound pads of a media sink
    pub fn media_sink_outbound_pads(&self, key: &MediaSinkKey) -> Entries<'_, OutboundPadEntry> {
        match self.media_sinks.get(key) {
            Some(sink) => Entries::from_ids(&self.outbound_pads, sink.outbound_pad_ids()),
            None => Entries::empty(&self.outbound_pads),
        }
    }

    /// Remove every base entry with `touched <= threshold_ms`
    ///
    /// The threshold is an absolute epoch-ms timestamp, not a TTL. Derived
    /// streams and sinks disappear with their last pad. Returns the number
    /// of base entries removed.
    pub fn trim(&mut self, threshold_ms: i64) -> usize {
        fn expired<S>(table: &HashMap<String, StatsEntry<S>>, threshold_ms: i64) -> Vec<String> {
            table
                .values()
                .filter(|entry| entry.touched <= threshold_ms)
                .map(|entry| entry.id.clone())
                .collect()
        }

        let transports = expired(&self.transports, threshold_ms);
        let inbound_pads = expired(&self.inbound_pads, threshold_ms);
        let outbound_pads = expired(&self.outbound_pads, threshold_ms);
        let sctp_channels = expired(&self.sctp_channels, threshold_ms);

        let removed =
            transports.len() + inbound_pads.len() + outbound_pads.len() + sctp_channels.len();

        for id in &inbound_pads {
            self.remove_inbound_pad(id);
        }
        for id in &outbound_pads {
            self.remove_outbound_pad(id);
        }
        for id in &sctp_channels {
            self.remove_sctp_channel(id);
        }
        for id in &transports {
            self.remove_transport(id);
        }

        if removed > 0 {
            tracing::debug!(
                threshold_ms = threshold_ms,
                transports = transports.len(),
                inbound_pads = inbound_pads.len(),
                outbound_pads = outbound_pads.len(),
                sctp_channels = sctp_channels.len(),
                "Expired entries trimmed"
            );
        }

        removed
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.transports.clear();
        self.inbound_pads.clear();
        self.outbound_pads.clear();
        self.sctp_channels.clear();
        self.media_streams.clear();
        self.media_sinks.clear();
        self.transport_links.clear();
    }

    fn links_mut(&mut self, transport_id: &str) -> &mut TransportLinks {
        self.transport_links
            .entry(transport_id.to_string())
            .or_default()
    }

    /// Drop the link record of a transport once nothing refers to it
    fn release_links(&mut self, transport_id: &str) {
        let unused = self
            .transport_links
            .get(transport_id)
            .is_some_and(|links| links.is_empty())
            && !self.transports.contains_key(transport_id);

        if unused {
            self.transport_links.remove(transport_id);
        }
    }

    fn stream_mut(&mut self, key: &MediaStreamKey) -> &mut MediaStreamEntry {
        let now = self.clock.now_ms();
        self.media_streams.entry(key.clone()).or_insert_with(|| {
            tracing::trace!(stream = %key, "Media stream created");
            MediaStreamEntry::new(key.clone(), now)
        })
    }

    /// Drop a stream once no pad and no sink refers to it
    fn release_stream(&mut self, key: &MediaStreamKey) {
        let unreferenced = self
            .media_streams
            .get(key)
            .is_some_and(MediaStreamEntry::is_unreferenced);

        if unreferenced {
            self.media_streams.remove(key);
            tracing::trace!(stream = %key, "Media stream removed");
        }
    }

    fn bind_sink_pad(&mut self, key: &MediaSinkKey, pad_id: &str) {
        if !self.media_sinks.contains_key(key) {
            let now = self.clock.now_ms();
            self.media_sinks
                .insert(key.clone(), MediaSinkEntry::new(key.clone(), now));
            if let Some(stream_key) = key.stream_key() {
                self.stream_mut(&stream_key).sink_keys.insert(key.clone());
            }
            tracing::trace!(sink = %key, "Media sink created");
        }

        if let Some(sink) = self.media_sinks.get_mut(key) {
            sink.outbound_pad_ids.insert(pad_id.to_string());
        }
    }

    fn unbind_sink_pad(&mut self, key: &MediaSinkKey, pad_id: &str) {
        let Some(sink) = self.media_sinks.get_mut(key) else {
            return;
        };
        sink.outbound_pad_ids.remove(pad_id);
        if !sink.outbound_pad_ids.is_empty() {
            return;
        }

        self.media_sinks.remove(key);
        tracing::trace!(sink = %key, "Media sink removed");
        if let Some(stream_key) = key.stream_key() {
            if let Some(stream) = self.media_streams.get_mut(&stream_key) {
                stream.sink_keys.remove(key);
            }
            self.release_stream(&stream_key);
        }
    }

    fn bind_inbound_pad(&mut self, pad_id: &str, binding: &InboundBinding) {
        self.links_mut(&binding.transport_id)
            .inbound_pad_ids
            .insert(pad_id.to_string());
        if let Some(key) = &binding.stream {
            self.stream_mut(key).inbound_pad_ids.insert(pad_id.to_string());
        }
    }

    fn unbind_inbound_pad(&mut self, pad_id: &str, binding: &InboundBinding) {
        if let Some(links) = self.transport_links.get_mut(&binding.transport_id) {
            links.inbound_pad_ids.remove(pad_id);
        }
        self.release_links(&binding.transport_id);
        if let Some(key) = &binding.stream {
            if let Some(stream) = self.media_streams.get_mut(key) {
                stream.inbound_pad_ids.remove(pad_id);
            }
            self.release_stream(key);
        }
    }

    fn bind_outbound_pad(&mut self, pad_id: &str, binding: &OutboundBinding) {
        self.links_mut(&binding.transport_id)
            .outbound_pad_ids
            .insert(pad_id.to_string());
        if let Some(key) = &binding.sink {
            self.bind_sink_pad(key, pad_id);
        }
    }

    fn unbind_outbound_pad(&mut self, pad_id: &str, binding: &OutboundBinding) {
        if let Some(links) = self.transport_links.get_mut(&binding.transport_id) {
            links.outbound_pad_ids.remove(pad_id);
        }
        self.release_links(&binding.transport_id);
        if let Some(key) = &binding.sink {
            self.unbind_sink_pad(key, pad_id);
        }
    }

    fn bind_sctp_channel(&mut self, channel_id: &str, transport_id: &str) {
        self.links_mut(transport_id)
            .sctp_channel_ids
            .insert(channel_id.to_string());
    }

    fn unbind_sctp_channel(&mut self, channel_id: &str, transport_id: &str) {
        if let Some(links) = self.transport_links.get_mut(transport_id) {
            links.sctp_channel_ids.remove(channel_id);
        }
        self.release_links(transport_id);
    }
}

impl Default for StatsStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsStorage")
            .field("transports", &self.transports.len())
            .field("inbound_pads", &self.inbound_pads.len())
            .field("outbound_pads", &self.outbound_pads.len())
            .field("sctp_channels", &self.sctp_channels.len())
            .field("media_streams", &self.media_streams.len())
            .field("media_sinks", &self.media_sinks.len())
            .finish()
    }
}

impl StatsWriter for StatsStorage {
    fn update_transport(
        &mut self,
        stats: TransportStats,
        appendix: Option<Appendix>,
    ) -> Result<()> {
        let now = self.clock.now_ms();
        upsert(&mut self.transports, stats, appendix, now)?;
        Ok(())
    }

    fn remove_transport(&mut self, transport_id: &str) {
        if self.transports.remove(transport_id).is_some() {
            tracing::trace!(kind = %EntityKind::Transport, id = %transport_id, "Entry removed");
            self.release_links(transport_id);
        }
    }

    fn update_inbound_pad(
        &mut self,
        stats: InboundPadStats,
        appendix: Option<Appendix>,
    ) -> Result<()> {
        let now = self.clock.now_ms();
        let pad_id = stats.pad_id.clone();
        match upsert(&mut self.inbound_pads, stats, appendix, now)? {
            Upsert::Created(binding) => self.bind_inbound_pad(&pad_id, &binding),
            Upsert::Kept => {}
            Upsert::Moved { from, to } => {
                self.unbind_inbound_pad(&pad_id, &from);
                self.bind_inbound_pad(&pad_id, &to);
            }
        }
        Ok(())
    }

    fn remove_inbound_pad(&mut self, pad_id: &str) {
        if let Some(entry) = self.inbound_pads.remove(pad_id) {
            tracing::trace!(kind = %EntityKind::InboundPad, id = %pad_id, "Entry removed");
            self.unbind_inbound_pad(pad_id, &entry.stats.binding());
        }
    }

    fn update_outbound_pad(
        &mut self,
        stats: OutboundPadStats,
        appendix: Option<Appendix>,
    ) -> Result<()> {
        let now = self.clock.now_ms();
        let pad_id = stats.pad_id.clone();
        match upsert(&mut self.outbound_pads, stats, appendix, now)? {
            Upsert::Created(binding) => self.bind_outbound_pad(&pad_id, &binding),
            Upsert::Kept => {}
            Upsert::Moved { from, to } => {
                self.unbind_outbound_pad(&pad_id, &from);
                self.bind_outbound_pad(&pad_id, &to);
            }
        }
        Ok(())
    }

    fn remove_outbound_pad(&mut self, pad_id: &str) {
        if let Some(entry) = self.outbound_pads.remove(pad_id) {
            tracing::trace!(kind = %EntityKind::OutboundPad, id = %pad_id, "Entry removed");
            self.unbind_outbound_pad(pad_id, &entry.stats.binding());
        }
    }

    fn update_sctp_channel(
        &mut self,
        stats: SctpChannelStats,
        appendix: Option<Appendix>,
    ) -> Result<()> {
        let now = self.clock.now_ms();
        let channel_id = stats.channel_id.clone();
        match upsert(&mut self.sctp_channels, stats, appendix, now)? {
            Upsert::Created(transport_id) => self.bind_sctp_channel(&channel_id, &transport_id),
            Upsert::Kept => {}
            Upsert::Moved { from, to } => {
                self.unbind_sctp_channel(&channel_id, &from);
                self.bind_sctp_channel(&channel_id, &to);
            }
        }
        Ok(())
    }

    fn remove_sctp_channel(&mut self, channel_id: &str) {
        if let Some(entry) = self.sctp_channels.remove(channel_id) {
            tracing::trace!(kind = %EntityKind::SctpChannel, id = %channel_id, "Entry removed");
            self.unbind_sctp_channel(channel_id, &entry.stats.transport_id);
        }
    }
}

impl StatsReader for StatsStorage {
    fn transports(&self) -> Entries<'_, TransportEntry> {
        Entries::all(&self.transports)
    }

    fn inbound_pads(&self) -> Entries<'_, InboundPadEntry> {
        Entries::all(&self.inbound_pads)
    }

    fn outbound_pads(&self) -> Entries<'_, OutboundPadEntry> {
        Entries::all(&self.outbound_pads)
    }

    fn sctp_channels(&self) -> Entries<'_, SctpChannelEntry> {
        Entries::all(&self.sctp_channels)
    }

    fn media_streams(&self) -> Entries<'_, MediaStreamEntry, MediaStreamKey> {
        Entries::all(&self.media_streams)
    }

    fn media_sinks(&self) -> Entries<'_, MediaSinkEntry, MediaSinkKey> {
        Entries::all(&self.media_sinks)
    }

    fn count_transports(&self) -> usize {
        self.transports.len()
    }

    fn count_inbound_pads(&self) -> usize {
        self.inbound_pads.len()
    }

    fn count_outbound_pads(&self) -> usize {
        self.outbound_pads.len()
    }

    fn count_sctp_channels(&self) -> usize {
        self.sctp_channels.len()
    }

    fn count_media_streams(&self) -> usize {
        self.media_streams.len()
    }

    fn count_media_sinks(&self) -> usize {
        self.media_sinks.len()
    }
}
