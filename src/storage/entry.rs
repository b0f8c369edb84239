//! Stored entity types
//!
//! Base entries wrap a stats record together with its bookkeeping
//! timestamps. Derived entries (media streams and sinks) hold only id-sets;
//! they exist while at least one pad refers to them.

use std::collections::HashSet;

use crate::stats::{
    Appendix, ContentHash, InboundPadStats, MediaKind, OutboundPadStats, SctpChannelStats,
    StatsRecord, TransportStats,
};

/// A base entity: the latest stats for one id plus bookkeeping
#[derive(Debug, Clone)]
pub struct StatsEntry<S> {
    /// Identifier, unique within the kind
    pub id: String,

    /// Latest reported stats
    pub stats: S,

    /// When the entry was first written (epoch ms)
    pub created: i64,

    /// When the content last changed (epoch ms)
    pub updated: i64,

    /// When the entry was last written, changed or not (epoch ms)
    pub touched: i64,

    /// Digest of `stats`
    pub content_hash: ContentHash,

    /// Internal to the SFU (e.g. pipe transports between routers)
    pub internal: bool,

    /// Caller-attached metadata
    pub appendix: Option<Appendix>,
}

impl<S: StatsRecord> StatsEntry<S> {
    pub(super) fn new(stats: S, appendix: Option<Appendix>, hash: ContentHash, now: i64) -> Self {
        Self {
            id: stats.id().to_string(),
            internal: stats.internal(),
            stats,
            created: now,
            updated: now,
            touched: now,
            content_hash: hash,
            appendix,
        }
    }

    /// Replace the stats; returns true if the content changed
    ///
    /// `touched` always advances, `updated` only on a content change. An
    /// absent appendix keeps the previous one.
    pub(super) fn apply(
        &mut self,
        stats: S,
        appendix: Option<Appendix>,
        hash: ContentHash,
        now: i64,
    ) -> bool {
        let changed = self.content_hash != hash;

        self.touched = now;
        if changed {
            self.updated = now;
            self.content_hash = hash;
        }
        self.internal = stats.internal();
        self.stats = stats;
        if appendix.is_some() {
            self.appendix = appendix;
        }

        changed
    }
}

/// Transport entry
pub type TransportEntry = StatsEntry<TransportStats>;

/// Inbound RTP pad entry
pub type InboundPadEntry = StatsEntry<InboundPadStats>;

/// Outbound RTP pad entry
pub type OutboundPadEntry = StatsEntry<OutboundPadStats>;

/// SCTP channel entry
pub type SctpChannelEntry = StatsEntry<SctpChannelStats>;

/// Children registered under one transport id
///
/// Kept apart from [`TransportEntry`] so pads reported before their
/// transport are still navigable once it shows up.
#[derive(Debug, Default)]
pub(super) struct TransportLinks {
    pub inbound_pad_ids: HashSet<String>,
    pub outbound_pad_ids: HashSet<String>,
    pub sctp_channel_ids: HashSet<String>,
}

impl TransportLinks {
    pub fn is_empty(&self) -> bool {
        self.inbound_pad_ids.is_empty()
            && self.outbound_pad_ids.is_empty()
            && self.sctp_channel_ids.is_empty()
    }
}

/// Identity of a media stream: the reported `streamId` plus the media kind
///
/// Audio and video pads sharing one `streamId` form two streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaStreamKey {
    pub stream_id: String,
    pub kind: Option<MediaKind>,
}

impl MediaStreamKey {
    pub fn new(stream_id: impl Into<String>, kind: Option<MediaKind>) -> Self {
        Self {
            stream_id: stream_id.into(),
            kind,
        }
    }
}

impl std::fmt::Display for MediaStreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "{}/{}", self.stream_id, kind.as_str()),
            None => f.write_str(&self.stream_id),
        }
    }
}

/// Identity of a media sink: the reported `sinkId` plus the stream it forwards
///
/// One `sinkId` reported against two streams forms two sinks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaSinkKey {
    pub sink_id: String,
    pub stream_id: Option<String>,
    pub kind: Option<MediaKind>,
}

impl MediaSinkKey {
    pub fn new(
        sink_id: impl Into<String>,
        stream_id: Option<&str>,
        kind: Option<MediaKind>,
    ) -> Self {
        Self {
            sink_id: sink_id.into(),
            stream_id: stream_id.map(str::to_string),
            kind,
        }
    }

    /// Key of the stream this sink forwards, if a stream was reported
    pub fn stream_key(&self) -> Option<MediaStreamKey> {
        self.stream_id
            .as_deref()
            .map(|stream_id| MediaStreamKey::new(stream_id, self.kind))
    }
}

impl std::fmt::Display for MediaSinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stream_key() {
            Some(stream) => write!(f, "{}@{}", self.sink_id, stream),
            None => f.write_str(&self.sink_id),
        }
    }
}

/// Media stream derived from inbound pads sharing a [`MediaStreamKey`]
#[derive(Debug, Clone)]
pub struct MediaStreamEntry {
    pub key: MediaStreamKey,

    /// When the stream was first referenced (epoch ms)
    pub created: i64,

    pub(super) inbound_pad_ids: HashSet<String>,
    pub(super) sink_keys: HashSet<MediaSinkKey>,
}

impl MediaStreamEntry {
    pub(super) fn new(key: MediaStreamKey, now: i64) -> Self {
        Self {
            key,
            created: now,
            inbound_pad_ids: HashSet::new(),
            sink_keys: HashSet::new(),
        }
    }

    /// Reported stream id
    pub fn id(&self) -> &str {
        &self.key.stream_id
    }

    pub fn kind(&self) -> Option<MediaKind> {
        self.key.kind
    }

    /// Ids of the inbound pads feeding this stream
    pub fn inbound_pad_ids(&self) -> impl Iterator<Item = &String> + '_ {
        self.inbound_pad_ids.iter()
    }

    /// Keys of the sinks forwarding this stream
    pub fn sink_keys(&self) -> impl Iterator<Item = &MediaSinkKey> + '_ {
        self.sink_keys.iter()
    }

    pub(super) fn is_unreferenced(&self) -> bool {
        self.inbound_pad_ids.is_empty() && self.sink_keys.is_empty()
    }
}

/// Media sink derived from outbound pads sharing a [`MediaSinkKey`]
#[derive(Debug, Clone)]
pub struct MediaSinkEntry {
    pub key: MediaSinkKey,

    /// When the sink was first referenced (epoch ms)
    pub created: i64,

    pub(super) outbound_pad_ids: HashSet<String>,
}

impl MediaSinkEntry {
    pub(super) fn new(key: MediaSinkKey, now: i64) -> Self {
        Self {
            key,
            created: now,
            outbound_pad_ids: HashSet::new(),
        }
    }

    /// Reported sink id
    pub fn id(&self) -> &str {
        &self.key.sink_id
    }

    /// Stream the sink forwards, if the pads reported one
    pub fn stream_id(&self) -> Option<&str> {
        self.key.stream_id.as_deref()
    }

    pub fn kind(&self) -> Option<MediaKind> {
        self.key.kind
    }

    /// Ids of the outbound pads of this sink
    pub fn outbound_pad_ids(&self) -> impl Iterator<Item = &String> + '_ {
        self.outbound_pad_ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of<S: StatsRecord>(stats: &S) -> ContentHash {
        ContentHash::of(stats).unwrap()
    }

    #[test]
    fn test_new_entry_timestamps() {
        let stats = TransportStats::new("t1");
        let hash = hash_of(&stats);
        let entry = TransportEntry::new(stats, None, hash, 100);

        assert_eq!(entry.id, "t1");
        assert_eq!(entry.created, 100);
        assert_eq!(entry.updated, 100);
        assert_eq!(entry.touched, 100);
        assert!(!entry.internal);
    }

    #[test]
    fn test_apply_same_content_only_touches() {
        let stats = TransportStats::new("t1");
        let hash = hash_of(&stats);
        let mut entry = TransportEntry::new(stats.clone(), None, hash, 100);

        assert!(!entry.apply(stats, None, hash, 200));
        assert_eq!(entry.updated, 100);
        assert_eq!(entry.touched, 200);
    }

    #[test]
    fn test_apply_changed_content_updates() {
        let stats = TransportStats::new("t1");
        let mut entry = TransportEntry::new(stats.clone(), None, hash_of(&stats), 100);

        let mut changed = stats;
        changed.ice_state = Some("connected".into());
        let hash = hash_of(&changed);

        assert!(entry.apply(changed, None, hash, 300));
        assert_eq!(entry.updated, 300);
        assert_eq!(entry.touched, 300);
        assert_eq!(entry.content_hash, hash);
    }

    #[test]
    fn test_apply_keeps_appendix_when_absent() {
        let stats = TransportStats::new("t1");
        let hash = hash_of(&stats);
        let mut appendix = Appendix::new();
        appendix.insert("routerId".into(), "r1".into());

        let mut entry = TransportEntry::new(stats.clone(), Some(appendix.clone()), hash, 1);
        entry.apply(stats, None, hash, 2);

        assert_eq!(entry.appendix, Some(appendix));
    }

    #[test]
    fn test_sink_key_names_its_stream() {
        let key = MediaSinkKey::new("k1", Some("s1"), Some(MediaKind::Video));
        assert_eq!(
            key.stream_key(),
            Some(MediaStreamKey::new("s1", Some(MediaKind::Video)))
        );
        assert_eq!(key.to_string(), "k1@s1/video");

        let detached = MediaSinkKey::new("k2", None, Some(MediaKind::Audio));
        assert_eq!(detached.stream_key(), None);
        assert_eq!(detached.to_string(), "k2");
    }
}
