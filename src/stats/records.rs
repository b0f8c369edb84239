//! Stats records reported by collectors
//!
//! Each record has one or two mandatory identifying fields and an open set
//! of optional telemetry fields. Fields the schema does not name land in
//! `extra`, so adapters can forward server-specific counters unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Open-ended record fields (also used for caller-attached appendices)
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Caller-attached side metadata, passed through unmodified
pub type Appendix = FieldMap;

/// Kind of entity held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Transport,
    InboundPad,
    OutboundPad,
    SctpChannel,
    MediaStream,
    MediaSink,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Transport => "transport",
            EntityKind::InboundPad => "inbound pad",
            EntityKind::OutboundPad => "outbound pad",
            EntityKind::SctpChannel => "sctp channel",
            EntityKind::MediaStream => "media stream",
            EntityKind::MediaSink => "media sink",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media kind of an RTP pad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Common behaviour of the four base stats records
pub trait StatsRecord: Clone + Serialize {
    /// Entity kind this record describes
    const KIND: EntityKind;

    /// Wire name of the identifying field
    const ID_FIELD: &'static str;

    /// Identifier, unique within the kind
    fn id(&self) -> &str;

    /// Whether the entity is internal to the SFU (e.g. a pipe transport)
    fn internal(&self) -> bool;

    /// Check the mandatory identifying fields
    fn validate(&self) -> Result<()> {
        require(Self::KIND, Self::ID_FIELD, self.id())
    }
}

fn require(kind: EntityKind, field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::MissingId { kind, field });
    }
    Ok(())
}

/// Transport (ICE/DTLS/SCTP association) stats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStats {
    pub transport_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtls_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_bytes_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_bytes_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_packets_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_packets_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_packets_lost: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_bytes_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_bytes_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_messages_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_messages_sent: Option<u64>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl TransportStats {
    /// Create stats carrying only the transport id
    pub fn new(transport_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            ..Default::default()
        }
    }
}

impl StatsRecord for TransportStats {
    const KIND: EntityKind = EntityKind::Transport;
    const ID_FIELD: &'static str = "transportId";

    fn id(&self) -> &str {
        &self.transport_id
    }

    fn internal(&self) -> bool {
        self.internal.unwrap_or(false)
    }
}

/// Inbound RTP pad stats (media received by the SFU)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundPadStats {
    pub transport_id: String,
    pub pad_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_lost: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_lost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_trip_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nack_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pli_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fir_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_received: Option<u32>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl InboundPadStats {
    /// Create stats for a pad on `transport_id`
    pub fn new(transport_id: impl Into<String>, pad_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            pad_id: pad_id.into(),
            ..Default::default()
        }
    }

    /// Attach the pad to a media stream
    pub fn with_stream(mut self, stream_id: impl Into<String>, kind: MediaKind) -> Self {
        self.stream_id = Some(stream_id.into());
        self.media_type = Some(kind);
        self
    }
}

impl StatsRecord for InboundPadStats {
    const KIND: EntityKind = EntityKind::InboundPad;
    const ID_FIELD: &'static str = "padId";

    fn id(&self) -> &str {
        &self.pad_id
    }

    fn internal(&self) -> bool {
        self.internal.unwrap_or(false)
    }

    fn validate(&self) -> Result<()> {
        require(Self::KIND, Self::ID_FIELD, &self.pad_id)?;
        require(Self::KIND, "transportId", &self.transport_id)
    }
}

/// Outbound RTP pad stats (media forwarded by the SFU)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPadStats {
    pub transport_id: String,
    pub pad_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retransmitted_packets_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_lost: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_lost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_trip_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bitrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nack_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pli_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fir_count: Option<u32>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl OutboundPadStats {
    /// Create stats for a pad on `transport_id`
    pub fn new(transport_id: impl Into<String>, pad_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            pad_id: pad_id.into(),
            ..Default::default()
        }
    }

    /// Attach the pad to a media sink of a stream
    pub fn with_sink(
        mut self,
        stream_id: impl Into<String>,
        sink_id: impl Into<String>,
        kind: MediaKind,
    ) -> Self {
        self.stream_id = Some(stream_id.into());
        self.sink_id = Some(sink_id.into());
        self.media_type = Some(kind);
        self
    }
}

impl StatsRecord for OutboundPadStats {
    const KIND: EntityKind = EntityKind::OutboundPad;
    const ID_FIELD: &'static str = "padId";

    fn id(&self) -> &str {
        &self.pad_id
    }

    fn internal(&self) -> bool {
        self.internal.unwrap_or(false)
    }

    fn validate(&self) -> Result<()> {
        require(Self::KIND, Self::ID_FIELD, &self.pad_id)?;
        require(Self::KIND, "transportId", &self.transport_id)
    }
}

/// SCTP channel (data channel) stats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpChannelStats {
    pub transport_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_smoothed_round_trip_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_congestion_window: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_receiver_window: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_mtu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_unack_data: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl SctpChannelStats {
    /// Create stats for a channel on `transport_id`
    pub fn new(transport_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }
}

impl StatsRecord for SctpChannelStats {
    const KIND: EntityKind = EntityKind::SctpChannel;
    const ID_FIELD: &'static str = "channelId";

    fn id(&self) -> &str {
        &self.channel_id
    }

    fn internal(&self) -> bool {
        self.internal.unwrap_or(false)
    }

    fn validate(&self) -> Result<()> {
        require(Self::KIND, Self::ID_FIELD, &self.channel_id)?;
        require(Self::KIND, "transportId", &self.transport_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transport_requires_id() {
        let stats = TransportStats::default();
        let err = stats.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::MissingId {
                kind: EntityKind::Transport,
                field: "transportId"
            }
        ));
    }

    #[test]
    fn test_pad_requires_transport_id() {
        let stats = InboundPadStats::new("", "p1");
        assert!(matches!(
            stats.validate(),
            Err(Error::MissingId {
                field: "transportId",
                ..
            })
        ));

        let stats = OutboundPadStats::new("t1", "");
        assert!(matches!(
            stats.validate(),
            Err(Error::MissingId { field: "padId", .. })
        ));
    }

    #[test]
    fn test_inbound_pad_wire_names() {
        let stats = InboundPadStats::new("t1", "p1").with_stream("s1", MediaKind::Audio);
        let value = serde_json::to_value(&stats).unwrap();

        assert_eq!(
            value,
            json!({
                "transportId": "t1",
                "padId": "p1",
                "streamId": "s1",
                "mediaType": "audio",
            })
        );
    }

    #[test]
    fn test_unknown_fields_kept_in_extra() {
        let stats: TransportStats = serde_json::from_value(json!({
            "transportId": "t1",
            "iceState": "connected",
            "rtxPacketsSent": 12,
        }))
        .unwrap();

        assert_eq!(stats.ice_state.as_deref(), Some("connected"));
        assert_eq!(stats.extra.get("rtxPacketsSent"), Some(&json!(12)));

        let back = serde_json::to_value(&stats).unwrap();
        assert_eq!(back["rtxPacketsSent"], json!(12));
    }

    #[test]
    fn test_internal_flag_defaults_to_false() {
        let mut stats = SctpChannelStats::new("t1", "c1");
        assert!(!stats.internal());

        stats.internal = Some(true);
        assert!(stats.internal());
    }
}
