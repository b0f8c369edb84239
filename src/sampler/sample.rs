//! Sample wire type
//!
//! List fields with nothing to report are `None` and left out of the JSON
//! entirely, never serialized as empty arrays.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::{InboundPadStats, OutboundPadStats, SctpChannelStats, TransportStats};

/// Out-of-band record attached to the next sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionStats {
    /// Application-defined type tag
    #[serde(rename = "type")]
    pub kind: String,

    /// Opaque payload, usually JSON
    pub payload: String,
}

impl ExtensionStats {
    pub fn new(kind: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

/// One timestamped snapshot of an SFU's stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub sfu_id: String,

    /// Epoch milliseconds at which the sample was made
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone_offset_in_hours: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<TransportStats>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_pads: Option<Vec<InboundPadStats>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_pads: Option<Vec<OutboundPadStats>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_channels: Option<Vec<SctpChannelStats>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_stats: Option<Vec<ExtensionStats>>,
}

impl Sample {
    /// An empty sample for `sfu_id` at `timestamp`
    pub fn new(sfu_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sfu_id: sfu_id.into(),
            timestamp,
            time_zone_offset_in_hours: None,
            marker: None,
            transports: None,
            inbound_pads: None,
            outbound_pads: None,
            sctp_channels: None,
            extension_stats: None,
        }
    }

    /// Whether the sample carries no entity or extension stats
    pub fn is_empty(&self) -> bool {
        self.transports.is_none()
            && self.inbound_pads.is_none()
            && self.outbound_pads.is_none()
            && self.sctp_channels.is_none()
            && self.extension_stats.is_none()
    }
}

/// Encode a batch as a JSON array
pub fn encode_batch(batch: &[Sample]) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(batch)?))
}

/// Decode a batch produced by [`encode_batch`]
pub fn decode_batch(payload: &[u8]) -> Result<Vec<Sample>> {
    Ok(serde_json::from_slice(payload)?)
}
