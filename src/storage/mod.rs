//! Stats entity store
//!
//! Holds the latest stats of every transport, RTP pad, and SCTP channel the
//! collectors report, plus the media streams and sinks derived from them.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<RwLock<StatsStorage>>
//!                     ┌───────────────────────────┐
//!                     │ transports:    id -> entry│
//!                     │ inbound_pads:  id -> entry│
//!                     │ outbound_pads: id -> entry│
//!                     │ sctp_channels: id -> entry│
//!                     │ media_streams: key -> ids │
//!                     │ media_sinks:   key -> ids │
//!                     └─────────────┬─────────────┘
//!                                   │
//!             ┌─────────────────────┴─────────────────────┐
//!             │                                           │
//!             ▼                                           ▼
//!      [Collectors]                                  [Sampler]
//!      StatsWriter::update_*()                       StatsReader::transports()
//!      StatsWriter::remove_*()                       StatsReader::inbound_pads()
//! ```
//!
//! # Derived entities
//!
//! Media streams and sinks are reference counted by id-sets: a stream lives
//! while an inbound pad or a sink names it, a sink while an outbound pad
//! names it. A stream is keyed by `streamId` and media kind, a sink by
//! `sinkId` and the stream it forwards.

pub mod access;
pub mod entry;
pub mod store;

use std::sync::Arc;

use tokio::sync::RwLock;

pub use access::{Entries, StatsReader, StatsWriter};
pub use entry::{
    InboundPadEntry, MediaSinkEntry, MediaSinkKey, MediaStreamEntry, MediaStreamKey,
    OutboundPadEntry, SctpChannelEntry, StatsEntry, TransportEntry,
};
pub use store::StatsStorage;

/// Storage shared between collectors and the sampler
pub type SharedStorage = Arc<RwLock<StatsStorage>>;

/// Wrap a storage for sharing
pub fn shared(storage: StatsStorage) -> SharedStorage {
    Arc::new(RwLock::new(storage))
}
