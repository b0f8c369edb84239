//! Stats records and content hashing
//!
//! Collectors translate a media server's native objects into the records in
//! [`records`]. The store treats each record as an opaque, hashable blob:
//! apart from the identifying fields it never looks inside.

pub mod hash;
pub mod records;

pub use hash::ContentHash;
pub use records::{
    Appendix, EntityKind, FieldMap, InboundPadStats, MediaKind, OutboundPadStats,
    SctpChannelStats, StatsRecord, TransportStats,
};
