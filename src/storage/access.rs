//! Read and write sides of the store
//!
//! Collectors only see [`StatsWriter`]; the sampler only sees
//! [`StatsReader`].

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::Result;
use crate::stats::{Appendix, InboundPadStats, OutboundPadStats, SctpChannelStats, TransportStats};

use super::entry::{
    InboundPadEntry, MediaSinkEntry, MediaSinkKey, MediaStreamEntry, MediaStreamKey,
    OutboundPadEntry, SctpChannelEntry, TransportEntry,
};

/// Write side of the store, used by collectors
pub trait StatsWriter {
    /// Insert or update a transport
    fn update_transport(&mut self, stats: TransportStats, appendix: Option<Appendix>)
        -> Result<()>;

    /// Remove a transport; no-op if absent
    fn remove_transport(&mut self, transport_id: &str);

    /// Insert or update an inbound RTP pad
    fn update_inbound_pad(
        &mut self,
        stats: InboundPadStats,
        appendix: Option<Appendix>,
    ) -> Result<()>;

    /// Remove an inbound RTP pad; no-op if absent
    fn remove_inbound_pad(&mut self, pad_id: &str);

    /// Insert or update an outbound RTP pad
    fn update_outbound_pad(
        &mut self,
        stats: OutboundPadStats,
        appendix: Option<Appendix>,
    ) -> Result<()>;

    /// Remove an outbound RTP pad; no-op if absent
    fn remove_outbound_pad(&mut self, pad_id: &str);

    /// Insert or update an SCTP channel
    fn update_sctp_channel(
        &mut self,
        stats: SctpChannelStats,
        appendix: Option<Appendix>,
    ) -> Result<()>;

    /// Remove an SCTP channel; no-op if absent
    fn remove_sctp_channel(&mut self, channel_id: &str);
}

/// Read side of the store, used by the sampler
pub trait StatsReader {
    fn transports(&self) -> Entries<'_, TransportEntry>;
    fn inbound_pads(&self) -> Entries<'_, InboundPadEntry>;
    fn outbound_pads(&self) -> Entries<'_, OutboundPadEntry>;
    fn sctp_channels(&self) -> Entries<'_, SctpChannelEntry>;
    fn media_streams(&self) -> Entries<'_, MediaStreamEntry, MediaStreamKey>;
    fn media_sinks(&self) -> Entries<'_, MediaSinkEntry, MediaSinkKey>;

    fn count_transports(&self) -> usize;
    fn count_inbound_pads(&self) -> usize;
    fn count_outbound_pads(&self) -> usize;
    fn count_sctp_channels(&self) -> usize;
    fn count_media_streams(&self) -> usize;
    fn count_media_sinks(&self) -> usize;
}

/// Lazy iterator over entries of one kind
///
/// The id list is captured when the iterator is created; each step looks the
/// id up in the table and skips ids that are no longer present. Calling the
/// reader method again starts a fresh pass. Base tables are keyed by their
/// string id; derived tables by [`MediaStreamKey`] and [`MediaSinkKey`].
pub struct Entries<'a, V, K = String> {
    table: &'a HashMap<K, V>,
    keys: std::vec::IntoIter<&'a K>,
}

impl<'a, V, K> Entries<'a, V, K>
where
    K: Eq + Hash,
{
    /// Iterate every entry of `table`
    pub(super) fn all(table: &'a HashMap<K, V>) -> Self {
        Self::from_ids(table, table.keys())
    }

    /// Iterate the entries of `table` named by `keys`
    pub(super) fn from_ids<I>(table: &'a HashMap<K, V>, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a K>,
    {
        Self {
            table,
            keys: keys.into_iter().collect::<Vec<_>>().into_iter(),
        }
    }

    /// An iterator yielding nothing
    pub(super) fn empty(table: &'a HashMap<K, V>) -> Self {
        Self::from_ids(table, std::iter::empty())
    }
}

impl<'a, V, K> Iterator for Entries<'a, V, K>
where
    K: Eq + Hash,
{
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            if let Some(entry) = self.table.get(key) {
                return Some(entry);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_skip_missing_ids() {
        let mut table = HashMap::new();
        table.insert("a".to_string(), 1);
        table.insert("c".to_string(), 3);

        let keys: Vec<String> = ["a", "b", "c"].iter().map(|k| k.to_string()).collect();
        let found: Vec<_> = Entries::from_ids(&table, &keys).copied().collect();
        assert_eq!(found, vec![1, 3]);
    }

    #[test]
    fn test_entries_all_is_restartable() {
        let mut table = HashMap::new();
        table.insert("a".to_string(), 1);
        table.insert("b".to_string(), 2);

        assert_eq!(Entries::all(&table).count(), 2);
        assert_eq!(Entries::all(&table).count(), 2);
        assert_eq!(Entries::empty(&table).count(), 0);
    }
}
