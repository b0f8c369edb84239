//! End-to-end pipeline tests: collectors through store, sampler,
//! accumulator, and sender.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use sfu_monitor::collector::BoxFuture;
use sfu_monitor::sampler::decode_batch;
use sfu_monitor::{
    Accumulator, AccumulatorConfig, ChannelSender, Error, FetchConfig, InboundPadStats,
    ManualClock, MediaKind, MediaSinkKey, MediaStreamKey, MonitorConfig, OutboundPadStats, Result,
    Sampler, SamplerConfig, SctpChannelStats, SfuMonitor, SourceCollector, StatsReader,
    StatsSource, StatsStorage, StatsUpdate, StatsWriter, TransportStats,
};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A transport whose packet counter grows on every poll
struct LiveTransport {
    id: String,
    polls: AtomicU64,
}

impl LiveTransport {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            polls: AtomicU64::new(0),
        })
    }
}

impl StatsSource for LiveTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn poll(&self) -> BoxFuture<'_, Result<Vec<StatsUpdate>>> {
        Box::pin(async move {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut transport = TransportStats::new(self.id.clone());
            transport.rtp_packets_received = Some(polls * 100);

            let pad = InboundPadStats::new(self.id.clone(), format!("{}-in", self.id))
                .with_stream(format!("{}-stream", self.id), MediaKind::Video);

            Ok(vec![transport.into(), pad.into()])
        })
    }
}

struct ClosedSource;

impl StatsSource for ClosedSource {
    fn id(&self) -> &str {
        "closed"
    }

    fn poll(&self) -> BoxFuture<'_, Result<Vec<StatsUpdate>>> {
        Box::pin(async {
            Err(Error::Source {
                id: "closed".into(),
                reason: "peer connection closed".into(),
            })
        })
    }
}

#[test]
fn test_store_relations_through_public_api() {
    init_tracing();

    let clock = ManualClock::new(0);
    let mut storage = StatsStorage::with_clock(Arc::new(clock.clone()));

    storage.update_transport(TransportStats::new("t1"), None).unwrap();
    storage
        .update_inbound_pad(
            InboundPadStats::new("t1", "in-1").with_stream("s1", MediaKind::Audio),
            None,
        )
        .unwrap();
    storage
        .update_outbound_pad(
            OutboundPadStats::new("t1", "out-1").with_sink("s1", "sink-1", MediaKind::Audio),
            None,
        )
        .unwrap();
    storage
        .update_sctp_channel(SctpChannelStats::new("t1", "ch-1"), None)
        .unwrap();

    assert_eq!(storage.transport_inbound_pads("t1").count(), 1);
    assert_eq!(storage.transport_outbound_pads("t1").count(), 1);
    assert_eq!(storage.transport_sctp_channels("t1").count(), 1);
    let stream = MediaStreamKey::new("s1", Some(MediaKind::Audio));
    let sink = MediaSinkKey::new("sink-1", Some("s1"), Some(MediaKind::Audio));
    assert_eq!(storage.media_stream_sinks(&stream).count(), 1);
    assert_eq!(storage.media_sink_outbound_pads(&sink).count(), 1);

    // The sink outlives its last inbound pad; the stream survives via the sink
    storage.remove_inbound_pad("in-1");
    assert_eq!(storage.count_media_streams(), 1);

    storage.remove_outbound_pad("out-1");
    assert_eq!(storage.count_media_sinks(), 0);
    assert_eq!(storage.count_media_streams(), 0);
}

#[test]
fn test_manual_pipeline_batches() {
    init_tracing();

    let clock = ManualClock::new(1_000);
    let mut storage = StatsStorage::with_clock(Arc::new(clock.clone()));
    let mut sampler = Sampler::with_clock(SamplerConfig::new("sfu-1"), Arc::new(clock.clone()));
    let mut accumulator =
        Accumulator::new(AccumulatorConfig::default().max_samples_per_batch(2));

    for round in 0..5u64 {
        let mut stats = TransportStats::new("t1");
        stats.rtp_packets_received = Some(round);
        storage.update_transport(stats, None).unwrap();
        clock.advance(100);
        accumulator.add_sample(sampler.make(&storage).unwrap()).unwrap();
    }

    let mut batches = Vec::new();
    accumulator
        .drain_to(|batch| batches.push(batch.unwrap()))
        .unwrap();

    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    let timestamps: Vec<i64> = batches.iter().flatten().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![1_100, 1_200, 1_300, 1_400, 1_500]);
}

#[tokio::test]
async fn test_monitor_end_to_end() {
    init_tracing();

    let clock = ManualClock::new(50_000);
    let config = MonitorConfig::new("sfu-1").stats_expiration(Duration::from_secs(10));
    let mut monitor = SfuMonitor::with_clock(config, Arc::new(clock.clone()));
    let (sender, mut rx) = ChannelSender::channel(8);
    monitor.set_sender(sender);

    let mut collector = SourceCollector::new("transports", FetchConfig::default().batch_size(2));
    collector.add_source(LiveTransport::new("t1"));
    collector.add_source(Arc::new(ClosedSource));
    collector.add_source(LiveTransport::new("t2"));
    monitor.add_collector(collector).unwrap();

    monitor.collect().await.unwrap();
    clock.advance(1_000);
    monitor.sample().await.unwrap();

    // Nothing changes except the clock; the next sample has no entities
    clock.advance(1_000);
    monitor.sample().await.unwrap();

    monitor.send().await.unwrap();

    let batch = decode_batch(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(batch.len(), 2);

    let first = &batch[0];
    let transports = first.transports.as_ref().unwrap();
    assert_eq!(transports.len(), 2);
    assert!(transports
        .iter()
        .all(|t| t.rtp_packets_received == Some(100)));
    assert_eq!(first.inbound_pads.as_ref().map(Vec::len), Some(2));

    assert!(batch[1].is_empty());

    let storage = monitor.storage().read().await;
    assert_eq!(storage.count_media_streams(), 2);
}

#[test]
fn test_sender_heartbeat_blocking() {
    init_tracing();

    tokio_test::block_on(async {
        let config = MonitorConfig::new("sfu-1").forward_if_empty(true);
        let mut monitor = SfuMonitor::with_clock(config, Arc::new(ManualClock::new(0)));
        let (sender, mut rx) = ChannelSender::channel(2);
        monitor.set_sender(sender);

        monitor.send().await.unwrap();
        monitor.send().await.unwrap();

        assert_eq!(&rx.recv().await.unwrap()[..], b"[]");
        assert_eq!(&rx.recv().await.unwrap()[..], b"[]");
        assert_eq!(monitor.metrics().batches_sent, 2);
    });
}
