//! In-process sender over an mpsc channel
//!
//! Encodes each batch as a JSON array and forwards the bytes to whoever
//! holds the receiving end, typically a task owning a WebSocket or HTTP
//! client.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::collector::BoxFuture;
use crate::error::{Error, Result};
use crate::sampler::{encode_batch, Sample};

use super::Sender;

/// Sender forwarding encoded batches on a channel
#[derive(Debug)]
pub struct ChannelSender {
    tx: Option<mpsc::Sender<Bytes>>,
    batches_sent: u64,
}

impl ChannelSender {
    /// Wrap an existing channel
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx: Some(tx),
            batches_sent: 0,
        }
    }

    /// Create a sender together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Number of batches delivered
    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }
}

impl Sender for ChannelSender {
    fn send(&mut self, batch: Vec<Sample>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let tx = self
                .tx
                .as_ref()
                .ok_or_else(|| Error::Sender("sender is closed".into()))?;

            let payload = encode_batch(&batch)?;
            let size = payload.len();

            tx.send(payload)
                .await
                .map_err(|_| Error::Sender("receiver dropped".into()))?;

            self.batches_sent += 1;
            tracing::trace!(samples = batch.len(), bytes = size, "Batch forwarded");
            Ok(())
        })
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::decode_batch;

    #[tokio::test]
    async fn test_send_encodes_batch() {
        let (mut sender, mut rx) = ChannelSender::channel(4);

        sender
            .send(vec![Sample::new("sfu-1", 10), Sample::new("sfu-1", 20)])
            .await
            .unwrap();

        let payload = rx.recv().await.unwrap();
        let decoded = decode_batch(&payload).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].timestamp, 20);
        assert_eq!(sender.batches_sent(), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_is_empty_array() {
        let (mut sender, mut rx) = ChannelSender::channel(1);

        sender.send(Vec::new()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"[]"));
    }

    #[tokio::test]
    async fn test_dropped_receiver_fails() {
        let (mut sender, rx) = ChannelSender::channel(1);
        drop(rx);

        let err = sender.send(vec![Sample::new("sfu-1", 1)]).await.unwrap_err();
        assert!(matches!(err, Error::Sender(_)));
        assert_eq!(sender.batches_sent(), 0);
    }

    #[tokio::test]
    async fn test_closed_sender_fails() {
        let (mut sender, _rx) = ChannelSender::channel(1);
        sender.close();

        assert!(matches!(
            sender.send(Vec::new()).await,
            Err(Error::Sender(_))
        ));
    }
}
