//! Sample senders
//!
//! A sender delivers drained batches to wherever samples are consumed. The
//! monitor hands each batch over as is; retries and acknowledgement are the
//! sender's business. An empty batch is a heartbeat.

pub mod channel;

pub use channel::ChannelSender;

use crate::collector::BoxFuture;
use crate::error::Result;
use crate::sampler::Sample;

/// Trait for batch delivery
pub trait Sender: Send {
    /// Deliver one batch
    fn send(&mut self, batch: Vec<Sample>) -> BoxFuture<'_, Result<()>>;

    /// Release the sender's resources
    fn close(&mut self) {}
}
