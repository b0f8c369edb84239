//! Stats collectors
//!
//! A collector translates some live source of WebRTC objects into store
//! writes. The monitor hands every collector the shared store with
//! [`Collector::set_writer`] and then drives [`Collector::collect`] on each
//! collecting tick. Closed collectors are dropped by the monitor on its next
//! pass.

pub mod source;

use std::future::Future;
use std::pin::Pin;

pub use source::{SourceCollector, StatsSource, StatsUpdate};

use crate::error::Result;
use crate::storage::SharedStorage;

/// Boxed future returned by collector and source methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for anything that writes stats into the store
pub trait Collector: Send {
    /// Unique collector identifier
    fn id(&self) -> &str;

    /// Whether `close()` was called
    fn is_closed(&self) -> bool;

    /// Attach or detach the store this collector writes to
    fn set_writer(&mut self, writer: Option<SharedStorage>);

    /// Run one collection cycle
    fn collect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Stop collecting and release the writer
    fn close(&mut self);
}
