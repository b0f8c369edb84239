//! Sample accumulator
//!
//! Buffers samples into size-bounded batches until the sender asks for them:
//!
//! 1. `add_sample` appends to the open batch
//! 2. A full open batch is sealed into the pending FIFO
//! 3. `drain_to` seals the open batch and hands every pending batch over
//!
//! With `forward_if_empty`, draining an empty accumulator still calls the
//! consumer once with `None`, which senders turn into a heartbeat.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::sampler::Sample;

/// Accumulator configuration options
#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    /// Samples per batch before it is sealed (0 = unbounded)
    pub max_samples_per_batch: usize,

    /// Call the consumer with `None` when there is nothing to drain
    pub forward_if_empty: bool,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            max_samples_per_batch: 100,
            forward_if_empty: false,
        }
    }
}

impl AccumulatorConfig {
    /// Set the batch size limit
    pub fn max_samples_per_batch(mut self, max: usize) -> Self {
        self.max_samples_per_batch = max;
        self
    }

    /// Enable or disable empty forwarding
    pub fn forward_if_empty(mut self, enabled: bool) -> Self {
        self.forward_if_empty = enabled;
        self
    }
}

/// Batches samples between sends
#[derive(Debug, Default)]
pub struct Accumulator {
    config: AccumulatorConfig,
    open: Vec<Sample>,
    pending: VecDeque<Vec<Sample>>,
    closed: bool,
}

impl Accumulator {
    /// Create an accumulator with `config`
    pub fn new(config: AccumulatorConfig) -> Self {
        Self {
            config,
            open: Vec::new(),
            pending: VecDeque::new(),
            closed: false,
        }
    }

    /// Get the accumulator configuration
    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }

    /// Add a sample to the open batch
    pub fn add_sample(&mut self, sample: Sample) -> Result<()> {
        if self.closed {
            return Err(Error::AccumulatorClosed);
        }

        self.open.push(sample);

        let max = self.config.max_samples_per_batch;
        if max > 0 && self.open.len() >= max {
            self.seal();
        }
        Ok(())
    }

    /// Hand every batch to `consumer` in FIFO order
    ///
    /// Returns the number of batches drained.
    pub fn drain_to<F>(&mut self, mut consumer: F) -> Result<usize>
    where
        F: FnMut(Option<Vec<Sample>>),
    {
        if self.closed {
            return Err(Error::AccumulatorClosed);
        }

        self.seal();

        if self.pending.is_empty() {
            if self.config.forward_if_empty {
                consumer(None);
            }
            return Ok(0);
        }

        let drained = self.pending.len();
        for batch in self.pending.drain(..) {
            consumer(Some(batch));
        }

        tracing::trace!(batches = drained, "Accumulator drained");
        Ok(drained)
    }

    /// Number of samples not yet drained
    pub fn sample_count(&self) -> usize {
        self.open.len() + self.pending.iter().map(Vec::len).sum::<usize>()
    }

    /// Whether nothing is waiting to be drained
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.pending.is_empty()
    }

    /// Close the accumulator, dropping anything not yet drained
    pub fn close(&mut self) {
        if !self.closed {
            let dropped = self.sample_count();
            self.closed = true;
            self.open.clear();
            self.pending.clear();
            if dropped > 0 {
                tracing::debug!(dropped = dropped, "Accumulator closed with undrained samples");
            }
        }
    }

    /// Whether `close()` was called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn seal(&mut self) {
        if !self.open.is_empty() {
            self.pending.push_back(std::mem::take(&mut self.open));
        }
    }
}
