//! Batched fetch
//!
//! Drives many independent "poll one source" futures with bounded
//! concurrency:
//!
//! ```text
//!   suppliers: [0 1 2 | 3 4 5 | 6 7]        batch_size = 3
//!               window   window   window
//!                  │  pace  │  pace  │
//!                  ▼        ▼        ▼
//!   output:    Ok([0,2])  Ok([3,4,5])  Ok([6,7])     (1 failed, handler swallowed it)
//! ```
//!
//! Every supplier in a window runs concurrently; results come back in
//! submission order, never completion order. A failed index is handed to the
//! error handler and left out of the output. Without a handler the first
//! failure is yielded as `Err` and ends the stream.
//!
//! The output stream is pull based: a window is only dispatched when the
//! consumer polls for it, so dropping the stream early cancels the rest.
//! There is no per-supplier timeout; wrap the supplier if one is needed.

pub mod config;

use std::collections::VecDeque;
use std::future::Future;

use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;

pub use config::FetchConfig;

/// An escalated supplier failure
#[derive(Debug, Error)]
#[error("supplier {index} failed: {error}")]
pub struct FetchError<E> {
    /// Submission index of the failed supplier
    pub index: usize,
    /// The supplier's error
    pub error: E,
}

/// Per-item error handler
///
/// Receives the error and the supplier's submission index. Returning `Ok`
/// swallows the failure; returning `Err` escalates it and ends the fetch.
pub type ErrorHandler<E> = Box<dyn FnMut(E, usize) -> Result<(), E> + Send>;

/// Bounded-concurrency, paced fetch over many suppliers
pub struct BatchedFetch<E> {
    config: FetchConfig,
    on_error: Option<ErrorHandler<E>>,
}

impl<E> BatchedFetch<E> {
    /// Create a fail-fast fetch with `config`
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            on_error: None,
        }
    }

    /// Get the fetch configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Install an error handler that decides per failure
    pub fn on_error<H>(mut self, handler: H) -> Self
    where
        H: FnMut(E, usize) -> Result<(), E> + Send + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Install an error handler that always swallows
    pub fn isolate<H>(self, mut handler: H) -> Self
    where
        H: FnMut(E, usize) + Send + 'static,
    {
        self.on_error(move |error, index| {
            handler(error, index);
            Ok(())
        })
    }

    /// Run `suppliers`, yielding one `Vec` of successes per window
    pub fn fetch<I, Fut, T>(
        self,
        suppliers: I,
    ) -> impl Stream<Item = Result<Vec<T>, FetchError<E>>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>>,
    {
        let indexed: Vec<(usize, Fut)> = suppliers.into_iter().enumerate().collect();
        let window_size = match self.config.batch_size {
            0 => indexed.len().max(1),
            size => size,
        };

        let mut windows = VecDeque::with_capacity(self.config.window_count(indexed.len()));
        let mut remaining = indexed.into_iter().peekable();
        while remaining.peek().is_some() {
            windows.push_back(remaining.by_ref().take(window_size).collect::<Vec<_>>());
        }

        let state = FetchState {
            config: self.config,
            on_error: self.on_error,
            windows,
            dispatched: 0,
            done: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            let window = state.windows.pop_front()?;

            if state.dispatched > 0 {
                let delay = state.config.pace_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            state.dispatched += 1;

            let results = join_all(
                window
                    .into_iter()
                    .map(|(index, supplier)| async move { (index, supplier.await) }),
            )
            .await;

            let mut values = Vec::with_capacity(results.len());
            for (index, result) in results {
                match result {
                    Ok(value) => values.push(value),
                    Err(error) => {
                        let escalated = match state.on_error.as_mut() {
                            Some(handler) => handler(error, index).err(),
                            None => Some(error),
                        };
                        if let Some(error) = escalated {
                            state.done = true;
                            return Some((Err(FetchError { index, error }), state));
                        }
                    }
                }
            }

            Some((Ok(values), state))
        })
    }

    /// Run `suppliers` to completion and flatten the windows
    pub async fn fetch_all<I, Fut, T>(self, suppliers: I) -> Result<Vec<T>, FetchError<E>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>>,
    {
        let stream = self.fetch(suppliers);
        futures::pin_mut!(stream);

        let mut values = Vec::new();
        while let Some(window) = stream.next().await {
            values.extend(window?);
        }
        Ok(values)
    }
}

impl<E> Default for BatchedFetch<E> {
    fn default() -> Self {
        Self::new(FetchConfig::default())
    }
}

struct FetchState<Fut, E> {
    config: FetchConfig,
    on_error: Option<ErrorHandler<E>>,
    windows: VecDeque<Vec<(usize, Fut)>>,
    dispatched: usize,
    done: bool,
}
