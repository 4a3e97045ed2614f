//! Debounced lookups for type-ahead inputs.
//!
//! Each new input supersedes the previous one: a pending delay is abandoned
//! and an in-flight fetch is aborted through its [`CancellationToken`], so a
//! slow stale response can never overwrite a newer one.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, DEFAULT_LOOKUP_DEBOUNCE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome<T> {
    Completed(T),
    /// A newer input (or [`DebouncedLookup::cancel`]) replaced this one.
    Superseded,
    /// Empty input; results should be cleared. Nothing was fetched.
    Cleared,
}

pub struct DebouncedLookup {
    delay: Duration,
    current: Mutex<Option<CancellationToken>>,
}

impl Default for DebouncedLookup {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_DEBOUNCE)
    }
}

impl DebouncedLookup {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.lookup_debounce)
    }

    /// Wait out the debounce delay, then run `fetch` unless superseded.
    ///
    /// `fetch` receives the input and the lookup's cancellation token, which
    /// it may pass down to abort its own I/O early.
    pub async fn lookup<F, Fut, T>(&self, input: &str, fetch: F) -> LookupOutcome<T>
    where
        F: FnOnce(String, CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        if input.is_empty() {
            self.cancel();
            return LookupOutcome::Cleared;
        }

        let token = self.supersede();

        tokio::select! {
            biased;
            _ = token.cancelled() => return LookupOutcome::Superseded,
            _ = tokio::time::sleep(self.delay) => {}
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => LookupOutcome::Superseded,
            out = fetch(input.to_string(), token.clone()) => LookupOutcome::Completed(out),
        }
    }

    /// Abandon whatever lookup is pending or in flight.
    pub fn cancel(&self) {
        if let Some(previous) = self.slot().take() {
            previous.cancel();
        }
    }

    fn supersede(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self.slot().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
