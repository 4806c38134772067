//! Delayed invocation that later calls supersede.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy_primitives::Address;
use tokio::time::sleep;

use crate::abi::{self, AbiFilter, AbiSource, AbiState};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Runs only the most recent of a burst of calls, once `delay` has passed without a newer one.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, generation: AtomicU64::new(0) }
    }

    /// Waits out the quiet period, then runs `f` unless a newer call or [`cancel`](Self::cancel)
    /// arrived in the meantime (`None`).
    pub async fn call<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            return None;
        }
        Some(f().await)
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// ABI resolution that coalesces rapid target edits into a single fetch.
pub struct DebouncedAbiLookup<S> {
    source: S,
    filter: AbiFilter,
    debouncer: Debouncer,
}

impl<S: AbiSource> DebouncedAbiLookup<S> {
    pub fn new(source: S, filter: AbiFilter, delay: Duration) -> Self {
        Self { source, filter, debouncer: Debouncer::new(delay) }
    }

    /// `None` when a newer lookup superseded this one.
    pub async fn lookup(&self, target: Address) -> Option<AbiState> {
        self.debouncer
            .call(|| abi::resolve(&self.source, &self.filter, target))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::StaticAbiSource;

    #[tokio::test(start_paused = true)]
    async fn only_last_call_runs() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let first = debouncer.call(|| async { 1 });
        let second = async {
            sleep(Duration::from_millis(100)).await;
            debouncer.call(|| async { 2 }).await
        };
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, None);
        assert_eq!(b, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_calls_both_run() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        assert_eq!(debouncer.call(|| async { 1 }).await, Some(1));
        assert_eq!(debouncer.call(|| async { 2 }).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_call() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let pending = debouncer.call(|| async { 1 });
        let cancel = async {
            sleep(Duration::from_millis(10)).await;
            debouncer.cancel();
        };
        let (result, ()) = tokio::join!(pending, cancel);
        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_fetches_once_for_a_burst() {
        let source = StaticAbiSource::unavailable();
        let lookup = DebouncedAbiLookup::new(source, AbiFilter::default(), DEFAULT_DEBOUNCE);
        let first = lookup.lookup(Address::repeat_byte(1));
        let second = async {
            sleep(Duration::from_millis(50)).await;
            lookup.lookup(Address::repeat_byte(2)).await
        };
        let (a, b) = tokio::join!(first, second);
        assert!(a.is_none());
        assert!(!b.unwrap().is_available());
        assert_eq!(lookup.source.fetches(), vec![Address::repeat_byte(2)]);
    }
}
