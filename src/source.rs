/*
 *  source.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Background refresh + cache cell for one data source
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metrics::{FetchTimer, Metrics};

/// Everything that can go wrong inside a fetch. Never leaves the worker;
/// the fallback value is published instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("missing data: {0}")]
    MissingData(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// A data-producing unit polled by a [`RefreshableSource`].
pub trait Fetch: Send + Sync + 'static {
    type Data: Send + Sync + 'static;

    /// Retrieve fresh data. The worker bounds every call with the
    /// source's fetch timeout.
    fn fetch(&self) -> impl Future<Output = Result<Self::Data, FetchError>> + Send;

    /// Substitute published when `fetch` fails or times out. Must not fail.
    fn fallback(&self) -> Self::Data;
}

/// Closure-backed [`Fetch`], handy for static pages and tests.
pub struct FnFetch<F, G> {
    fetch: F,
    fallback: G,
}

impl<F, G> FnFetch<F, G> {
    pub fn new(fetch: F, fallback: G) -> Self {
        Self { fetch, fallback }
    }
}

impl<T, F, Fut, G> Fetch for FnFetch<F, G>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    G: Fn() -> T + Send + Sync + 'static,
{
    type Data = T;

    fn fetch(&self) -> impl Future<Output = Result<T, FetchError>> + Send {
        (self.fetch)()
    }

    fn fallback(&self) -> T {
        (self.fallback)()
    }
}

/// Refresh cadence for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Interval between the end of one cycle and the start of the next.
    /// Also the retry interval after a failure.
    pub ttl: Duration,
    /// Hard bound on a single fetch call.
    pub fetch_timeout: Duration,
}

impl RefreshPolicy {
    pub fn new(ttl: Duration, fetch_timeout: Duration) -> Self {
        Self { ttl, fetch_timeout }
    }
}

type Cell<T> = Option<Arc<T>>;

/// One data source with its own background worker.
///
/// The worker fetches immediately on construction, then once per TTL. Each
/// result (or the fallback) is published as a single replace of the cache
/// cell, so readers see either the previous value or the new one, never a
/// mix. Dropping the source cancels the worker; it exits at its next wait.
pub struct RefreshableSource<T> {
    name: Arc<str>,
    ttl: Duration,
    enabled: AtomicBool,
    cell: watch::Receiver<Cell<T>>,
    fallback: Arc<dyn Fn() -> T + Send + Sync>,
    refreshes: Arc<AtomicU64>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> RefreshableSource<T> {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn<F>(name: impl Into<String>, fetcher: F, policy: RefreshPolicy, metrics: Metrics) -> Self
    where
        F: Fetch<Data = T>,
    {
        let name: Arc<str> = Arc::from(name.into());
        let fetcher = Arc::new(fetcher);
        let (tx, rx) = watch::channel(None);
        let refreshes = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(refresh_loop(
            name.clone(),
            fetcher.clone(),
            policy,
            tx,
            refreshes.clone(),
            cancel.clone(),
            metrics,
        ));

        info!("{}: refresh worker started (ttl {:?})", name, policy.ttl);

        Self {
            name,
            ttl: policy.ttl,
            enabled: AtomicBool::new(true),
            cell: rx,
            fallback: Arc::new(move || fetcher.fallback()),
            refreshes,
            cancel,
            worker: Some(worker),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// True once the first fetch/fallback cycle has published.
    pub fn is_ready(&self) -> bool {
        self.cell.borrow().is_some()
    }

    /// Latest published value without waiting.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.cell.borrow().clone()
    }

    /// Wait for the first publish, then return the latest value.
    ///
    /// Once ready this never waits again. If the worker died before ever
    /// publishing, the fallback is returned.
    pub async fn snapshot(&self) -> Arc<T> {
        let mut rx = self.cell.clone();
        let published = rx.wait_for(Option::is_some).await.ok().and_then(|v| v.clone());
        match published {
            Some(v) => v,
            None => {
                warn!("{}: worker gone before first publish, using fallback", self.name);
                Arc::new((self.fallback)())
            }
        }
    }

    /// Number of completed publish cycles.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Acquire)
    }

    /// Ask the worker to stop. Idempotent; observed at the next wait.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A clone of the cancellation token, for callers that track workers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait for the worker to exit.
    ///
    /// Bounded by one in-flight fetch timeout.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.take() {
            if let Err(e) = handle.await {
                warn!("{}: refresh worker failed to join: {}", self.name, e);
            }
        }
    }
}

impl<T> Drop for RefreshableSource<T> {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!("{}: source dropped, cancelling worker", self.name);
            self.cancel.cancel();
        }
    }
}

async fn refresh_loop<F: Fetch>(
    name: Arc<str>,
    fetcher: Arc<F>,
    policy: RefreshPolicy,
    tx: watch::Sender<Cell<F::Data>>,
    refreshes: Arc<AtomicU64>,
    cancel: CancellationToken,
    metrics: Metrics,
) {
    loop {
        let mut timer = FetchTimer::new(&metrics, &name);
        let value = match tokio::time::timeout(policy.fetch_timeout, fetcher.fetch()).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                timer.mark_failed();
                warn!("{}: fetch failed, using fallback: {}", name, e);
                fetcher.fallback()
            }
            Err(_) => {
                timer.mark_failed();
                warn!("{}: fetch failed, using fallback: {}", name, FetchError::Timeout(policy.fetch_timeout));
                fetcher.fallback()
            }
        };

        tx.send_replace(Some(Arc::new(value)));
        refreshes.fetch_add(1, Ordering::AcqRel);
        drop(timer);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(policy.ttl) => {}
        }
    }
    info!("{}: refresh worker stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn policy(ttl_secs: u64) -> RefreshPolicy {
        RefreshPolicy::new(Duration::from_secs(ttl_secs), Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_waits_for_first_publish() {
        let fetcher = FnFetch::new(
            || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, FetchError>(42u32)
            },
            || 0u32,
        );
        let source = RefreshableSource::spawn("slow", fetcher, policy(60), Metrics::new());
        assert!(!source.is_ready());
        assert!(source.latest().is_none());

        let start = tokio::time::Instant::now();
        assert_eq!(*source.snapshot().await, 42);
        assert!(start.elapsed() >= Duration::from_secs(1));

        // ready now: no further waiting
        let again = tokio::time::Instant::now();
        assert_eq!(*source.snapshot().await, 42);
        assert_eq!(again.elapsed(), Duration::ZERO);
        assert!(source.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_fetch_publishes_fallback_forever() {
        let fetcher = FnFetch::new(
            || async { Err::<u32, _>(FetchError::MissingData("upstream down".into())) },
            || 7u32,
        );
        let metrics = Metrics::new();
        let source = RefreshableSource::spawn("down", fetcher, policy(5), metrics.clone());

        for _ in 0..4 {
            assert_eq!(*source.snapshot().await, 7);
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        let m = metrics.get("down").unwrap();
        assert!(m.fetches >= 4);
        assert_eq!(m.fetches, m.failures);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_is_bounded_by_timeout() {
        let fetcher = FnFetch::new(
            || async {
                std::future::pending::<()>().await;
                Ok::<_, FetchError>(1u8)
            },
            || 9u8,
        );
        let source = RefreshableSource::spawn("hung", fetcher, policy(30), Metrics::new());
        let start = tokio::time::Instant::now();
        assert_eq!(*source.snapshot().await, 9);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetcher = FnFetch::new(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, FetchError>(())
                }
            },
            || (),
        );
        let source = RefreshableSource::spawn("cancel", fetcher, policy(1), Metrics::new());
        source.snapshot().await;

        source.cancel();
        source.cancel();
        assert!(source.is_cancelled());

        let start = tokio::time::Instant::now();
        let token = source.cancellation_token();
        source.join().await;
        assert!(start.elapsed() <= Duration::from_secs(2));
        assert!(token.is_cancelled());

        let after = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_worker() {
        let fetcher = FnFetch::new(|| async { Ok::<_, FetchError>(1u8) }, || 0u8);
        let source = RefreshableSource::spawn("dropped", fetcher, policy(1), Metrics::new());
        let token = source.cancellation_token();
        source.snapshot().await;
        drop(source);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabled_flag() {
        let fetcher = FnFetch::new(|| async { Ok::<_, FetchError>(()) }, || ());
        let source = RefreshableSource::spawn("flag", fetcher, policy(60), Metrics::new());
        assert!(source.is_enabled());
        source.set_enabled(false);
        assert!(!source.is_enabled());
        assert_eq!(source.name(), "flag");
        assert_eq!(source.ttl(), Duration::from_secs(60));
    }
}
