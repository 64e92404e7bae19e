//! The Request Coalescer (spec.md 4.D): at most one `produce` thunk in
//! flight per `WindowKey`, every concurrent caller for that key fanning out
//! from the same in-flight future rather than issuing its own COG read.
//!
//! The cache (§4.C) is `moka::future::Cache`-backed and already safe to
//! share across tasks; what it doesn't give us is "don't call `produce`
//! twice for the same miss" -- that part is hand-rolled on top of a
//! `Mutex<HashMap<WindowKey, PendingFetch>>` per spec.md 9's design note
//! ("the `PendingFetch`/waiter state machine ... directly observable and
//! testable").

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use ctod_geo::ElevationGrid;
use tokio::sync::oneshot;

use crate::cache::ProcessedWindowCache;
use crate::error::{Error, ErrorKind, Result};
use crate::windowkey::WindowKey;

/// `Error` isn't `Clone` (it wraps `gdal`'s error type and `std::io::Error`),
/// so every waiter is resolved with this projection instead and
/// reconstructs its own `Error` via `Error::from_shared`.
type SharedResult = std::result::Result<Arc<ElevationGrid>, (ErrorKind, String)>;

struct PendingFetch {
    waiters: Vec<oneshot::Sender<SharedResult>>,
}

#[derive(Clone)]
pub struct RequestCoalescer {
    cache: ProcessedWindowCache,
    pending: Arc<Mutex<HashMap<WindowKey, PendingFetch>>>,
}

impl RequestCoalescer {
    pub fn new(cache: ProcessedWindowCache) -> Self {
        RequestCoalescer { cache, pending: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn cache(&self) -> &ProcessedWindowCache {
        &self.cache
    }

    /// Fetches the grid for `key`, calling `produce` at most once across
    /// every concurrent caller for that key (spec.md 8, invariant 1).
    pub async fn get_or_fetch<F, Fut>(&self, key: WindowKey, produce: F) -> Result<Arc<ElevationGrid>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ElevationGrid>> + Send + 'static,
    {
        if let Some(grid) = self.cache.get(&key).await {
            return Ok(grid);
        }

        let rx = {
            let mut pending = self.pending.lock().unwrap();
            match pending.get_mut(&key) {
                Some(entry) => {
                    let (tx, rx) = oneshot::channel();
                    entry.waiters.push(tx);
                    rx
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    pending.insert(key, PendingFetch { waiters: vec![tx] });
                    self.spawn_leader(key, produce);
                    rx
                }
            }
        };

        match rx.await {
            Ok(Ok(grid)) => Ok(grid),
            Ok(Err((kind, message))) => Err(Error::from_shared(kind, message)),
            // the leader's task was dropped before sending -- can only happen
            // on a panic inside `produce` escaping `run_cpu`'s catch, which
            // already turns panics into an `Internal` error, so this should
            // not occur in practice.
            Err(_) => Err(Error::Internal("coalesced fetch was abandoned".into())),
        }
    }

    /// Runs `produce` detached from the calling task: a waiter dropping its
    /// receiver (request cancellation) never cancels the shared work, per
    /// spec.md 4.D's "continue to populate" policy.
    fn spawn_leader<F, Fut>(&self, key: WindowKey, produce: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ElevationGrid>> + Send + 'static,
    {
        let cache = self.cache.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            let result = produce().await;
            let shared: SharedResult = match result {
                Ok(grid) => {
                    let grid = Arc::new(grid);
                    cache.insert(key, grid.clone()).await;
                    Ok(grid)
                }
                Err(err) => Err(err.to_shared()),
            };

            let waiters = {
                let mut pending = pending.lock().unwrap();
                pending.remove(&key).map(|entry| entry.waiters).unwrap_or_default()
            };
            for waiter in waiters {
                // a waiter may have dropped its receiver already (cancellation);
                // sending into a closed channel is a no-op we can ignore.
                let _ = waiter.send(clone_shared(&shared));
            }
        });
    }
}

fn clone_shared(result: &SharedResult) -> SharedResult {
    match result {
        Ok(grid) => Ok(grid.clone()),
        Err((kind, message)) => Err((*kind, message.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctod_geo::{Columns, GeoTransform, RasterSize, Rows};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key() -> WindowKey {
        let dataset = crate::dataset::DatasetConfig { cog_path: "/data/dem.tif".into(), ..Default::default() };
        WindowKey::new(&dataset, crate::windowkey::TileKey::new(ctod_geo::TmsId::WebMercatorQuad, 10, 3, 4))
    }

    fn grid() -> ElevationGrid {
        let size = RasterSize::new(Rows(4), Columns(4));
        let transform = GeoTransform::new(0.0, 1.0, 0.0, -1.0);
        ElevationGrid::new(size, transform, vec![1.0; 16], Some(-9999.0))
    }

    #[tokio::test]
    async fn concurrent_callers_invoke_produce_exactly_once() {
        let coalescer = RequestCoalescer::new(ProcessedWindowCache::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .get_or_fetch(key(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(grid())
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_shared_failure_is_observed_by_every_waiter() {
        let coalescer = RequestCoalescer::new(ProcessedWindowCache::default());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let coalescer = coalescer.clone();
            handles.push(tokio::spawn(async move {
                coalescer.get_or_fetch(key(), || async { Err(Error::SourceUnavailable("unreachable".into())) }).await
            }));
        }
        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(Error::SourceUnavailable(_))));
        }
    }

    #[tokio::test]
    async fn a_dropped_waiter_does_not_stop_the_shared_work_from_populating_the_cache() {
        let coalescer = RequestCoalescer::new(ProcessedWindowCache::default());
        let cache = coalescer.cache().clone();

        let leader = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move { coalescer.get_or_fetch(key(), || async { Ok(grid()) }).await })
        };
        // give the leader a moment to register before we'd otherwise race it
        tokio::time::sleep(Duration::from_millis(5)).await;
        leader.abort();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = coalescer.get_or_fetch(key(), || async { Ok(grid()) }).await;
        assert!(second.is_ok());
        assert!(cache.get(&key()).await.is_some());
    }
}
