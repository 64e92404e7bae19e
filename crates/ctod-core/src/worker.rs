//! Dispatch helpers that keep CPU-bound and blocking-I/O work off the Tokio
//! reactor (spec.md 4.E: "step 5 is CPU-bound and MUST be executed on a
//! worker pool distinct from the I/O reactor"). `run_cpu` reuses the
//! teacher's own pattern (`tileapihandler.rs::fetch_tile`): spawn the
//! closure onto rayon's global pool, hand the result back over a oneshot
//! channel. `run_blocking` is the Tokio-native equivalent for disk I/O,
//! which the teacher has no analogue for since it never added a disk cache.

use crate::error::{Error, Result};

/// Runs `f` on rayon's global pool and awaits its result without blocking
/// the calling task. Mirrors the teacher's `fetch_tile` idiom verbatim.
pub async fn run_cpu<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let (send, recv) = tokio::sync::oneshot::channel();
    rayon::spawn(move || {
        let _ = send.send(f());
    });
    recv.await.map_err(|_| Error::Internal("worker task panicked".into()))?
}

/// Runs `f` on Tokio's blocking-task pool, for disk-cache I/O. `rayon::spawn`
/// would work too, but blocking file I/O is exactly what `spawn_blocking`
/// exists for and the two pools are independently sized.
pub async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|_| Error::Internal("blocking task panicked".into()))?
}
