//! CPU-bound dispatch for the solver/optimizer/accounting crates
//! (SPEC_FULL.md §B): initializes a `rayon` global pool sized to
//! `num_cpus::get()` once per process, then hands each solve/optimize call
//! to `tokio::task::spawn_blocking` so the pure-compute work never blocks
//! the cooperative scheduler the adapters' async I/O runs on.

use crate::error::{Result, ServiceError};
use std::sync::Once;

static RAYON_INIT: Once = Once::new();

/// Idempotent: safe to call from every `ServiceState::new`, including in
/// tests that construct more than one.
pub fn ensure_rayon_pool() {
    RAYON_INIT.call_once(|| {
        let _ = rayon::ThreadPoolBuilder::new().num_threads(num_cpus::get()).build_global();
    });
}

/// Runs `f` on a blocking-pool thread backed by the global `rayon` pool,
/// so nested `rayon::join`/`par_iter` calls inside `f` fan out across all
/// cores instead of running serially on tokio's blocking thread.
pub async fn run_cpu_bound<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| ServiceError::TaskJoin(e.to_string()))
}
