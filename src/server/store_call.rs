//! Dispatch of data-layer calls from async handlers.
//!
//! Store operations are blocking (rusqlite), so they run on tokio's blocking
//! pool and are bounded by the configured store timeout. A call that times out
//! keeps running to completion on its thread; its transaction still commits or
//! rolls back as a unit, the request just no longer waits for it.

use super::error::ApiError;
use super::metrics;
use super::state::ServerState;
use crate::library::{LibraryStore, StoreError, StoreResult};
use anyhow::anyhow;
use std::time::Instant;
use tracing::warn;

pub async fn call_store<T, F>(
    state: &ServerState,
    operation: &'static str,
    user_message: &'static str,
    f: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&dyn LibraryStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    let started = Instant::now();
    let task = tokio::task::spawn_blocking(move || f(store.as_ref()));

    let outcome = match tokio::time::timeout(state.config.store_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(StoreError::Failure(anyhow!(
            "data layer task did not complete: {}",
            join_err
        ))),
        Err(_) => {
            warn!(
                "{} exceeded the store timeout of {}ms",
                operation,
                state.config.store_timeout.as_millis()
            );
            Err(StoreError::Timeout)
        }
    };

    metrics::record_store_call(operation, started.elapsed());
    outcome.map_err(|err| ApiError::from_store(operation, user_message, err))
}
