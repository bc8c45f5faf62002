//! Call gateway.
//!
//! # Data Flow
//! ```text
//! call(name, run, fallback)
//!     → Registry::resolve (create breaker on first use)
//!     → Breaker::admit
//!     → run (only if admitted) → Breaker::on_outcome
//!     → fallback (rejected or failed calls only)
//! ```
//!
//! `run` is a future and is only polled when the breaker lets the call
//! through, so a rejected call never starts.

use std::future::Future;

use crate::resilience::error::{CallError, Fallback};
use crate::resilience::registry::Registry;

impl Registry {
    /// Guard `run` with the breaker called `name`.
    ///
    /// - `Ok(Some(v))`: ran and succeeded
    /// - `Ok(None)`: rejected; the fallback got a `RejectedError`
    /// - `Err(CallError::Operation(e))`: ran and failed; the fallback got `e` too
    pub async fn call<T, E, Fut>(
        &self,
        name: &str,
        run: Fut,
        fallback: Option<&Fallback<'_, E>>,
    ) -> Result<Option<T>, CallError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute(name, Some(run), fallback).await
    }

    /// Like [`Registry::call`], for callers whose operation may be missing.
    pub async fn execute<T, E, Fut>(
        &self,
        name: &str,
        run: Option<Fut>,
        fallback: Option<&Fallback<'_, E>>,
    ) -> Result<Option<T>, CallError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if name.is_empty() {
            return Err(CallError::NameRequired);
        }
        let Some(run) = run else {
            return Err(CallError::OperationRequired);
        };

        let breaker = self.resolve(name)?;
        breaker
            .call(run, fallback)
            .await
            .map_err(CallError::Operation)
    }
}

/// Guard `run` with the process-wide breaker called `name`.
pub async fn call<T, E, Fut>(
    name: &str,
    run: Fut,
    fallback: Option<&Fallback<'_, E>>,
) -> Result<Option<T>, CallError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    Registry::global().call(name, run, fallback).await
}

/// Like [`call`], for callers whose operation may be missing.
pub async fn execute<T, E, Fut>(
    name: &str,
    run: Option<Fut>,
    fallback: Option<&Fallback<'_, E>>,
) -> Result<Option<T>, CallError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    Registry::global().execute(name, run, fallback).await
}
