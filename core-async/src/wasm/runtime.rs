//! Blocking entry point for WASM.

use std::future::Future;

/// Drives `future` on a local pool.
///
/// Only suitable for futures that never wait on the browser event loop
/// (timers, fetch); those would never complete here.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future + 'static,
    F::Output: 'static,
{
    futures::executor::LocalPool::new().run_until(future)
}
