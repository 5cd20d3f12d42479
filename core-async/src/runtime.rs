//! Runtime utilities that abstract over the underlying async executor.

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a current-thread runtime.
#[cfg(not(target_arch = "wasm32"))]
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Like [`block_on`], but the runtime starts with its clock paused.
///
/// Timers auto-advance whenever every task is idle, so a test can await a
/// sixty second cooldown without waiting sixty seconds.
#[cfg(all(not(target_arch = "wasm32"), feature = "test-util"))]
pub fn block_on_paused<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("core_async::runtime::block_on_paused: failed to build Tokio runtime")
        .block_on(future)
}

#[cfg(target_arch = "wasm32")]
pub use crate::wasm::runtime::block_on;

#[cfg(target_arch = "wasm32")]
pub use wasm_bindgen_futures::spawn_local;
