//! Task spawning.
//!
//! On native targets tasks are Tokio tasks and must be `Send`. On WASM they
//! run on the browser event loop via `spawn_local` and only need `'static`.
//!
//! [`ScopedTask`] ties a background task to the value that owns it: dropping
//! or cancelling the handle stops the task at its next suspension point, so
//! timers and pollers can never outlive their session.

use std::future::Future;

use crate::sync::CancellationToken;

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::task::{yield_now, JoinError, JoinHandle};

#[cfg(target_arch = "wasm32")]
pub use crate::wasm::task::{spawn, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the Tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;

/// Runs `future` until it completes or `token` is cancelled.
///
/// Returns `None` when cancellation won.
pub async fn run_until_cancelled<F>(token: &CancellationToken, future: F) -> Option<F::Output>
where
    F: Future,
{
    use futures::future::{select, Either};

    let cancelled = token.cancelled();
    futures::pin_mut!(cancelled);
    futures::pin_mut!(future);

    match select(future, cancelled).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(_) => None,
    }
}

/// Handle to a background task that is cancelled when dropped.
#[derive(Debug)]
pub struct ScopedTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScopedTask {
    /// Signals the task to stop. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observed by the task; useful for checking cancellation inside
    /// a state mutation.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Waits for the task to stop, whether it finished or was cancelled.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawns a task whose lifetime is bound to the returned [`ScopedTask`].
///
/// The closure receives the task's cancellation token. The future is also
/// raced against the token, so a task blocked on a timer stops promptly.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_scoped<F, Fut>(f: F) -> ScopedTask
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let future = f(token.clone());
    let guard = token.clone();
    let handle = spawn(async move {
        run_until_cancelled(&guard, future).await;
    });
    ScopedTask {
        token,
        handle: Some(handle),
    }
}

#[cfg(target_arch = "wasm32")]
pub fn spawn_scoped<F, Fut>(f: F) -> ScopedTask
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = ()> + 'static,
{
    let token = CancellationToken::new();
    let future = f(token.clone());
    let guard = token.clone();
    let handle = spawn(async move {
        run_until_cancelled(&guard, future).await;
    });
    ScopedTask {
        token,
        handle: Some(handle),
    }
}
