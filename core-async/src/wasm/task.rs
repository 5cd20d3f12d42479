//! Task spawning on the browser event loop.
//!
//! `spawn` hands the future to `wasm_bindgen_futures::spawn_local` and
//! returns an awaitable handle. Unlike a bare `spawn_local`, the task can be
//! aborted: it is wrapped in `futures::future::Abortable`.

use futures::channel::oneshot;
use futures::future::{AbortHandle, Abortable};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Error returned when awaiting a task that did not run to completion.
#[derive(Debug, Clone)]
pub struct JoinError {
    _private: (),
}

impl JoinError {
    pub fn is_cancelled(&self) -> bool {
        true
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task was cancelled")
    }
}

impl std::error::Error for JoinError {}

pub struct JoinHandle<T> {
    receiver: oneshot::Receiver<T>,
    abort: AbortHandle,
}

impl<T> JoinHandle<T> {
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_aborted()
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("aborted", &self.abort.is_aborted())
            .finish()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| JoinError { _private: () }))
    }
}

pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let (sender, receiver) = oneshot::channel();
    let (abort, registration) = AbortHandle::new_pair();
    let task = Abortable::new(future, registration);

    wasm_bindgen_futures::spawn_local(async move {
        if let Ok(output) = task.await {
            let _ = sender.send(output);
        }
    });

    JoinHandle { receiver, abort }
}

/// Yields to the browser event loop.
pub async fn yield_now() {
    gloo_timers::future::TimeoutFuture::new(0).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    async fn test_spawn_returns_value() {
        let handle = spawn(async { 42 });
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[wasm_bindgen_test]
    async fn test_abort_resolves_with_error() {
        let handle = spawn(async {
            gloo_timers::future::sleep(std::time::Duration::from_secs(60)).await;
            1
        });
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
