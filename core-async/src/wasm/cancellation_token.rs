//! Cancellation token for the single-threaded WASM runtime.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::task::{Poll, Waker};

#[derive(Default)]
struct TokenState {
    cancelled: Cell<bool>,
    waiters: RefCell<Vec<Waker>>,
}

/// Clonable flag that wakes every waiter once cancelled.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Rc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if self.state.cancelled.replace(true) {
            return;
        }
        let waiters = std::mem::take(&mut *self.state.waiters.borrow_mut());
        for waker in waiters {
            waker.wake();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        futures::future::poll_fn(|cx| {
            if self.state.cancelled.get() {
                return Poll::Ready(());
            }
            let mut waiters = self.state.waiters.borrow_mut();
            if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
                waiters.push(cx.waker().clone());
            }
            Poll::Pending
        })
        .await
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    async fn test_cancel_wakes_waiter() {
        let token = CancellationToken::new();
        let waiter = token.clone();

        let handle = crate::task::spawn(async move {
            waiter.cancelled().await;
            7
        });

        crate::task::yield_now().await;
        token.cancel();
        token.cancel();

        assert_eq!(handle.await.unwrap(), 7);
        assert!(token.is_cancelled());
    }
}
