//! Single-producer, multi-consumer channel holding the latest value.
//!
//! Mirrors the parts of `tokio::sync::watch` the console core relies on:
//! conditional updates through `send_if_modified`, versioned receivers and
//! `wait_for`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::task::{Poll, Waker};

pub type Ref<'a, T> = std::cell::Ref<'a, T>;

pub mod error {
    use std::fmt;

    /// The sender was dropped.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecvError(pub(crate) ());

    impl fmt::Display for RecvError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "channel closed")
        }
    }

    impl std::error::Error for RecvError {}
}

use error::RecvError;

struct Shared<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    closed: Cell<bool>,
    waiters: RefCell<Vec<Waker>>,
}

impl<T> Shared<T> {
    fn notify(&self) {
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for waker in waiters {
            waker.wake();
        }
    }
}

pub struct Sender<T> {
    shared: Rc<Shared<T>>,
}

pub struct Receiver<T> {
    shared: Rc<Shared<T>>,
    seen: u64,
}

pub fn channel<T>(init: T) -> (Sender<T>, Receiver<T>) {
    let shared = Rc::new(Shared {
        value: RefCell::new(init),
        version: Cell::new(0),
        closed: Cell::new(false),
        waiters: RefCell::new(Vec::new()),
    });
    let rx = Receiver {
        shared: shared.clone(),
        seen: 0,
    };
    (Sender { shared }, rx)
}

impl<T> Sender<T> {
    /// Applies `modify` and notifies receivers only if it returned `true`.
    pub fn send_if_modified<F>(&self, modify: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        let modified = modify(&mut self.shared.value.borrow_mut());
        if modified {
            self.shared.version.set(self.shared.version.get() + 1);
            self.shared.notify();
        }
        modified
    }

    pub fn send_modify<F>(&self, modify: F)
    where
        F: FnOnce(&mut T),
    {
        self.send_if_modified(|value| {
            modify(value);
            true
        });
    }

    pub fn send_replace(&self, value: T) -> T {
        let previous = std::mem::replace(&mut *self.shared.value.borrow_mut(), value);
        self.shared.version.set(self.shared.version.get() + 1);
        self.shared.notify();
        previous
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.shared.value.borrow()
    }

    pub fn subscribe(&self) -> Receiver<T> {
        Receiver {
            shared: self.shared.clone(),
            seen: self.shared.version.get(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.shared.closed.set(true);
        self.shared.notify();
    }
}

impl<T> Receiver<T> {
    pub fn borrow(&self) -> Ref<'_, T> {
        self.shared.value.borrow()
    }

    pub fn borrow_and_update(&mut self) -> Ref<'_, T> {
        self.seen = self.shared.version.get();
        self.shared.value.borrow()
    }

    pub fn has_changed(&self) -> Result<bool, RecvError> {
        if self.shared.closed.get() {
            return Err(RecvError(()));
        }
        Ok(self.shared.version.get() != self.seen)
    }

    /// Waits for a value newer than the last one seen by this receiver.
    pub async fn changed(&mut self) -> Result<(), RecvError> {
        futures::future::poll_fn(|cx| {
            let version = self.shared.version.get();
            if version != self.seen {
                self.seen = version;
                return Poll::Ready(Ok(()));
            }
            if self.shared.closed.get() {
                return Poll::Ready(Err(RecvError(())));
            }
            let mut waiters = self.shared.waiters.borrow_mut();
            if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
                waiters.push(cx.waker().clone());
            }
            Poll::Pending
        })
        .await
    }

    /// Waits until the current value satisfies `condition`.
    pub async fn wait_for<F>(&mut self, mut condition: F) -> Result<Ref<'_, T>, RecvError>
    where
        F: FnMut(&T) -> bool,
    {
        loop {
            self.seen = self.shared.version.get();
            if condition(&self.shared.value.borrow()) {
                return Ok(self.shared.value.borrow());
            }
            self.changed().await?;
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            seen: self.seen,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("value", &*self.shared.value.borrow())
            .finish()
    }
}

impl<T: fmt::Debug> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("value", &*self.shared.value.borrow())
            .field("seen", &self.seen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_send_if_modified_skips_notification() {
        let (tx, rx) = channel(1);
        assert!(!tx.send_if_modified(|_| false));
        assert_eq!(rx.has_changed(), Ok(false));
        assert!(tx.send_if_modified(|v| {
            *v = 2;
            true
        }));
        assert_eq!(rx.has_changed(), Ok(true));
        assert_eq!(*rx.borrow(), 2);
    }

    #[wasm_bindgen_test]
    async fn test_wait_for_condition() {
        let (tx, mut rx) = channel(0u32);
        let handle = crate::task::spawn(async move {
            for _ in 0..3 {
                crate::task::yield_now().await;
                tx.send_modify(|v| *v += 1);
            }
            tx
        });
        let value = *rx.wait_for(|v| *v == 3).await.unwrap();
        assert_eq!(value, 3);
        drop(handle.await.unwrap());
        assert!(rx.changed().await.is_err());
    }
}
