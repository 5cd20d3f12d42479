//! Multi-producer, multi-consumer broadcast queue for the event bus.
//!
//! Each receiver owns a bounded queue. When a slow receiver falls more than
//! `capacity` values behind, the oldest values are dropped and the next
//! `recv` reports `Lagged(n)`, matching Tokio's semantics.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::task::{Poll, Waker};

pub mod error {
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RecvError {
        Closed,
        Lagged(u64),
    }

    impl fmt::Display for RecvError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                RecvError::Closed => write!(f, "channel closed"),
                RecvError::Lagged(n) => write!(f, "channel lagged by {n}"),
            }
        }
    }

    impl std::error::Error for RecvError {}

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TryRecvError {
        Empty,
        Closed,
        Lagged(u64),
    }

    impl fmt::Display for TryRecvError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                TryRecvError::Empty => write!(f, "channel empty"),
                TryRecvError::Closed => write!(f, "channel closed"),
                TryRecvError::Lagged(n) => write!(f, "channel lagged by {n}"),
            }
        }
    }

    impl std::error::Error for TryRecvError {}

    /// No receiver was alive to take the value.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SendError<T>(pub T);

    impl<T> fmt::Display for SendError<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "channel closed")
        }
    }

    impl<T: fmt::Debug> std::error::Error for SendError<T> {}
}

use error::{RecvError, SendError, TryRecvError};

struct Slot<T> {
    queue: RefCell<VecDeque<T>>,
    lagged: Cell<u64>,
    closed: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl<T> Slot<T> {
    fn wake(&self) {
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

struct Shared<T> {
    capacity: usize,
    senders: Cell<usize>,
    slots: RefCell<Vec<Weak<Slot<T>>>>,
}

impl<T> Shared<T> {
    fn attach(&self) -> Rc<Slot<T>> {
        let slot = Rc::new(Slot {
            queue: RefCell::new(VecDeque::new()),
            lagged: Cell::new(0),
            closed: Cell::new(self.senders.get() == 0),
            waker: RefCell::new(None),
        });
        self.slots.borrow_mut().push(Rc::downgrade(&slot));
        slot
    }
}

pub struct Sender<T> {
    shared: Rc<Shared<T>>,
}

pub struct Receiver<T> {
    shared: Rc<Shared<T>>,
    slot: Rc<Slot<T>>,
}

pub fn channel<T: Clone>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    assert!(capacity > 0, "broadcast channel capacity cannot be zero");
    let shared = Rc::new(Shared {
        capacity,
        senders: Cell::new(1),
        slots: RefCell::new(Vec::new()),
    });
    let slot = shared.attach();
    let rx = Receiver {
        shared: shared.clone(),
        slot,
    };
    (Sender { shared }, rx)
}

impl<T: Clone> Sender<T> {
    /// Delivers `value` to every live receiver and returns how many got it.
    pub fn send(&self, value: T) -> Result<usize, SendError<T>> {
        let mut slots = self.shared.slots.borrow_mut();
        slots.retain(|slot| slot.strong_count() > 0);
        if slots.is_empty() {
            return Err(SendError(value));
        }

        for slot in slots.iter().filter_map(Weak::upgrade) {
            let mut queue = slot.queue.borrow_mut();
            queue.push_back(value.clone());
            if queue.len() > self.shared.capacity {
                queue.pop_front();
                slot.lagged.set(slot.lagged.get() + 1);
            }
            drop(queue);
            slot.wake();
        }
        Ok(slots.len())
    }

    pub fn subscribe(&self) -> Receiver<T> {
        Receiver {
            shared: self.shared.clone(),
            slot: self.shared.attach(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.shared
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.set(self.shared.senders.get() + 1);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let remaining = self.shared.senders.get().saturating_sub(1);
        self.shared.senders.set(remaining);
        if remaining == 0 {
            for slot in self.shared.slots.borrow().iter().filter_map(Weak::upgrade) {
                slot.closed.set(true);
                slot.wake();
            }
        }
    }
}

impl<T: Clone> Receiver<T> {
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let lagged = self.slot.lagged.replace(0);
        if lagged > 0 {
            return Err(TryRecvError::Lagged(lagged));
        }
        if let Some(value) = self.slot.queue.borrow_mut().pop_front() {
            return Ok(value);
        }
        if self.slot.closed.get() {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    pub async fn recv(&mut self) -> Result<T, RecvError> {
        futures::future::poll_fn(|cx| match self.try_recv() {
            Ok(value) => Poll::Ready(Ok(value)),
            Err(TryRecvError::Lagged(n)) => Poll::Ready(Err(RecvError::Lagged(n))),
            Err(TryRecvError::Closed) => Poll::Ready(Err(RecvError::Closed)),
            Err(TryRecvError::Empty) => {
                *self.slot.waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
        })
        .await
    }

    pub fn resubscribe(&self) -> Self {
        Receiver {
            shared: self.shared.clone(),
            slot: self.shared.attach(),
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("senders", &self.shared.senders.get())
            .finish()
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("queued", &self.slot.queue.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_slow_receiver_reports_lag() {
        let (tx, mut rx) = channel(2);
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Lagged(2)));
        assert_eq!(rx.try_recv(), Ok(2));
        assert_eq!(rx.try_recv(), Ok(3));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[wasm_bindgen_test]
    async fn test_recv_after_sender_dropped() {
        let (tx, mut rx) = channel(4);
        tx.send("event").unwrap();
        drop(tx);
        assert_eq!(rx.recv().await, Ok("event"));
        assert_eq!(rx.recv().await, Err(RecvError::Closed));
    }
}
