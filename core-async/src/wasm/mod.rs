//! Single-threaded implementations backing the public API on `wasm32`.
//!
//! Everything here runs on the browser event loop, so shared state lives in
//! `Rc<RefCell<_>>` and waiters are plain `Waker` lists. The method names
//! mirror their Tokio counterparts so callers need no `cfg` of their own.

pub mod broadcast;
pub mod cancellation_token;
pub mod runtime;
pub mod task;
pub mod watch;
