//! Runtime-agnostic async layer for the MCP console core.
//!
//! Native targets run on Tokio; `wasm32` targets run on the browser event
//! loop through `wasm-bindgen-futures`. Every other crate in the workspace
//! schedules timers, spawns tasks and shares state through this crate so the
//! controllers compile unchanged for both.
//!
//! # Modules
//!
//! - `task`: spawning, plus [`task::ScopedTask`] for work that must not
//!   outlive its owner
//! - `time`: sleep, timeout, fixed-period intervals and monotonic instants
//! - `sync`: watch/broadcast/mpsc/oneshot channels and `CancellationToken`
//! - `runtime`: `block_on` for tests and synchronous entry points
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let ticker = task::spawn_scoped(|token| async move {
//!         while !token.is_cancelled() {
//!             sleep(Duration::from_secs(1)).await;
//!         }
//!     });
//!     // Dropping the handle cancels the loop.
//!     drop(ticker);
//! }
//! ```

pub use core_async_macros::test;

#[cfg(target_arch = "wasm32")]
pub mod test_support {
    pub use wasm_bindgen_test::wasm_bindgen_test;
}

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

#[cfg(target_arch = "wasm32")]
mod wasm;

pub use task::{spawn, spawn_scoped, ScopedTask};
pub use time::{sleep, Duration, Instant};
