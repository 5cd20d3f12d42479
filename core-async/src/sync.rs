//! Synchronization primitives.
//!
//! Native targets re-export `tokio::sync` and `tokio_util`'s
//! `CancellationToken`. WASM targets get single-threaded implementations
//! with the same method names, so controller code is written once.
//!
//! Only the primitives the console core needs are exposed: `watch` for
//! observable state snapshots, `broadcast` for the event bus and
//! `CancellationToken` for task teardown.

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::sync::{broadcast, watch};

#[cfg(not(target_arch = "wasm32"))]
pub use tokio_util::sync::CancellationToken;

#[cfg(target_arch = "wasm32")]
pub use crate::wasm::cancellation_token::CancellationToken;

#[cfg(target_arch = "wasm32")]
pub use crate::wasm::{broadcast, watch};
