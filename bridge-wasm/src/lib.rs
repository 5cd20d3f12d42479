//! WebAssembly Bridge Implementations
//!
//! This crate provides WebAssembly-compatible implementations of the bridge traits
//! defined in `bridge-traits`, using browser APIs through `web-sys` and
//! `wasm-bindgen`.
//!
//! # Platform Support
//!
//! This crate is designed exclusively for the `wasm32-unknown-unknown` target.
//! It will not compile for native targets.
//!
//! # Implementations
//!
//! - `WasmHttpClient`: `fetch` with credentials included and `AbortController` timeouts
//! - `WebPopupHost`: `window.open` popups and `message` event subscriptions
//!
//! # Examples
//!
//! ```ignore
//! use bridge_wasm::{WasmHttpClient, WebPopupHost};
//! use core_runtime::config::ConsoleConfig;
//! use std::sync::Arc;
//!
//! let config = ConsoleConfig::builder()
//!     .api_base_url("https://console.example.com/api")
//!     .http_client(Arc::new(WasmHttpClient::new()?))
//!     .popup_host(Arc::new(WebPopupHost::new()?))
//!     .build()?;
//! ```

#![cfg(target_arch = "wasm32")]

pub mod error;
pub mod http;
pub mod popup;

pub use error::{WasmError, WasmResult};
pub use http::WasmHttpClient;
pub use popup::WebPopupHost;
