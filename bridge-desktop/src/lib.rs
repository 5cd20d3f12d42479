//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! Desktop hosts have no browser window to open OAuth popups in, so only the
//! HTTP transport lives here:
//! - `HttpClient` using `reqwest`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use core_runtime::config::ConsoleConfig;
//! use std::sync::Arc;
//!
//! let config = ConsoleConfig::builder()
//!     .api_base_url("https://console.example.com/api")
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .build()?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
