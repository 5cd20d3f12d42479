//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the console
//! core.
//!
//! The core crates are written once against these traits; `bridge-desktop`
//! and `bridge-wasm` supply the concrete adapters.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - JSON/REST transport to the console backend
//! - [`PopupHost`](popup::PopupHost) / [`PopupWindow`](popup::PopupWindow) -
//!   browser window primitives used by the OAuth reauthorization flow
//! - [`Clock`](time::Clock) - time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - forwards structured logs to the host
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability
//! is missing:
//!
//! ```ignore
//! let popup_host = config.popup_host.clone().ok_or_else(|| Error::CapabilityMissing {
//!     capability: "PopupHost".to_string(),
//!     message: "OAuth reauthorization needs a window host. \
//!               Web: use bridge_wasm::WebPopupHost.".to_string(),
//! })?;
//! ```
//!
//! ## Thread Safety
//!
//! Native implementations must be `Send + Sync`. On `wasm32` the bounds are
//! dropped (see [`platform`]) because `web_sys` handles are not thread-safe.

pub mod error;
pub mod http;
pub mod platform;
pub mod popup;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use popup::{MessageSubscription, PopupFeatures, PopupHost, PopupWindow, WindowMessage};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
