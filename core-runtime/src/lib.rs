//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the console core:
//! - Logging and tracing infrastructure with PII redaction
//! - Configuration management (`ConsoleConfig`)
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one. It fixes the logging
//! conventions, the shape of the injected host bridges and the events that
//! flows broadcast to the UI host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::{AuthSettings, ConsoleConfig, ConsoleConfigBuilder, ReauthSettings};
pub use error::{Error, Result};
