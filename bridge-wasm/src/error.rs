//! Error types for WebAssembly bridge implementations

use bridge_traits::error::BridgeError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Result type for WebAssembly bridge operations
pub type WasmResult<T> = Result<T, WasmError>;

/// Errors raised while talking to browser APIs
#[derive(Error, Debug)]
pub enum WasmError {
    /// JavaScript error from web-sys
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// A browser global (window, location) is missing, e.g. inside a worker
    #[error("Browser API not available: {0}")]
    NotAvailable(String),

    /// The browser refused access, e.g. a cross-origin property read
    #[error("Access denied: {0}")]
    AccessDenied(String),
}

impl WasmError {
    /// Converts a thrown JavaScript value, prefixing it with `context`.
    pub fn from_js(context: &str, value: JsValue) -> Self {
        if is_security_error(&value) {
            return WasmError::AccessDenied(format!("{context}: {}", js_message(&value)));
        }
        WasmError::JavaScript(format!("{context}: {}", js_message(&value)))
    }
}

impl From<WasmError> for BridgeError {
    fn from(err: WasmError) -> Self {
        match err {
            WasmError::NotAvailable(what) => BridgeError::NotAvailable(what),
            WasmError::AccessDenied(what) => BridgeError::AccessDenied(what),
            WasmError::JavaScript(message) => BridgeError::OperationFailed(message),
        }
    }
}

impl From<JsValue> for WasmError {
    fn from(js_value: JsValue) -> Self {
        WasmError::JavaScript(js_message(&js_value))
    }
}

fn js_message(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        text
    } else if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        error.message().into()
    } else {
        format!("{value:?}")
    }
}

/// Cross-origin reads throw a `SecurityError` DOMException.
fn is_security_error(value: &JsValue) -> bool {
    value
        .dyn_ref::<web_sys::DomException>()
        .map(|e| e.name() == "SecurityError")
        .unwrap_or(false)
}
