//! WASM bindings for core-runtime
//!
//! Exposes logging setup and the event bus to JavaScript/TypeScript.

use crate::events::{CoreEvent, EventBus};
use crate::logging::{init_logging, LoggingConfig};
use bridge_traits::time::LogLevel;
use core_async::sync::broadcast::error::TryRecvError;
use wasm_bindgen::prelude::*;

fn to_js_error<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// =============================================================================
// Logging
// =============================================================================

#[wasm_bindgen]
#[derive(Clone, Default)]
pub struct JsLoggingConfig {
    inner: LoggingConfig,
}

#[wasm_bindgen]
impl JsLoggingConfig {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set minimum log level (0 = Trace, 1 = Debug, 2 = Info, 3 = Warn, 4 = Error)
    #[wasm_bindgen(js_name = setLevel)]
    pub fn set_level(&mut self, level: u8) {
        self.inner.level = match level {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Info,
        };
    }

    /// Include span timings in the browser performance panel
    #[wasm_bindgen(js_name = setSpans)]
    pub fn set_spans(&mut self, enable: bool) {
        self.inner.enable_spans = enable;
    }
}

#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging_js(config: JsLoggingConfig) -> Result<(), JsValue> {
    init_logging(config.inner).map_err(to_js_error)
}

// =============================================================================
// Events
// =============================================================================

#[wasm_bindgen]
pub struct JsEventBus {
    inner: EventBus,
}

impl JsEventBus {
    pub fn from_bus(bus: EventBus) -> Self {
        Self { inner: bus }
    }

    pub fn inner(&self) -> &EventBus {
        &self.inner
    }
}

#[wasm_bindgen]
impl JsEventBus {
    #[wasm_bindgen(constructor)]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: EventBus::new(capacity),
        }
    }

    #[wasm_bindgen(js_name = subscriberCount)]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    pub fn subscribe(&self) -> JsEventReceiver {
        JsEventReceiver {
            receiver: self.inner.subscribe(),
        }
    }
}

/// Yields events as JSON strings.
#[wasm_bindgen]
pub struct JsEventReceiver {
    receiver: core_async::sync::broadcast::Receiver<CoreEvent>,
}

#[wasm_bindgen]
impl JsEventReceiver {
    pub async fn recv(&mut self) -> Result<String, JsValue> {
        let event = self.receiver.recv().await.map_err(to_js_error)?;
        serde_json::to_string(&event).map_err(to_js_error)
    }

    /// Returns `null` when no event is queued.
    #[wasm_bindgen(js_name = tryRecv)]
    pub fn try_recv(&mut self) -> Result<Option<String>, JsValue> {
        match self.receiver.try_recv() {
            Ok(event) => serde_json::to_string(&event).map(Some).map_err(to_js_error),
            Err(TryRecvError::Empty) => Ok(None),
            Err(err) => Err(to_js_error(err)),
        }
    }
}
