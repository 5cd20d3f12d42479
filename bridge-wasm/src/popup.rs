//! Browser implementation of the popup bridge.
//!
//! `WebPopupHost` opens OAuth consent pages with `window.open`, exposes the
//! popup's `closed` flag and location, and turns `message` events on the
//! hosting window into a [`MessageSubscription`].

use bridge_traits::{
    error::Result as BridgeResult,
    popup::{MessageSubscription, PopupFeatures, PopupHost, PopupWindow, WindowMessage},
};
use futures::channel::mpsc;
use tracing::{debug, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{MessageEvent, Window};

use crate::error::WasmError;

/// Popup host bound to the current browser window.
#[derive(Clone)]
pub struct WebPopupHost {
    window: Window,
}

impl WebPopupHost {
    pub fn new() -> BridgeResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| WasmError::NotAvailable("window".to_string()))?;
        Ok(Self { window })
    }

    /// Centers `features` over the opener unless a position was given.
    fn place(&self, features: &PopupFeatures) -> PopupFeatures {
        if features.left.is_some() || features.top.is_some() {
            return *features;
        }

        let x = self.window.screen_x().unwrap_or(0);
        let y = self.window.screen_y().unwrap_or(0);
        let width = dimension(self.window.outer_width());
        let height = dimension(self.window.outer_height());

        match (width, height) {
            (Some(width), Some(height)) => features.centered_over(x, y, width, height),
            _ => *features,
        }
    }
}

fn dimension(value: Result<JsValue, JsValue>) -> Option<u32> {
    value
        .ok()
        .and_then(|v| v.as_f64())
        .filter(|v| *v > 0.0)
        .map(|v| v as u32)
}

impl PopupHost for WebPopupHost {
    fn origin(&self) -> String {
        self.window.location().origin().unwrap_or_default()
    }

    fn open_popup(
        &self,
        url: &str,
        name: &str,
        features: &PopupFeatures,
    ) -> Option<Box<dyn PopupWindow>> {
        let features = self.place(features).to_feature_string();
        match self
            .window
            .open_with_url_and_target_and_features(url, name, &features)
        {
            Ok(Some(popup)) => Some(Box::new(WebPopupWindow { window: popup })),
            Ok(None) => None,
            Err(err) => {
                warn!(error = %WasmError::from_js("window.open", err), "Popup could not be opened");
                None
            }
        }
    }

    fn subscribe_messages(&self) -> BridgeResult<MessageSubscription> {
        let (tx, rx) = mpsc::unbounded();

        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let Some(data) = decode_data(event.data()) else {
                debug!("Ignoring window message with undecodable payload");
                return;
            };
            let _ = tx.unbounded_send(WindowMessage {
                origin: event.origin(),
                data,
            });
        });

        self.window
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            .map_err(|err| WasmError::from_js("addEventListener(message)", err))?;

        let window = self.window.clone();
        Ok(MessageSubscription::new(rx, move || {
            if let Err(err) = window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            {
                warn!(error = %WasmError::from_js("removeEventListener(message)", err), "Message listener not removed");
            }
            drop(listener);
        }))
    }
}

/// Accepts structured-clone objects as well as JSON strings.
fn decode_data(data: JsValue) -> Option<serde_json::Value> {
    if let Some(text) = data.as_string() {
        return serde_json::from_str(&text).ok();
    }
    serde_wasm_bindgen::from_value(data).ok()
}

/// A window opened by [`WebPopupHost`].
struct WebPopupWindow {
    window: Window,
}

impl PopupWindow for WebPopupWindow {
    fn is_closed(&self) -> bool {
        self.window.closed().unwrap_or(true)
    }

    fn close(&self) {
        if let Err(err) = self.window.close() {
            debug!(error = %WasmError::from_js("window.close", err), "Popup close failed");
        }
    }

    fn location(&self) -> BridgeResult<String> {
        // Reading href throws a SecurityError while the popup is on the
        // provider's origin; from_js maps that to AccessDenied.
        self.window
            .location()
            .href()
            .map_err(|err| WasmError::from_js("popup location", err).into())
    }
}
