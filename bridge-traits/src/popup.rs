//! Browser window primitives for OAuth popups.
//!
//! The OAuth reauthorization flow needs three things from its host: open a
//! sized popup, observe that popup (closed? where is it now?), and receive
//! cross-window messages together with the sender's origin. Keeping these
//! behind traits lets the coordinator run against a fake host in tests.

use futures::channel::mpsc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::platform::PlatformSendSync;

/// Size and placement of a popup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
    pub left: Option<i32>,
    pub top: Option<i32>,
}

impl PopupFeatures {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            left: None,
            top: None,
        }
    }

    /// Centers the popup over an opener of the given outer geometry.
    pub fn centered_over(mut self, opener_x: i32, opener_y: i32, opener_width: u32, opener_height: u32) -> Self {
        let dx = (opener_width as i64 - self.width as i64) / 2;
        let dy = (opener_height as i64 - self.height as i64) / 2;
        self.left = Some((opener_x as i64 + dx) as i32);
        self.top = Some((opener_y as i64 + dy) as i32);
        self
    }

    /// Renders the `window.open` feature string with standard chrome flags.
    pub fn to_feature_string(&self) -> String {
        let mut parts = vec![
            format!("width={}", self.width),
            format!("height={}", self.height),
        ];
        if let Some(left) = self.left {
            parts.push(format!("left={left}"));
        }
        if let Some(top) = self.top {
            parts.push(format!("top={top}"));
        }
        parts.push("toolbar=no,menubar=no,location=yes,status=no,scrollbars=yes,resizable=yes".to_string());
        parts.join(",")
    }
}

impl Default for PopupFeatures {
    fn default() -> Self {
        Self::new(600, 700)
    }
}

/// Handle to an open popup window.
pub trait PopupWindow: PlatformSendSync {
    fn is_closed(&self) -> bool;

    /// Closes the window. Calling it on an already-closed window is harmless.
    fn close(&self);

    /// Current location of the popup.
    ///
    /// Fails with `BridgeError::AccessDenied` while the popup is on another
    /// origin; callers treat that as "not back yet", not as an error.
    fn location(&self) -> Result<String>;
}

/// A message posted to the hosting window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    /// Origin of the sender as reported by the browser, never by the payload.
    pub origin: String,
    pub data: serde_json::Value,
}

#[cfg(not(target_arch = "wasm32"))]
type DetachFn = Box<dyn FnOnce() + Send>;

#[cfg(target_arch = "wasm32")]
type DetachFn = Box<dyn FnOnce()>;

/// Stream of window messages. Dropping it removes the underlying listener.
pub struct MessageSubscription {
    receiver: mpsc::UnboundedReceiver<WindowMessage>,
    detach: Option<DetachFn>,
}

impl MessageSubscription {
    /// Creates a subscription fed by `receiver`; `detach` runs exactly once
    /// when the subscription is dropped.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(
        receiver: mpsc::UnboundedReceiver<WindowMessage>,
        detach: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            detach: Some(Box::new(detach)),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new(
        receiver: mpsc::UnboundedReceiver<WindowMessage>,
        detach: impl FnOnce() + 'static,
    ) -> Self {
        Self {
            receiver,
            detach: Some(Box::new(detach)),
        }
    }

    /// Subscription with no listener to remove, fed by the returned sender.
    pub fn channel() -> (mpsc::UnboundedSender<WindowMessage>, Self) {
        let (tx, rx) = mpsc::unbounded();
        (
            tx,
            Self {
                receiver: rx,
                detach: None,
            },
        )
    }

    /// Next message, or `None` once the host side is gone.
    pub async fn next(&mut self) -> Option<WindowMessage> {
        self.receiver.next().await
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for MessageSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSubscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// The window hosting the console.
pub trait PopupHost: PlatformSendSync {
    /// Origin of the hosting page, e.g. `https://console.example.com`.
    fn origin(&self) -> String;

    /// Opens `url` in a named popup. `None` means the browser blocked it.
    fn open_popup(&self, url: &str, name: &str, features: &PopupFeatures) -> Option<Box<dyn PopupWindow>>;

    /// Starts listening for messages posted to the hosting window.
    fn subscribe_messages(&self) -> Result<MessageSubscription>;
}
