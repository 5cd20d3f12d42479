//! Shared fakes for the core-auth integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::popup::{
    MessageSubscription, PopupFeatures, PopupHost, PopupWindow, WindowMessage,
};
use core_async::sync::watch;
use core_auth::{
    AuthApi, AuthError, AuthSession, AuthUser, PasswordLoginResponse, ReauthStart,
    RegisterResponse, Result, SignupDetails,
};
use core_runtime::events::{CoreEvent, Receiver};
use futures::channel::mpsc;

pub const ORIGIN: &str = "https://console.example.com";

pub fn session_for(email: &str) -> AuthSession {
    AuthSession {
        user: AuthUser {
            id: "user-1".to_string(),
            email: email.to_string(),
            name: None,
        },
        expires_at: None,
    }
}

pub fn api_error(code: &str, message: &str) -> AuthError {
    AuthError::Api {
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// Everything currently buffered on an event receiver.
pub fn drain(receiver: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Auth API
// ============================================================================

/// Scriptable [`AuthApi`] that records calls and can hold requests open.
pub struct FakeAuthApi {
    calls: Mutex<Vec<(&'static str, Vec<String>)>>,
    failures: Mutex<HashMap<&'static str, AuthError>>,
    login_response: Mutex<Option<PasswordLoginResponse>>,
    register_response: Mutex<Option<RegisterResponse>>,
    gate: watch::Sender<bool>,
}

impl FakeAuthApi {
    pub fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            login_response: Mutex::new(None),
            register_response: Mutex::new(None),
            gate,
        })
    }

    /// Makes `operation` fail with `err` until cleared.
    pub fn fail(&self, operation: &'static str, err: AuthError) {
        self.failures.lock().unwrap().insert(operation, err);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn respond_to_login(&self, response: PasswordLoginResponse) {
        *self.login_response.lock().unwrap() = Some(response);
    }

    pub fn respond_to_register(&self, response: RegisterResponse) {
        *self.register_response.lock().unwrap() = Some(response);
    }

    /// Requests block until [`FakeAuthApi::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_args(&self, operation: &str) -> Option<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _)| *name == operation)
            .map(|(_, args)| args.clone())
    }

    async fn enter(&self, operation: &'static str, args: &[&str]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((operation, args.iter().map(|a| a.to_string()).collect()));

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        match self.failures.lock().unwrap().get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn request_otp(&self, email: &str) -> Result<()> {
        self.enter("request_otp", &[email]).await
    }

    async fn password_login(&self, email: &str, password: &str) -> Result<PasswordLoginResponse> {
        self.enter("password_login", &[email, password]).await?;
        let scripted = self.login_response.lock().unwrap().clone();
        Ok(scripted.unwrap_or_else(|| PasswordLoginResponse::Authenticated(session_for(email))))
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthSession> {
        self.enter("verify_otp", &[email, code]).await?;
        Ok(session_for(email))
    }

    async fn register(&self, details: &SignupDetails) -> Result<RegisterResponse> {
        self.enter("register", &[&details.email]).await?;
        let scripted = self.register_response.lock().unwrap().clone();
        Ok(scripted.unwrap_or_else(|| RegisterResponse::VerificationRequired {
            email: details.email.clone(),
        }))
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.enter("request_password_reset", &[email]).await
    }

    async fn reset_password(&self, email: &str, code: &str, _new_password: &str) -> Result<()> {
        self.enter("reset_password", &[email, code]).await
    }

    async fn request_email_change(&self, new_email: &str, _current_password: &str) -> Result<()> {
        self.enter("request_email_change", &[new_email]).await
    }

    async fn verify_email_change(&self, email: &str, code: &str) -> Result<AuthSession> {
        self.enter("verify_email_change", &[email, code]).await?;
        Ok(session_for(email))
    }

    async fn start_reauth(&self, instance_id: &str, provider: &str) -> Result<ReauthStart> {
        self.enter("start_reauth", &[instance_id, provider]).await?;
        Ok(ReauthStart {
            authorization_url: format!(
                "https://accounts.example.com/oauth/authorize?instance={instance_id}&provider={provider}"
            ),
        })
    }
}

// ============================================================================
// Popup host
// ============================================================================

/// Popup window state shared between the test and the coordinator.
pub struct FakePopup {
    pub url: String,
    pub features: PopupFeatures,
    closed: AtomicBool,
    closed_by_owner: AtomicBool,
    location: Mutex<Option<String>>,
}

impl FakePopup {
    /// The user closes the window.
    pub fn user_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Navigates the popup; `None` means it is on a foreign origin.
    pub fn navigate(&self, location: Option<&str>) {
        *self.location.lock().unwrap() = location.map(str::to_string);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn was_closed_by_owner(&self) -> bool {
        self.closed_by_owner.load(Ordering::SeqCst)
    }
}

struct FakePopupHandle(Arc<FakePopup>);

impl PopupWindow for FakePopupHandle {
    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    fn close(&self) {
        self.0.closed.store(true, Ordering::SeqCst);
        self.0.closed_by_owner.store(true, Ordering::SeqCst);
    }

    fn location(&self) -> BridgeResult<String> {
        match self.0.location.lock().unwrap().clone() {
            Some(location) => Ok(location),
            None => Err(BridgeError::AccessDenied(
                "cross-origin popup location".to_string(),
            )),
        }
    }
}

pub struct FakePopupHost {
    blocked: AtomicBool,
    popups: Mutex<Vec<Arc<FakePopup>>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<WindowMessage>>>,
    detached: Arc<AtomicUsize>,
}

impl FakePopupHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            blocked: AtomicBool::new(false),
            popups: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            detached: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Simulates a popup blocker.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn popup_count(&self) -> usize {
        self.popups.lock().unwrap().len()
    }

    pub fn last_popup(&self) -> Arc<FakePopup> {
        self.popups
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no popup was opened")
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn detached_count(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }

    /// Posts a message to every live listener.
    pub fn post(&self, origin: &str, data: serde_json::Value) {
        let message = WindowMessage {
            origin: origin.to_string(),
            data,
        };
        self.listeners
            .lock()
            .unwrap()
            .retain(|listener| listener.unbounded_send(message.clone()).is_ok());
    }
}

impl PopupHost for FakePopupHost {
    fn origin(&self) -> String {
        ORIGIN.to_string()
    }

    fn open_popup(
        &self,
        url: &str,
        _name: &str,
        features: &PopupFeatures,
    ) -> Option<Box<dyn PopupWindow>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        let popup = Arc::new(FakePopup {
            url: url.to_string(),
            features: *features,
            closed: AtomicBool::new(false),
            closed_by_owner: AtomicBool::new(false),
            location: Mutex::new(None),
        });
        self.popups.lock().unwrap().push(popup.clone());
        Some(Box::new(FakePopupHandle(popup)))
    }

    fn subscribe_messages(&self) -> BridgeResult<MessageSubscription> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.lock().unwrap().push(tx);
        let detached = self.detached.clone();
        Ok(MessageSubscription::new(rx, move || {
            detached.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
