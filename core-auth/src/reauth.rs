//! # OAuth Reauthorization
//!
//! Re-obtains a provider grant for a connector instance whose stored OAuth
//! credentials were revoked or expired, using a popup window as the consent
//! surface.
//!
//! ## State machine
//!
//! ```text
//! opening -> waiting        popup opened
//! opening -> error          popup blocked, or the authorization URL request failed
//! waiting -> processing     success message, or same-origin return seen by polling
//! waiting -> error          popup closed by the user, or error message received
//! processing -> success     after the confirmation delay
//! error -> opening          retry()
//! any non-terminal -> cancelled
//! ```
//!
//! ## Completion detection
//!
//! Two paths run side by side inside one monitor task:
//!
//! 1. Window messages `{ type: "OAUTH_SUCCESS" | "OAUTH_ERROR", instanceId, error? }`,
//!    accepted only when the sender origin equals the host origin and the
//!    instance id matches the session.
//! 2. A poll every `poll_interval` that detects a closed popup or a popup that
//!    has navigated back to the host origin.
//!
//! Whichever fires first wins; the status check inside every transition
//! turns the other into a no-op.
//!
//! ## Teardown
//!
//! The popup is closed before any terminal state is published. `cancel()` and
//! dropping the [`ReauthSession`] stop the monitor task, remove the message
//! listener and close the popup.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bridge_traits::error::BridgeError;
use bridge_traits::popup::{MessageSubscription, PopupHost, PopupWindow, WindowMessage};
use core_async::sync::watch;
use core_async::task::{spawn_scoped, ScopedTask};
use core_async::time::{interval, sleep};
use core_runtime::config::ReauthSettings;
use core_runtime::events::{CoreEvent, EventBus, ReauthEvent};
use futures::future::{select, Either};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::api::AuthApi;
use crate::error::{AuthError, Result};
use crate::providers::ConnectorProvider;

const POPUP_WINDOW_NAME: &str = "mcp_oauth_reauth";

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReauthStatus {
    Opening,
    Waiting,
    Processing,
    Success,
    Error,
    Cancelled,
}

impl ReauthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReauthStatus::Opening => "opening",
            ReauthStatus::Waiting => "waiting",
            ReauthStatus::Processing => "processing",
            ReauthStatus::Success => "success",
            ReauthStatus::Error => "error",
            ReauthStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReauthStatus::Success | ReauthStatus::Error | ReauthStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: ReauthStatus) -> bool {
        use ReauthStatus::*;

        match (self, next) {
            (Opening, Waiting) | (Opening, Error) => true,
            (Waiting, Processing) | (Waiting, Error) => true,
            (Processing, Success) => true,
            (Error, Opening) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ReauthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended in `error` (or `cancelled`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ReauthFailure {
    PopupBlocked,
    /// The popup was closed before the provider redirected back.
    UserCancelled,
    /// The provider reported an error; carries its text when it sent one.
    Provider(Option<String>),
    /// The authorization URL could not be obtained, or the host refused to
    /// deliver window messages.
    Request(String),
}

impl ReauthFailure {
    pub fn message(&self, provider: &ConnectorProvider) -> String {
        match self {
            ReauthFailure::PopupBlocked => {
                "Popup was blocked. Allow popups for this site and try again.".to_string()
            }
            ReauthFailure::UserCancelled => {
                "The authorization window was closed before completing.".to_string()
            }
            ReauthFailure::Provider(Some(text)) if !text.trim().is_empty() => text.clone(),
            ReauthFailure::Provider(_) => format!(
                "{} authorization failed. Please try again.",
                provider.info().display_name
            ),
            ReauthFailure::Request(message) => message.clone(),
        }
    }
}

/// Read-only snapshot of a reauthorization session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReauthState {
    pub status: ReauthStatus,
    pub last_error: Option<String>,
    pub failure: Option<ReauthFailure>,
    pub popup_open: bool,
}

impl ReauthState {
    fn opening() -> Self {
        Self {
            status: ReauthStatus::Opening,
            last_error: None,
            failure: None,
            popup_open: false,
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Starts reauthorization sessions. Cloning is cheap.
#[derive(Clone)]
pub struct OAuthReauthCoordinator {
    api: Arc<dyn AuthApi>,
    host: Arc<dyn PopupHost>,
    event_bus: EventBus,
    settings: ReauthSettings,
}

impl OAuthReauthCoordinator {
    pub fn new(
        api: Arc<dyn AuthApi>,
        host: Arc<dyn PopupHost>,
        event_bus: EventBus,
        settings: ReauthSettings,
    ) -> Self {
        Self {
            api,
            host,
            event_bus,
            settings,
        }
    }

    /// Starts a session for `instance_id`.
    ///
    /// Fails only for an empty instance id. A blocked popup or a failed
    /// authorization URL request is reported through the session's `error`
    /// state so the caller can offer [`ReauthSession::retry`].
    #[instrument(skip(self), fields(session_id))]
    pub async fn begin(&self, instance_id: &str, provider: &str) -> Result<ReauthSession> {
        let instance_id = instance_id.trim();
        if instance_id.is_empty() {
            return Err(AuthError::validation(
                "instance_id",
                "Connector instance is required",
            ));
        }

        let session_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("session_id", session_id.as_str());

        let (state, _) = watch::channel(ReauthState::opening());
        let shared = Arc::new(Shared {
            session_id,
            instance_id: instance_id.to_string(),
            provider: ConnectorProvider::from_slug(provider),
            api: Arc::clone(&self.api),
            host: Arc::clone(&self.host),
            event_bus: self.event_bus.clone(),
            settings: self.settings.clone(),
            state,
            popup: Mutex::new(None),
        });
        shared.emit_status(ReauthStatus::Opening);

        let session = ReauthSession {
            shared,
            monitor: Mutex::new(None),
        };
        session.attempt().await;
        Ok(session)
    }
}

impl fmt::Debug for OAuthReauthCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthReauthCoordinator")
            .field("settings", &self.settings)
            .finish()
    }
}

// ============================================================================
// Session
// ============================================================================

/// One reauthorization attempt and its popup.
pub struct ReauthSession {
    shared: Arc<Shared>,
    monitor: Mutex<Option<ScopedTask>>,
}

struct Shared {
    session_id: String,
    instance_id: String,
    provider: ConnectorProvider,
    api: Arc<dyn AuthApi>,
    host: Arc<dyn PopupHost>,
    event_bus: EventBus,
    settings: ReauthSettings,
    state: watch::Sender<ReauthState>,
    popup: Mutex<Option<Box<dyn PopupWindow>>>,
}

impl ReauthSession {
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn instance_id(&self) -> &str {
        &self.shared.instance_id
    }

    pub fn provider(&self) -> &ConnectorProvider {
        &self.shared.provider
    }

    pub fn status(&self) -> ReauthStatus {
        self.shared.state.borrow().status
    }

    pub fn snapshot(&self) -> ReauthState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReauthState> {
        self.shared.state.subscribe()
    }

    /// Whether the monitor task is still watching the popup.
    pub fn is_monitoring(&self) -> bool {
        let running = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_cancelled());
        running && matches!(self.status(), ReauthStatus::Waiting | ReauthStatus::Processing)
    }

    /// Waits until the session reaches `success`, `error` or `cancelled`.
    pub async fn wait_resolved(&self) -> ReauthState {
        let mut receiver = self.shared.state.subscribe();
        let resolved = receiver
            .wait_for(|state| state.status.is_terminal())
            .await
            .map(|state| state.clone());

        match resolved {
            Ok(state) => state,
            Err(_) => self.snapshot(),
        }
    }

    /// Starts over from `error` with the same instance and provider.
    #[instrument(skip(self), fields(session_id = %self.shared.session_id))]
    pub async fn retry(&self) -> Result<()> {
        let status = self.status();
        if status != ReauthStatus::Error {
            return Err(AuthError::invalid_step("retry", status));
        }
        if !self.shared.transition(ReauthStatus::Opening, None) {
            return Err(AuthError::invalid_step("retry", self.status()));
        }
        info!(instance_id = %self.shared.instance_id, "Retrying reauthorization");
        self.attempt().await;
        Ok(())
    }

    /// Closes the popup, stops polling and removes the message listener.
    /// Idempotent; a session that already resolved keeps its status.
    pub fn cancel(&self) {
        self.stop_monitor();
        if self.shared.transition(ReauthStatus::Cancelled, None) {
            info!(session_id = %self.shared.session_id, "Reauthorization cancelled");
        }
        self.shared.close_popup();
    }

    fn stop_monitor(&self) {
        let task = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(task);
    }

    /// Runs one `opening` phase: listen, fetch the URL, open the popup, then
    /// hand over to the monitor task.
    async fn attempt(&self) {
        self.stop_monitor();
        let shared = &self.shared;

        let messages = match shared.host.subscribe_messages() {
            Ok(messages) => messages,
            Err(err) => {
                warn!(error = %err, "Cannot listen for popup messages");
                shared.fail(ReauthFailure::Request(bridge_failure_message(&err)));
                return;
            }
        };

        let start = match shared
            .api
            .start_reauth(&shared.instance_id, shared.provider.slug())
            .await
        {
            Ok(start) => start,
            Err(err) => {
                warn!(error = %err, "Failed to obtain authorization URL");
                shared.fail(ReauthFailure::Request(err.user_message()));
                return;
            }
        };

        if shared.state.borrow().status != ReauthStatus::Opening {
            debug!("Session left opening while the authorization URL was requested");
            return;
        }

        let popup = shared.host.open_popup(
            &start.authorization_url,
            POPUP_WINDOW_NAME,
            &shared.settings.popup,
        );
        let Some(popup) = popup else {
            warn!("Popup blocked by the browser");
            shared.fail(ReauthFailure::PopupBlocked);
            return;
        };

        *shared.popup.lock().unwrap_or_else(PoisonError::into_inner) = Some(popup);
        if !shared.transition(ReauthStatus::Waiting, None) {
            shared.close_popup();
            return;
        }

        let monitored = Arc::clone(shared);
        let task = spawn_scoped(move |_token| monitor(monitored, messages));
        let previous = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        drop(previous);
    }
}

impl Drop for ReauthSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for ReauthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReauthSession")
            .field("session_id", &self.shared.session_id)
            .field("instance_id", &self.shared.instance_id)
            .field("provider", &self.shared.provider.slug())
            .field("status", &self.status())
            .finish()
    }
}

impl Shared {
    /// Applies a transition if the state machine allows it. Returns whether it
    /// was applied. Entering `processing` or a terminal state closes the
    /// popup first.
    fn transition(&self, next: ReauthStatus, failure: Option<ReauthFailure>) -> bool {
        if next == ReauthStatus::Processing || next.is_terminal() {
            let current = self.state.borrow().status;
            if current.can_transition_to(next) {
                self.close_popup();
            }
        }

        let last_error = failure.as_ref().map(|f| f.message(&self.provider));
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if !state.status.can_transition_to(next) {
                return false;
            }
            state.status = next;
            state.failure = failure;
            state.last_error = last_error;
            state.popup_open = next == ReauthStatus::Waiting;
            applied = true;
            true
        });

        if applied {
            debug!(session_id = %self.session_id, status = %next, "Reauthorization status changed");
            self.emit_status(next);
            if next.is_terminal() {
                self.emit_resolved();
            }
        }
        applied
    }

    fn fail(&self, failure: ReauthFailure) -> bool {
        self.transition(ReauthStatus::Error, Some(failure))
    }

    fn close_popup(&self) {
        let popup = self
            .popup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(popup) = popup {
            popup.close();
        }
    }

    fn emit_status(&self, status: ReauthStatus) {
        let _ = self
            .event_bus
            .emit(CoreEvent::Reauth(ReauthEvent::StatusChanged {
                session_id: self.session_id.clone(),
                instance_id: self.instance_id.clone(),
                status: status.as_str().to_string(),
            }));
    }

    fn emit_resolved(&self) {
        let state = self.state.borrow().clone();
        match state.status {
            ReauthStatus::Success => info!(instance_id = %self.instance_id, "Reauthorization succeeded"),
            status => info!(
                instance_id = %self.instance_id,
                status = %status,
                error = state.last_error.as_deref().unwrap_or(""),
                "Reauthorization ended"
            ),
        }
        let _ = self.event_bus.emit(CoreEvent::Reauth(ReauthEvent::Resolved {
            session_id: self.session_id.clone(),
            instance_id: self.instance_id.clone(),
            provider: self.provider.slug().to_string(),
            outcome: state.status.as_str().to_string(),
            message: state.last_error,
        }));
    }

    fn is_settling(&self) -> bool {
        let status = self.state.borrow().status;
        status == ReauthStatus::Processing || status.is_terminal()
    }

    /// Moves to `processing`, waits out the confirmation delay, then `success`.
    async fn complete(&self) {
        if !self.transition(ReauthStatus::Processing, None) {
            return;
        }
        sleep(self.settings.confirmation_delay).await;
        self.transition(ReauthStatus::Success, None);
    }

    async fn handle_message(&self, message: WindowMessage) {
        if self.is_settling() {
            return;
        }

        if !same_origin(&message.origin, &self.host.origin()) {
            debug!(origin = %message.origin, "Ignoring message from foreign origin");
            return;
        }

        let parsed: PopupMessage = match serde_json::from_value(message.data) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(error = %err, "Ignoring unrecognized window message");
                return;
            }
        };

        if parsed.instance_id() != self.instance_id {
            debug!(
                expected = %self.instance_id,
                received = %parsed.instance_id(),
                "Ignoring message for another instance"
            );
            return;
        }

        match parsed {
            PopupMessage::Success { .. } => self.complete().await,
            PopupMessage::Error { error, .. } => {
                self.fail(ReauthFailure::Provider(error));
            }
        }
    }

    async fn poll_popup(&self) {
        if self.is_settling() {
            return;
        }

        let check = {
            let popup = self.popup.lock().unwrap_or_else(PoisonError::into_inner);
            match popup.as_ref() {
                None => PopupCheck::Closed,
                Some(popup) if popup.is_closed() => PopupCheck::Closed,
                Some(popup) => match popup.location() {
                    Ok(location) => PopupCheck::Location(location),
                    // Still on the provider's origin.
                    Err(BridgeError::AccessDenied(_)) => PopupCheck::Pending,
                    Err(err) => {
                        debug!(error = %err, "Popup location unavailable");
                        PopupCheck::Pending
                    }
                },
            }
        };

        match check {
            PopupCheck::Pending => {}
            PopupCheck::Closed => {
                info!(instance_id = %self.instance_id, "Popup closed before completion");
                self.fail(ReauthFailure::UserCancelled);
            }
            PopupCheck::Location(location) => match classify_return(&location, &self.host.origin())
            {
                ReturnCheck::Pending => {}
                ReturnCheck::Completed => self.complete().await,
                ReturnCheck::Failed(error) => {
                    self.fail(ReauthFailure::Provider(error));
                }
            },
        }
    }
}

/// Watches the popup until the session settles.
///
/// The poll runs on a fixed schedule no matter how many window messages
/// arrive in between.
async fn monitor(shared: Arc<Shared>, mut messages: MessageSubscription) {
    let mut ticker = interval(shared.settings.poll_interval);
    let mut listening = true;

    loop {
        if shared.state.borrow().status.is_terminal() {
            break;
        }

        if listening {
            let tick = ticker.tick();
            let next = messages.next();
            futures::pin_mut!(tick);
            futures::pin_mut!(next);

            match select(next, tick).await {
                Either::Left((Some(message), _)) => shared.handle_message(message).await,
                Either::Left((None, _)) => {
                    debug!("Message channel closed; relying on polling");
                    listening = false;
                }
                Either::Right(_) => shared.poll_popup().await,
            }
        } else {
            ticker.tick().await;
            shared.poll_popup().await;
        }
    }

    debug!(session_id = %shared.session_id, "Popup monitor stopped");
}

// ============================================================================
// Message and location parsing
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum PopupMessage {
    #[serde(rename = "OAUTH_SUCCESS")]
    Success {
        #[serde(rename = "instanceId")]
        instance_id: String,
    },
    #[serde(rename = "OAUTH_ERROR")]
    Error {
        #[serde(rename = "instanceId")]
        instance_id: String,
        #[serde(default)]
        error: Option<String>,
    },
}

impl PopupMessage {
    fn instance_id(&self) -> &str {
        match self {
            PopupMessage::Success { instance_id } | PopupMessage::Error { instance_id, .. } => {
                instance_id
            }
        }
    }
}

enum PopupCheck {
    Pending,
    Closed,
    Location(String),
}

#[derive(Debug, PartialEq, Eq)]
enum ReturnCheck {
    Pending,
    Completed,
    Failed(Option<String>),
}

fn same_origin(candidate: &str, host_origin: &str) -> bool {
    match (Url::parse(candidate), Url::parse(host_origin)) {
        (Ok(candidate), Ok(host)) => {
            let origin = candidate.origin();
            origin.is_tuple() && origin == host.origin()
        }
        _ => false,
    }
}

/// Inspects a popup location that the host was allowed to read.
fn classify_return(location: &str, host_origin: &str) -> ReturnCheck {
    let Ok(url) = Url::parse(location) else {
        return ReturnCheck::Pending;
    };
    if !same_origin(url.as_str(), host_origin) {
        return ReturnCheck::Pending;
    }

    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    match (error, description) {
        (None, None) => ReturnCheck::Completed,
        (error, description) => ReturnCheck::Failed(description.or(error)),
    }
}

fn bridge_failure_message(err: &BridgeError) -> String {
    match err {
        BridgeError::NotAvailable(_) => {
            "Reauthorization is not available in this window.".to_string()
        }
        _ => crate::error::GENERIC_FAILURE_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://console.example.com";

    #[test]
    fn test_transition_table() {
        use ReauthStatus::*;

        assert!(Opening.can_transition_to(Waiting));
        assert!(Opening.can_transition_to(Error));
        assert!(Waiting.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Success));
        assert!(Error.can_transition_to(Opening));

        assert!(!Waiting.can_transition_to(Success));
        assert!(!Success.can_transition_to(Error));
        assert!(!Processing.can_transition_to(Error));

        for status in [Opening, Waiting, Processing] {
            assert!(status.can_transition_to(Cancelled));
        }
        for status in [Success, Error, Cancelled] {
            assert!(!status.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn test_same_origin_requires_tuple_origin() {
        assert!(same_origin("https://console.example.com", ORIGIN));
        assert!(same_origin("https://console.example.com/oauth/done?x=1", ORIGIN));
        assert!(!same_origin("https://evil.example.com", ORIGIN));
        assert!(!same_origin("http://console.example.com", ORIGIN));
        assert!(!same_origin("about:blank", ORIGIN));
        assert!(!same_origin("null", ORIGIN));
    }

    #[test]
    fn test_classify_return() {
        assert_eq!(classify_return("about:blank", ORIGIN), ReturnCheck::Pending);
        assert_eq!(
            classify_return("https://accounts.google.com/o/oauth2", ORIGIN),
            ReturnCheck::Pending
        );
        assert_eq!(
            classify_return("https://console.example.com/oauth/callback?code=abc", ORIGIN),
            ReturnCheck::Completed
        );
        assert_eq!(
            classify_return(
                "https://console.example.com/oauth/callback?error=access_denied&error_description=User%20denied%20access",
                ORIGIN
            ),
            ReturnCheck::Failed(Some("User denied access".to_string()))
        );
        assert_eq!(
            classify_return("https://console.example.com/cb?error=access_denied", ORIGIN),
            ReturnCheck::Failed(Some("access_denied".to_string()))
        );
    }

    #[test]
    fn test_popup_message_decoding() {
        let success: PopupMessage = serde_json::from_value(serde_json::json!({
            "type": "OAUTH_SUCCESS",
            "instanceId": "inst-1"
        }))
        .unwrap();
        assert_eq!(success.instance_id(), "inst-1");

        let error: PopupMessage = serde_json::from_value(serde_json::json!({
            "type": "OAUTH_ERROR",
            "instanceId": "inst-1",
            "error": "Consent revoked"
        }))
        .unwrap();
        assert!(matches!(error, PopupMessage::Error { error: Some(ref e), .. } if e == "Consent revoked"));

        let unknown = serde_json::from_value::<PopupMessage>(serde_json::json!({
            "type": "SOMETHING_ELSE",
            "instanceId": "inst-1"
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_failure_messages() {
        let github = ConnectorProvider::GitHub;
        assert!(ReauthFailure::PopupBlocked
            .message(&github)
            .contains("Allow popups"));
        assert_eq!(
            ReauthFailure::Provider(Some("Token revoked".into())).message(&github),
            "Token revoked"
        );
        assert_eq!(
            ReauthFailure::Provider(None).message(&github),
            "GitHub authorization failed. Please try again."
        );
        assert_eq!(
            ReauthFailure::Provider(Some("  ".into())).message(&ConnectorProvider::from_slug("acme")),
            "Connector authorization failed. Please try again."
        );
    }
}
