//! # Event Bus System
//!
//! Typed, broadcast events for the console core. Controllers emit; UI hosts,
//! analytics and tests subscribe.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ AuthFlowController ├────────>│           ├────────────>│ UI host    │
//! └────────────────────┘         │ EventBus  │             └────────────┘
//! ┌────────────────────┐  emit   │ (broadcast│  subscribe  ┌────────────┐
//! │ ReauthSession      ├────────>│  channel) ├────────────>│ Test probe │
//! └────────────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::CodeSent {
//!         flow: "login".to_string(),
//!         email: "a***@example.com".to_string(),
//!     }))
//!     .ok();
//! ```
//!
//! ## Event Types
//!
//! ### Authentication Events
//! - `CodeSent`: a one-time code was sent to an address
//! - `SessionEstablished`: terminal success of a login/signup/email-change flow
//! - `PasswordResetCompleted`: the reset flow finished
//! - `EmailChanged`: the account email was replaced
//! - `FlowReset`: a flow returned to its initial step
//! - `AuthError`: an operation failed and the error was returned to the caller
//!
//! ### Reauthorization Events
//! - `StatusChanged`: every status an OAuth session passes through
//! - `Resolved`: the session reached `success`, `error` or `cancelled`
//!
//! ## Error Handling
//!
//! `emit` fails only when nobody is subscribed. Controllers ignore that
//! failure: events are notifications, never part of the control flow.
//! Subscribers that fall behind receive `RecvError::Lagged(n)` and may keep
//! reading.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use core_async::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Auth(AuthEvent),
    Reauth(ReauthEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Reauth(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Warning,
            CoreEvent::Reauth(ReauthEvent::Resolved { outcome, .. }) if outcome == "error" => {
                EventSeverity::Warning
            }
            CoreEvent::Auth(AuthEvent::SessionEstablished { .. })
            | CoreEvent::Reauth(ReauthEvent::Resolved { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Flow names are the wire names (`login`, `signup`, `forgot_password`,
/// `change_email`). Email addresses are masked before they are emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    CodeSent {
        flow: String,
        email: String,
    },
    SessionEstablished {
        flow: String,
        user_id: String,
    },
    PasswordResetCompleted,
    EmailChanged {
        user_id: String,
    },
    FlowReset {
        flow: String,
    },
    AuthError {
        flow: String,
        message: String,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::CodeSent { .. } => "Verification code sent",
            AuthEvent::SessionEstablished { .. } => "Session established",
            AuthEvent::PasswordResetCompleted => "Password reset completed",
            AuthEvent::EmailChanged { .. } => "Account email changed",
            AuthEvent::FlowReset { .. } => "Authentication flow reset",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Reauthorization Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ReauthEvent {
    StatusChanged {
        session_id: String,
        instance_id: String,
        status: String,
    },
    Resolved {
        session_id: String,
        instance_id: String,
        provider: String,
        /// `success`, `error` or `cancelled`.
        outcome: String,
        message: Option<String>,
    },
}

impl ReauthEvent {
    fn description(&self) -> &str {
        match self {
            ReauthEvent::StatusChanged { .. } => "Reauthorization status changed",
            ReauthEvent::Resolved { .. } => "Reauthorization resolved",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A receiver with an optional predicate; non-matching events are skipped.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(outcome: &str) -> CoreEvent {
        CoreEvent::Reauth(ReauthEvent::Resolved {
            session_id: "s-1".to_string(),
            instance_id: "inst-1".to_string(),
            provider: "google".to_string(),
            outcome: outcome.to_string(),
            message: None,
        })
    }

    #[core_async::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Auth(AuthEvent::PasswordResetCompleted);

        assert!(bus.emit(event).is_err());
    }

    #[core_async::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = CoreEvent::Auth(AuthEvent::SessionEstablished {
            flow: "login".to_string(),
            user_id: "user-1".to_string(),
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Reauth(ReauthEvent::Resolved { .. })));

        bus.emit(CoreEvent::Reauth(ReauthEvent::StatusChanged {
            session_id: "s-1".to_string(),
            instance_id: "inst-1".to_string(),
            status: "waiting".to_string(),
        }))
        .ok();
        bus.emit(resolved("success")).ok();

        assert_eq!(stream.recv().await.unwrap(), resolved("success"));
        assert!(stream.try_recv().is_none());
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for _ in 0..5 {
            bus.emit(CoreEvent::Auth(AuthEvent::FlowReset {
                flow: "login".to_string(),
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let error_event = CoreEvent::Auth(AuthEvent::AuthError {
            flow: "login".to_string(),
            message: "Invalid email or password".to_string(),
        });
        assert_eq!(error_event.severity(), EventSeverity::Warning);
        assert_eq!(resolved("error").severity(), EventSeverity::Warning);
        assert_eq!(resolved("cancelled").severity(), EventSeverity::Info);
        assert_eq!(resolved("success").description(), "Reauthorization resolved");
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(resolved("success")).unwrap();
        assert_eq!(json["type"], "Reauth");
        assert_eq!(json["payload"]["event"], "Resolved");
        assert_eq!(json["payload"]["outcome"], "success");
    }
}
