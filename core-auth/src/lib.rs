//! # Authentication Module
//!
//! Client-side state machines for the console's account flows and for OAuth
//! reauthorization of connector instances.
//!
//! ## Overview
//!
//! - [`AuthFlowController`] drives login (password or one-time code),
//!   signup with email verification, password reset and email change. Every
//!   state-advancing action is validated locally, then sent through the
//!   [`AuthApi`] collaborator.
//! - [`OAuthReauthCoordinator`] runs one popup-based reauthorization per
//!   [`ReauthSession`], detecting completion by window message or by polling
//!   the popup, and always closing the popup on the way out.
//!
//! ## Features
//!
//! - Field-scoped local validation with readable messages
//! - Single in-flight request per controller; stale responses discarded after reset
//! - Resend cooldown driven by a cancel-on-drop timer task
//! - Exactly-once OTP submission for typed and pasted codes
//! - Auth and reauth events on the core event bus

pub mod api;
pub mod error;
pub mod flow;
pub mod otp;
pub mod providers;
pub mod reauth;
pub mod types;
pub mod validation;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use api::{AuthApi, HttpAuthApi, PasswordLoginResponse, RegisterResponse, ReauthStart};
pub use error::{AuthError, Result};
pub use flow::AuthFlowController;
pub use otp::OtpInput;
pub use providers::{ConnectorProvider, ProviderInfo};
pub use reauth::{OAuthReauthCoordinator, ReauthFailure, ReauthSession, ReauthState, ReauthStatus};
pub use types::{
    AuthFlow, AuthFlowState, AuthSession, AuthUser, ChangeEmailStep, FlowStep, LoginMethod,
    LoginStep, PasswordOutcome, PasswordResetStep, ResendOutcome, SignupDetails, SignupOutcome,
    SignupStep,
};
