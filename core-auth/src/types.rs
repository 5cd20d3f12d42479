use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Top-level authentication flows.
///
/// # Examples
///
/// ```
/// use core_auth::{AuthFlow, FlowStep, LoginStep};
///
/// assert_eq!(AuthFlow::Login.as_str(), "login");
/// assert_eq!(AuthFlow::Login.initial_step(), FlowStep::Login(LoginStep::CollectingEmail));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    Login,
    Signup,
    ForgotPassword,
    ChangeEmail,
}

impl AuthFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFlow::Login => "login",
            AuthFlow::Signup => "signup",
            AuthFlow::ForgotPassword => "forgot_password",
            AuthFlow::ChangeEmail => "change_email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "login" => Some(AuthFlow::Login),
            "signup" => Some(AuthFlow::Signup),
            "forgot_password" => Some(AuthFlow::ForgotPassword),
            "change_email" => Some(AuthFlow::ChangeEmail),
            _ => None,
        }
    }

    pub fn initial_step(&self) -> FlowStep {
        match self {
            AuthFlow::Login => FlowStep::Login(LoginStep::CollectingEmail),
            AuthFlow::Signup => FlowStep::Signup(SignupStep::CollectingDetails),
            AuthFlow::ForgotPassword => {
                FlowStep::ForgotPassword(PasswordResetStep::CollectingEmail)
            }
            AuthFlow::ChangeEmail => FlowStep::ChangeEmail(ChangeEmailStep::ChangeRequest),
        }
    }
}

impl fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStep {
    CollectingEmail,
    CollectingPassword,
    OtpVerification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupStep {
    CollectingDetails,
    EmailVerification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordResetStep {
    CollectingEmail,
    OtpAndNewPassword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEmailStep {
    ChangeRequest,
    OtpVerification,
}

/// Position within a flow.
///
/// The variant names the flow, so a step can never belong to a flow other
/// than the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "flow", content = "step", rename_all = "snake_case")]
pub enum FlowStep {
    Login(LoginStep),
    Signup(SignupStep),
    ForgotPassword(PasswordResetStep),
    ChangeEmail(ChangeEmailStep),
}

impl FlowStep {
    pub fn flow(&self) -> AuthFlow {
        match self {
            FlowStep::Login(_) => AuthFlow::Login,
            FlowStep::Signup(_) => AuthFlow::Signup,
            FlowStep::ForgotPassword(_) => AuthFlow::ForgotPassword,
            FlowStep::ChangeEmail(_) => AuthFlow::ChangeEmail,
        }
    }

    /// Steps where the user types a one-time code.
    pub fn is_otp_entry(&self) -> bool {
        matches!(
            self,
            FlowStep::Login(LoginStep::OtpVerification)
                | FlowStep::Signup(SignupStep::EmailVerification)
                | FlowStep::ForgotPassword(PasswordResetStep::OtpAndNewPassword)
                | FlowStep::ChangeEmail(ChangeEmailStep::OtpVerification)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStep::Login(LoginStep::CollectingEmail) => "collecting_email",
            FlowStep::Login(LoginStep::CollectingPassword) => "collecting_password",
            FlowStep::Login(LoginStep::OtpVerification) => "otp_verification",
            FlowStep::Signup(SignupStep::CollectingDetails) => "collecting_details",
            FlowStep::Signup(SignupStep::EmailVerification) => "email_verification",
            FlowStep::ForgotPassword(PasswordResetStep::CollectingEmail) => "collecting_email",
            FlowStep::ForgotPassword(PasswordResetStep::OtpAndNewPassword) => {
                "otp_and_new_password"
            }
            FlowStep::ChangeEmail(ChangeEmailStep::ChangeRequest) => "change_request",
            FlowStep::ChangeEmail(ChangeEmailStep::OtpVerification) => "otp_verification",
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.flow(), self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    #[default]
    Password,
    Otp,
}

/// Read-only snapshot of a controller's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFlowState {
    pub step: FlowStep,
    /// Address the most recent code was sent to.
    pub pending_email: Option<String>,
    /// Zero whenever `step` is not an OTP-entry step.
    pub resend_cooldown_secs: u32,
    pub login_method: LoginMethod,
    /// A state-advancing request is awaiting its response.
    pub in_flight: bool,
}

impl AuthFlowState {
    pub fn initial(flow: AuthFlow, login_method: LoginMethod) -> Self {
        Self {
            step: flow.initial_step(),
            pending_email: None,
            resend_cooldown_secs: 0,
            login_method,
            in_flight: false,
        }
    }

    pub fn flow(&self) -> AuthFlow {
        self.step.flow()
    }

    pub fn can_resend(&self) -> bool {
        self.step.is_otp_entry()
            && self.pending_email.is_some()
            && self.resend_cooldown_secs == 0
            && !self.in_flight
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Authenticated session returned by the backend. The session credential
/// itself travels as an HTTP-only cookie and is never visible here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: AuthUser,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Sessions without an expiry are treated as live until the backend
    /// says otherwise.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Registration form input.
#[derive(Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupDetails {
    #[validate(custom(function = "crate::validation::validate_name"))]
    pub name: String,
    #[validate(custom(function = "crate::validation::validate_email"))]
    pub email: String,
    #[validate(custom(function = "crate::validation::validate_password_strength"))]
    pub password: String,
    /// Checked locally only; never sent to the backend.
    #[serde(skip_serializing, default)]
    #[validate(must_match(
        other = "password",
        code = "password_mismatch",
        message = "Passwords do not match"
    ))]
    pub confirm_password: String,
}

impl SignupDetails {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
        }
    }
}

impl fmt::Debug for SignupDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupDetails")
            .field("name", &self.name)
            .field("email", &core_runtime::logging::redact_email(&self.email))
            .field("password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .finish()
    }
}

/// Result of `submit_password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordOutcome {
    Authenticated(AuthSession),
    /// A code was sent; the controller now expects `verify_otp`.
    VerificationRequired { email: String },
}

/// Result of `start_signup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    /// The account was verified on creation.
    Authenticated(AuthSession),
    VerificationRequired { email: String },
}

/// Result of `resend_otp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    /// Guarded no-op; nothing was sent.
    CoolingDown { remaining_secs: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_steps_belong_to_flow() {
        for flow in [
            AuthFlow::Login,
            AuthFlow::Signup,
            AuthFlow::ForgotPassword,
            AuthFlow::ChangeEmail,
        ] {
            let step = flow.initial_step();
            assert_eq!(step.flow(), flow);
            assert!(!step.is_otp_entry());
            assert_eq!(AuthFlow::parse(flow.as_str()), Some(flow));
        }
    }

    #[test]
    fn test_step_display() {
        let step = FlowStep::ForgotPassword(PasswordResetStep::OtpAndNewPassword);
        assert_eq!(step.to_string(), "forgot_password/otp_and_new_password");
        assert!(step.is_otp_entry());
    }

    #[test]
    fn test_can_resend() {
        let mut state = AuthFlowState::initial(AuthFlow::Login, LoginMethod::Otp);
        assert!(!state.can_resend());

        state.step = FlowStep::Login(LoginStep::OtpVerification);
        state.pending_email = Some("a@b.com".to_string());
        state.resend_cooldown_secs = 12;
        assert!(!state.can_resend());

        state.resend_cooldown_secs = 0;
        assert!(state.can_resend());
    }

    #[test]
    fn test_signup_details_debug_redacts_passwords() {
        let details = SignupDetails::new("Ada", "ada@example.com", "LongEnough1!", "LongEnough1!");
        let debug = format!("{:?}", details);
        assert!(!debug.contains("LongEnough1!"));
        assert!(!debug.contains("ada@example.com"));
    }

    #[test]
    fn test_signup_details_serialization_omits_confirmation() {
        let details = SignupDetails::new("Ada", "ada@example.com", "LongEnough1!", "LongEnough1!");
        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("confirmPassword").is_none());
        assert_eq!(json["name"], "Ada");
    }

    #[test]
    fn test_session_decoding() {
        let session: AuthSession = serde_json::from_str(
            r#"{"user":{"id":"u-1","email":"a@b.com"},"expiresAt":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(session.user.id, "u-1");
        assert!(session.user.name.is_none());
        assert!(session.expires_at.is_some());
    }
}
