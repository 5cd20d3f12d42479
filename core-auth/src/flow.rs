//! # Authentication Flow Controller
//!
//! Drives the client-visible steps of the login, signup, password-reset and
//! email-change flows.
//!
//! ## Overview
//!
//! One [`AuthFlowController`] is created per page session. It owns the
//! [`AuthFlowState`]; the UI reads snapshots (or subscribes to changes) and
//! mutates state only through the operations below.
//!
//! ```text
//! login:           collecting_email -> collecting_password -> (otp_verification) -> done
//!                  collecting_email -> otp_verification -> done
//! signup:          collecting_details -> (email_verification) -> done
//! forgot_password: collecting_email -> otp_and_new_password -> done
//! change_email:    change_request -> otp_verification -> done
//! ```
//!
//! ## Guarantees
//!
//! - Local validation runs before any request; a validation failure never
//!   reaches the network.
//! - At most one state-advancing request is in flight. A second call while
//!   one is pending fails with [`AuthError::OperationInProgress`] and sends
//!   nothing.
//! - A failed request leaves the state exactly as it was.
//! - `reset()` and `switch_flow()` invalidate pending requests: their
//!   responses are discarded and the call returns [`AuthError::FlowReset`].
//! - The resend cooldown ticks once per second on a task owned by the
//!   controller; it is cancelled whenever the step changes or the controller
//!   is dropped.
//!
//! ## Usage
//!
//! ```ignore
//! let controller = AuthFlowController::new(AuthFlow::Login, api, event_bus, &settings);
//! controller.set_login_method(LoginMethod::Otp);
//! controller.start_login("a@b.com").await?;
//! assert_eq!(controller.state().resend_cooldown_secs, 60);
//!
//! let mut input = OtpInput::new();
//! input.paste("123456");
//! let session = controller.submit_otp_input(&mut input).await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use core_async::sync::watch;
use core_async::task::{spawn_scoped, ScopedTask};
use core_async::time::{sleep, Duration};
use core_runtime::config::AuthSettings;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_email;
use tracing::{debug, info, instrument, warn};

use crate::api::{AuthApi, PasswordLoginResponse, RegisterResponse};
use crate::error::{AuthError, Result};
use crate::otp::OtpInput;
use crate::types::{
    AuthFlow, AuthFlowState, AuthSession, ChangeEmailStep, FlowStep, LoginMethod, LoginStep,
    PasswordOutcome, PasswordResetStep, ResendOutcome, SignupDetails, SignupOutcome, SignupStep,
};
use crate::validation::{
    validate_form, EmailChangeForm, EmailForm, OtpForm, PasswordLoginForm, PasswordResetForm,
};

const COOLDOWN_TICK: Duration = Duration::from_secs(1);

/// Controller for the multi-step authentication flows.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct AuthFlowController {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    event_bus: EventBus,
    cooldown_secs: u32,
    /// Shared with the cooldown ticker, which must not keep `Inner` alive.
    state: Arc<watch::Sender<AuthFlowState>>,
    /// Bumped on reset; only changed while the state lock is held.
    epoch: AtomicU64,
    cooldown: Mutex<Option<ScopedTask>>,
}

impl Inner {
    fn stop_cooldown_task(&self) {
        let task = self
            .cooldown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(task);
    }
}

/// Marks a request as in flight; clears the flag when dropped unless the flow
/// was reset in the meantime.
struct InFlight<'a> {
    inner: &'a Inner,
    epoch: u64,
}

impl InFlight<'_> {
    fn is_stale(&self) -> bool {
        self.inner.epoch.load(Ordering::SeqCst) != self.epoch
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let epoch = self.epoch;
        let current = &self.inner.epoch;
        self.inner.state.send_if_modified(|state| {
            if current.load(Ordering::SeqCst) == epoch && state.in_flight {
                state.in_flight = false;
                true
            } else {
                false
            }
        });
    }
}

impl AuthFlowController {
    pub fn new(
        flow: AuthFlow,
        api: Arc<dyn AuthApi>,
        event_bus: EventBus,
        settings: &AuthSettings,
    ) -> Self {
        let login_method = if settings.prefer_otp_login {
            LoginMethod::Otp
        } else {
            LoginMethod::Password
        };
        let cooldown = settings.resend_cooldown;
        let cooldown_secs = u32::try_from(cooldown.as_secs())
            .unwrap_or(u32::MAX)
            .saturating_add(u32::from(cooldown.subsec_nanos() > 0));
        let (state, _) = watch::channel(AuthFlowState::initial(flow, login_method));

        Self {
            inner: Arc::new(Inner {
                api,
                event_bus,
                cooldown_secs,
                state: Arc::new(state),
                epoch: AtomicU64::new(0),
                cooldown: Mutex::new(None),
            }),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthFlowState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change, including cooldown ticks.
    pub fn subscribe(&self) -> watch::Receiver<AuthFlowState> {
        self.inner.state.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    // ------------------------------------------------------------------
    // Flow selection
    // ------------------------------------------------------------------

    /// Returns the current flow to its initial step, clears the pending email
    /// and cancels the cooldown. Safe from any step.
    #[instrument(skip(self))]
    pub fn reset(&self) {
        let flow = self.inner.state.borrow().flow();
        self.reset_to(flow);
    }

    /// Moves to another top-level flow, starting at its initial step.
    #[instrument(skip(self))]
    pub fn switch_flow(&self, flow: AuthFlow) {
        self.reset_to(flow);
    }

    pub fn set_login_method(&self, method: LoginMethod) {
        self.inner.state.send_if_modified(|state| {
            if state.login_method == method {
                return false;
            }
            state.login_method = method;
            true
        });
    }

    fn reset_to(&self, flow: AuthFlow) {
        let inner = &self.inner;
        inner.state.send_modify(|state| {
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            inner.stop_cooldown_task();
            *state = AuthFlowState::initial(flow, state.login_method);
        });
        debug!(flow = %flow, "Flow reset");
        self.emit(AuthEvent::FlowReset {
            flow: flow.as_str().to_string(),
        });
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// Password method: advances to `collecting_password` without a request.
    /// OTP method: requests a code and advances to `otp_verification`.
    #[instrument(skip_all, fields(email = %redact_email(email)))]
    pub async fn start_login(&self, email: &str) -> Result<()> {
        validate_form(&EmailForm { email })?;
        let email = email.trim();

        let guard = self.begin("start_login", |step| {
            matches!(
                step,
                FlowStep::Login(LoginStep::CollectingEmail | LoginStep::CollectingPassword)
            )
        })?;

        if self.state().login_method == LoginMethod::Password {
            return self.commit(&guard, |state| {
                state.step = FlowStep::Login(LoginStep::CollectingPassword);
                state.resend_cooldown_secs = 0;
            });
        }

        match self.inner.api.request_otp(email).await {
            Ok(()) => {
                self.enter_code_step(&guard, FlowStep::Login(LoginStep::OtpVerification), email)
            }
            Err(err) => Err(self.fail(&guard, "start_login", err)),
        }
    }

    /// Password login. A "verification required" response sends a code and
    /// moves to `otp_verification`; bad credentials leave the step unchanged.
    #[instrument(skip_all, fields(email = %redact_email(email)))]
    pub async fn submit_password(&self, email: &str, password: &str) -> Result<PasswordOutcome> {
        validate_form(&PasswordLoginForm { email, password })?;
        let email = email.trim();

        let guard = self.begin("submit_password", |step| {
            matches!(
                step,
                FlowStep::Login(LoginStep::CollectingEmail | LoginStep::CollectingPassword)
            )
        })?;

        let response = match self.inner.api.password_login(email, password).await {
            Ok(response) => response,
            Err(err) => return Err(self.fail(&guard, "submit_password", err)),
        };

        match response {
            PasswordLoginResponse::Authenticated(session) => {
                self.complete(&guard)?;
                self.session_established(AuthFlow::Login, &session);
                Ok(PasswordOutcome::Authenticated(session))
            }
            PasswordLoginResponse::VerificationRequired { email: verify_email } => {
                let target = if verify_email.trim().is_empty() {
                    email.to_string()
                } else {
                    verify_email
                };
                info!("Account requires email verification; requesting code");

                if let Err(err) = self.inner.api.request_otp(&target).await {
                    return Err(self.fail(&guard, "submit_password", err));
                }
                self.enter_code_step(
                    &guard,
                    FlowStep::Login(LoginStep::OtpVerification),
                    &target,
                )?;
                Ok(PasswordOutcome::VerificationRequired { email: target })
            }
        }
    }

    /// Verifies a login code. On success the flow completes and resets.
    #[instrument(skip_all, fields(email = %redact_email(email)))]
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthSession> {
        validate_form(&OtpForm { email, code })?;

        let guard = self.begin("verify_otp", |step| {
            step == FlowStep::Login(LoginStep::OtpVerification)
        })?;

        match self.inner.api.verify_otp(email.trim(), code).await {
            Ok(session) => {
                self.complete(&guard)?;
                self.session_established(AuthFlow::Login, &session);
                Ok(session)
            }
            Err(err) => Err(self.fail(&guard, "verify_otp", err)),
        }
    }

    /// Re-sends the code for the pending email.
    ///
    /// A no-op returning [`ResendOutcome::CoolingDown`] while the cooldown is
    /// running. Not offered in the change-email flow.
    #[instrument(skip(self))]
    pub async fn resend_otp(&self) -> Result<ResendOutcome> {
        let mut remaining = 0;
        let mut pending = None;
        let mut step = self.state().step;

        let guard = self.admit(|state| {
            step = state.step;
            let resendable = state.step.is_otp_entry()
                && !matches!(state.step, FlowStep::ChangeEmail(_));
            if !resendable {
                return Err(AuthError::invalid_step("resend_otp", state.step));
            }
            if state.resend_cooldown_secs > 0 {
                remaining = state.resend_cooldown_secs;
                return Ok(false);
            }
            pending = state.pending_email.clone();
            if pending.is_none() {
                return Err(AuthError::NoPendingEmail);
            }
            Ok(true)
        })?;

        let (Some(guard), Some(email)) = (guard, pending) else {
            debug!(remaining, "Resend ignored while cooling down");
            return Ok(ResendOutcome::CoolingDown {
                remaining_secs: remaining,
            });
        };

        let result = match step {
            FlowStep::ForgotPassword(_) => self.inner.api.request_password_reset(&email).await,
            _ => self.inner.api.request_otp(&email).await,
        };

        match result {
            Ok(()) => {
                self.enter_code_step(&guard, step, &email)?;
                Ok(ResendOutcome::Sent)
            }
            Err(err) => Err(self.fail(&guard, "resend_otp", err)),
        }
    }

    // ------------------------------------------------------------------
    // Signup
    // ------------------------------------------------------------------

    #[instrument(skip_all, fields(email = %redact_email(&details.email)))]
    pub async fn start_signup(&self, details: &SignupDetails) -> Result<SignupOutcome> {
        validate_form(details)?;

        let guard = self.begin("start_signup", |step| {
            step == FlowStep::Signup(SignupStep::CollectingDetails)
        })?;

        match self.inner.api.register(details).await {
            Ok(RegisterResponse::VerificationRequired { email }) => {
                let email = if email.trim().is_empty() {
                    details.email.trim().to_string()
                } else {
                    email
                };
                self.enter_code_step(
                    &guard,
                    FlowStep::Signup(SignupStep::EmailVerification),
                    &email,
                )?;
                Ok(SignupOutcome::VerificationRequired { email })
            }
            Ok(RegisterResponse::Authenticated(session)) => {
                self.complete(&guard)?;
                self.session_established(AuthFlow::Signup, &session);
                Ok(SignupOutcome::Authenticated(session))
            }
            Err(err) => Err(self.fail(&guard, "start_signup", err)),
        }
    }

    #[instrument(skip_all, fields(email = %redact_email(email)))]
    pub async fn verify_signup_otp(&self, email: &str, code: &str) -> Result<AuthSession> {
        validate_form(&OtpForm { email, code })?;

        let guard = self.begin("verify_signup_otp", |step| {
            step == FlowStep::Signup(SignupStep::EmailVerification)
        })?;

        match self.inner.api.verify_otp(email.trim(), code).await {
            Ok(session) => {
                self.complete(&guard)?;
                self.session_established(AuthFlow::Signup, &session);
                Ok(session)
            }
            Err(err) => Err(self.fail(&guard, "verify_signup_otp", err)),
        }
    }

    // ------------------------------------------------------------------
    // Password reset
    // ------------------------------------------------------------------

    #[instrument(skip_all, fields(email = %redact_email(email)))]
    pub async fn start_password_reset(&self, email: &str) -> Result<()> {
        validate_form(&EmailForm { email })?;
        let email = email.trim();

        let guard = self.begin("start_password_reset", |step| {
            step == FlowStep::ForgotPassword(PasswordResetStep::CollectingEmail)
        })?;

        match self.inner.api.request_password_reset(email).await {
            Ok(()) => self.enter_code_step(
                &guard,
                FlowStep::ForgotPassword(PasswordResetStep::OtpAndNewPassword),
                email,
            ),
            Err(err) => Err(self.fail(&guard, "start_password_reset", err)),
        }
    }

    /// On success the flow returns to its initial step; the caller usually
    /// navigates to login.
    #[instrument(skip_all, fields(email = %redact_email(email)))]
    pub async fn complete_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        validate_form(&PasswordResetForm {
            email,
            code,
            new_password,
        })?;

        let guard = self.begin("complete_password_reset", |step| {
            step == FlowStep::ForgotPassword(PasswordResetStep::OtpAndNewPassword)
        })?;

        match self
            .inner
            .api
            .reset_password(email.trim(), code, new_password)
            .await
        {
            Ok(()) => {
                self.complete(&guard)?;
                info!("Password reset completed");
                self.emit(AuthEvent::PasswordResetCompleted);
                Ok(())
            }
            Err(err) => Err(self.fail(&guard, "complete_password_reset", err)),
        }
    }

    // ------------------------------------------------------------------
    // Email change
    // ------------------------------------------------------------------

    #[instrument(skip_all, fields(new_email = %redact_email(new_email)))]
    pub async fn start_email_change(&self, new_email: &str, current_password: &str) -> Result<()> {
        validate_form(&EmailChangeForm {
            new_email,
            current_password,
        })?;
        let new_email = new_email.trim();

        let guard = self.begin("start_email_change", |step| {
            step == FlowStep::ChangeEmail(ChangeEmailStep::ChangeRequest)
        })?;

        match self
            .inner
            .api
            .request_email_change(new_email, current_password)
            .await
        {
            Ok(()) => {
                self.commit(&guard, |state| {
                    state.step = FlowStep::ChangeEmail(ChangeEmailStep::OtpVerification);
                    state.pending_email = Some(new_email.to_string());
                    state.resend_cooldown_secs = 0;
                })?;
                self.code_sent(AuthFlow::ChangeEmail, new_email);
                Ok(())
            }
            Err(err) => Err(self.fail(&guard, "start_email_change", err)),
        }
    }

    /// Verifies the code sent to the pending new address. On success the
    /// flow returns to `change_request`; the returned session carries the
    /// updated email.
    #[instrument(skip_all)]
    pub async fn complete_email_change(&self, code: &str) -> Result<AuthSession> {
        let pending = self.state().pending_email.ok_or(AuthError::NoPendingEmail)?;
        validate_form(&OtpForm {
            email: &pending,
            code,
        })?;

        let guard = self.begin("complete_email_change", |step| {
            step == FlowStep::ChangeEmail(ChangeEmailStep::OtpVerification)
        })?;

        match self.inner.api.verify_email_change(&pending, code).await {
            Ok(session) => {
                self.complete(&guard)?;
                info!(user_id = %session.user.id, "Account email changed");
                self.emit(AuthEvent::EmailChanged {
                    user_id: session.user.id.clone(),
                });
                Ok(session)
            }
            Err(err) => Err(self.fail(&guard, "complete_email_change", err)),
        }
    }

    // ------------------------------------------------------------------
    // OTP auto-submit
    // ------------------------------------------------------------------

    /// Auto-submit path shared by manual entry and paste.
    ///
    /// Returns `Ok(None)` when the input is incomplete or its code was already
    /// handed out. Dispatches on the current step and clears the input when
    /// the verification fails.
    pub async fn submit_otp_input(&self, input: &mut OtpInput) -> Result<Option<AuthSession>> {
        let Some(code) = input.take_submission() else {
            return Ok(None);
        };

        let state = self.state();
        let result = match (state.step, state.pending_email) {
            (FlowStep::Login(LoginStep::OtpVerification), Some(email)) => {
                self.verify_otp(&email, &code).await
            }
            (FlowStep::Signup(SignupStep::EmailVerification), Some(email)) => {
                self.verify_signup_otp(&email, &code).await
            }
            (FlowStep::ChangeEmail(ChangeEmailStep::OtpVerification), Some(_)) => {
                self.complete_email_change(&code).await
            }
            (step, Some(_)) => Err(AuthError::invalid_step("submit_otp_input", step)),
            (_, None) => Err(AuthError::NoPendingEmail),
        };

        match result {
            Ok(session) => Ok(Some(session)),
            // The pending request owns this code; keep the digits on screen.
            Err(AuthError::OperationInProgress) => Err(AuthError::OperationInProgress),
            Err(err) => {
                input.clear();
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin(&self, operation: &'static str, allowed: fn(FlowStep) -> bool) -> Result<InFlight<'_>> {
        let admitted = self.admit(|state| {
            if allowed(state.step) {
                Ok(true)
            } else {
                Err(AuthError::invalid_step(operation, state.step))
            }
        })?;
        admitted.ok_or_else(|| AuthError::invalid_step(operation, self.state().step))
    }

    /// Atomically checks the in-flight flag and `check`, then marks the
    /// request in flight. `Ok(false)` from `check` admits nothing.
    fn admit<F>(&self, check: F) -> Result<Option<InFlight<'_>>>
    where
        F: FnOnce(&AuthFlowState) -> Result<bool>,
    {
        let inner = &self.inner;
        let mut outcome = Ok(None);

        inner.state.send_if_modified(|state| {
            if state.in_flight {
                outcome = Err(AuthError::OperationInProgress);
                return false;
            }
            match check(state) {
                Ok(true) => {
                    state.in_flight = true;
                    outcome = Ok(Some(inner.epoch.load(Ordering::SeqCst)));
                    true
                }
                Ok(false) => false,
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });

        outcome.map(|epoch| {
            epoch.map(|epoch| InFlight {
                inner: inner.as_ref(),
                epoch,
            })
        })
    }

    /// Applies `update` unless the flow was reset while the request was in
    /// flight. Any committed transition stops the running cooldown.
    fn commit<F>(&self, guard: &InFlight<'_>, update: F) -> Result<()>
    where
        F: FnOnce(&mut AuthFlowState),
    {
        let inner = &self.inner;
        let epoch = guard.epoch;
        let mut applied = false;

        inner.state.send_if_modified(|state| {
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            inner.stop_cooldown_task();
            update(state);
            applied = true;
            true
        });

        if applied {
            Ok(())
        } else {
            debug!("Discarding response for a flow that was reset");
            Err(AuthError::FlowReset)
        }
    }

    /// Terminal success: back to the flow's initial step.
    fn complete(&self, guard: &InFlight<'_>) -> Result<()> {
        self.commit(guard, |state| {
            let flow = state.flow();
            let in_flight = state.in_flight;
            *state = AuthFlowState::initial(flow, state.login_method);
            state.in_flight = in_flight;
        })
    }

    /// A code was sent to `email`: enter `step` and restart the cooldown.
    fn enter_code_step(&self, guard: &InFlight<'_>, step: FlowStep, email: &str) -> Result<()> {
        let seconds = self.inner.cooldown_secs;
        self.commit(guard, |state| {
            state.step = step;
            state.pending_email = Some(email.to_string());
            state.resend_cooldown_secs = seconds;
        })?;
        self.spawn_cooldown_ticker();
        self.code_sent(step.flow(), email);
        Ok(())
    }

    fn spawn_cooldown_ticker(&self) {
        let sender = Arc::clone(&self.inner.state);
        let task = spawn_scoped(move |token| async move {
            loop {
                sleep(COOLDOWN_TICK).await;
                let mut finished = false;
                sender.send_if_modified(|state| {
                    if token.is_cancelled() || state.resend_cooldown_secs == 0 {
                        finished = true;
                        return false;
                    }
                    state.resend_cooldown_secs -= 1;
                    finished = state.resend_cooldown_secs == 0;
                    true
                });
                if finished {
                    break;
                }
            }
        });

        let previous = self
            .inner
            .cooldown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        drop(previous);
    }

    /// Maps a failed request to the error returned to the caller.
    fn fail(&self, guard: &InFlight<'_>, operation: &str, err: AuthError) -> AuthError {
        if guard.is_stale() {
            debug!(operation, "Discarding failure for a flow that was reset");
            return AuthError::FlowReset;
        }

        let flow = self.inner.state.borrow().flow();
        warn!(operation, flow = %flow, error = %err, "Authentication request failed");
        self.emit(AuthEvent::AuthError {
            flow: flow.as_str().to_string(),
            message: err.user_message(),
        });
        err
    }

    fn code_sent(&self, flow: AuthFlow, email: &str) {
        info!(flow = %flow, email = %redact_email(email), "Verification code sent");
        self.emit(AuthEvent::CodeSent {
            flow: flow.as_str().to_string(),
            email: redact_email(email),
        });
    }

    fn session_established(&self, flow: AuthFlow, session: &AuthSession) {
        info!(flow = %flow, user_id = %session.user.id, "Session established");
        self.emit(AuthEvent::SessionEstablished {
            flow: flow.as_str().to_string(),
            user_id: session.user.id.clone(),
        });
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.inner.event_bus.emit(CoreEvent::Auth(event));
    }
}

impl std::fmt::Debug for AuthFlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("AuthFlowController")
            .field("step", &state.step)
            .field("in_flight", &state.in_flight)
            .field("resend_cooldown_secs", &state.resend_cooldown_secs)
            .finish()
    }
}
