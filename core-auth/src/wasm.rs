//! WebAssembly bindings for core-auth
//!
//! Exposes the authentication flow controller to JavaScript hosts. State is
//! returned as plain objects; operations return promises that reject with
//! `{ code, field, message }`.

use std::sync::Arc;

use bridge_wasm::{WasmHttpClient, WebPopupHost};
use core_runtime::config::{AuthSettings, ReauthSettings};
use core_runtime::wasm::JsEventBus;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::api::HttpAuthApi;
use crate::error::AuthError;
use crate::flow::AuthFlowController;
use crate::otp::OtpInput;
use crate::providers::ConnectorProvider;
use crate::reauth::{OAuthReauthCoordinator, ReauthSession};
use crate::types::{AuthFlow, LoginMethod, SignupDetails};

// NOTE: Logging (initLogging) and the event bus are exported by core-runtime.

/// Rejection value for every failed operation.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsAuthError<'a> {
    code: Option<&'a str>,
    field: Option<&'a str>,
    message: String,
}

fn to_js_error(err: AuthError) -> JsValue {
    let payload = JsAuthError {
        code: err.code(),
        field: err.field(),
        message: err.user_message(),
    };
    serde_wasm_bindgen::to_value(&payload).unwrap_or_else(|_| JsValue::from_str(&payload.message))
}

fn to_js<T: Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn http_api(api_base_url: &str) -> std::result::Result<HttpAuthApi, JsValue> {
    let http_client = WasmHttpClient::new().map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(HttpAuthApi::new(
        api_base_url.trim_end_matches('/'),
        Arc::new(http_client),
    ))
}

fn parse_flow(flow: &str) -> std::result::Result<AuthFlow, JsValue> {
    AuthFlow::parse(flow).ok_or_else(|| JsValue::from_str(&format!("Unknown auth flow: {flow}")))
}

/// JavaScript-accessible authentication flow
///
/// # Example
///
/// ```javascript
/// import { JsEventBus } from './core_runtime';
/// import { JsAuthFlow } from './core_auth';
///
/// const eventBus = new JsEventBus(100);
/// const flow = new JsAuthFlow('login', 'https://api.example.com', eventBus);
///
/// flow.setLoginMethod('otp');
/// await flow.startLogin('a@b.com');
/// console.log(flow.state()); // { step: { flow: 'login', step: 'otp_verification' }, ... }
///
/// const session = await flow.pasteOtp('123456');
/// ```
#[wasm_bindgen]
pub struct JsAuthFlow {
    inner: AuthFlowController,
    otp: OtpInput,
}

#[wasm_bindgen]
impl JsAuthFlow {
    /// Creates a controller for `flow` (`login`, `signup`, `forgot_password`,
    /// `change_email`) talking to `api_base_url` through `fetch`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        flow: &str,
        api_base_url: &str,
        event_bus: &JsEventBus,
    ) -> std::result::Result<JsAuthFlow, JsValue> {
        let flow = parse_flow(flow)?;
        let api = http_api(api_base_url)?;

        let inner = AuthFlowController::new(
            flow,
            Arc::new(api),
            event_bus.inner().clone(),
            &AuthSettings::default(),
        );

        Ok(Self {
            inner,
            otp: OtpInput::new(),
        })
    }

    /// Current state snapshot as a plain object.
    pub fn state(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.inner.state())
    }

    #[wasm_bindgen(getter)]
    pub fn step(&self) -> String {
        self.inner.state().step.as_str().to_string()
    }

    #[wasm_bindgen(js_name = pendingEmail, getter)]
    pub fn pending_email(&self) -> Option<String> {
        self.inner.state().pending_email
    }

    #[wasm_bindgen(js_name = resendCooldownSeconds, getter)]
    pub fn resend_cooldown_seconds(&self) -> u32 {
        self.inner.state().resend_cooldown_secs
    }

    #[wasm_bindgen(js_name = inFlight, getter)]
    pub fn in_flight(&self) -> bool {
        self.inner.state().in_flight
    }

    /// `password` or `otp`.
    #[wasm_bindgen(js_name = setLoginMethod)]
    pub fn set_login_method(&self, method: &str) -> std::result::Result<(), JsValue> {
        let method = match method {
            "password" => LoginMethod::Password,
            "otp" => LoginMethod::Otp,
            other => return Err(JsValue::from_str(&format!("Unknown login method: {other}"))),
        };
        self.inner.set_login_method(method);
        Ok(())
    }

    #[wasm_bindgen(js_name = switchFlow)]
    pub fn switch_flow(&mut self, flow: &str) -> std::result::Result<(), JsValue> {
        let flow = parse_flow(flow)?;
        self.otp.clear();
        self.inner.switch_flow(flow);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.otp.clear();
        self.inner.reset();
    }

    #[wasm_bindgen(js_name = startLogin)]
    pub async fn start_login(&self, email: String) -> std::result::Result<(), JsValue> {
        self.inner.start_login(&email).await.map_err(to_js_error)
    }

    /// Resolves to `{ authenticated: session }` or `{ verificationRequired: email }`.
    #[wasm_bindgen(js_name = submitPassword)]
    pub async fn submit_password(
        &self,
        email: String,
        password: String,
    ) -> std::result::Result<JsValue, JsValue> {
        let outcome = self
            .inner
            .submit_password(&email, &password)
            .await
            .map_err(to_js_error)?;

        match outcome {
            crate::types::PasswordOutcome::Authenticated(session) => {
                to_js(&serde_json::json!({ "authenticated": session }))
            }
            crate::types::PasswordOutcome::VerificationRequired { email } => {
                to_js(&serde_json::json!({ "verificationRequired": email }))
            }
        }
    }

    #[wasm_bindgen(js_name = verifyOtp)]
    pub async fn verify_otp(&self, email: String, code: String) -> std::result::Result<JsValue, JsValue> {
        let session = self.inner.verify_otp(&email, &code).await.map_err(to_js_error)?;
        to_js(&session)
    }

    /// Resolves to `true` when a code was sent, `false` while cooling down.
    #[wasm_bindgen(js_name = resendOtp)]
    pub async fn resend_otp(&self) -> std::result::Result<bool, JsValue> {
        let outcome = self.inner.resend_otp().await.map_err(to_js_error)?;
        Ok(outcome == crate::types::ResendOutcome::Sent)
    }

    #[wasm_bindgen(js_name = startSignup)]
    pub async fn start_signup(
        &self,
        name: String,
        email: String,
        password: String,
        confirm_password: String,
    ) -> std::result::Result<JsValue, JsValue> {
        let details = SignupDetails::new(name, email, password, confirm_password);
        let outcome = self.inner.start_signup(&details).await.map_err(to_js_error)?;

        match outcome {
            crate::types::SignupOutcome::Authenticated(session) => {
                to_js(&serde_json::json!({ "authenticated": session }))
            }
            crate::types::SignupOutcome::VerificationRequired { email } => {
                to_js(&serde_json::json!({ "verificationRequired": email }))
            }
        }
    }

    #[wasm_bindgen(js_name = verifySignupOtp)]
    pub async fn verify_signup_otp(
        &self,
        email: String,
        code: String,
    ) -> std::result::Result<JsValue, JsValue> {
        let session = self
            .inner
            .verify_signup_otp(&email, &code)
            .await
            .map_err(to_js_error)?;
        to_js(&session)
    }

    #[wasm_bindgen(js_name = startPasswordReset)]
    pub async fn start_password_reset(&self, email: String) -> std::result::Result<(), JsValue> {
        self.inner.start_password_reset(&email).await.map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = completePasswordReset)]
    pub async fn complete_password_reset(
        &self,
        email: String,
        code: String,
        new_password: String,
    ) -> std::result::Result<(), JsValue> {
        self.inner
            .complete_password_reset(&email, &code, &new_password)
            .await
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = startEmailChange)]
    pub async fn start_email_change(
        &self,
        new_email: String,
        current_password: String,
    ) -> std::result::Result<(), JsValue> {
        self.inner
            .start_email_change(&new_email, &current_password)
            .await
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = completeEmailChange)]
    pub async fn complete_email_change(&self, code: String) -> std::result::Result<JsValue, JsValue> {
        let session = self
            .inner
            .complete_email_change(&code)
            .await
            .map_err(to_js_error)?;
        to_js(&session)
    }

    /// Types one digit into the code boxes. Resolves to the session when this
    /// digit completed a valid code, otherwise to `null`.
    #[wasm_bindgen(js_name = enterOtpDigit)]
    pub async fn enter_otp_digit(
        &mut self,
        index: usize,
        digit: char,
    ) -> std::result::Result<JsValue, JsValue> {
        if !self.otp.enter_digit(index, digit) {
            return Ok(JsValue::NULL);
        }
        self.submit_otp().await
    }

    /// Fills every code box from pasted text and submits when it is a
    /// six-digit code.
    #[wasm_bindgen(js_name = pasteOtp)]
    pub async fn paste_otp(&mut self, text: String) -> std::result::Result<JsValue, JsValue> {
        if !self.otp.paste(&text) {
            return Ok(JsValue::NULL);
        }
        self.submit_otp().await
    }

    /// Clears a code box; returns the index that should take focus.
    #[wasm_bindgen(js_name = otpBackspace)]
    pub fn otp_backspace(&mut self, index: usize) -> usize {
        self.otp.backspace(index)
    }

    /// Current code boxes; empty slots are empty strings.
    #[wasm_bindgen(js_name = otpDigits)]
    pub fn otp_digits(&self) -> Vec<String> {
        self.otp
            .digits()
            .iter()
            .map(|slot| slot.map(String::from).unwrap_or_default())
            .collect()
    }
}

impl JsAuthFlow {
    async fn submit_otp(&mut self) -> std::result::Result<JsValue, JsValue> {
        let controller = self.inner.clone();
        match controller.submit_otp_input(&mut self.otp).await {
            Ok(Some(session)) => to_js(&session),
            Ok(None) => Ok(JsValue::NULL),
            Err(err) => Err(to_js_error(err)),
        }
    }
}

/// JavaScript-accessible OAuth reauthorization
///
/// ```javascript
/// const reauth = new JsReauth('https://api.example.com', eventBus);
/// const session = await reauth.begin(instance.id, 'github');
/// const state = await session.waitResolved(); // { status: 'success', ... }
/// ```
#[wasm_bindgen]
pub struct JsReauth {
    inner: OAuthReauthCoordinator,
}

#[wasm_bindgen]
impl JsReauth {
    #[wasm_bindgen(constructor)]
    pub fn new(api_base_url: &str, event_bus: &JsEventBus) -> std::result::Result<JsReauth, JsValue> {
        let api = http_api(api_base_url)?;
        let host = WebPopupHost::new().map_err(|e| JsValue::from_str(&e.to_string()))?;

        Ok(Self {
            inner: OAuthReauthCoordinator::new(
                Arc::new(api),
                Arc::new(host),
                event_bus.inner().clone(),
                ReauthSettings::default(),
            ),
        })
    }

    /// Must be called from a user gesture so the popup is not blocked.
    pub async fn begin(
        &self,
        instance_id: String,
        provider: String,
    ) -> std::result::Result<JsReauthSession, JsValue> {
        let session = self
            .inner
            .begin(&instance_id, &provider)
            .await
            .map_err(to_js_error)?;
        Ok(JsReauthSession { inner: session })
    }
}

/// One reauthorization attempt. Call `cancel()` (or `free()`) when the
/// dialog unmounts.
#[wasm_bindgen]
pub struct JsReauthSession {
    inner: ReauthSession,
}

#[wasm_bindgen]
impl JsReauthSession {
    #[wasm_bindgen(js_name = sessionId, getter)]
    pub fn session_id(&self) -> String {
        self.inner.session_id().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn status(&self) -> String {
        self.inner.status().as_str().to_string()
    }

    pub fn state(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.inner.snapshot())
    }

    #[wasm_bindgen(js_name = waitResolved)]
    pub async fn wait_resolved(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.inner.wait_resolved().await)
    }

    pub async fn retry(&self) -> std::result::Result<(), JsValue> {
        self.inner.retry().await.map_err(to_js_error)
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

/// Display name for a connector provider slug; unknown slugs map to a
/// generic label.
#[wasm_bindgen(js_name = providerDisplayName)]
pub fn provider_display_name(slug: &str) -> String {
    ConnectorProvider::from_slug(slug).info().display_name.to_string()
}

/// Icon identifier for a connector provider slug.
#[wasm_bindgen(js_name = providerIcon)]
pub fn provider_icon(slug: &str) -> String {
    ConnectorProvider::from_slug(slug).info().icon.to_string()
}

/// Get the module version
#[wasm_bindgen(js_name = authVersion)]
pub fn auth_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
