//! # Auth API Collaborator
//!
//! The backend operations the controllers depend on, and their HTTP/JSON
//! implementation over the host's [`HttpClient`].
//!
//! ## Response decoding
//!
//! Login and registration responses carry an explicit `status` tag
//! (`"authenticated"` or `"verification_required"`); the outcome is never
//! inferred from which fields happen to be present.
//!
//! ## Error mapping
//!
//! - 2xx: decoded into the operation's response type
//! - non-2xx with a JSON body carrying `code`, `error` or `message`:
//!   [`AuthError::Api`]
//! - anything else, including transport failures: [`AuthError::Network`]

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::platform::PlatformSendSync;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, Result};
use crate::types::{AuthSession, SignupDetails};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of a password login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PasswordLoginResponse {
    Authenticated(AuthSession),
    /// Correct credentials, but the address must be verified with a code.
    VerificationRequired { email: String },
}

/// Response of a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegisterResponse {
    /// The account was verified on creation.
    Authenticated(AuthSession),
    VerificationRequired { email: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReauthStart {
    pub authorization_url: String,
}

/// Backend authentication operations.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait AuthApi: PlatformSendSync {
    async fn request_otp(&self, email: &str) -> Result<()>;

    async fn password_login(&self, email: &str, password: &str) -> Result<PasswordLoginResponse>;

    async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthSession>;

    async fn register(&self, details: &SignupDetails) -> Result<RegisterResponse>;

    async fn request_password_reset(&self, email: &str) -> Result<()>;

    async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()>;

    /// The backend re-checks `current_password` before sending a code.
    async fn request_email_change(&self, new_email: &str, current_password: &str) -> Result<()>;

    async fn verify_email_change(&self, email: &str, code: &str) -> Result<AuthSession>;

    async fn start_reauth(&self, instance_id: &str, provider: &str) -> Result<ReauthStart>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CodeBody<'a> {
    email: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetBody<'a> {
    email: &'a str,
    code: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailChangeBody<'a> {
    new_email: &'a str,
    current_password: &'a str,
}

#[derive(Serialize)]
struct ReauthBody<'a> {
    provider: &'a str,
}

/// Structured error body. Backends use either `code` or `error` for the
/// machine-readable part.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

/// [`AuthApi`] over JSON `POST` requests.
pub struct HttpAuthApi {
    base_url: String,
    http_client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Accept", "application/json")
            .json(body)?
            .timeout(self.timeout);

        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(error_from_response(path, &response))
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        response.json().map_err(|e| {
            warn!(path, error = %e, "Malformed response body");
            AuthError::Network(format!("Unexpected response from {}: {}", path, e))
        })
    }
}

fn error_from_response(path: &str, response: &HttpResponse) -> AuthError {
    let status = response.status;
    let parsed: Option<ErrorBody> = response.json().ok();

    match parsed {
        Some(body) if body.code.is_some() || body.error.is_some() || body.message.is_some() => {
            let code = body
                .code
                .or(body.error)
                .unwrap_or_else(|| format!("HTTP_{}", status));
            debug!(path, status, code = %code, "Backend rejected request");
            AuthError::Api {
                code,
                message: body.message.unwrap_or_default(),
            }
        }
        _ => {
            warn!(path, status, "Request failed without a structured body");
            AuthError::Network(format!("Request to {} failed with HTTP {}", path, status))
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AuthApi for HttpAuthApi {
    #[instrument(skip_all)]
    async fn request_otp(&self, email: &str) -> Result<()> {
        self.post("/auth/otp/request", &EmailBody { email }).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn password_login(&self, email: &str, password: &str) -> Result<PasswordLoginResponse> {
        self.post_json("/auth/login", &LoginBody { email, password })
            .await
    }

    #[instrument(skip_all)]
    async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthSession> {
        self.post_json("/auth/otp/verify", &CodeBody { email, code })
            .await
    }

    #[instrument(skip_all)]
    async fn register(&self, details: &SignupDetails) -> Result<RegisterResponse> {
        self.post_json("/auth/register", details).await
    }

    #[instrument(skip_all)]
    async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.post("/auth/password/forgot", &EmailBody { email })
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        self.post(
            "/auth/password/reset",
            &ResetBody {
                email,
                code,
                new_password,
            },
        )
        .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn request_email_change(&self, new_email: &str, current_password: &str) -> Result<()> {
        self.post(
            "/auth/email/change",
            &EmailChangeBody {
                new_email,
                current_password,
            },
        )
        .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn verify_email_change(&self, email: &str, code: &str) -> Result<AuthSession> {
        self.post_json("/auth/email/verify", &CodeBody { email, code })
            .await
    }

    #[instrument(skip_all, fields(instance_id = %instance_id, provider = %provider))]
    async fn start_reauth(&self, instance_id: &str, provider: &str) -> Result<ReauthStart> {
        let path = format!("/instances/{}/reauth", urlencode_segment(instance_id));
        self.post_json(&path, &ReauthBody { provider }).await
    }
}

/// Percent-encodes a single path segment.
fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays canned responses and records requests.
    struct ScriptedHttpClient {
        responses: Mutex<Vec<BridgeResult<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn new(responses: Vec<BridgeResult<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn response(status: u16, body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn api(client: Arc<ScriptedHttpClient>) -> HttpAuthApi {
        HttpAuthApi::new("https://console.example.com/api/", client)
    }

    fn body_json(request: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    #[core_async::test]
    async fn test_request_otp_posts_email() {
        let client = ScriptedHttpClient::new(vec![response(200, r#"{"ok":true}"#)]);
        api(client.clone()).request_otp("a@b.com").await.unwrap();

        let request = client.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "https://console.example.com/api/auth/otp/request");
        assert_eq!(body_json(&request)["email"], "a@b.com");
        assert_eq!(request.timeout, Some(DEFAULT_REQUEST_TIMEOUT));
    }

    #[core_async::test]
    async fn test_password_login_decodes_tagged_outcomes() {
        let client = ScriptedHttpClient::new(vec![
            response(
                200,
                r#"{"status":"authenticated","user":{"id":"u-1","email":"a@b.com"}}"#,
            ),
            response(
                200,
                r#"{"status":"verification_required","email":"a@b.com"}"#,
            ),
        ]);
        let api = api(client);

        match api.password_login("a@b.com", "pw").await.unwrap() {
            PasswordLoginResponse::Authenticated(session) => assert_eq!(session.user.id, "u-1"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            api.password_login("a@b.com", "pw").await.unwrap(),
            PasswordLoginResponse::VerificationRequired {
                email: "a@b.com".to_string()
            }
        );
    }

    #[core_async::test]
    async fn test_untagged_login_body_is_not_guessed() {
        let client = ScriptedHttpClient::new(vec![response(
            200,
            r#"{"requiresVerification":true,"email":"a@b.com"}"#,
        )]);

        let err = api(client).password_login("a@b.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
    }

    #[core_async::test]
    async fn test_structured_rejection_maps_to_api_error() {
        let client = ScriptedHttpClient::new(vec![
            response(
                401,
                r#"{"code":"INVALID_CREDENTIALS","message":"Invalid email or password"}"#,
            ),
            response(429, r#"{"error":"RATE_LIMITED"}"#),
        ]);
        let api = api(client);

        assert_eq!(
            api.password_login("a@b.com", "wrong").await.unwrap_err(),
            AuthError::Api {
                code: "INVALID_CREDENTIALS".to_string(),
                message: "Invalid email or password".to_string(),
            }
        );
        assert_eq!(
            api.request_otp("a@b.com").await.unwrap_err(),
            AuthError::Api {
                code: "RATE_LIMITED".to_string(),
                message: String::new(),
            }
        );
    }

    #[core_async::test]
    async fn test_unstructured_failure_maps_to_network_error() {
        let client = ScriptedHttpClient::new(vec![
            response(502, "<html>Bad Gateway</html>"),
            Err(BridgeError::OperationFailed("connection reset".to_string())),
        ]);
        let api = api(client);

        assert!(matches!(
            api.request_password_reset("a@b.com").await,
            Err(AuthError::Network(_))
        ));
        assert!(matches!(
            api.request_password_reset("a@b.com").await,
            Err(AuthError::Network(_))
        ));
    }

    #[core_async::test]
    async fn test_register_omits_confirmation() {
        let client = ScriptedHttpClient::new(vec![response(
            201,
            r#"{"status":"verification_required","email":"ada@example.com"}"#,
        )]);
        let details =
            SignupDetails::new("Ada", "ada@example.com", "LongEnough1!", "LongEnough1!");

        let outcome = api(client.clone()).register(&details).await.unwrap();
        assert_eq!(
            outcome,
            RegisterResponse::VerificationRequired {
                email: "ada@example.com".to_string()
            }
        );

        let body = body_json(&client.last_request());
        assert_eq!(body["password"], "LongEnough1!");
        assert!(body.get("confirmPassword").is_none());
    }

    #[core_async::test]
    async fn test_start_reauth_encodes_instance_id() {
        let client = ScriptedHttpClient::new(vec![response(
            200,
            r#"{"authorizationUrl":"https://accounts.example.com/o/auth?x=1"}"#,
        )]);

        let start = api(client.clone())
            .start_reauth("inst 1/a", "gmail")
            .await
            .unwrap();
        assert_eq!(start.authorization_url, "https://accounts.example.com/o/auth?x=1");

        let request = client.last_request();
        assert_eq!(
            request.url,
            "https://console.example.com/api/instances/inst%201%2Fa/reauth"
        );
        assert_eq!(body_json(&request)["provider"], "gmail");
    }

    #[core_async::test]
    async fn test_email_change_endpoints() {
        let client = ScriptedHttpClient::new(vec![
            response(200, r#"{"ok":true}"#),
            response(200, r#"{"user":{"id":"u-1","email":"new@example.com"}}"#),
        ]);
        let api = api(client.clone());

        api.request_email_change("new@example.com", "Current1!")
            .await
            .unwrap();
        let body = body_json(&client.last_request());
        assert_eq!(body["newEmail"], "new@example.com");
        assert_eq!(body["currentPassword"], "Current1!");

        let session = api
            .verify_email_change("new@example.com", "123456")
            .await
            .unwrap();
        assert_eq!(session.user.email, "new@example.com");
        assert!(client.last_request().url.ends_with("/auth/email/verify"));
    }
}
