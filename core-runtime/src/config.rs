//! # Core Configuration Module
//!
//! Configuration for the console core.
//!
//! ## Overview
//!
//! A builder constructs a [`ConsoleConfig`] holding the injected host bridges
//! and the tunables of the authentication and reauthorization flows. `build()`
//! validates fail-fast so a misconfigured host is rejected at startup, not in
//! the middle of a sign-in.
//!
//! ## Required Dependencies
//!
//! - API base URL - where the console backend lives
//! - `HttpClient` - transport (desktop default: reqwest, behind `desktop-shims`)
//!
//! ## Optional Dependencies
//!
//! - `PopupHost` - required only for OAuth reauthorization
//! - `Clock` - defaults to the system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ConsoleConfig;
//! use std::sync::Arc;
//!
//! let config = ConsoleConfig::builder()
//!     .api_base_url("https://console.example.com/api")
//!     .http_client(Arc::new(WasmHttpClient::new()?))
//!     .popup_host(Arc::new(WebPopupHost::new()?))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::ConsoleConfig;
//!
//! // Missing base URL
//! let config = ConsoleConfig::builder()
//!     .build()
//!     .expect("Should fail - missing API base URL");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, PopupFeatures, PopupHost, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Upper bound for the OTP resend cooldown.
const MAX_RESEND_COOLDOWN: Duration = Duration::from_secs(600);

/// Tunables of the multi-step authentication flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Cooldown started whenever a verification code is sent
    pub resend_cooldown: Duration,
    /// Start new login flows in one-time-code mode instead of password mode
    pub prefer_otp_login: bool,
    /// Per-request timeout for backend calls
    pub request_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            resend_cooldown: Duration::from_secs(60),
            prefer_otp_login: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Tunables of the OAuth popup lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReauthSettings {
    /// How often the popup is polled for closure or a same-origin return
    pub poll_interval: Duration,
    /// Pause between `processing` and `success`
    pub confirmation_delay: Duration,
    pub popup: PopupFeatures,
}

impl Default for ReauthSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            confirmation_delay: Duration::from_secs(1),
            popup: PopupFeatures::default(),
        }
    }
}

/// Core configuration for the console core.
///
/// Use [`ConsoleConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct ConsoleConfig {
    /// Base URL of the console backend, without trailing slash
    pub api_base_url: String,

    pub http_client: Arc<dyn HttpClient>,

    /// Window host for OAuth popups (web only)
    pub popup_host: Option<Arc<dyn PopupHost>>,

    pub clock: Arc<dyn Clock>,

    pub auth: AuthSettings,

    pub reauth: ReauthSettings,

    /// Capacity of the event bus buffer
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for ConsoleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleConfig")
            .field("api_base_url", &self.api_base_url)
            .field("http_client", &"HttpClient { ... }")
            .field(
                "popup_host",
                &self.popup_host.as_ref().map(|_| "PopupHost { ... }"),
            )
            .field("auth", &self.auth)
            .field("reauth", &self.reauth)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl ConsoleConfig {
    pub fn builder() -> ConsoleConfigBuilder {
        ConsoleConfigBuilder::default()
    }

    /// Returns the popup host or an actionable `CapabilityMissing` error.
    pub fn require_popup_host(&self) -> Result<Arc<dyn PopupHost>> {
        self.popup_host.clone().ok_or_else(|| Error::CapabilityMissing {
            capability: "PopupHost".to_string(),
            message: "OAuth reauthorization opens a provider popup and needs a window host. \
                      Web: inject bridge_wasm::WebPopupHost. \
                      Other hosts: reauthorization is not available."
                .to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "API base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.auth.resend_cooldown.is_zero() {
            return Err(Error::Config(
                "Resend cooldown must be greater than zero".to_string(),
            ));
        }

        if self.auth.resend_cooldown > MAX_RESEND_COOLDOWN {
            return Err(Error::Config(
                "Resend cooldown exceeds maximum of 10 minutes".to_string(),
            ));
        }

        if self.auth.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.reauth.poll_interval.is_zero() {
            return Err(Error::Config(
                "Popup poll interval must be greater than zero".to_string(),
            ));
        }

        if self.reauth.popup.width == 0 || self.reauth.popup.height == 0 {
            return Err(Error::Config(
                "Popup dimensions must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(all(feature = "desktop-shims", not(target_arch = "wasm32"))))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Web: inject bridge_wasm::WasmHttpClient."
            .to_string(),
    })
}

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[derive(Default)]
pub struct ConsoleConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    popup_host: Option<Arc<dyn PopupHost>>,
    clock: Option<Arc<dyn Clock>>,
    auth: AuthSettings,
    reauth: ReauthSettings,
    event_buffer_size: Option<usize>,
}

impl ConsoleConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn popup_host(mut self, host: Arc<dyn PopupHost>) -> Self {
        self.popup_host = Some(host);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn resend_cooldown(mut self, cooldown: Duration) -> Self {
        self.auth.resend_cooldown = cooldown;
        self
    }

    pub fn prefer_otp_login(mut self, prefer: bool) -> Self {
        self.auth.prefer_otp_login = prefer;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.auth.request_timeout = timeout;
        self
    }

    pub fn popup_poll_interval(mut self, interval: Duration) -> Self {
        self.reauth.poll_interval = interval;
        self
    }

    pub fn confirmation_delay(mut self, delay: Duration) -> Self {
        self.reauth.confirmation_delay = delay;
        self
    }

    pub fn popup_size(mut self, width: u32, height: u32) -> Self {
        self.reauth.popup = PopupFeatures::new(width, height);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn build(self) -> Result<ConsoleConfig> {
        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = ConsoleConfig {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            http_client,
            popup_host: self.popup_host,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            auth: self.auth,
            reauth: self.reauth,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse, MessageSubscription, PopupWindow};

    struct MockHttpClient;

    #[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                headers: Default::default(),
                body: Default::default(),
            })
        }
    }

    struct MockPopupHost;

    impl PopupHost for MockPopupHost {
        fn origin(&self) -> String {
            "https://console.example.com".to_string()
        }

        fn open_popup(&self, _url: &str, _name: &str, _features: &PopupFeatures) -> Option<Box<dyn PopupWindow>> {
            None
        }

        fn subscribe_messages(&self) -> BridgeResult<MessageSubscription> {
            Ok(MessageSubscription::channel().1)
        }
    }

    fn builder() -> ConsoleConfigBuilder {
        ConsoleConfig::builder()
            .api_base_url("https://console.example.com/api/")
            .http_client(Arc::new(MockHttpClient))
    }

    #[test]
    fn test_builder_applies_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.api_base_url, "https://console.example.com/api");
        assert_eq!(config.auth.resend_cooldown, Duration::from_secs(60));
        assert!(!config.auth.prefer_otp_login);
        assert_eq!(config.reauth.poll_interval, Duration::from_secs(1));
        assert_eq!(config.reauth.popup, PopupFeatures::new(600, 700));
        assert_eq!(config.event_buffer_size, 100);
        assert!(config.popup_host.is_none());
    }

    #[test]
    fn test_builder_requires_base_url() {
        let result = ConsoleConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .build();

        match result {
            Err(Error::Config(message)) => assert!(message.contains("api_base_url")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let result = ConsoleConfig::builder()
            .api_base_url("https://console.example.com")
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let result = builder().api_base_url("ftp://console.example.com").build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = builder().api_base_url("not a url").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        assert!(builder().resend_cooldown(Duration::ZERO).build().is_err());
        assert!(builder().popup_poll_interval(Duration::ZERO).build().is_err());
        assert!(builder().request_timeout(Duration::ZERO).build().is_err());
        assert!(builder()
            .resend_cooldown(Duration::from_secs(3600))
            .build()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_empty_popup() {
        assert!(builder().popup_size(0, 700).build().is_err());
        assert!(builder().popup_size(800, 900).build().is_ok());
    }

    #[test]
    fn test_require_popup_host() {
        let config = builder().build().unwrap();
        assert!(matches!(
            config.require_popup_host(),
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "PopupHost"
        ));

        let config = builder().popup_host(Arc::new(MockPopupHost)).build().unwrap();
        assert_eq!(
            config.require_popup_host().unwrap().origin(),
            "https://console.example.com"
        );
    }

    #[test]
    fn test_config_debug_hides_bridges() {
        let config = builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("HttpClient { ... }"));
        assert!(debug.contains("console.example.com"));
    }
}
