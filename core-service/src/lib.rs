//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`ConsoleConfig`] into ready-to-use
//! controllers for a UI host: one [`AuthFlowController`] per auth page and an
//! [`OAuthReauthCoordinator`] for connector reauthorization. Desktop apps
//! typically enable the `desktop-shims` feature (which supplies the reqwest
//! transport), whereas WebAssembly builds enable the `wasm` feature and rely
//! on the adapters from `bridge-wasm`.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_auth::{
    AuthApi, AuthFlow, AuthFlowController, AuthSession, HttpAuthApi, OAuthReauthCoordinator,
};
use core_runtime::config::ConsoleConfig;
use core_runtime::events::EventBus;
use tracing::{debug, info};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct ConsoleService {
    config: Arc<ConsoleConfig>,
    api: Arc<dyn AuthApi>,
    event_bus: EventBus,
}

impl ConsoleService {
    /// Create a service talking to `config.api_base_url` over the configured
    /// HTTP client.
    pub fn new(config: ConsoleConfig) -> Self {
        let api = HttpAuthApi::new(config.api_base_url.clone(), config.http_client.clone())
            .with_timeout(config.auth.request_timeout);
        Self::with_api(config, Arc::new(api))
    }

    /// Create a service around a custom [`AuthApi`] implementation.
    pub fn with_api(config: ConsoleConfig, api: Arc<dyn AuthApi>) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        info!(api_base_url = %config.api_base_url, "Console service initialized");
        Self {
            config: Arc::new(config),
            api,
            event_bus,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Event bus shared by every controller this service creates.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// A fresh controller for one auth page session.
    pub fn auth_flow(&self, flow: AuthFlow) -> AuthFlowController {
        debug!(flow = flow.as_str(), "Creating auth flow controller");
        AuthFlowController::new(
            flow,
            self.api.clone(),
            self.event_bus.clone(),
            &self.config.auth,
        )
    }

    /// Coordinator for OAuth reauthorization popups.
    ///
    /// Fails with [`CoreError::CapabilityMissing`] when no popup host was
    /// configured.
    pub fn reauth(&self) -> Result<OAuthReauthCoordinator> {
        let host = self.config.require_popup_host()?;
        Ok(OAuthReauthCoordinator::new(
            self.api.clone(),
            host,
            self.event_bus.clone(),
            self.config.reauth.clone(),
        ))
    }

    /// Whether `session` has passed its expiry according to the configured
    /// clock.
    pub fn is_session_expired(&self, session: &AuthSession) -> bool {
        session.is_expired_at(self.config.clock.now())
    }
}

impl std::fmt::Debug for ConsoleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleService")
            .field("config", &self.config)
            .field("subscribers", &self.event_bus.subscriber_count())
            .finish()
    }
}

/// Convenience bootstrapper for WebAssembly hosts.
///
/// ```ignore
/// use core_service::bootstrap_wasm;
/// use core_auth::AuthFlow;
///
/// let service = bootstrap_wasm("https://console.example.com/api")?;
/// let login = service.auth_flow(AuthFlow::Login);
/// let reauth = service.reauth()?;
/// ```
#[cfg(feature = "wasm")]
pub fn bootstrap_wasm(api_base_url: &str) -> Result<ConsoleService> {
    use bridge_wasm::{WasmHttpClient, WebPopupHost};

    let http_client =
        WasmHttpClient::new().map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let popup_host =
        WebPopupHost::new().map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let config = ConsoleConfig::builder()
        .api_base_url(api_base_url)
        .http_client(Arc::new(http_client))
        .popup_host(Arc::new(popup_host))
        .build()?;

    Ok(ConsoleService::new(config))
}
