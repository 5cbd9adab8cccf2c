//! Application State
//!
//! Wires configuration, the model provider, snapshot storage and the
//! research controller together.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use research_desk_core::proxy::ProxyConfig;
use research_desk_llm::{GeminiProvider, ProviderConfig, ProviderType};

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::services::gateway::{LlmGateway, LlmGatewayOptions, ResearchGateway};
use crate::services::research::ResearchController;
use crate::storage::{ConfigService, FileSnapshotBackend, SessionStore};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths;

/// Environment variables holding the API key, in lookup order
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Application state for one process
#[derive(Debug)]
pub struct AppState {
    config: ConfigService,
    /// Proxy for this process only, not saved
    proxy_override: Option<ProxyConfig>,
}

impl AppState {
    /// Load configuration from the default location
    pub fn new() -> AppResult<Self> {
        Ok(Self::with_config_service(ConfigService::new()?))
    }

    pub fn with_config_service(config: ConfigService) -> Self {
        Self {
            config,
            proxy_override: None,
        }
    }

    pub fn set_proxy_override(&mut self, proxy: Option<ProxyConfig>) {
        self.proxy_override = proxy;
    }

    pub fn config(&self) -> &AppConfig {
        self.config.get_config()
    }

    pub fn update_config(&mut self, update: SettingsUpdate) -> AppResult<AppConfig> {
        self.config.update_config(update)
    }

    /// Restore default settings
    pub fn reset_config(&mut self) -> AppResult<()> {
        self.config.reset()
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.config.path()
    }

    /// Directory holding the session snapshot
    pub fn data_dir(&self) -> AppResult<PathBuf> {
        match &self.config().data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::data_dir(),
        }
    }

    /// Provider settings derived from the config, with the key from the
    /// environment.
    pub fn provider_config(&self) -> ProviderConfig {
        let config = self.config();
        let api_key = api_key_from(|name| std::env::var(name).ok());
        if api_key.is_none() {
            warn!("No API key found in {}", API_KEY_VARS.join(" or "));
        }
        ProviderConfig {
            provider: ProviderType::Gemini,
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_output_tokens,
            temperature: ProviderConfig::default().temperature,
            timeout_secs: Some(config.request_timeout_secs),
            proxy: self.proxy_override.clone().or_else(|| config.proxy.clone()),
        }
    }

    pub fn build_gateway(&self) -> AppResult<Arc<dyn ResearchGateway>> {
        let provider = GeminiProvider::new(self.provider_config())
            .map_err(|e| AppError::gateway(e.to_string()))?;
        let options = LlmGatewayOptions {
            report_temperature: self.config().report_temperature,
            enable_search: self.config().enable_search_grounding,
        };
        Ok(Arc::new(LlmGateway::new(Arc::new(provider), options)))
    }

    /// Load the session store from the snapshot directory
    pub fn open_store(&self) -> AppResult<SessionStore> {
        let dir = self.data_dir()?;
        let backend = FileSnapshotBackend::new(&dir)?;
        info!(dir = %dir.display(), "Opened session snapshot");
        Ok(SessionStore::load(Arc::new(backend)))
    }

    pub fn open_controller(&self) -> AppResult<ResearchController> {
        Ok(ResearchController::new(
            self.open_store()?,
            self.build_gateway()?,
        ))
    }
}

/// First non-blank value among [`API_KEY_VARS`].
fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
