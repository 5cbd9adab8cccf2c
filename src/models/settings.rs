//! Settings Models
//!
//! Application configuration and settings data structures.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use research_desk_core::proxy::ProxyConfig;

/// Application configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative model used for all three calls
    #[serde(default = "default_model")]
    pub model: String,
    /// API base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature for report generation
    #[serde(default = "default_report_temperature")]
    pub report_temperature: f32,
    /// Output token ceiling per call
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Ground reports with web search
    #[serde(default = "default_true")]
    pub enable_search_grounding: bool,
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Snapshot directory override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Enable debug mode
    #[serde(default)]
    pub debug_mode: bool,
    /// Outbound proxy for model calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_report_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            report_temperature: default_report_temperature(),
            max_output_tokens: default_max_output_tokens(),
            enable_search_grounding: true,
            request_timeout_secs: default_request_timeout_secs(),
            data_dir: None,
            debug_mode: false,
            proxy: None,
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub model: Option<String>,
    pub base_url: Option<Option<String>>,
    pub report_temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub enable_search_grounding: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub data_dir: Option<Option<PathBuf>>,
    pub debug_mode: Option<bool>,
    pub proxy: Option<Option<ProxyConfig>>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(base_url) = update.base_url {
            self.base_url = base_url;
        }
        if let Some(temperature) = update.report_temperature {
            self.report_temperature = temperature;
        }
        if let Some(max) = update.max_output_tokens {
            self.max_output_tokens = max;
        }
        if let Some(enabled) = update.enable_search_grounding {
            self.enable_search_grounding = enabled;
        }
        if let Some(timeout) = update.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(data_dir) = update.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(debug) = update.debug_mode {
            self.debug_mode = debug;
        }
        if let Some(proxy) = update.proxy {
            self.proxy = proxy;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }

        if !(0.0..=2.0).contains(&self.report_temperature) {
            return Err(format!(
                "Invalid report_temperature: {}. Must be between 0.0 and 2.0",
                self.report_temperature
            ));
        }

        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be greater than 0".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }

        if let Some(base_url) = &self.base_url {
            let parsed = url::Url::parse(base_url)
                .map_err(|e| format!("Invalid base_url {}: {}", base_url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("base_url must be http or https: {}", base_url));
            }
        }

        if let Some(proxy) = &self.proxy {
            proxy.validate().map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}
