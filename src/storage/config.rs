//! JSON Configuration Management
//!
//! Reads and writes the panel settings file: which backends exist, how to
//! reach them, and which model each tier maps to.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use panel_review_llm::{BackendKind, ModelTier, ModelTierMap, ProviderConfig};
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_dir};

/// Panel settings stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    /// Tier used when neither the request nor the backend names one
    #[serde(default)]
    pub default_tier: ModelTier,
    /// Whole-request timeout for every backend call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Route every request/response through the tracing request log
    #[serde(default = "default_log_requests")]
    pub log_requests: bool,
    #[serde(default)]
    pub backends: Vec<BackendSettings>,
}

/// One configured backend, registered under `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub id: String,
    pub kind: BackendKind,
    /// Inline credential. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub models: ModelTierMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<ModelTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_log_requests() -> bool {
    true
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            default_tier: ModelTier::Tier2,
            request_timeout_secs: default_request_timeout_secs(),
            log_requests: default_log_requests(),
            backends: vec![
                BackendSettings::new(
                    "openai",
                    BackendKind::OpenAI,
                    ModelTierMap::new()
                        .with(ModelTier::Tier1, "gpt-4o")
                        .with(ModelTier::Tier2, "gpt-4o-mini")
                        .with(ModelTier::Tier3, "gpt-4o-mini"),
                ),
                BackendSettings::new(
                    "anthropic",
                    BackendKind::Anthropic,
                    ModelTierMap::new()
                        .with(ModelTier::Tier1, "claude-3-5-sonnet-20241022")
                        .with(ModelTier::Tier2, "claude-3-5-haiku-20241022")
                        .with(ModelTier::Tier3, "claude-3-5-haiku-20241022"),
                ),
                BackendSettings::new(
                    "gemini",
                    BackendKind::Gemini,
                    ModelTierMap::new()
                        .with(ModelTier::Tier1, "gemini-1.5-pro")
                        .with(ModelTier::Tier2, "gemini-1.5-flash")
                        .with(ModelTier::Tier3, "gemini-1.5-flash-8b"),
                ),
            ],
        }
    }
}

impl PanelSettings {
    /// Validate settings values
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.id.trim().is_empty() {
                return Err("backend id must not be empty".to_string());
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(format!("duplicate backend id: {}", backend.id));
            }
            if backend.models.is_empty() {
                return Err(format!("backend '{}' has no models configured", backend.id));
            }
        }

        Ok(())
    }

    pub fn backend(&self, id: &str) -> Option<&BackendSettings> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Copy of these settings keeping only backends whose credential
    /// resolves, so a registry can be built with a subset of keys present.
    pub fn credentialed(&self, env: impl Fn(&str) -> Option<String>) -> Self {
        let backends = self
            .backends
            .iter()
            .filter(|b| b.resolve_api_key(&env).is_some())
            .cloned()
            .collect();
        Self {
            backends,
            ..self.clone()
        }
    }

    /// Tier for `id`: request override, then backend setting, then default.
    pub fn resolve_tier(
        &self,
        backend: &BackendSettings,
        overrides: &HashMap<String, ModelTier>,
    ) -> ModelTier {
        overrides
            .get(&backend.id)
            .copied()
            .or(backend.tier)
            .unwrap_or(self.default_tier)
    }

    /// Build the transport config for one backend.
    ///
    /// `env` looks up environment variables; pass `|k| std::env::var(k).ok()`
    /// outside tests.
    pub fn provider_config(
        &self,
        backend: &BackendSettings,
        overrides: &HashMap<String, ModelTier>,
        env: impl Fn(&str) -> Option<String>,
    ) -> AppResult<ProviderConfig> {
        let tier = self.resolve_tier(backend, overrides);
        let model = backend
            .models
            .resolve(tier)
            .map_err(|e| AppError::config(format!("backend '{}': {}", backend.id, e.reason())))?;

        let api_key = backend.resolve_api_key(env).ok_or_else(|| {
            AppError::config(format!(
                "backend '{}': no API key (set api_key, api_key_env or {})",
                backend.id,
                backend.kind.default_api_key_env()
            ))
        })?;

        let defaults = ProviderConfig::default();
        Ok(ProviderConfig {
            backend: backend.kind,
            api_key: Some(api_key),
            base_url: backend.base_url.clone(),
            model: model.to_string(),
            max_tokens: backend.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: backend.temperature.unwrap_or(defaults.temperature),
            request_timeout_secs: self.request_timeout_secs,
        })
    }
}

impl BackendSettings {
    pub fn new(id: impl Into<String>, kind: BackendKind, models: ModelTierMap) -> Self {
        Self {
            id: id.into(),
            kind,
            api_key: None,
            api_key_env: None,
            base_url: None,
            models,
            tier: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Inline key, else `api_key_env`, else the kind's default variable.
    pub fn resolve_api_key(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);

        if let Some(key) = self.api_key.clone().and_then(non_empty) {
            return Some(key);
        }
        if let Some(var) = self.api_key_env.as_deref() {
            if let Some(key) = env(var).and_then(non_empty) {
                return Some(key);
            }
        }
        env(self.kind.default_api_key_env()).and_then(non_empty)
    }
}

/// Configuration service for managing panel settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    settings: PanelSettings,
}

impl ConfigService {
    /// Load settings from the default location, creating defaults if absent
    pub fn new() -> AppResult<Self> {
        Self::open(config_path()?)
    }

    /// Load settings from `path`, creating defaults if absent.
    ///
    /// The defaults list an OpenAI, an Anthropic and a Gemini backend.
    /// [`ProviderRegistry::from_settings`](crate::services::ProviderRegistry::from_settings)
    /// needs a credential for every listed backend, so either remove the
    /// unused ones or build from [`PanelSettings::credentialed`].
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let config_path = path.into();
        let settings = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            if let Some(parent) = config_path.parent() {
                ensure_dir(parent)?;
            }
            let defaults = PanelSettings::default();
            Self::save_to_file(&config_path, &defaults)?;
            defaults
        };

        Ok(Self {
            config_path,
            settings,
        })
    }

    /// Load settings from a file
    pub fn load_from_file(path: &Path) -> AppResult<PanelSettings> {
        let content = fs::read_to_string(path)?;
        let settings: PanelSettings = serde_json::from_str(&content)?;
        settings.validate().map_err(AppError::validation)?;
        Ok(settings)
    }

    /// Save settings to a file with pretty formatting
    pub fn save_to_file(path: &Path, settings: &PanelSettings) -> AppResult<()> {
        settings.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current settings
    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Replace the settings and persist them
    pub fn update(&mut self, settings: PanelSettings) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Reload settings from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.settings = Self::load_from_file(&self.config_path)?;
        Ok(())
    }
}
