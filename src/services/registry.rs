//! Provider Registry
//!
//! Immutable map from provider id to [`AnalysisProvider`]. Built once, then
//! shared by reference with the pipeline controller and retry coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use panel_review_llm::{
    create_backend, AnalysisProvider, LlmAnalysisProvider, ModelTier, RequestLogSink,
    TracingRequestLog,
};
use tracing::{debug, info};

use crate::storage::config::PanelSettings;
use crate::utils::error::{AppError, AppResult};

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn AnalysisProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration. Rejects a duplicate id.
    pub fn with_provider(mut self, provider: Arc<dyn AnalysisProvider>) -> AppResult<Self> {
        let id = provider.id().to_string();
        if id.trim().is_empty() {
            return Err(AppError::config("provider id must not be empty"));
        }
        if self.providers.contains_key(&id) {
            return Err(AppError::config(format!("duplicate provider id: {}", id)));
        }
        debug!(provider = %id, model = provider.model(), "registry: provider registered");
        self.providers.insert(id, provider);
        Ok(self)
    }

    /// Build one provider per configured backend.
    ///
    /// Fails on the first backend whose tier, credential or URL cannot be
    /// resolved. `log_sink` overrides the default tracing sink; with
    /// `log_requests` off and no override, exchanges are not logged.
    pub fn from_settings(
        settings: &PanelSettings,
        model_tiers: &HashMap<String, ModelTier>,
        log_sink: Option<Arc<dyn RequestLogSink>>,
    ) -> AppResult<Self> {
        Self::from_settings_with_env(settings, model_tiers, log_sink, |k| std::env::var(k).ok())
    }

    pub(crate) fn from_settings_with_env(
        settings: &PanelSettings,
        model_tiers: &HashMap<String, ModelTier>,
        log_sink: Option<Arc<dyn RequestLogSink>>,
        env: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        settings.validate().map_err(AppError::validation)?;

        let sink: Option<Arc<dyn RequestLogSink>> = match log_sink {
            Some(sink) => Some(sink),
            None if settings.log_requests => Some(Arc::new(TracingRequestLog)),
            None => None,
        };

        let mut registry = Self::new();
        for backend in &settings.backends {
            let tier = settings.resolve_tier(backend, model_tiers);
            let config = settings.provider_config(backend, model_tiers, &env)?;
            let transport = create_backend(config)
                .map_err(|e| AppError::config(format!("backend '{}': {}", backend.id, e.reason())))?;

            let mut provider = LlmAnalysisProvider::new(backend.id.clone(), transport).with_tier(tier);
            if let Some(sink) = &sink {
                provider = provider.with_log_sink(Arc::clone(sink));
            }
            registry = registry.with_provider(Arc::new(provider))?;
        }

        info!(providers = registry.len(), "registry: built from settings");
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn AnalysisProvider>> {
        self.providers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Check that every provider in `ids` was built for the tier `requested`
    /// names for it. Ids absent from `requested` are not checked.
    pub fn check_tiers<'a, I>(&self, ids: I, requested: &HashMap<String, ModelTier>) -> AppResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut problems = Vec::new();
        let mut checked = Vec::new();
        for id in ids {
            if checked.contains(&id) {
                continue;
            }
            checked.push(id);
            let (Some(&want), Some(provider)) = (requested.get(id), self.providers.get(id)) else {
                continue;
            };
            match provider.tier() {
                Some(built) if built == want => {}
                Some(built) => problems.push(format!(
                    "'{}' requested {} but is registered with {} ({})",
                    id,
                    want,
                    built,
                    provider.model()
                )),
                None => problems.push(format!("'{}' requested {} but has no model tier", id, want)),
            }
        }
        if !problems.is_empty() {
            return Err(AppError::config(format!(
                "no model configured for requested tier: {}",
                problems.join("; ")
            )));
        }
        Ok(())
    }

    /// Look up every id, reporting all unknown ones in a single error.
    pub fn resolve_all<'a, I>(&self, ids: I) -> AppResult<Vec<Arc<dyn AnalysisProvider>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut found = Vec::new();
        let mut missing: Vec<&str> = Vec::new();
        for id in ids {
            match self.providers.get(id) {
                Some(p) => found.push(Arc::clone(p)),
                None if !missing.contains(&id) => missing.push(id),
                None => {}
            }
        }
        if !missing.is_empty() {
            return Err(AppError::config(format!(
                "unknown provider(s): {} (registered: {})",
                missing.join(", "),
                self.ids().join(", ")
            )));
        }
        Ok(found)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}
