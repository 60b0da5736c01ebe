// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Model Alias Resolution and Provider Management
//
// Manages LLM providers and resolves model aliases to actual providers.
// Retries with exponential backoff and switches to the fallback provider on
// the last attempt. The registry is itself an `LLMProvider` bound to the
// default alias, so the orchestration layer sees a single seam.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;
use crate::domain::config::{resolve_secret, CounselConfig, LLMProviderConfig, ModelConfig, ProviderType};
use crate::domain::llm::{ChatMessage, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TextStream};

struct AliasTarget {
    provider_name: String,
    adapter: Arc<dyn LLMProvider>,
}

/// Registry for managing LLM providers and resolving model aliases
pub struct ProviderRegistry {
    aliases: HashMap<String, AliasTarget>,
    /// First model of each provider, used when it acts as fallback
    fallbacks: HashMap<String, Arc<dyn LLMProvider>>,
    default_alias: String,
    fallback_provider: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl ProviderRegistry {
    /// Empty registry; providers are added with [`ProviderRegistry::register`]
    pub fn new(default_alias: impl Into<String>) -> Self {
        Self {
            aliases: HashMap::new(),
            fallbacks: HashMap::new(),
            default_alias: default_alias.into(),
            fallback_provider: None,
            max_retries: 1,
            retry_delay_ms: 0,
        }
    }

    /// Create provider registry from configuration
    pub fn from_config(config: &CounselConfig) -> anyhow::Result<Self> {
        let selection = &config.spec.llm_selection;
        let mut registry = Self::new(selection.default_model.clone())
            .with_retry_policy(selection.max_retries, selection.retry_delay_ms);
        registry.fallback_provider = selection.fallback_provider.clone();

        info!("Initializing LLM provider registry");

        for provider_config in &config.spec.llm_providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            info!("Initializing provider: {}", provider_config.name);

            let api_key = match resolve_secret(provider_config.api_key.as_deref()) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                    continue;
                }
            };

            for model_config in &provider_config.models {
                info!(
                    "Mapping alias '{}' -> {} ({})",
                    model_config.alias, model_config.model, provider_config.name
                );
                let adapter = Self::create_adapter(provider_config, model_config, api_key.clone());
                registry.register(model_config.alias.clone(), provider_config.name.clone(), adapter);
            }
        }

        if registry.aliases.is_empty() {
            warn!("No LLM providers configured - guidance generation will not be available");
        } else if !registry.has_alias(&registry.default_alias) {
            anyhow::bail!(
                "Default model alias '{}' is not provided by any enabled provider",
                registry.default_alias
            );
        }

        Ok(registry)
    }

    fn create_adapter(
        config: &LLMProviderConfig,
        model: &ModelConfig,
        api_key: Option<String>,
    ) -> Arc<dyn LLMProvider> {
        match config.provider_type {
            // OpenAI-compatible APIs (LM Studio, vLLM, etc.) speak the same dialect
            ProviderType::Openai | ProviderType::OpenaiCompatible => {
                Arc::new(OpenAIAdapter::new(config.endpoint.clone(), api_key, model.model.clone()))
            }
            ProviderType::Ollama => Arc::new(OllamaAdapter::new(config.endpoint.clone(), model.model.clone())),
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn with_fallback_provider(mut self, provider_name: impl Into<String>) -> Self {
        self.fallback_provider = Some(provider_name.into());
        self
    }

    /// Bind an alias to an adapter owned by `provider_name`
    pub fn register(
        &mut self,
        alias: impl Into<String>,
        provider_name: impl Into<String>,
        adapter: Arc<dyn LLMProvider>,
    ) {
        let provider_name = provider_name.into();
        self.fallbacks
            .entry(provider_name.clone())
            .or_insert_with(|| adapter.clone());
        self.aliases.insert(
            alias.into(),
            AliasTarget {
                provider_name,
                adapter,
            },
        );
    }

    fn resolve(&self, alias: &str) -> Result<&AliasTarget, LLMError> {
        self.aliases
            .get(alias)
            .ok_or_else(|| LLMError::ModelNotFound(format!("Model alias '{}' not found", alias)))
    }

    fn fallback_for(&self, primary: &str) -> Option<(&str, &Arc<dyn LLMProvider>)> {
        let name = self.fallback_provider.as_deref().filter(|name| *name != primary)?;
        self.fallbacks.get(name).map(|adapter| (name, adapter))
    }

    /// Run `call` against the alias' adapter with retries, falling back to
    /// the fallback provider once the last attempt has failed.
    async fn with_retries<R, F, Fut>(&self, alias: &str, call: F) -> Result<R, LLMError>
    where
        F: Fn(Arc<dyn LLMProvider>) -> Fut,
        Fut: Future<Output = Result<R, LLMError>>,
    {
        let target = self.resolve(alias)?;
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match call(target.adapter.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(alias, "Generation successful on attempt {}", attempt + 1);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        alias,
                        provider = %target.provider_name,
                        "Generation failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    last_error = Some(e);

                    if attempt + 1 < self.max_retries {
                        // Exponential backoff
                        let delay = self.retry_delay_ms.saturating_mul(2_u64.saturating_pow(attempt));
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        if let Some((name, fallback)) = self.fallback_for(&target.provider_name) {
            info!("Trying fallback provider: {}", name);
            return call(fallback.clone()).await;
        }

        Err(last_error.unwrap_or_else(|| LLMError::Provider("Unknown error".into())))
    }

    /// Generate text using a model alias
    pub async fn generate_with(
        &self,
        alias: &str,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        self.with_retries(alias, |provider| async move { provider.generate(messages, options).await })
            .await
    }

    /// Open a fragment stream using a model alias. Only establishing the
    /// stream is retried; failures mid-stream surface to the consumer.
    pub async fn generate_stream_with(
        &self,
        alias: &str,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<TextStream, LLMError> {
        self.with_retries(alias, |provider| async move { provider.generate_stream(messages, options).await })
            .await
    }

    /// Check health of all providers
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();

        for (name, provider) in &self.fallbacks {
            info!("Health checking provider: {}", name);
            results.insert(name.clone(), provider.health_check().await);
        }

        results
    }

    /// Get list of available model aliases
    pub fn available_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.aliases.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Check if a model alias exists
    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    pub fn default_alias(&self) -> &str {
        &self.default_alias
    }
}

#[async_trait]
impl LLMProvider for ProviderRegistry {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        self.generate_with(&self.default_alias, messages, options).await
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<TextStream, LLMError> {
        self.generate_stream_with(&self.default_alias, messages, options).await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.resolve(&self.default_alias)?.adapter.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{LLMProviderConfig, ModelConfig, ProviderType};
    use crate::domain::llm::{FinishReason, TokenUsage};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        name: &'static str,
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(name: &'static str, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Flaky {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(LLMError::Network("connection reset".into()));
            }
            Ok(GenerationResponse {
                text: self.name.to_string(),
                usage: TokenUsage::default(),
                provider: self.name.to_string(),
                model: self.name.to_string(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn config_with(providers: Vec<LLMProviderConfig>) -> CounselConfig {
        let mut config = CounselConfig::default();
        config.spec.llm_providers = providers;
        config
    }

    fn ollama(name: &str, aliases: &[&str]) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            provider_type: ProviderType::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            enabled: true,
            models: aliases
                .iter()
                .map(|alias| ModelConfig {
                    alias: alias.to_string(),
                    model: "llama3.2".to_string(),
                    context_window: Some(8192),
                })
                .collect(),
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = ProviderRegistry::from_config(&config_with(vec![ollama("local", &["default", "judge"])])).unwrap();
        assert!(registry.has_alias("default"));
        assert_eq!(registry.available_aliases(), vec!["default".to_string(), "judge".to_string()]);
    }

    #[test]
    fn test_missing_default_alias_is_rejected() {
        assert!(ProviderRegistry::from_config(&config_with(vec![ollama("local", &["judge"])])).is_err());
    }

    #[test]
    fn test_disabled_provider_is_skipped() {
        let mut provider = ollama("local", &["default"]);
        provider.enabled = false;
        let registry = ProviderRegistry::from_config(&config_with(vec![provider])).unwrap();
        assert!(registry.available_aliases().is_empty());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let primary = Flaky::new("primary", 2);
        let mut registry = ProviderRegistry::new("default").with_retry_policy(3, 0);
        registry.register("default", "primary", primary.clone());

        let response = registry
            .generate(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(response.text, "primary");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fallback_after_last_attempt() {
        let primary = Flaky::new("primary", u32::MAX);
        let backup = Flaky::new("backup", 0);
        let mut registry = ProviderRegistry::new("default")
            .with_retry_policy(2, 0)
            .with_fallback_provider("backup");
        registry.register("default", "primary", primary.clone());
        registry.register("backup-model", "backup", backup.clone());

        let response = registry
            .generate(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(response.text, "backup");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let mut registry = ProviderRegistry::new("default").with_retry_policy(2, 0);
        registry.register("default", "primary", Flaky::new("primary", u32::MAX));

        let err = registry
            .generate(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::Network(_)));
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let registry = ProviderRegistry::new("default");
        let err = registry
            .generate_with("nope", &[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::ModelNotFound(_)));
    }
}
