// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Counsel Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - LLM provider configuration and model aliases
// - Embedding backend and persistence backend
// - Retrieval weights, compliance thresholds, orchestration and learning knobs
// - Logging

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use counsel_cortex::{EmbeddingApi, RetrievalWeights};

use super::compliance::ComplianceThresholds;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "CounselConfig";
pub const CONFIG_PATH_ENV: &str = "COUNSEL_CONFIG_PATH";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounselConfig {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CounselConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: CounselConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CounselConfigSpec {
    pub llm_providers: Vec<LLMProviderConfig>,
    pub llm_selection: LLMSelection,
    pub embedding: EmbeddingConfig,
    pub persistence: PersistenceConfig,
    pub retrieval: RetrievalConfig,
    pub compliance: ComplianceConfig,
    pub orchestration: OrchestrationConfig,
    pub learning: LearningConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    Openai,
    OpenaiCompatible,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name (e.g., "ollama-local", "openai")
    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// API endpoint URL
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Alias the core refers to (e.g., "default", "judge")
    pub alias: String,

    /// Actual model identifier for the provider API
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMSelection {
    /// Alias every generation call goes to
    pub default_model: String,

    /// Provider tried on the last attempt when the primary keeps failing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,

    pub max_retries: u32,

    /// Base delay between retries; doubles per attempt
    pub retry_delay_ms: u64,
}

impl Default for LLMSelection {
    fn default() -> Self {
        Self {
            default_model: "default".to_string(),
            fallback_provider: None,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, no network
    Hash,
    OpenaiCompatible,
    Ollama,
}

impl EmbeddingBackend {
    pub fn api(&self) -> Option<EmbeddingApi> {
        match self {
            EmbeddingBackend::Hash => None,
            EmbeddingBackend::OpenaiCompatible => Some(EmbeddingApi::OpenaiCompatible),
            EmbeddingBackend::Ollama => Some(EmbeddingApi::Ollama),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    #[serde(rename = "type")]
    pub backend: EmbeddingBackend,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hash,
            endpoint: None,
            api_key: None,
            model: None,
            dimensions: 384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    /// JSON-lines files, one per record kind
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    #[serde(rename = "type")]
    pub backend: StoreBackend,

    /// Data directory for the file backend (default: ~/.counsel/data)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl PersistenceConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".counsel")
                .join("data")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub memory_weights: RetrievalWeights,
    pub precedent_weights: RetrievalWeights,
    pub half_life_hours: f64,
    pub memory_top_k: usize,
    pub case_top_k: usize,
    pub rule_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            memory_weights: RetrievalWeights::memory(),
            precedent_weights: RetrievalWeights::precedent(),
            half_life_hours: 24.0,
            memory_top_k: 5,
            case_top_k: 3,
            rule_top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub pass_threshold: f64,
    pub borderline_threshold: f64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 0.85,
            borderline_threshold: 0.70,
            temperature: 0.1,
            max_tokens: 800,
        }
    }
}

impl ComplianceConfig {
    pub fn thresholds(&self) -> ComplianceThresholds {
        ComplianceThresholds {
            pass: self.pass_threshold,
            borderline: self.borderline_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Run a reasoning call before generating guidance
    pub chain_of_thought: bool,
    pub temperature: f32,
    /// Strengthen regenerates at `temperature - delta`
    pub strengthen_temperature_delta: f32,
    pub max_tokens: u32,
    pub customer_importance_floor: f64,
    pub advisor_importance_floor: f64,
    /// Customer turns that still count as the opening phase
    pub opening_turns: usize,
    /// Concurrent background validations
    pub validation_workers: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            chain_of_thought: false,
            temperature: 0.7,
            strengthen_temperature_delta: 0.2,
            max_tokens: 1024,
            customer_importance_floor: 0.3,
            advisor_importance_floor: 0.5,
            opening_turns: 2,
            validation_workers: 4,
        }
    }
}

impl OrchestrationConfig {
    pub fn strengthen_temperature(&self) -> f32 {
        (self.temperature - self.strengthen_temperature_delta).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Step size η of rule confidence recalibration
    pub learning_rate: f64,
    /// Dialogue techniques are kept only at or above this conversational quality
    pub technique_quality_floor: f64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            technique_quality_floor: 0.7,
            temperature: 0.3,
            max_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

impl Default for CounselConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "counsel".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CounselConfigSpec::default(),
        }
    }
}

/// Resolve a secret that may be written as `env:VAR_NAME`.
pub fn resolve_secret(value: Option<&str>) -> anyhow::Result<Option<String>> {
    match value {
        Some(k) => match k.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map(Some)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(Some(k.to_string())),
        },
        None => Ok(None),
    }
}

impl CounselConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. COUNSEL_CONFIG_PATH environment variable
    /// 2. ./counsel-config.yaml (working directory)
    /// 3. ~/.counsel/config.yaml (user home)
    /// 4. /etc/counsel/config.yaml (system, Unix) or C:\ProgramData\Counsel\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./counsel-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".counsel").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/counsel/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Counsel\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COUNSEL_CHAIN_OF_THOUGHT") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: COUNSEL_CHAIN_OF_THOUGHT=true");
                    self.spec.orchestration.chain_of_thought = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: COUNSEL_CHAIN_OF_THOUGHT=false");
                    self.spec.orchestration.chain_of_thought = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for COUNSEL_CHAIN_OF_THOUGHT: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(level) = std::env::var("COUNSEL_LOG_LEVEL") {
            self.spec.observability.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        for provider in &spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }

            if provider.endpoint.is_empty() {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }

            if provider.models.is_empty() {
                anyhow::bail!("LLM provider must have at least one model: {}", provider.name);
            }

            for model in &provider.models {
                if model.alias.is_empty() {
                    anyhow::bail!("Model alias cannot be empty in provider: {}", provider.name);
                }

                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty for alias: {}", model.alias);
                }
            }
        }

        if let Some(fallback) = &spec.llm_selection.fallback_provider {
            if !spec.llm_providers.iter().any(|p| &p.name == fallback) {
                anyhow::bail!("Fallback provider '{}' not found in llm_providers", fallback);
            }
        }

        if spec.llm_selection.max_retries == 0 {
            anyhow::bail!("llm_selection.max_retries must be at least 1");
        }

        if spec.embedding.dimensions == 0 {
            anyhow::bail!("embedding.dimensions must be positive");
        }
        if spec.embedding.backend != EmbeddingBackend::Hash
            && (spec.embedding.endpoint.is_none() || spec.embedding.model.is_none())
        {
            anyhow::bail!("embedding.endpoint and embedding.model are required for remote embeddings");
        }

        for (name, weights) in [
            ("memory_weights", &spec.retrieval.memory_weights),
            ("precedent_weights", &spec.retrieval.precedent_weights),
        ] {
            if !weights.is_valid() {
                anyhow::bail!("retrieval.{} must lie in [0, 1]: {:?}", name, weights);
            }
        }
        if !(spec.retrieval.half_life_hours.is_finite() && spec.retrieval.half_life_hours > 0.0) {
            anyhow::bail!("retrieval.half_life_hours must be positive");
        }

        let compliance = &spec.compliance;
        for (name, value) in [
            ("pass_threshold", compliance.pass_threshold),
            ("borderline_threshold", compliance.borderline_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("compliance.{} must lie in [0, 1]: {}", name, value);
            }
        }
        if compliance.borderline_threshold > compliance.pass_threshold {
            anyhow::bail!(
                "compliance.borderline_threshold ({}) cannot exceed pass_threshold ({})",
                compliance.borderline_threshold,
                compliance.pass_threshold
            );
        }

        if spec.orchestration.validation_workers == 0 {
            anyhow::bail!("orchestration.validation_workers must be at least 1");
        }
        for (name, value) in [
            ("customer_importance_floor", spec.orchestration.customer_importance_floor),
            ("advisor_importance_floor", spec.orchestration.advisor_importance_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("orchestration.{} must lie in [0, 1]: {}", name, value);
            }
        }

        let eta = spec.learning.learning_rate;
        if !(eta > 0.0 && eta <= 1.0) {
            anyhow::bail!("learning.learning_rate must lie in (0, 1]: {}", eta);
        }

        Ok(())
    }
}
