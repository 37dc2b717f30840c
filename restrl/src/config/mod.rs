//! Run configuration.
//!
//! Plain key/value settings loaded from TOML, overridable field by field
//! through `RESTRL_`-prefixed environment variables. Defaults carry the
//! reference constants.

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Language-model settings for value synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    pub model: String,
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// USD per token, for the cumulative cost readout.
    pub cost_per_token_usd: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-4o".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.8,
            max_tokens: 4000,
            cost_per_token_usd: 5e-6,
        }
    }
}

/// Settings for one run of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL of the API under test.
    pub api_url: String,
    /// Name of the spec, used to derive the report path.
    pub spec_name: String,
    /// Learning rate α.
    pub learning_rate: f64,
    /// Discount factor γ.
    pub discount_factor: f64,
    /// Exploration rate ε for the scheduler-managed agents.
    pub exploration_rate: f64,
    /// ε-greedy rate of the operation agent.
    pub operation_exploration_rate: f64,
    /// Probability that an iteration's request is mutated.
    pub mutation_rate: f64,
    /// Wall-clock budget in seconds.
    pub time_duration_secs: u64,
    /// Warm-up window during which the data source stays idle.
    pub warmup_secs: u64,
    /// Share of warm-up iterations using type-based defaults.
    pub warmup_default_share: f64,
    /// Whether the header agent participates at all.
    pub header_agent_enabled: bool,
    /// Pre-configured Authorization candidates for the header agent.
    pub auth_tokens: Vec<String>,
    /// Bound K on tentative edge pools.
    pub tentative_edge_limit: usize,
    /// Acceptance threshold of the default comparator.
    pub similarity_threshold: f64,
    /// Runner-up matches kept per field.
    pub runner_up_count: usize,
    pub request_timeout_secs: u64,
    /// Directory the success report is written into.
    pub output_dir: PathBuf,
    /// Optional iteration cap; the time budget still applies.
    pub max_iterations: Option<u64>,
    /// Seed for the run's random source; random when absent.
    pub seed: Option<u64>,
    pub llm: LlmSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            spec_name: "api".to_string(),
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.3,
            operation_exploration_rate: 0.7,
            mutation_rate: 0.2,
            time_duration_secs: 1800,
            warmup_secs: 30,
            warmup_default_share: 0.2,
            header_agent_enabled: true,
            auth_tokens: Vec::new(),
            tentative_edge_limit: 5,
            similarity_threshold: 0.75,
            runner_up_count: 5,
            request_timeout_secs: 30,
            output_dir: PathBuf::from("data/successful_responses"),
            max_iterations: None,
            seed: None,
            llm: LlmSettings::default(),
        }
    }
}

const ENV_PREFIX: &str = "RESTRL_";

fn env_override<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .and_then(|value| value.parse().ok())
}

impl RunConfig {
    /// Load from a TOML file and apply environment overrides on top.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: RunConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment beats file values which beat defaults.
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_override("API_URL") {
            self.api_url = value;
        }
        if let Some(value) = env_override("SPEC_NAME") {
            self.spec_name = value;
        }
        if let Some(value) = env_override("LEARNING_RATE") {
            self.learning_rate = value;
        }
        if let Some(value) = env_override("DISCOUNT_FACTOR") {
            self.discount_factor = value;
        }
        if let Some(value) = env_override("EXPLORATION_RATE") {
            self.exploration_rate = value;
        }
        if let Some(value) = env_override("MUTATION_RATE") {
            self.mutation_rate = value;
        }
        if let Some(value) = env_override("TIME_DURATION_SECS") {
            self.time_duration_secs = value;
        }
        if let Some(value) = env_override("HEADER_AGENT_ENABLED") {
            self.header_agent_enabled = value;
        }
        if let Some(value) = env_override("SEED") {
            self.seed = Some(value);
        }
    }
}
