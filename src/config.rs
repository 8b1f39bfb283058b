use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::ModelSettings;

pub const API_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    Gemini,
    OpenRouter,
}

impl ModelProvider {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(ModelProvider::Gemini),
            "openrouter" => Some(ModelProvider::OpenRouter),
            _ => None,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            ModelProvider::Gemini => "gemini-1.5-flash",
            ModelProvider::OpenRouter => "google/gemini-flash-1.5",
        }
    }

    fn api_key_var(self) -> &'static str {
        match self {
            ModelProvider::Gemini => "GOOGLE_API_KEY",
            ModelProvider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub provider: ModelProvider,
    /// `None` keeps the server up but every analysis fails with SERVICE_CONFIG_ERROR
    pub api_key: Option<String>,
    pub model: ModelSettings,
    pub analysis_timeout: Duration,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_sweep_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let provider_name = env::var("MODEL_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = ModelProvider::from_string(&provider_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown MODEL_PROVIDER: {}", provider_name))?;

        let api_key = env::var(provider.api_key_var())
            .ok()
            .filter(|key| !key.trim().is_empty());

        let model = ModelSettings {
            model_id: env::var("ANALYSIS_MODEL")
                .unwrap_or_else(|_| provider.default_model().to_string()),
            max_output_tokens: env_or("MAX_OUTPUT_TOKENS", 2048),
            temperature: env_or("TEMPERATURE", 0.4),
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            provider,
            api_key,
            model,
            analysis_timeout: Duration::from_secs(env_or("ANALYSIS_TIMEOUT_SECS", 25)),
            rate_limit_max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", 10),
            rate_limit_window: Duration::from_secs(env_or("RATE_LIMIT_WINDOW_SECS", 60)),
            rate_limit_sweep_interval: Duration::from_secs(env_or("RATE_LIMIT_SWEEP_SECS", 60)),
        })
    }

    pub fn api_key_var(&self) -> &'static str {
        self.provider.api_key_var()
    }
}

fn env_or<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️ {}={:?} is not valid, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
