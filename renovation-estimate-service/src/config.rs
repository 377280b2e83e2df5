use anyhow::{Context as _, anyhow};
use renovation_core::visualization::{AuthScheme, FallbackSettings, ProviderSettings};
use renovation_core::{FactorTables, OrchestratorConfig, PollPolicy};
use secrecy::SecretString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ASSESSOR_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct AssessorSettings {
    pub api_key: SecretString,
    pub model: String,
    pub request_timeout: Duration,
}

/// Service configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// `None` disables the space assessor; requests get default assessments.
    pub assessor: Option<AssessorSettings>,
    /// `None` disables the masked provider; visualization goes to the fallback.
    pub provider: Option<ProviderSettings>,
    pub orchestrator: OrchestratorConfig,
    pub fallback: Option<FallbackSettings>,
    pub factor_tables_path: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = parse_or(&var, "PORT", DEFAULT_PORT)?;

        let assessor = var("OPENROUTER_API_KEY").map(|key| AssessorSettings {
            api_key: SecretString::from(key),
            model: var("ASSESSOR_MODEL").unwrap_or_else(|| DEFAULT_ASSESSOR_MODEL.to_string()),
            request_timeout: Duration::from_secs(60),
        });

        let provider = match (var("IMAGE_PROVIDER_BASE_URL"), var("IMAGE_PROVIDER_API_KEY")) {
            (Some(base_url), Some(key)) => {
                let mut settings = ProviderSettings::new(base_url, SecretString::from(key));
                if let Some(scheme) = var("IMAGE_PROVIDER_MASK_AUTH") {
                    settings.mask_auth = parse_auth("IMAGE_PROVIDER_MASK_AUTH", &scheme)?;
                }
                if let Some(scheme) = var("IMAGE_PROVIDER_RENDER_AUTH") {
                    settings.render_auth = parse_auth("IMAGE_PROVIDER_RENDER_AUTH", &scheme)?;
                }
                Some(settings)
            }
            _ => None,
        };

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            mask_poll: PollPolicy {
                interval: Duration::from_millis(positive(
                    "MASK_POLL_INTERVAL_MS",
                    parse_or(
                        &var,
                        "MASK_POLL_INTERVAL_MS",
                        defaults.mask_poll.interval.as_millis() as u64,
                    )?,
                )?),
                max_attempts: positive(
                    "MASK_MAX_ATTEMPTS",
                    parse_or(&var, "MASK_MAX_ATTEMPTS", defaults.mask_poll.max_attempts)?,
                )?,
            },
            render_poll: PollPolicy {
                interval: Duration::from_millis(positive(
                    "RENDER_POLL_INTERVAL_MS",
                    parse_or(
                        &var,
                        "RENDER_POLL_INTERVAL_MS",
                        defaults.render_poll.interval.as_millis() as u64,
                    )?,
                )?),
                max_attempts: positive(
                    "RENDER_MAX_ATTEMPTS",
                    parse_or(&var, "RENDER_MAX_ATTEMPTS", defaults.render_poll.max_attempts)?,
                )?,
            },
            control_strength: match var("RENDER_CONTROL_STRENGTH") {
                Some(value) => Some(parse_value("RENDER_CONTROL_STRENGTH", &value)?),
                None => defaults.control_strength,
            },
        };

        let fallback = match (var("FALLBACK_RENDER_URL"), var("FALLBACK_RENDER_API_KEY")) {
            (Some(endpoint), Some(key)) => Some(FallbackSettings {
                endpoint,
                api_key: SecretString::from(key),
                model: var("FALLBACK_RENDER_MODEL").unwrap_or_else(|| "default".to_string()),
                request_timeout: Duration::from_secs(90),
            }),
            _ => None,
        };

        Ok(Self {
            port,
            assessor,
            provider,
            orchestrator,
            fallback,
            factor_tables_path: var("FACTOR_TABLES_PATH").map(PathBuf::from),
        })
    }

    pub fn load_factor_tables(&self) -> anyhow::Result<FactorTables> {
        match &self.factor_tables_path {
            Some(path) => FactorTables::load(path)
                .with_context(|| format!("Failed to load factor tables from {}", path.display())),
            None => Ok(FactorTables::standard()),
        }
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", value, key, e))
}

fn positive<T: Default + PartialOrd + std::fmt::Display>(key: &str, value: T) -> anyhow::Result<T> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(anyhow!("Invalid value '{}' for {}: must be at least 1", value, key))
    }
}

fn parse_auth(key: &str, value: &str) -> anyhow::Result<AuthScheme> {
    AuthScheme::parse(value)
        .ok_or_else(|| anyhow!("Invalid value '{}' for {}: expected 'api-key' or 'bearer'", value, key))
}
