use std::path::Path;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::indicator::ma::EmaSeed;
use crate::narrative::openai::OpenAiConfig;
use crate::report::PromptLanguage;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub analysis: AnalysisConfig,
    pub provider: ProviderConfig,
    pub narrative: NarrativeConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

/// EMA seeding used for the MACD, fast, slow and signal lines alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdSeed {
    #[default]
    FirstValue,
    SimpleMean,
}

impl From<MacdSeed> for EmaSeed {
    fn from(seed: MacdSeed) -> Self {
        match seed {
            MacdSeed::FirstValue => EmaSeed::FirstValue,
            MacdSeed::SimpleMean => EmaSeed::SimpleMean,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub macd_seed: MacdSeed,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub prompt_language: PromptLanguage,
    /// Used when no symbols are given on the command line.
    pub symbols: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            macd_seed: MacdSeed::default(),
            bollinger_window: 20,
            bollinger_k: 2.0,
            prompt_language: PromptLanguage::default(),
            symbols: vec!["QQQ".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Yahoo chart range, e.g. `"1y"`.
    pub range: String,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
    /// Maximum price fetches in flight during a batch run.
    pub concurrency: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".into(),
            range: "1y".into(),
            requests_per_second: 2,
            timeout_secs: 10,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 30,
            temperature: 0.7,
        }
    }
}

impl NarrativeConfig {
    /// Resolve the API key through `lookup` and build the client settings.
    pub fn client_config(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<OpenAiConfig, Report<ConfigError>> {
        let api_key = lookup(&self.api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Report::new(ConfigError::MissingSecret {
                    var: self.api_key_env.clone(),
                })
            })?;
        Ok(OpenAiConfig {
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            model: self.model.clone(),
            api_key,
            timeout: Duration::from_secs(self.timeout_secs),
            temperature: self.temperature,
        })
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_RANGES: &[&str] = &["3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max"];

pub fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(&config.general)?;
    validate_analysis(&config.analysis)?;
    validate_provider(&config.provider)?;
    validate_narrative(&config.narrative)?;
    Ok(())
}

fn invalid(field: impl Into<String>) -> Report<ConfigError> {
    Report::new(ConfigError::Validation {
        field: field.into(),
    })
}

fn validate_general(general: &GeneralConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            general.log_format
        )));
    }
    Ok(())
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), Report<ConfigError>> {
    let periods = [
        ("rsi_period", analysis.rsi_period),
        ("macd_fast", analysis.macd_fast),
        ("macd_slow", analysis.macd_slow),
        ("macd_signal", analysis.macd_signal),
    ];
    for (name, value) in periods {
        if value == 0 {
            return Err(invalid(format!("analysis.{name} must be > 0")));
        }
    }
    if analysis.macd_fast >= analysis.macd_slow {
        return Err(invalid(format!(
            "analysis.macd_fast ({}) must be < analysis.macd_slow ({})",
            analysis.macd_fast, analysis.macd_slow
        )));
    }
    if analysis.bollinger_window < 2 {
        return Err(invalid("analysis.bollinger_window must be >= 2"));
    }
    if analysis.bollinger_k.is_nan() || analysis.bollinger_k <= 0.0 {
        return Err(invalid("analysis.bollinger_k must be > 0"));
    }
    Ok(())
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_RANGES.contains(&provider.range.as_str()) {
        return Err(invalid(format!(
            "provider.range \"{}\" is not valid",
            provider.range
        )));
    }
    if provider.requests_per_second == 0 {
        return Err(invalid("provider.requests_per_second must be > 0"));
    }
    if provider.timeout_secs == 0 {
        return Err(invalid("provider.timeout_secs must be > 0"));
    }
    if provider.concurrency == 0 {
        return Err(invalid("provider.concurrency must be > 0"));
    }
    Ok(())
}

fn validate_narrative(narrative: &NarrativeConfig) -> Result<(), Report<ConfigError>> {
    if narrative.timeout_secs == 0 {
        return Err(invalid("narrative.timeout_secs must be > 0"));
    }
    if narrative.model.trim().is_empty() {
        return Err(invalid("narrative.model must not be empty"));
    }
    if !(0.0..=2.0).contains(&narrative.temperature) {
        return Err(invalid("narrative.temperature must be within 0.0..=2.0"));
    }
    Ok(())
}
