use media_sync_models::ScoreFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default = "default_retry_config")]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The tracking services progress is synced to. The primary service keeps rich
/// history; the secondary one only a list entry per item.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<ServiceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<ServiceConfig>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            primary: Some(ServiceConfig {
                enabled: true,
                name: "anilist".to_string(),
                score_format: ScoreFormat::Point100,
            }),
            secondary: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub name: String,
    #[serde(default)]
    pub score_format: ScoreFormat,
}

/// Bounded exponential backoff for rate-limited or failed remote writes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    pub fn backoff_base(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        default_retry_config()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json_logging")]
    pub json: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
            file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    8_000
}

pub fn default_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: default_max_attempts(),
        backoff_base_ms: default_backoff_base_ms(),
        backoff_max_ms: default_backoff_max_ms(),
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    use std::io::IsTerminal;
    !std::io::stdout().is_terminal()
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config, falling back to defaults when the file does not exist yet.
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(anyhow::anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_base_ms == 0 {
            return Err(anyhow::anyhow!("retry.backoff_base_ms must be positive"));
        }
        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            return Err(anyhow::anyhow!(
                "retry.backoff_max_ms ({}) must not be lower than retry.backoff_base_ms ({})",
                self.retry.backoff_max_ms,
                self.retry.backoff_base_ms
            ));
        }

        let enabled = self.enabled_services();
        for service in &enabled {
            if service.name.trim().is_empty() {
                return Err(anyhow::anyhow!("An enabled service has an empty name"));
            }
        }
        if let [primary, secondary] = enabled.as_slice() {
            if primary.name.eq_ignore_ascii_case(&secondary.name) {
                return Err(anyhow::anyhow!(
                    "Primary and secondary services are both '{}'",
                    primary.name
                ));
            }
        }

        Ok(())
    }

    /// Enabled services, primary first
    pub fn enabled_services(&self) -> Vec<&ServiceConfig> {
        [&self.services.primary, &self.services.secondary]
            .into_iter()
            .flatten()
            .filter(|s| s.enabled)
            .collect()
    }

    pub fn find_service(&self, name: &str) -> Option<&ServiceConfig> {
        self.enabled_services()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}
