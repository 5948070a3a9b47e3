//! Configuration loading
//!
//! Credentials come from the environment (optionally seeded from a `.env`
//! file). Retry, concurrency and buyout settings come from an optional TOML
//! file, and command-line flags override both.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::credentials::CredentialContext;
use crate::api::resilience::{LogLevel, ResilienceConfig, ResilienceConfigBuilder};
use crate::services::buyout::BuyoutFields;

pub const APP_DIR: &str = "jira-assets";
pub const CONFIG_FILE: &str = "config.toml";

pub const ENV_USER: &str = "JIRA_USER";
pub const ENV_API_TOKEN: &str = "JIRA_API_TOKEN";
pub const ENV_WORKSPACE_ID: &str = "JIRA_WORKSPACE_ID";
pub const ENV_SITE_URL: &str = "JIRA_URL";
pub const ENV_API_URL: &str = "JIRA_ASSETS_API_URL";

/// Resilience preset selected with `--profile`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    #[default]
    Default,
    Conservative,
    Aggressive,
    /// No retries and no request cap
    Disabled,
}

impl Profile {
    fn preset(self) -> ResilienceConfig {
        match self {
            Profile::Default => ResilienceConfig::default(),
            Profile::Conservative => ResilienceConfig::conservative(),
            Profile::Aggressive => ResilienceConfig::aggressive(),
            Profile::Disabled => ResilienceConfig::disabled(),
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub retry: RetrySection,
    pub concurrency: ConcurrencySection,
    pub logging: LoggingSection,
    pub buyout: BuyoutFields,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
    pub honor_retry_after: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencySection {
    pub workers: Option<usize>,
    pub max_concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// error, warn, info, debug or trace
    pub level: Option<String>,
    /// Log every outgoing request at debug level
    pub request_logging: Option<bool>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration file")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }
}

/// Command-line flags that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Profile,
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: CredentialContext,
    /// Jira site URL, shown to the user only
    pub site_url: Option<String>,
    pub resilience: ResilienceConfig,
    pub buyout: BuyoutFields,
    /// Config file that was read, if any
    pub config_file: Option<PathBuf>,
}

/// `<config_dir>/jira-assets/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Load from `.env`, the process environment and the config file.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(e).context("Failed to load .env file");
            }
        }

        let config_file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };
        let file = match &config_file {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };

        let mut config = Self::load_from(|key| std::env::var(key).ok(), file, overrides)?;
        config.config_file = config_file;
        Ok(config)
    }

    /// Build from an environment lookup and already-parsed file contents
    pub fn load_from<F>(env: F, file: FileConfig, overrides: &Overrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            lookup(key).with_context(|| format!("{} is not set (environment or .env file)", key))
        };

        let user = required(ENV_USER)?;
        let api_token = required(ENV_API_TOKEN)?;
        let credentials = match lookup(ENV_API_URL) {
            Some(api_url) => CredentialContext::new(api_url, user, api_token),
            None => CredentialContext::for_workspace(&required(ENV_WORKSPACE_ID)?, user, api_token),
        };

        let resilience = build_resilience(&file, overrides)?;

        Ok(Self {
            credentials,
            site_url: lookup(ENV_SITE_URL),
            resilience,
            buyout: file.buyout,
            config_file: None,
        })
    }
}

fn build_resilience(file: &FileConfig, overrides: &Overrides) -> Result<ResilienceConfig> {
    let mut builder = ResilienceConfigBuilder::from_config(overrides.profile.preset());

    let retry = &file.retry;
    let max_retries = overrides.max_retries.or(retry.max_retries);
    let initial_delay_ms = overrides.initial_delay_ms.or(retry.initial_delay_ms);
    let max_delay_ms = overrides.max_delay_ms.or(retry.max_delay_ms);

    if let Some(n) = max_retries {
        builder = builder.max_retries(n);
    }
    if let Some(ms) = initial_delay_ms {
        builder = builder.initial_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = max_delay_ms {
        builder = builder.max_delay(Duration::from_millis(ms));
    }
    if let Some(jitter) = retry.jitter {
        builder = builder.jitter(jitter);
    }
    if let Some(honor) = retry.honor_retry_after {
        builder = builder.honor_retry_after(honor);
    }
    if let Some(workers) = overrides.workers.or(file.concurrency.workers) {
        builder = builder.workers(workers);
    }
    if let Some(max) = file.concurrency.max_concurrent_requests {
        builder = builder.max_concurrent_requests(max);
    }
    if let Some(level) = &file.logging.level {
        let level = LogLevel::parse(level)
            .with_context(|| format!("Unknown log level '{}' in [logging]", level))?;
        builder = builder.log_level(level);
    }
    if let Some(enabled) = file.logging.request_logging {
        builder = builder.request_logging(enabled);
    }

    let config = builder.build();
    if config.retry.initial_delay > config.retry.max_delay {
        anyhow::bail!(
            "initial retry delay ({}ms) exceeds the maximum delay ({}ms)",
            config.retry.initial_delay.as_millis(),
            config.retry.max_delay.as_millis()
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base_env() -> impl Fn(&str) -> Option<String> {
        env(&[
            (ENV_USER, "agent@example.com"),
            (ENV_API_TOKEN, "secret"),
            (ENV_WORKSPACE_ID, "ws-123"),
        ])
    }

    #[test]
    fn test_load_from_environment() {
        let config = Config::load_from(base_env(), FileConfig::default(), &Overrides::default()).unwrap();

        assert_eq!(config.credentials.user(), "agent@example.com");
        assert_eq!(
            config.credentials.base_url(),
            "https://api.atlassian.com/jsm/assets/workspace/ws-123/v1"
        );
        assert_eq!(config.resilience.retry.max_retries, 5);
        assert_eq!(config.buyout, BuyoutFields::default());
        assert!(config.site_url.is_none());
    }

    #[test]
    fn test_missing_credentials_are_reported() {
        let err = Config::load_from(
            env(&[(ENV_USER, "agent@example.com"), (ENV_API_TOKEN, "  ")]),
            FileConfig::default(),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_API_TOKEN));

        let err = Config::load_from(
            env(&[(ENV_USER, "agent@example.com"), (ENV_API_TOKEN, "secret")]),
            FileConfig::default(),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_WORKSPACE_ID));
    }

    #[test]
    fn test_api_url_replaces_workspace_lookup() {
        let config = Config::load_from(
            env(&[
                (ENV_USER, "agent@example.com"),
                (ENV_API_TOKEN, "secret"),
                (ENV_API_URL, "http://localhost:8080/v1/"),
                (ENV_SITE_URL, "https://example.atlassian.net"),
            ]),
            FileConfig::default(),
            &Overrides::default(),
        )
        .unwrap();

        assert_eq!(config.credentials.base_url(), "http://localhost:8080/v1");
        assert_eq!(config.site_url.as_deref(), Some("https://example.atlassian.net"));
    }

    #[test]
    fn test_file_settings_apply() {
        let file = FileConfig::parse(
            r#"
            [retry]
            max_retries = 3
            initial_delay_ms = 500
            max_delay_ms = 8000
            jitter = true

            [concurrency]
            workers = 12
            max_concurrent_requests = 20

            [buyout]
            original_cost = "Cost"
            age_months = ""
            "#,
        )
        .unwrap();

        let config = Config::load_from(base_env(), file, &Overrides::default()).unwrap();
        let retry = &config.resilience.retry;
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.initial_delay, Duration::from_millis(500));
        assert_eq!(retry.max_delay, Duration::from_secs(8));
        assert!(retry.jitter);
        assert!(retry.honor_retry_after);
        assert_eq!(config.resilience.concurrency.workers, 12);
        assert_eq!(config.resilience.concurrency.max_concurrent_requests, 20);
        assert_eq!(config.buyout.original_cost, "Cost");
        assert_eq!(config.buyout.age_months, "");
        assert_eq!(config.buyout.purchase_date, "Purchase Date");
    }

    #[test]
    fn test_flags_override_file_and_profile() {
        let file = FileConfig::parse("[retry]\nmax_retries = 3\n[concurrency]\nworkers = 4\n").unwrap();
        let overrides = Overrides {
            profile: Profile::Conservative,
            workers: Some(500),
            max_retries: Some(7),
            ..Default::default()
        };

        let config = Config::load_from(base_env(), file, &overrides).unwrap();
        assert_eq!(config.resilience.retry.max_retries, 7);
        assert_eq!(config.resilience.concurrency.workers, 50);
        // Untouched settings come from the preset
        assert_eq!(
            config.resilience.concurrency.max_concurrent_requests,
            ResilienceConfig::conservative().concurrency.max_concurrent_requests
        );
    }

    #[test]
    fn test_log_level_from_profile_and_file() {
        let level = |file: FileConfig, profile: Profile| {
            let overrides = Overrides {
                profile,
                ..Default::default()
            };
            Config::load_from(base_env(), file, &overrides)
                .map(|c| c.resilience.monitoring.log_level)
        };

        assert_eq!(level(FileConfig::default(), Profile::Default).unwrap(), LogLevel::Warn);
        assert_eq!(level(FileConfig::default(), Profile::Aggressive).unwrap(), LogLevel::Info);

        let file = FileConfig::parse("[logging]\nlevel = \"debug\"\nrequest_logging = false\n").unwrap();
        let config = Config::load_from(base_env(), file, &Overrides::default()).unwrap();
        assert_eq!(config.resilience.monitoring.log_level, LogLevel::Debug);
        assert!(!config.resilience.monitoring.request_logging);

        let file = FileConfig::parse("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(level(file, Profile::Default).is_err());
    }

    #[test]
    fn test_rejects_inverted_delays() {
        let file = FileConfig::parse("[retry]\ninitial_delay_ms = 5000\nmax_delay_ms = 100\n").unwrap();
        assert!(Config::load_from(base_env(), file, &Overrides::default()).is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("[retry]\nretries = 3\n").is_err());
        assert!(FileConfig::parse("[metrics]\nenabled = true\n").is_err());
    }
}
