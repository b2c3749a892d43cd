use crate::constants::{self, cache_ttl, env_vars, warming};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub mod paths;
pub mod tenants;
pub mod validation;

use paths::{get_config_path, get_log_dir_path};
pub use tenants::{Branding, RefreshInterval, StaticTenantDirectory, TenantConfig, TenantDirectory};
use validation::{validate_config, validate_tenants};

/// Configuration structure for the service.
/// Handles loading, saving, and managing settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Upstream sports API base URL. Should include the scheme.
    pub api_domain: String,
    /// Path to the log file. If not specified, logs will be written to a default location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
    /// HTTP timeout in seconds for upstream requests. Defaults to 20 seconds if not specified.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    /// Address the HTTP service binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Bearer secret for the warming trigger and cache administration routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_secret: Option<String>,
    /// API key used for ad hoc requests and tenants without their own key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_api_key: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub warming: WarmingConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tenants: Vec<TenantConfig>,
}

/// Cache store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Base URL of a remote key-value store speaking the REST command protocol.
    /// When unset the in-process store is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_token: Option<String>,
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_seconds: u64,
    #[serde(default = "default_last_known_good_ttl")]
    pub last_known_good_ttl_seconds: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Capacity for last-known-good slots and refresh markers, kept apart from
    /// payloads so request traffic cannot evict them
    #[serde(default = "default_durable_max_entries")]
    pub durable_max_entries: usize,
}

/// Cache warming settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WarmingConfig {
    /// Run the warming scheduler inside the service process
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_warm_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_warm_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_run_budget")]
    pub run_budget_seconds: u64,
}

fn default_http_timeout() -> u64 {
    constants::DEFAULT_HTTP_TIMEOUT_SECONDS
}

fn default_listen_addr() -> String {
    constants::DEFAULT_LISTEN_ADDR.to_string()
}

fn default_cache_ttl() -> u64 {
    cache_ttl::DEFAULT_SECONDS
}

fn default_last_known_good_ttl() -> u64 {
    cache_ttl::LAST_KNOWN_GOOD_SECONDS
}

fn default_max_entries() -> usize {
    cache_ttl::MEMORY_MAX_ENTRIES
}

fn default_durable_max_entries() -> usize {
    cache_ttl::DURABLE_MAX_ENTRIES
}

fn default_warm_interval() -> u64 {
    warming::DEFAULT_INTERVAL_SECONDS
}

fn default_warm_concurrency() -> usize {
    warming::DEFAULT_CONCURRENCY
}

fn default_run_budget() -> u64 {
    warming::DEFAULT_RUN_BUDGET_SECONDS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rest_url: None,
            rest_token: None,
            default_ttl_seconds: default_cache_ttl(),
            last_known_good_ttl_seconds: default_last_known_good_ttl(),
            max_entries: default_max_entries(),
            durable_max_entries: default_durable_max_entries(),
        }
    }
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_warm_interval(),
            concurrency: default_warm_concurrency(),
            run_budget_seconds: default_run_budget(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_domain: String::new(),
            log_file_path: None,
            http_timeout_seconds: default_http_timeout(),
            listen_addr: default_listen_addr(),
            cron_secret: None,
            default_api_key: None,
            cache: CacheConfig::default(),
            warming: WarmingConfig::default(),
            tenants: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file location.
    /// A missing file is not an error: defaults are used and environment
    /// variables must then supply at least the API domain.
    ///
    /// # Environment Variables
    /// - `DISCOVERY_CONFIG` - Config file path
    /// - `DISCOVERY_API_DOMAIN` - Override API domain
    /// - `DISCOVERY_LOG_FILE` - Override log file path
    /// - `DISCOVERY_HTTP_TIMEOUT` - Override HTTP timeout in seconds
    /// - `DISCOVERY_LISTEN_ADDR` - Override bind address
    /// - `DISCOVERY_CRON_SECRET` - Override the cron bearer secret
    /// - `DISCOVERY_CACHE_URL` / `DISCOVERY_CACHE_TOKEN` - Remote cache store
    pub async fn load() -> Result<Self, AppError> {
        Self::load_at(&get_config_path()).await
    }

    /// Like [`Config::load`] with an explicit config file location
    pub async fn load_at(config_path: &str) -> Result<Self, AppError> {
        let mut config = if Path::new(config_path).exists() {
            Self::load_from_path(config_path).await?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Applies environment variable overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(api_domain) = std::env::var(env_vars::API_DOMAIN) {
            self.api_domain = api_domain;
        }

        if let Ok(log_file_path) = std::env::var(env_vars::LOG_FILE) {
            self.log_file_path = Some(log_file_path);
        }

        if let Some(timeout) = std::env::var(env_vars::HTTP_TIMEOUT)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.http_timeout_seconds = timeout;
        }

        if let Ok(listen_addr) = std::env::var(env_vars::LISTEN_ADDR) {
            self.listen_addr = listen_addr;
        }

        if let Ok(secret) = std::env::var(env_vars::CRON_SECRET) {
            self.cron_secret = Some(secret);
        }

        if let Ok(url) = std::env::var(env_vars::CACHE_URL) {
            self.cache.rest_url = Some(url);
        }

        if let Ok(token) = std::env::var(env_vars::CACHE_TOKEN) {
            self.cache.rest_token = Some(token);
        }
    }

    /// Validates the configuration settings
    pub fn validate(&self) -> Result<(), AppError> {
        validate_config(&self.api_domain, &self.log_file_path)?;
        validate_tenants(&self.tenants)?;

        if self.warming.concurrency == 0 {
            return Err(AppError::config_error(
                "Warming concurrency must be at least 1",
            ));
        }
        if self.http_timeout_seconds == 0 {
            return Err(AppError::config_error("HTTP timeout must be at least 1 second"));
        }

        Ok(())
    }

    /// Returns the path for the config file.
    pub fn get_config_path() -> String {
        paths::get_config_path()
    }

    /// Returns the platform-specific path for the log directory.
    pub fn get_log_dir_path() -> String {
        paths::get_log_dir_path()
    }

    /// Displays current configuration settings to stdout. Secrets are masked.
    pub async fn display(config_path: &str) -> Result<(), AppError> {
        let log_dir = get_log_dir_path();

        if Path::new(config_path).exists() {
            let config = Config::load_at(config_path).await?;
            println!("\nCurrent Configuration");
            println!("────────────────────────────────────");
            println!("Config Location:");
            println!("{config_path}");
            println!("────────────────────────────────────");
            println!("API Domain:");
            println!("{}", config.api_domain);
            println!("────────────────────────────────────");
            println!("HTTP Timeout:");
            println!("{} seconds", config.http_timeout_seconds);
            println!("────────────────────────────────────");
            println!("Listen Address:");
            println!("{}", config.listen_addr);
            println!("────────────────────────────────────");
            println!("Cache Store:");
            match &config.cache.rest_url {
                Some(url) => println!("{url} (remote, in-process fallback)"),
                None => println!("in-process"),
            }
            println!("────────────────────────────────────");
            println!("Cron Secret:");
            println!(
                "{}",
                if config.cron_secret.is_some() { "set" } else { "not set" }
            );
            println!("────────────────────────────────────");
            println!("Tenants:");
            for tenant in &config.tenants {
                println!(
                    "{} ({} organizations, refresh {}min, cache {})",
                    tenant.slug,
                    tenant.organization_ids.len(),
                    tenant.refresh_interval.minutes(),
                    if tenant.cache_enabled { "on" } else { "off" }
                );
            }
            println!("────────────────────────────────────");
            println!("Log File Location:");
            if let Some(custom_path) = &config.log_file_path {
                println!("{custom_path}");
            } else {
                println!("{log_dir}/discovery_events.log");
                println!("(Default location)");
            }
        } else {
            println!("\nNo configuration file found at:");
            println!("{config_path}");
        }

        Ok(())
    }

    /// Saves configuration to a file path, creating the parent directory if
    /// needed. A bare host in `api_domain` gets an `https://` prefix.
    ///
    /// # Errors
    /// * `AppError::Config` - If the provided path has no parent directory
    /// * `AppError::Io` - If there's an I/O error creating directories or writing the file
    /// * `AppError::TomlSerialize` - If there's an error serializing the configuration
    pub async fn save_to_path(&self, path: &str) -> Result<(), AppError> {
        let config_dir = Path::new(path).parent().ok_or_else(|| {
            AppError::config_error(format!("Path '{path}' has no parent directory"))
        })?;

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).await?;
        }

        let mut normalized = self.clone();
        if !normalized.api_domain.starts_with("https://")
            && !normalized.api_domain.starts_with("http://")
        {
            normalized.api_domain = format!("https://{}", normalized.api_domain);
        }

        let content = toml::to_string_pretty(&normalized)?;
        let mut file = fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Loads configuration from a file path without applying environment overrides.
    pub async fn load_from_path(path: &str) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    const FULL_CONFIG: &str = r##"
api_domain = "https://api.example.com"
log_file_path = "/custom/log/path"
cron_secret = "s3cret"

[cache]
default_ttl_seconds = 120

[warming]
enabled = true
concurrency = 3

[[tenants]]
slug = "acme"
organization_ids = ["10", "20"]
refresh_interval = "15min"
timezone = "America/New_York"

[tenants.branding]
color = "#ff6600"
registration_url_template = "https://register.example.com/{org_id}/programs/{program_id}?session={session_id}"

[[tenants]]
slug = "beta"
organization_ids = ["30"]
cache_enabled = false
"##;

    #[tokio::test]
    async fn test_config_load_existing_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_path_str = config_path.to_string_lossy();
        tokio::fs::write(&config_path, FULL_CONFIG).await.unwrap();

        let config = Config::load_from_path(&config_path_str).await.unwrap();

        assert_eq!(config.api_domain, "https://api.example.com");
        assert_eq!(config.log_file_path, Some("/custom/log/path".to_string()));
        assert_eq!(config.cron_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.cache.default_ttl_seconds, 120);
        assert_eq!(
            config.cache.last_known_good_ttl_seconds,
            cache_ttl::LAST_KNOWN_GOOD_SECONDS
        );
        assert!(config.warming.enabled);
        assert_eq!(config.warming.concurrency, 3);
        assert_eq!(config.tenants.len(), 2);
        assert_eq!(config.tenants[0].organization_ids, vec!["10", "20"]);
        assert_eq!(
            config.tenants[0].branding.color.as_deref(),
            Some("#ff6600")
        );
        assert!(!config.tenants[1].cache_enabled);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_config_load_minimal_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_path_str = config_path.to_string_lossy();
        tokio::fs::write(&config_path, "api_domain = \"https://api.example.com\"\n")
            .await
            .unwrap();

        let config = Config::load_from_path(&config_path_str).await.unwrap();

        assert_eq!(config.log_file_path, None);
        assert_eq!(
            config.http_timeout_seconds,
            constants::DEFAULT_HTTP_TIMEOUT_SECONDS
        );
        assert_eq!(config.listen_addr, constants::DEFAULT_LISTEN_ADDR);
        assert_eq!(config.warming.concurrency, warming::DEFAULT_CONCURRENCY);
        assert!(!config.warming.enabled);
        assert!(config.tenants.is_empty());
    }

    #[tokio::test]
    async fn test_config_save_and_load_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let config_path_str = config_path.to_string_lossy();

        let original: Config = toml::from_str(FULL_CONFIG).unwrap();
        original.save_to_path(&config_path_str).await.unwrap();
        assert!(config_path.exists());

        let loaded = Config::load_from_path(&config_path_str).await.unwrap();
        assert_eq!(loaded.api_domain, original.api_domain);
        assert_eq!(loaded.tenants, original.tenants);
        assert_eq!(loaded.warming.concurrency, original.warming.concurrency);
    }

    #[tokio::test]
    async fn test_config_save_adds_https_to_bare_host() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_path_str = config_path.to_string_lossy();

        let config = Config {
            api_domain: "api.example.com".to_string(),
            ..Config::default()
        };
        config.save_to_path(&config_path_str).await.unwrap();

        let loaded = Config::load_from_path(&config_path_str).await.unwrap();
        assert_eq!(loaded.api_domain, "https://api.example.com");

        // Explicit schemes are kept, local upstreams are commonly plain http
        let config = Config {
            api_domain: "http://localhost:8080".to_string(),
            ..Config::default()
        };
        config.save_to_path(&config_path_str).await.unwrap();
        let loaded = Config::load_from_path(&config_path_str).await.unwrap();
        assert_eq!(loaded.api_domain, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_config_malformed_toml_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("malformed_config.toml");
        let config_path_str = config_path.to_string_lossy();

        let malformed_content = r#"
api_domain = "https://api.example.com"
[invalid_section
malformed = "data
"#;
        tokio::fs::write(&config_path, malformed_content)
            .await
            .unwrap();

        let result = Config::load_from_path(&config_path_str).await;
        assert!(matches!(result.unwrap_err(), AppError::TomlDeserialize(_)));
    }

    #[tokio::test]
    async fn test_config_load_from_nonexistent_path() {
        let result = Config::load_from_path("/nonexistent/path/config.toml").await;
        assert!(matches!(result.unwrap_err(), AppError::Io(_)));
    }

    #[test]
    fn test_config_validation_rejects_zero_concurrency() {
        let mut config: Config = toml::from_str(FULL_CONFIG).unwrap();
        config.warming.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_secrets_not_serialized_when_absent() {
        let config = Config {
            api_domain: "https://api.example.com".to_string(),
            ..Config::default()
        };
        let toml_string = toml::to_string_pretty(&config).unwrap();
        assert!(!toml_string.contains("cron_secret"));
        assert!(!toml_string.contains("default_api_key"));
        assert!(!toml_string.contains("rest_token"));
    }

    #[test]
    fn test_get_log_dir_path() {
        let log_dir_path = Config::get_log_dir_path();
        assert!(log_dir_path.contains("discovery_events"));
        assert!(log_dir_path.ends_with("logs"));
    }

    #[test]
    #[serial]
    fn test_environment_variable_override() {
        unsafe {
            std::env::set_var(env_vars::API_DOMAIN, "https://env.example.com");
            std::env::set_var(env_vars::HTTP_TIMEOUT, "7");
            std::env::set_var(env_vars::CRON_SECRET, "from-env");
            std::env::set_var(env_vars::CACHE_URL, "https://kv.example.com");
        }

        let mut config: Config = toml::from_str(FULL_CONFIG).unwrap();
        config.apply_env_overrides();

        assert_eq!(config.api_domain, "https://env.example.com");
        assert_eq!(config.http_timeout_seconds, 7);
        assert_eq!(config.cron_secret.as_deref(), Some("from-env"));
        assert_eq!(
            config.cache.rest_url.as_deref(),
            Some("https://kv.example.com")
        );

        unsafe {
            std::env::remove_var(env_vars::API_DOMAIN);
            std::env::remove_var(env_vars::HTTP_TIMEOUT);
            std::env::remove_var(env_vars::CRON_SECRET);
            std::env::remove_var(env_vars::CACHE_URL);
        }
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        unsafe {
            std::env::set_var(env_vars::CONFIG_PATH, "/etc/discovery/config.toml");
        }
        assert_eq!(Config::get_config_path(), "/etc/discovery/config.toml");
        unsafe {
            std::env::remove_var(env_vars::CONFIG_PATH);
        }
        assert!(Config::get_config_path().ends_with("config.toml"));
    }
}
