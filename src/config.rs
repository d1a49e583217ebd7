//! Configuration management with validation and defaults
//!
//! Defaults, then an optional TOML file, then environment overrides. The
//! binary applies CLI flags on top and calls `validate` last.

use crate::errors::{CaseboxResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::{env, path::Path, time::Duration};

/// Longest accepted session token lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
/// Longest accepted exchange-rate cache lifetime (one week)
pub const MAX_RATE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Full service configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub steam: SteamConfig,
    pub payments: PaymentsConfig,
    pub rates: RatesConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener and front-end settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Where the login callback redirects the browser to
    pub frontend_url: String,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// RocksDB settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    pub max_write_buffer_number: i32,
    pub compression_type: CompressionType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Snappy,
    Lz4,
    Zstd,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/casebox".to_string(),
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            compression_type: CompressionType::Lz4,
        }
    }
}

/// Session token settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret; the server refuses to start without it
    pub session_secret: String,
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            token_ttl_hours: 24,
        }
    }
}

/// Steam OpenID and Web API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamConfig {
    pub api_key: Option<String>,
    pub callback_url: Option<String>,
    pub openid_endpoint: String,
    pub profile_endpoint: String,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            callback_url: None,
            openid_endpoint: "https://steamcommunity.com/openid/login".to_string(),
            profile_endpoint: "https://api.steampowered.com/ISteamUser/GetPlayerSummaries/v0002/"
                .to_string(),
        }
    }
}

/// Crypto Pay settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    pub crypto_bot_token: String,
    pub api_base_url: String,
    pub success_redirect_url: String,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            crypto_bot_token: String::new(),
            api_base_url: "https://pay.crypt.bot/api".to_string(),
            success_redirect_url: "http://localhost:3000/payment-success".to_string(),
        }
    }
}

/// Exchange-rate lookup settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub endpoint: String,
    pub ttl_secs: u64,
    pub fallback_rate: f64,
}

impl RatesConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.exchangerate-api.com/v4/latest/USD".to_string(),
            ttl_secs: 300,
            fallback_rate: 90.0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog TOML file; the bundled catalog is used when unset
    pub path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "casebox=info,tower_http=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Validate configuration for logical consistency
    pub fn validate(&self) -> CaseboxResult<()> {
        if self.auth.session_secret.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "auth.session_secret (SESSION_SECRET)".to_string(),
            )
            .into());
        }

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.auth.token_ttl_hours) {
            return Err(ConfigurationError::InvalidValue {
                field: "auth.token_ttl_hours".to_string(),
                value: self.auth.token_ttl_hours.to_string(),
                reason: format!("Token lifetime must be between 1 and {} hours", MAX_TOKEN_TTL_HOURS),
            }
            .into());
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "Request timeout cannot be zero".to_string(),
            }
            .into());
        }

        if self.rates.ttl_secs > MAX_RATE_TTL_SECS {
            return Err(ConfigurationError::InvalidValue {
                field: "rates.ttl_secs".to_string(),
                value: self.rates.ttl_secs.to_string(),
                reason: format!("Rate cache lifetime cannot exceed {} seconds", MAX_RATE_TTL_SECS),
            }
            .into());
        }

        if self.server.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.port".to_string(),
                value: "0".to_string(),
                reason: "Port cannot be zero".to_string(),
            }
            .into());
        }

        if self.storage.data_directory.is_empty() {
            return Err(
                ConfigurationError::MissingRequired("storage.data_directory".to_string()).into(),
            );
        }

        if !(self.rates.fallback_rate.is_finite() && self.rates.fallback_rate > 0.0) {
            return Err(ConfigurationError::InvalidValue {
                field: "rates.fallback_rate".to_string(),
                value: self.rates.fallback_rate.to_string(),
                reason: "Fallback rate must be a positive number".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables.
    /// Validation is left to the caller so CLI flags can still apply.
    pub fn load(&self) -> CaseboxResult<AppConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => AppConfig::default(),
        };

        Self::apply_env_overrides(&mut config, |key| env::var(key).ok())?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> CaseboxResult<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        Self::parse(&content)
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn parse(content: &str) -> CaseboxResult<AppConfig> {
        toml::from_str(content).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into()
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> CaseboxResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("SESSION_SECRET") {
            config.auth.session_secret = secret;
        }
        if let Some(key) = lookup("STEAM_API_KEY") {
            config.steam.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(url) = lookup("CALLBACK_URL") {
            config.steam.callback_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(token) = lookup("CRYPTO_BOT_TOKEN") {
            config.payments.crypto_bot_token = token;
        }
        if let Some(url) = lookup("FRONTEND_URL") {
            config.server.frontend_url = url;
        }
        if let Some(host) = lookup("CASEBOX_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("CASEBOX_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "CASEBOX_PORT".to_string(),
                value: port,
                reason: "Invalid port number".to_string(),
            })?;
        }
        if let Some(dir) = lookup("CASEBOX_DATA_DIR") {
            config.storage.data_directory = dir;
        }
        if let Some(path) = lookup("CASEBOX_CATALOG") {
            config.catalog.path = Some(path).filter(|p| !p.is_empty());
        }

        Ok(())
    }
}
