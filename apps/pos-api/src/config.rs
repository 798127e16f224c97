//! # Server Configuration
//!
//! Settings for the POS API process.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     SERVER_PORT=9090  JWT_SECRET=...  TAX_RATE=0.16                     │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     $BISTRO_CONFIG, or                                                  │
//! │     ~/.config/bistro-pos/bistro.toml (Linux)                            │
//! │     ~/Library/Application Support/com.bistro.pos/bistro.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "bistro.db"
//! max_connections = 5
//!
//! [auth]
//! jwt_secret = "change-me"
//!
//! [pricing]
//! tax_rate = 0.14
//! service_charge_rate = 0.10
//!
//! [hub]
//! queue_capacity = 64
//!
//! [outbound]
//! whatsapp_api_url = "https://api.example.com/messages"
//! whatsapp_api_token = "..."
//! restaurant_name = "Bistro"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use bistro_core::{PricingRates, Rate};
use bistro_db::DbConfig;
use bistro_hub::HubSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Signing secret used when none is configured. Fine for a laptop, never for a till.
pub const DEV_JWT_SECRET: &str = "bistro-dev-secret-change-in-production";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bistro.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Lifetime of tokens issued by [`crate::auth::JwtManager::issue_token`].
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
}

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_token_lifetime() -> i64 {
    12 * 3600
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: default_jwt_secret(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

/// Rates as fractions. Converted to basis points once, by [`AppConfig::rates`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
    #[serde(default = "default_service_charge_rate")]
    pub service_charge_rate: f64,
}

fn default_tax_rate() -> f64 {
    0.14
}

fn default_service_charge_rate() -> f64 {
    0.10
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            tax_rate: default_tax_rate(),
            service_charge_rate: default_service_charge_rate(),
        }
    }
}

/// Receipt delivery. With no WhatsApp URL, receipts are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    #[serde(default)]
    pub whatsapp_api_url: Option<String>,
    #[serde(default)]
    pub whatsapp_api_token: Option<String>,
    #[serde(default = "default_restaurant_name")]
    pub restaurant_name: String,
    #[serde(default = "default_outbound_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_outbound_timeout")]
    pub timeout_secs: u64,
}

fn default_restaurant_name() -> String {
    "Bistro".to_string()
}

fn default_outbound_capacity() -> usize {
    256
}

fn default_outbound_timeout() -> u64 {
    10
}

impl Default for OutboundConfig {
    fn default() -> Self {
        OutboundConfig {
            whatsapp_api_url: None,
            whatsapp_api_token: None,
            restaurant_name: default_restaurant_name(),
            queue_capacity: default_outbound_capacity(),
            timeout_secs: default_outbound_timeout(),
        }
    }
}

impl OutboundConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub outbound: OutboundConfig,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`path`, `$BISTRO_CONFIG`, or the platform config dir)
    /// 3. Environment variables
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = path
            .or_else(|| std::env::var("BISTRO_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file. Missing sections and fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = parse_var("SERVER_PORT", &port)?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(rate) = lookup("TAX_RATE") {
            self.pricing.tax_rate = parse_var("TAX_RATE", &rate)?;
        }
        if let Some(rate) = lookup("SERVICE_CHARGE_RATE") {
            self.pricing.service_charge_rate = parse_var("SERVICE_CHARGE_RATE", &rate)?;
        }
        if let Some(url) = lookup("WHATSAPP_API_URL") {
            self.outbound.whatsapp_api_url = Some(url);
        }
        if let Some(token) = lookup("WHATSAPP_API_TOKEN") {
            self.outbound.whatsapp_api_token = Some(token);
        }
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".into()));
        }
        if self.auth.jwt_secret == DEV_JWT_SECRET {
            warn!("Using the development JWT secret; set JWT_SECRET in production");
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        for (field, rate) in [
            ("pricing.tax_rate", self.pricing.tax_rate),
            ("pricing.service_charge_rate", self.pricing.service_charge_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 0 and 1, got {}",
                    field, rate
                )));
            }
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.outbound.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound.queue_capacity must be greater than 0".into(),
            ));
        }
        self.hub
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Pricing rates in basis points.
    pub fn rates(&self) -> PricingRates {
        PricingRates::new(
            Rate::from_fraction(self.pricing.tax_rate),
            Rate::from_fraction(self.pricing.service_charge_rate),
        )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bistro", "pos")
            .map(|dirs| dirs.config_dir().join("bistro.toml"))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
