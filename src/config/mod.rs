//! Configuration management
//!
//! This module handles loading and parsing configuration for the storefront.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Secret used when nothing is configured. Fine for local development only.
pub const DEFAULT_JWT_SECRET: &str = "storefront-development-secret";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session token configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outgoing mail configuration
    #[serde(default)]
    pub mail: MailConfig,
    /// Catalogue settings
    #[serde(default)]
    pub shop: ShopConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin of the storefront frontend.
    ///
    /// Used as the CORS allowed origin (cookies need credentials) and as the
    /// base of links sent by email.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4444
}

fn default_frontend_url() -> String {
    "http://localhost:7777".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/storefront.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Issuer claim written into and required from every token
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Lifetime of a session token and its cookie, in days
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Lifetime of a password reset token, in minutes
    #[serde(default = "default_reset_token_ttl_minutes")]
    pub reset_token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: default_issuer(),
            token_ttl_days: default_token_ttl_days(),
            reset_token_ttl_minutes: default_reset_token_ttl_minutes(),
        }
    }
}

impl AuthConfig {
    /// Whether the signing secret is still the built-in development value
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_issuer() -> String {
    "storefront".to_string()
}

/// Longest accepted session lifetime (ten years)
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Longest accepted password reset window (one week)
pub const MAX_RESET_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

fn default_token_ttl_days() -> i64 {
    365
}

fn default_reset_token_ttl_minutes() -> i64 {
    60
}

/// Outgoing mail configuration
///
/// An empty `smtp_host` disables SMTP; mails are then only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    /// Sender address
    #[serde(default = "default_mail_from")]
    pub from: String,
    /// Display name used in the From header and in mail bodies
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from: default_mail_from(),
            site_name: default_site_name(),
        }
    }
}

impl MailConfig {
    /// Check whether SMTP delivery is configured
    pub fn smtp_enabled(&self) -> bool {
        !self.smtp_host.trim().is_empty()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_from() -> String {
    "no-reply@storefront.local".to_string()
}

fn default_site_name() -> String {
    "Storefront".to_string()
}

/// Catalogue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    /// Number of items returned by `items` when `first` is not given
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
        }
    }
}

fn default_per_page() -> i64 {
    4
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - STOREFRONT_SERVER_HOST
    /// - STOREFRONT_SERVER_PORT
    /// - STOREFRONT_SERVER_FRONTEND_URL
    /// - STOREFRONT_DATABASE_DRIVER
    /// - STOREFRONT_DATABASE_URL
    /// - STOREFRONT_AUTH_JWT_SECRET
    /// - STOREFRONT_AUTH_TOKEN_TTL_DAYS
    /// - STOREFRONT_MAIL_SMTP_HOST
    /// - STOREFRONT_MAIL_SMTP_PORT
    /// - STOREFRONT_MAIL_SMTP_USERNAME
    /// - STOREFRONT_MAIL_SMTP_PASSWORD
    /// - STOREFRONT_MAIL_FROM
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the server misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&self.auth.token_ttl_days) {
            return Err(ConfigError::ValidationError(format!(
                "auth.token_ttl_days must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_DAYS, self.auth.token_ttl_days
            )));
        }
        if !(1..=MAX_RESET_TOKEN_TTL_MINUTES).contains(&self.auth.reset_token_ttl_minutes) {
            return Err(ConfigError::ValidationError(format!(
                "auth.reset_token_ttl_minutes must be between 1 and {}, got {}",
                MAX_RESET_TOKEN_TTL_MINUTES, self.auth.reset_token_ttl_minutes
            )));
        }
        if self.shop.per_page <= 0 {
            return Err(ConfigError::ValidationError(
                "shop.per_page must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("STOREFRONT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("STOREFRONT_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(frontend_url) = std::env::var("STOREFRONT_SERVER_FRONTEND_URL") {
            self.server.frontend_url = frontend_url;
        }

        if let Ok(driver) = std::env::var("STOREFRONT_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("STOREFRONT_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("STOREFRONT_AUTH_JWT_SECRET") {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
            }
        }
        if let Ok(days) = std::env::var("STOREFRONT_AUTH_TOKEN_TTL_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.token_ttl_days = days;
            }
        }

        if let Ok(host) = std::env::var("STOREFRONT_MAIL_SMTP_HOST") {
            self.mail.smtp_host = host;
        }
        if let Ok(port) = std::env::var("STOREFRONT_MAIL_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("STOREFRONT_MAIL_SMTP_USERNAME") {
            self.mail.smtp_username = username;
        }
        if let Ok(password) = std::env::var("STOREFRONT_MAIL_SMTP_PASSWORD") {
            self.mail.smtp_password = password;
        }
        if let Ok(from) = std::env::var("STOREFRONT_MAIL_FROM") {
            self.mail.from = from;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_port_strategy() -> impl Strategy<Value = u16> {
        1u16..=65535
    }

    fn valid_driver_strategy() -> impl Strategy<Value = DatabaseDriver> {
        prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Serializing a config and reading it back yields the same values
        #[test]
        fn property_config_roundtrip(
            port in valid_port_strategy(),
            driver in valid_driver_strategy(),
            per_page in 1i64..=100,
            ttl_days in 1i64..=730,
            secret in "[a-zA-Z0-9]{8,32}",
        ) {
            let mut config = Config::default();
            config.server.port = port;
            config.database.driver = driver;
            config.shop.per_page = per_page;
            config.auth.token_ttl_days = ttl_days;
            config.auth.jwt_secret = secret.clone();

            let yaml = serde_yaml::to_string(&config).unwrap();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();

            let loaded = Config::load(file.path()).unwrap();
            prop_assert_eq!(loaded.server.port, port);
            prop_assert_eq!(loaded.database.driver, driver);
            prop_assert_eq!(loaded.shop.per_page, per_page);
            prop_assert_eq!(loaded.auth.token_ttl_days, ttl_days);
            prop_assert_eq!(loaded.auth.jwt_secret, secret);
        }

        /// Non-positive page sizes never pass validation
        #[test]
        fn property_non_positive_per_page_rejected(per_page in -1000i64..=0) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "shop:\n  per_page: {}\n", per_page).unwrap();
            prop_assert!(Config::load(file.path()).is_err());
        }
    }
}
