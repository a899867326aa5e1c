//! Configuration management
//!
//! This module handles loading and parsing configuration for the learnhub backend.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token, cookie and admin credential settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outgoing mail (password reset links)
    #[serde(default)]
    pub mail: MailConfig,
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
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
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
    "data/learnhub.db".to_string()
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

/// Authentication configuration
///
/// Lifetimes are expressed in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for JWTs and password reset tokens
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    #[serde(default = "default_password_reset_timeout")]
    pub password_reset_timeout: i64,
    /// Credentials accepted by the admin sign-in endpoint
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Add the `Secure` attribute to auth cookies
    #[serde(default)]
    pub secure_cookies: bool,
    /// Superuser account created at start-up when missing
    #[serde(default)]
    pub superuser_email: Option<String>,
    #[serde(default)]
    pub superuser_password: Option<String>,
    #[serde(default = "default_superuser_name")]
    pub superuser_name: String,
}

impl AuthConfig {
    /// Whether tokens would be signed with the published placeholder key
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            password_reset_timeout: default_password_reset_timeout(),
            admin_email: None,
            admin_password: None,
            secure_cookies: false,
            superuser_email: None,
            superuser_password: None,
            superuser_name: default_superuser_name(),
        }
    }
}

/// Placeholder signing key used when none is configured
pub const DEFAULT_SECRET_KEY: &str = "change-me-in-production";

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

fn default_access_token_lifetime() -> i64 {
    5 * 60
}

fn default_refresh_token_lifetime() -> i64 {
    24 * 60 * 60
}

fn default_password_reset_timeout() -> i64 {
    3 * 24 * 60 * 60
}

fn default_superuser_name() -> String {
    "Administrator".to_string()
}

/// Mail configuration
///
/// Without `smtp_host` reset links are written to the log instead of sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Prefix of the link mailed to users; `<uid>/<token>` is appended
    #[serde(default = "default_reset_link_base")]
    pub reset_link_base: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: default_from_address(),
            reset_link_base: default_reset_link_base(),
        }
    }
}

fn default_smtp_port() -> u16 {
    465
}

fn default_from_address() -> String {
    "no-reply@learnhub.local".to_string()
}

fn default_reset_link_base() -> String {
    "http://localhost:3000/api/user/reset/".to_string()
}

impl MailConfig {
    /// Whether an SMTP relay is configured
    pub fn is_enabled(&self) -> bool {
        self.smtp_host
            .as_deref()
            .map(|h| !h.trim().is_empty())
            .unwrap_or(false)
    }
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
    ParseError { path: String, message: String },
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

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables:
    /// - LEARNHUB_SERVER_HOST, LEARNHUB_SERVER_PORT, LEARNHUB_SERVER_CORS_ORIGIN
    /// - LEARNHUB_DATABASE_DRIVER, LEARNHUB_DATABASE_URL
    /// - SECRET_KEY, ACCESS_TOKEN_LIFETIME, REFRESH_TOKEN_LIFETIME
    /// - ADMIN_MAIL, ADMIN_PASSWORD, NODE_ENV
    /// - LEARNHUB_SMTP_HOST, LEARNHUB_SMTP_PORT, LEARNHUB_SMTP_USERNAME,
    ///   LEARNHUB_SMTP_PASSWORD, LEARNHUB_SMTP_FROM
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.secret_key must not be empty".to_string(),
            ));
        }
        if self.auth.secure_cookies && self.auth.uses_default_secret() {
            return Err(ConfigError::ValidationError(
                "auth.secret_key must be set in production (SECRET_KEY)".to_string(),
            ));
        }
        if self.auth.access_token_lifetime <= 0 || self.auth.refresh_token_lifetime <= 0 {
            return Err(ConfigError::ValidationError(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.auth.password_reset_timeout <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.password_reset_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("LEARNHUB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LEARNHUB_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("LEARNHUB_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("LEARNHUB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("LEARNHUB_DATABASE_URL") {
            self.database.url = url;
        }

        // Auth configuration
        if let Ok(secret) = std::env::var("SECRET_KEY") {
            if !secret.is_empty() {
                self.auth.secret_key = secret;
            }
        }
        if let Ok(lifetime) = std::env::var("ACCESS_TOKEN_LIFETIME") {
            if let Ok(lifetime) = lifetime.parse::<i64>() {
                self.auth.access_token_lifetime = lifetime;
            }
        }
        if let Ok(lifetime) = std::env::var("REFRESH_TOKEN_LIFETIME") {
            if let Ok(lifetime) = lifetime.parse::<i64>() {
                self.auth.refresh_token_lifetime = lifetime;
            }
        }
        if let Ok(email) = std::env::var("ADMIN_MAIL") {
            self.auth.admin_email = Some(email);
        }
        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            self.auth.admin_password = Some(password);
        }
        if let Ok(env) = std::env::var("NODE_ENV") {
            self.auth.secure_cookies = env == "production";
        }

        // Mail configuration
        if let Ok(host) = std::env::var("LEARNHUB_SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Ok(port) = std::env::var("LEARNHUB_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("LEARNHUB_SMTP_USERNAME") {
            self.mail.smtp_username = Some(username);
        }
        if let Ok(password) = std::env::var("LEARNHUB_SMTP_PASSWORD") {
            self.mail.smtp_password = Some(password);
        }
        if let Ok(from) = std::env::var("LEARNHUB_SMTP_FROM") {
            self.mail.from_address = from;
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

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "LEARNHUB_SERVER_HOST",
    "LEARNHUB_SERVER_PORT",
    "LEARNHUB_SERVER_CORS_ORIGIN",
    "LEARNHUB_DATABASE_DRIVER",
    "LEARNHUB_DATABASE_URL",
    "SECRET_KEY",
    "ACCESS_TOKEN_LIFETIME",
    "REFRESH_TOKEN_LIFETIME",
    "ADMIN_MAIL",
    "ADMIN_PASSWORD",
    "NODE_ENV",
    "LEARNHUB_SMTP_HOST",
    "LEARNHUB_SMTP_PORT",
    "LEARNHUB_SMTP_USERNAME",
    "LEARNHUB_SMTP_PASSWORD",
    "LEARNHUB_SMTP_FROM",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn valid_host_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
                .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
            Just("localhost".to_string()),
            Just("0.0.0.0".to_string()),
            "[a-z][a-z0-9]{0,10}".prop_map(|s| s),
        ]
    }

    fn valid_database_config_strategy() -> impl Strategy<Value = DatabaseConfig> {
        (
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            prop_oneof![
                "[a-z][a-z0-9_/]{0,20}\\.db".prop_map(|s| s),
                Just(":memory:".to_string()),
                Just("mysql://root@127.0.0.1:3306/learnhub".to_string()),
            ],
        )
            .prop_map(|(driver, url)| DatabaseConfig { driver, url })
    }

    fn valid_auth_config_strategy() -> impl Strategy<Value = AuthConfig> {
        (
            "[A-Za-z0-9]{8,32}",
            1i64..=86_400,
            1i64..=2_592_000,
            1i64..=604_800,
            proptest::option::of("[a-z]{3,8}@[a-z]{3,8}\\.com"),
            any::<bool>(),
        )
            .prop_map(
                |(secret_key, access, refresh, reset, admin_email, secure_cookies)| AuthConfig {
                    secret_key,
                    access_token_lifetime: access,
                    refresh_token_lifetime: refresh,
                    password_reset_timeout: reset,
                    admin_email,
                    secure_cookies,
                    ..AuthConfig::default()
                },
            )
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            valid_host_strategy(),
            1u16..=65535,
            valid_database_config_strategy(),
            valid_auth_config_strategy(),
        )
            .prop_map(|(host, port, database, auth)| Config {
                server: ServerConfig {
                    host,
                    port,
                    cors_origin: default_cors_origin(),
                },
                database,
                auth,
                mail: MailConfig::default(),
            })
    }

    fn partial_config_yaml_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("".to_string()),
            Just("server:\n  port: 3000\n".to_string()),
            Just("database:\n  driver: mysql\n".to_string()),
            Just("auth:\n  secure_cookies: true\n  secret_key: \"prod-key\"\n".to_string()),
            Just("mail:\n  smtp_port: 25\n".to_string()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config and loading it back yields the same values
        #[test]
        fn config_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).unwrap();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();

            let parsed = Config::load(file.path()).unwrap();

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.database.url, parsed.database.url);
            prop_assert_eq!(config.auth.secret_key, parsed.auth.secret_key);
            prop_assert_eq!(config.auth.access_token_lifetime, parsed.auth.access_token_lifetime);
            prop_assert_eq!(config.auth.refresh_token_lifetime, parsed.auth.refresh_token_lifetime);
            prop_assert_eq!(config.auth.admin_email, parsed.auth.admin_email);
            prop_assert_eq!(config.auth.secure_cookies, parsed.auth.secure_cookies);
        }

        /// Partial files keep every unspecified value usable
        #[test]
        fn config_default_filling(yaml in partial_config_yaml_strategy()) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();

            let config = Config::load(file.path()).unwrap();

            prop_assert!(!config.server.host.is_empty());
            prop_assert!(config.server.port > 0);
            prop_assert!(!config.database.url.is_empty());
            prop_assert!(!config.auth.secret_key.is_empty());
            prop_assert!(config.auth.access_token_lifetime > 0);
            prop_assert!(!config.mail.reset_link_base.is_empty());
        }

        /// Numeric lifetimes from the environment always win over the file
        #[test]
        fn env_override_access_lifetime(lifetime in 1i64..=1_000_000) {
            let _guard = lock_env();
            clear_env();

            let mut file = NamedTempFile::new().unwrap();
            write!(file, "auth:\n  access_token_lifetime: 42\n").unwrap();
            std::env::set_var("ACCESS_TOKEN_LIFETIME", lifetime.to_string());

            let config = Config::load_with_env(file.path()).unwrap();
            clear_env();

            prop_assert_eq!(config.auth.access_token_lifetime, lifetime);
        }
    }
}
