//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden by `KT_*`
//! environment variables. Missing values are filled with defaults that are
//! good enough for local development; `Config::validate` reports the
//! settings that must be fixed before running in production.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token signing configuration
    #[serde(default)]
    pub security: SecurityConfig,
    /// Image upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Application identity and environment
    #[serde(default)]
    pub app: AppConfig,
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
    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Take the client address from X-Forwarded-For / X-Real-IP.
    /// Only safe behind a reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            trust_proxy: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL or SQLite file path
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Upper bound on pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/kitchentech.db".to_string()
}

fn default_max_connections() -> u32 {
    20
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

/// Access token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// HMAC secret used to sign access tokens
    #[serde(default)]
    pub secret_key: String,
    /// JWT signing algorithm (HS256, HS384 or HS512)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Lifetime of an access token
    #[serde(default = "default_token_minutes")]
    pub access_token_expire_minutes: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            algorithm: default_algorithm(),
            access_token_expire_minutes: default_token_minutes(),
        }
    }
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_token_minutes() -> i64 {
    30
}

/// Minimum accepted length of the signing secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Media root; served under `/media`
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum size of a single file in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        mime_type.starts_with("image/") && self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// File extension used when storing a file of the given MIME type
    pub fn extension_for(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            "image/avif" => "avif",
            _ => "bin",
        }
    }
}

/// Application identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name reported by the health endpoints
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Deployment environment
    #[serde(default)]
    pub env: AppEnv,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: AppEnv::default(),
        }
    }
}

fn default_app_name() -> String {
    "KitchenTech API".to_string()
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Dev,
    Prod,
}

impl AppConfig {
    /// Debug behaviour is only enabled outside production
    pub fn is_debug(&self) -> bool {
        self.env == AppEnv::Dev
    }

    /// Crate version
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
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
    /// A missing or empty file yields the default configuration; a file that
    /// is not valid YAML for this structure is an error carrying the location.
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

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - KT_SERVER_HOST, KT_SERVER_PORT, KT_ALLOWED_ORIGINS (comma separated)
    /// - KT_TRUST_PROXY (true or false)
    /// - KT_DATABASE_DRIVER, KT_DATABASE_URL
    /// - KT_SECRET_KEY, KT_ACCESS_TOKEN_EXPIRE_MINUTES
    /// - KT_UPLOAD_PATH
    /// - KT_APP_ENV (dev or prod)
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides; unparsable values are ignored
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("KT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("KT_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(trust) = std::env::var("KT_TRUST_PROXY") {
            if let Ok(trust) = trust.trim().to_lowercase().parse::<bool>() {
                self.server.trust_proxy = trust;
            }
        }
        if let Ok(origins) = std::env::var("KT_ALLOWED_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if !origins.is_empty() {
                self.server.allowed_origins = origins;
            }
        }

        if let Ok(driver) = std::env::var("KT_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("KT_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("KT_SECRET_KEY") {
            self.security.secret_key = secret;
        }
        if let Ok(minutes) = std::env::var("KT_ACCESS_TOKEN_EXPIRE_MINUTES") {
            if let Ok(minutes) = minutes.parse::<i64>() {
                if minutes > 0 {
                    self.security.access_token_expire_minutes = minutes;
                }
            }
        }

        if let Ok(path) = std::env::var("KT_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Ok(env) = std::env::var("KT_APP_ENV") {
            match env.to_lowercase().as_str() {
                "dev" => self.app.env = AppEnv::Dev,
                "prod" => self.app.env = AppEnv::Prod,
                _ => {}
            }
        }
    }

    /// Security problems with this configuration. Empty means OK.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.security.secret_key.is_empty() {
            problems.push("secret_key is not set (KT_SECRET_KEY)".to_string());
        } else if self.security.secret_key.len() < MIN_SECRET_LENGTH {
            problems.push(format!(
                "secret_key must be at least {} characters long",
                MIN_SECRET_LENGTH
            ));
        }

        if !matches!(self.security.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            problems.push(format!(
                "Unsupported token algorithm '{}'",
                self.security.algorithm
            ));
        }

        if self.security.access_token_expire_minutes <= 0 {
            problems.push("access_token_expire_minutes must be positive".to_string());
        }

        if self.app.env == AppEnv::Prod {
            if self.database.driver == DatabaseDriver::Sqlite
                || self.database.url.to_lowercase().contains("sqlite")
            {
                problems.push("SQLite is not allowed in production".to_string());
            }
            if self.server.allowed_origins.iter().any(|o| o.contains('*')) {
                problems.push("allowed_origins cannot contain '*' in production".to_string());
            }
        }

        problems
    }

    /// Validate, failing on any problem in production.
    ///
    /// In development a missing secret is replaced with a random one that
    /// lives as long as the process; tokens do not survive a restart.
    pub fn validate_for_startup(&mut self) -> Result<Vec<String>, ConfigError> {
        if self.app.env == AppEnv::Dev && self.security.secret_key.is_empty() {
            self.security.secret_key = format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            );
            tracing::warn!("No secret_key configured, using a random key for this process");
        }

        let problems = self.validate();
        if self.app.env == AppEnv::Prod && !problems.is_empty() {
            return Err(ConfigError::ValidationError(problems.join("; ")));
        }
        Ok(problems)
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

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "KT_SERVER_HOST",
    "KT_SERVER_PORT",
    "KT_ALLOWED_ORIGINS",
    "KT_TRUST_PROXY",
    "KT_DATABASE_DRIVER",
    "KT_DATABASE_URL",
    "KT_SECRET_KEY",
    "KT_ACCESS_TOKEN_EXPIRE_MINUTES",
    "KT_UPLOAD_PATH",
    "KT_APP_ENV",
];


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn valid_host_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
                .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
            Just("localhost".to_string()),
            "[a-z][a-z0-9]{0,10}",
        ]
    }

    fn valid_origin_strategy() -> impl Strategy<Value = String> {
        "[a-z]{1,10}".prop_map(|host| format!("https://{}.sa", host))
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            valid_host_strategy(),
            1u16..=65535,
            prop::collection::vec(valid_origin_strategy(), 1..4),
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            "[a-zA-Z0-9]{0,48}",
            1i64..=10_000,
            prop_oneof![Just(AppEnv::Dev), Just(AppEnv::Prod)],
        )
            .prop_map(|(host, port, allowed_origins, driver, secret_key, minutes, env)| Config {
                server: ServerConfig {
                    host,
                    port,
                    allowed_origins,
                    trust_proxy: false,
                },
                database: DatabaseConfig {
                    driver,
                    ..DatabaseConfig::default()
                },
                security: SecurityConfig {
                    secret_key,
                    access_token_expire_minutes: minutes,
                    ..SecurityConfig::default()
                },
                upload: UploadConfig::default(),
                app: AppConfig {
                    env,
                    ..AppConfig::default()
                },
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing to YAML and loading it back yields the same settings.
        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.server.allowed_origins, parsed.server.allowed_origins);
            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.security.secret_key, parsed.security.secret_key);
            prop_assert_eq!(
                config.security.access_token_expire_minutes,
                parsed.security.access_token_expire_minutes
            );
            prop_assert_eq!(config.app.env, parsed.app.env);
        }

        /// Any valid port set in the environment wins over the file.
        #[test]
        fn env_port_overrides_file(file_port in 1u16..=65535, env_port in 1u16..=65535) {
            let _guard = lock_env();

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "server:\n  port: {}\n", file_port).expect("Failed to write config");

            std::env::set_var("KT_SERVER_PORT", env_port.to_string());
            let config = Config::load_with_env(file.path());
            std::env::remove_var("KT_SERVER_PORT");

            prop_assert_eq!(config.expect("Failed to load config").server.port, env_port);
        }

        /// Secrets shorter than the minimum are always reported.
        #[test]
        fn short_secret_is_reported(secret in "[a-z0-9]{1,31}") {
            let mut config = Config::default();
            config.security.secret_key = secret;
            prop_assert!(config.validate().iter().any(|p| p.contains("at least")));
        }
    }
}
