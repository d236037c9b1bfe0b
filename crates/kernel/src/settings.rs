use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSTORE_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSTORE_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSTORE";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay
    /// and `BOOKSTORE_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from `config_dir` for the named environment.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let cfg = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;
        Ok(settings)
    }

    /// Whether internal error details may be shown to API callers.
    pub fn exposes_internal_errors(&self) -> bool {
        self.environment == Environment::Local
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Origins allowed by CORS; empty means any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_url")]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_url() -> String {
        "sqlite://bookstore.db".to_string()
    }

    fn default_max_connections() -> u32 {
        5
    }

    /// Whether the configured URL points at a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Token signing and the single administrator credential pair.
#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "AuthSettings::default_issuer")]
    pub issuer: String,
    #[serde(default = "AuthSettings::default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    #[serde(default = "AuthSettings::default_admin_username")]
    pub admin_username: String,
    #[serde(default = "AuthSettings::default_admin_password")]
    pub admin_password: String,
}

impl AuthSettings {
    fn default_jwt_secret() -> String {
        "bookstore-development-signing-key-change-me".to_string()
    }

    fn default_issuer() -> String {
        "bookstore-api".to_string()
    }

    fn default_token_ttl_minutes() -> i64 {
        120
    }

    fn default_admin_username() -> String {
        "admin".to_string()
    }

    fn default_admin_password() -> String {
        "password".to_string()
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: Self::default_jwt_secret(),
            issuer: Self::default_issuer(),
            token_ttl_minutes: Self::default_token_ttl_minutes(),
            admin_username: Self::default_admin_username(),
            admin_password: Self::default_admin_password(),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "RateLimitSettings::default_enabled")]
    pub enabled: bool,
    #[serde(default = "RateLimitSettings::default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "RateLimitSettings::default_burst")]
    pub burst: u32,
}

impl RateLimitSettings {
    fn default_enabled() -> bool {
        true
    }

    fn default_requests_per_minute() -> u32 {
        100
    }

    fn default_burst() -> u32 {
        100
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            requests_per_minute: Self::default_requests_per_minute(),
            burst: Self::default_burst(),
        }
    }
}
