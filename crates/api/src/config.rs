use persistence::db::DatabaseConfig;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Bearer token verification
    pub jwt: JwtAuthConfig,
    /// Export worker pool and executors
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub mailing: MailingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// RSA public key in PEM format for verifying RS256 tokens
    #[serde(default)]
    pub public_key: String,

    /// Shared HS256 secret, used instead of the public key when set.
    /// Meant for local development only.
    #[serde(default)]
    pub secret: Option<String>,

    /// Leeway in seconds for clock skew tolerance (default: 30)
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Number of export workers
    #[serde(default = "default_export_workers")]
    pub workers: usize,

    /// Queued exports accepted before submissions are rejected
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Upper bound for one destination transfer
    #[serde(default = "default_destination_timeout")]
    pub destination_timeout_secs: u64,

    /// How long shutdown waits for in-flight exports
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Directory for spreadsheet artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Contacts per CRM request
    #[serde(default = "default_crm_batch_size")]
    pub crm_batch_size: usize,

    /// Unfinished jobs untouched for this long are failed by the reaper
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: i64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            workers: default_export_workers(),
            queue_depth: default_queue_depth(),
            destination_timeout_secs: default_destination_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            output_dir: default_output_dir(),
            crm_batch_size: default_crm_batch_size(),
            stale_after_minutes: default_stale_after_minutes(),
        }
    }
}

/// CRM connector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint receiving contact batches
    #[serde(default)]
    pub url: String,

    /// Bearer token sent to the CRM
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_client_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: String::new(),
            timeout_ms: default_client_timeout_ms(),
        }
    }
}

/// Mailing list connector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailingConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint receiving subscriber imports
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_client_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MailingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_ms: default_client_timeout_ms(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_jwt_leeway() -> u64 {
    shared::jwt::DEFAULT_LEEWAY_SECS
}
fn default_export_workers() -> usize {
    4
}
fn default_queue_depth() -> usize {
    64
}
fn default_destination_timeout() -> u64 {
    300
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_output_dir() -> String {
    "exports".to_string()
}
fn default_crm_batch_size() -> usize {
    100
}
fn default_stale_after_minutes() -> i64 {
    60
}
fn default_client_timeout_ms() -> u64 {
    30000
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

const TEST_DEFAULTS: &str = r#"
    [server]
    host = "0.0.0.0"
    port = 8080
    request_timeout_secs = 30

    [database]
    url = ""
    max_connections = 20
    min_connections = 2
    connect_timeout_secs = 10
    idle_timeout_secs = 600

    [logging]
    level = "info"
    format = "json"

    [security]
    cors_origins = []

    [jwt]
    public_key = ""
    leeway_secs = 30

    [export]
    workers = 2
    queue_depth = 16
    destination_timeout_secs = 10
    shutdown_timeout_secs = 5
    output_dir = "exports"
    crm_batch_size = 100
    stale_after_minutes = 60

    [crm]
    enabled = false

    [mailing]
    enabled = false
"#;

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with PROSPECT__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("PROSPECT").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on config files.
    /// Validation is skipped to allow partial configs.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(TEST_DEFAULTS, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "PROSPECT__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        let has_secret = self.jwt.secret.as_deref().is_some_and(|s| !s.is_empty());
        if self.jwt.public_key.is_empty() && !has_secret {
            return Err(ConfigValidationError::MissingRequired(
                "PROSPECT__JWT__PUBLIC_KEY must be set".to_string(),
            ));
        }

        if self.export.workers == 0 || self.export.queue_depth == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "export.workers and export.queue_depth must be at least 1".to_string(),
            ));
        }

        if self.export.crm_batch_size == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "export.crm_batch_size must be at least 1".to_string(),
            ));
        }

        if self.crm.enabled && self.crm.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "crm.url is required when the CRM destination is enabled".to_string(),
            ));
        }

        if self.mailing.enabled && self.mailing.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "mailing.url is required when the mailing destination is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigValidationError::InvalidValue(format!(
                    "Invalid socket address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }
}
