use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub postgres_drafts: PostgresDraftsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Expected `X-API-Key` value; `None` disables the check
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Backend names, most capable first
    #[serde(default = "default_backend_order")]
    pub backend_order: Vec<String>,
    /// Upper bound for the pause a backend may request after each attempt
    #[serde(default = "default_max_settle_delay_ms")]
    pub max_settle_delay_ms: u64,
    /// How long finished runs stay queryable
    #[serde(default = "default_run_retention_seconds")]
    pub run_retention_seconds: u64,
    /// Cleanup task interval in seconds
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComposeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory a mail client watches for unsent `.eml` drafts
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresDraftsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_drafts_table")]
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Draft creation endpoint (POST)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub credential: Option<CredentialConfig>,
}

/// How the remote backend obtains its short-lived bearer token
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialConfig {
    /// OAuth2 client-credentials exchange against a token endpoint
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
        #[serde(default)]
        scope: Option<String>,
    },
    /// HS256 token minted locally from a shared secret
    SignedJwt {
        secret: String,
        #[serde(default)]
        issuer: Option<String>,
        #[serde(default)]
        audience: Option<String>,
        #[serde(default)]
        subject: Option<String>,
        #[serde(default = "default_jwt_ttl")]
        ttl_seconds: u64,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_backend_order() -> Vec<String> {
    vec![
        "remote".to_string(),
        "postgres".to_string(),
        "compose".to_string(),
    ]
}

fn default_max_settle_delay_ms() -> u64 {
    2000
}

fn default_run_retention_seconds() -> u64 {
    3600 // 1 hour
}

fn default_cleanup_interval_seconds() -> u64 {
    60
}

fn default_outbox_dir() -> String {
    "outbox".to_string()
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_drafts_table() -> String {
    "merge_drafts".to_string()
}

fn default_remote_timeout() -> u64 {
    10
}

fn default_jwt_ttl() -> u64 {
    300 // 5 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "mail-merge-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("dispatch.backend_order", default_backend_order())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // MERGE__SERVER__PORT, MERGE__COMPOSE__OUTBOX_DIR, MERGE__DISPATCH__BACKEND_ORDER=remote,compose
            .add_source(
                Environment::with_prefix("MERGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("dispatch.backend_order"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backend_order: default_backend_order(),
            max_settle_delay_ms: default_max_settle_delay_ms(),
            run_retention_seconds: default_run_retention_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            outbox_dir: default_outbox_dir(),
            settle_delay_ms: default_settle_delay_ms(),
            from_address: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for PostgresDraftsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table: default_drafts_table(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_seconds: default_remote_timeout(),
            credential: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
