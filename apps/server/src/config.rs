//! Configuration management for the records server

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes. Bulk download bodies only carry ids.
    /// Default: 1 MiB
    #[serde(default = "default_max_request_body_size")]
    pub max_request_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_request_body_size: default_max_request_body_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string. Also read from `DATABASE_URL`.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_pool_min_size")]
    pub pool_min_size: u32,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
    /// Pool acquire timeout in seconds. An exhausted or unreachable database
    /// surfaces as `503 Service Unavailable` after this long.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_seconds: u64,
    /// Server-side statement timeout in seconds.
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_seconds: u64,
    /// Client-side bound on each collection query and on collection
    /// enumeration. 0 disables it.
    #[serde(default)]
    pub query_timeout_seconds: u64,
    /// Maximum number of collections queried concurrently per request.
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_min_size: default_pool_min_size(),
            pool_max_size: default_pool_max_size(),
            pool_timeout_seconds: default_pool_timeout(),
            statement_timeout_seconds: default_statement_timeout(),
            query_timeout_seconds: 0,
            scan_concurrency: default_scan_concurrency(),
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_seconds > 0).then(|| Duration::from_secs(self.query_timeout_seconds))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Directory holding every downloadable patient file. Also read from
    /// `EXPORT_FILES_PATH`.
    #[serde(default)]
    pub export_root: PathBuf,
    /// Where bulk download archives are staged. Defaults to the system temp dir.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    /// Upper bound for a single export tree walk. 0 disables it.
    #[serde(default)]
    pub walk_timeout_seconds: u64,
    /// Maximum number of export tree walks running concurrently per request.
    #[serde(default = "default_locate_concurrency")]
    pub locate_concurrency: usize,
    /// Deflate level for bulk download archives (0-9).
    #[serde(default = "default_compression_level")]
    pub archive_compression_level: i64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            export_root: PathBuf::new(),
            temp_dir: None,
            walk_timeout_seconds: 0,
            locate_concurrency: default_locate_concurrency(),
            archive_compression_level: default_compression_level(),
        }
    }
}

impl FilesConfig {
    pub fn walk_timeout(&self) -> Option<Duration> {
        (self.walk_timeout_seconds > 0).then(|| Duration::from_secs(self.walk_timeout_seconds))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Page size when `limit` is not given.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    /// Larger `limit` values are clamped to this.
    #[serde(default = "default_search_max_limit")]
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            max_limit: default_search_max_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting for logs (recommended for production)
    #[serde(default)]
    pub json: bool,

    /// Enable file logging in addition to console
    #[serde(default)]
    pub file_enabled: bool,

    /// Directory for log files (default: ./logs)
    #[serde(default = "default_log_directory")]
    pub file_directory: String,

    /// Log file prefix (default: records-server)
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,

    /// Log rotation: daily, hourly, minutely, never (default: daily)
    #[serde(default = "default_log_rotation")]
    pub file_rotation: String,

    /// Enable OpenTelemetry integration
    #[serde(default)]
    pub opentelemetry_enabled: bool,

    /// OpenTelemetry Collector endpoint (OTLP/gRPC)
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,

    /// Trace sampling ratio (0.0 - 1.0): 1.0 = always, 0.1 = 10%
    #[serde(default = "default_trace_sample_ratio")]
    pub trace_sample_ratio: f64,

    /// Service name for OpenTelemetry
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub deployment_environment: String,

    /// Service version (defaults to cargo package version)
    pub service_version: Option<String>,

    /// OTLP export timeout in seconds
    #[serde(default = "default_otlp_timeout")]
    pub otlp_timeout_seconds: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_enabled: false,
            file_directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
            file_rotation: default_log_rotation(),
            opentelemetry_enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            trace_sample_ratio: default_trace_sample_ratio(),
            service_name: default_service_name(),
            deployment_environment: default_environment(),
            service_version: None,
            otlp_timeout_seconds: default_otlp_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_max_request_body_size() -> usize {
    1024 * 1024
}
fn default_pool_min_size() -> u32 {
    1
}
fn default_pool_max_size() -> u32 {
    10
}
fn default_pool_timeout() -> u64 {
    30
}
fn default_statement_timeout() -> u64 {
    60
}
fn default_scan_concurrency() -> usize {
    8
}
fn default_locate_concurrency() -> usize {
    4
}
fn default_compression_level() -> i64 {
    9
}
fn default_search_limit() -> usize {
    20
}
fn default_search_max_limit() -> usize {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_directory() -> String {
    "./logs".to_string()
}
fn default_log_file_prefix() -> String {
    "records-server".to_string()
}
fn default_log_rotation() -> String {
    "daily".to_string()
}
fn default_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}
fn default_trace_sample_ratio() -> f64 {
    1.0
}
fn default_service_name() -> String {
    "records-server".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_otlp_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default(
                "server.max_request_body_size",
                default_max_request_body_size() as i64,
            )?
            .set_default("database.pool_min_size", default_pool_min_size())?
            .set_default("database.pool_max_size", default_pool_max_size())?
            .set_default("database.pool_timeout_seconds", default_pool_timeout())?
            .set_default(
                "database.statement_timeout_seconds",
                default_statement_timeout(),
            )?
            .set_default("database.query_timeout_seconds", 0)?
            .set_default(
                "database.scan_concurrency",
                default_scan_concurrency() as i64,
            )?
            .set_default("database.run_migrations", default_true())?
            .set_default("files.walk_timeout_seconds", 0)?
            .set_default(
                "files.locate_concurrency",
                default_locate_concurrency() as i64,
            )?
            .set_default(
                "files.archive_compression_level",
                default_compression_level(),
            )?
            .set_default("search.default_limit", default_search_limit() as i64)?
            .set_default("search.max_limit", default_search_max_limit() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .set_default("logging.file_enabled", false)?
            .set_default("logging.file_directory", default_log_directory())?
            .set_default("logging.file_prefix", default_log_file_prefix())?
            .set_default("logging.file_rotation", default_log_rotation())?
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            // Example: RECORDS__DATABASE__URL -> config.database.url
            // Arrays use comma separator: RECORDS__SERVER__CORS_ORIGINS=https://a.com,https://b.com
            .add_source(
                config::Environment::with_prefix("RECORDS")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = config.try_deserialize()?;

        // The deployment contract names these two variables directly.
        if std::env::var("RECORDS__DATABASE__URL").is_err() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }
        if std::env::var("RECORDS__FILES__EXPORT_ROOT").is_err() {
            if let Ok(path) = std::env::var("EXPORT_FILES_PATH") {
                config.files.export_root = PathBuf::from(path);
            }
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        Ok(addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err(
                "database.url must be set (RECORDS__DATABASE__URL or DATABASE_URL)".to_string(),
            );
        }
        self.validate_files()?;

        if self.database.scan_concurrency == 0 {
            return Err("database.scan_concurrency must be > 0".to_string());
        }
        if self.database.pool_max_size == 0 {
            return Err("database.pool_max_size must be > 0".to_string());
        }
        if self.database.pool_min_size > self.database.pool_max_size {
            return Err("database.pool_min_size must be <= database.pool_max_size".to_string());
        }

        if self.search.default_limit == 0 || self.search.max_limit == 0 {
            return Err("search.default_limit and search.max_limit must be > 0".to_string());
        }
        if self.search.default_limit > self.search.max_limit {
            return Err("search.default_limit must be <= search.max_limit".to_string());
        }

        if !(0.0..=1.0).contains(&self.logging.trace_sample_ratio) {
            return Err("logging.trace_sample_ratio must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    /// Checks that do not involve the database connection.
    pub fn validate_files(&self) -> Result<(), String> {
        if self.files.export_root.as_os_str().is_empty() {
            return Err(
                "files.export_root must be set (RECORDS__FILES__EXPORT_ROOT or EXPORT_FILES_PATH)"
                    .to_string(),
            );
        }
        if !self.files.export_root.is_dir() {
            return Err(format!(
                "files.export_root {} is not an existing directory",
                self.files.export_root.display()
            ));
        }
        if self.files.locate_concurrency == 0 {
            return Err("files.locate_concurrency must be > 0".to_string());
        }
        if !(0..=9).contains(&self.files.archive_compression_level) {
            return Err("files.archive_compression_level must be between 0 and 9".to_string());
        }
        Ok(())
    }
}
