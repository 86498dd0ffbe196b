//! Configuration management
//!
//! Scalar settings come from the environment (a `.env` file is honoured).
//! Structured settings such as the query databases and the maintenance
//! schedule can additionally be supplied in a TOML file named by
//! `OPENBIS_CONFIG_FILE`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use openbis_common::types::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Defaults
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL; the file is created on first start.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://openbis.db?mode=rwc";

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Session lifetime in minutes.
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 720;

pub const DEFAULT_ADMIN_USER: &str = "admin";

/// Key of the query database backed by the metadata store itself.
pub const METADATA_QUERY_DATABASE_KEY: &str = "1";

pub const DEFAULT_INDEX_POLL_INTERVAL_MS: u64 = 500;

pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 60;

/// Default availability time of operation executions (one year).
pub const DEFAULT_EXECUTION_AVAILABILITY_SECS: i64 = 365 * 24 * 60 * 60;

/// Default availability time of execution summaries (one month).
pub const DEFAULT_SUMMARY_AVAILABILITY_SECS: i64 = 30 * 24 * 60 * 60;

/// Default availability time of execution details (one day).
pub const DEFAULT_DETAILS_AVAILABILITY_SECS: i64 = 24 * 60 * 60;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub session: SessionConfig,
    pub index: IndexConfig,
    pub maintenance: MaintenanceConfig,
    pub executions: ExecutionConfig,
    pub server_info: ServerInfoConfig,
    pub query_databases: Vec<QueryDatabaseConfig>,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Session and bootstrap account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub timeout_minutes: i64,
    /// Instance admin created on an empty database
    pub admin_user: String,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub poll_interval_ms: u64,
}

/// Schedule of the operation execution maintenance tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    pub timeout_pending_interval_secs: u64,
    pub timed_out_or_deleted_interval_secs: u64,
}

/// Default availability times applied when an execution does not set its own
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub availability_secs: i64,
    pub summary_availability_secs: i64,
    pub details_availability_secs: i64,
}

/// Values reported by the server information endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfoConfig {
    pub authentication_service: String,
    pub enabled_technologies: Vec<String>,
    pub project_samples_enabled: bool,
    pub archiving_configured: bool,
}

/// A database that stored queries and ad hoc SQL may run against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryDatabaseConfig {
    pub key: String,
    pub label: String,
    /// Connection URL; `None` means the metadata database itself
    #[serde(default)]
    pub url: Option<String>,
    /// Space the database is bound to; `None` binds it to the instance
    #[serde(default)]
    pub space_code: Option<String>,
    /// Role needed to create or run queries; defaults to ADMIN on the
    /// metadata database and POWER_USER elsewhere
    #[serde(default)]
    pub creator_minimal_role: Option<Role>,
}

impl QueryDatabaseConfig {
    pub fn creator_minimal_role(&self) -> Role {
        match (self.creator_minimal_role, &self.url) {
            (Some(role), _) => role,
            (None, None) => Role::Admin,
            (None, Some(_)) => Role::PowerUser,
        }
    }
}

/// Structured settings accepted from the optional TOML file
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    maintenance: Option<MaintenanceConfig>,
    executions: Option<ExecutionConfig>,
    server_info: Option<ServerInfoConfig>,
    query_databases: Option<Vec<QueryDatabaseConfig>>,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(std::env::var("OPENBIS_CONFIG_FILE").ok().map(PathBuf::from).as_deref())
    }

    /// Load configuration, merging the structured settings of `file` when given
    pub fn load_from(file: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let mut config = Config {
            server: ServerConfig {
                host: std::env::var("OPENBIS_HOST").unwrap_or(defaults.server.host),
                port: env_or("OPENBIS_PORT", defaults.server.port),
                shutdown_timeout_secs: env_or(
                    "OPENBIS_SHUTDOWN_TIMEOUT",
                    defaults.server.shutdown_timeout_secs,
                ),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    defaults.database.connect_timeout_secs,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
            session: SessionConfig {
                timeout_minutes: env_or(
                    "OPENBIS_SESSION_TIMEOUT_MINUTES",
                    defaults.session.timeout_minutes,
                ),
                admin_user: std::env::var("OPENBIS_ADMIN_USER")
                    .unwrap_or(defaults.session.admin_user),
                admin_password: std::env::var("OPENBIS_ADMIN_PASSWORD").ok(),
            },
            index: IndexConfig {
                poll_interval_ms: env_or(
                    "OPENBIS_INDEX_POLL_INTERVAL_MS",
                    defaults.index.poll_interval_ms,
                ),
            },
            maintenance: defaults.maintenance,
            executions: defaults.executions,
            server_info: defaults.server_info,
            query_databases: defaults.query_databases,
        };

        if let Some(path) = file {
            if !path.is_file() {
                anyhow::bail!("Configuration file {} does not exist", path.display());
            }
            let settings: FileSettings = Figment::new()
                .merge(Toml::file(path))
                .merge(Env::prefixed("OPENBIS_FILE_").split("__"))
                .extract()
                .map_err(|e| anyhow::anyhow!("Failed to load configuration file {}: {}", path.display(), e))?;
            config.apply_file_settings(settings);
            tracing::info!(path = %path.display(), "Loaded configuration file");
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_file_settings(&mut self, settings: FileSettings) {
        if let Some(maintenance) = settings.maintenance {
            self.maintenance = maintenance;
        }
        if let Some(executions) = settings.executions {
            self.executions = executions;
        }
        if let Some(server_info) = settings.server_info {
            self.server_info = server_info;
        }
        if let Some(query_databases) = settings.query_databases {
            self.query_databases = query_databases;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.session.timeout_minutes <= 0 {
            anyhow::bail!("Session timeout must be positive");
        }

        let mut keys = std::collections::HashSet::new();
        for db in &self.query_databases {
            if db.key.trim().is_empty() {
                anyhow::bail!("Query database key cannot be empty");
            }
            if !keys.insert(db.key.as_str()) {
                anyhow::bail!("Duplicate query database key '{}'", db.key);
            }
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_pending_interval_secs: DEFAULT_MAINTENANCE_INTERVAL_SECS,
            timed_out_or_deleted_interval_secs: DEFAULT_MAINTENANCE_INTERVAL_SECS,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            availability_secs: DEFAULT_EXECUTION_AVAILABILITY_SECS,
            summary_availability_secs: DEFAULT_SUMMARY_AVAILABILITY_SECS,
            details_availability_secs: DEFAULT_DETAILS_AVAILABILITY_SECS,
        }
    }
}

impl Default for ServerInfoConfig {
    fn default() -> Self {
        Self {
            authentication_service: "database-authentication-service".to_string(),
            enabled_technologies: Vec::new(),
            project_samples_enabled: true,
            archiving_configured: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            session: SessionConfig {
                timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
                admin_user: DEFAULT_ADMIN_USER.to_string(),
                admin_password: None,
            },
            index: IndexConfig {
                poll_interval_ms: DEFAULT_INDEX_POLL_INTERVAL_MS,
            },
            maintenance: MaintenanceConfig::default(),
            executions: ExecutionConfig::default(),
            server_info: ServerInfoConfig::default(),
            query_databases: vec![QueryDatabaseConfig {
                key: METADATA_QUERY_DATABASE_KEY.to_string(),
                label: "openBIS meta data".to_string(),
                url: None,
                space_code: None,
                creator_minimal_role: None,
            }],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.query_databases.len(), 1);
        assert_eq!(config.query_databases[0].key, METADATA_QUERY_DATABASE_KEY);
        assert_eq!(config.query_databases[0].creator_minimal_role(), Role::Admin);
    }

    #[test]
    fn test_creator_minimal_role_defaults() {
        let external = QueryDatabaseConfig {
            key: "reporting".into(),
            label: "Reporting".into(),
            url: Some("sqlite::memory:".into()),
            space_code: None,
            creator_minimal_role: None,
        };
        assert_eq!(external.creator_minimal_role(), Role::PowerUser);

        let relaxed = QueryDatabaseConfig {
            url: None,
            creator_minimal_role: Some(Role::Observer),
            ..external
        };
        assert_eq!(relaxed.creator_minimal_role(), Role::Observer);
    }

    #[test]
    fn test_duplicate_query_database_keys_rejected() {
        let mut config = Config::default();
        let duplicate = config.query_databases[0].clone();
        config.query_databases.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_settings_parse_from_toml() {
        let toml = r#"
            [maintenance]
            enabled = false
            timeout_pending_interval_secs = 5

            [[query_databases]]
            key = "reporting"
            label = "Reporting"
            url = "sqlite::memory:"
            space_code = "CISD"
            creator_minimal_role = "ADMIN"
        "#;

        let settings: FileSettings = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        let mut config = Config::default();
        config.apply_file_settings(settings);

        assert!(!config.maintenance.enabled);
        assert_eq!(config.maintenance.timeout_pending_interval_secs, 5);
        assert_eq!(
            config.maintenance.timed_out_or_deleted_interval_secs,
            DEFAULT_MAINTENANCE_INTERVAL_SECS
        );
        assert_eq!(config.query_databases.len(), 1);
        assert_eq!(config.query_databases[0].creator_minimal_role(), Role::Admin);
        assert_eq!(config.query_databases[0].space_code.as_deref(), Some("CISD"));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[executions]\navailability_secs = 60\nsummary_availability_secs = 30\ndetails_availability_secs = 10"
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.executions.availability_secs, 60);
        assert_eq!(config.executions.details_availability_secs, 10);

        let missing = Config::load_from(Some(Path::new("/nonexistent/openbis.toml")));
        assert!(missing.is_err());
    }

}
