use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Default root of run output.
const DEFAULT_DATA_DIR: &str = "/tmp/studio";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for dispatched runs (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Root holding `input/` and `output/`.
    pub data_dir: PathBuf,
    /// Task runner executable.
    pub snakemake_bin: PathBuf,
    /// Rule file handed to the task runner.
    pub snakefile: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                     |
    /// |-------------------------|-----------------------------|
    /// | `HOST`                  | `0.0.0.0`                   |
    /// | `PORT`                  | `8000`                      |
    /// | `CORS_ORIGINS`          | `http://localhost:3000`     |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                        |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                        |
    /// | `JWT_SECRET`            | required                    |
    /// | `JWT_ACCESS_EXPIRY_MINS`| `60`                        |
    /// | `STUDIO_DATA_DIR`       | `/tmp/studio`               |
    /// | `SNAKEMAKE_BIN`         | `snakemake`                 |
    /// | `SNAKEFILE_PATH`        | `<STUDIO_DATA_DIR>/Snakefile` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_var("PORT", 8000)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs = parse_var("SHUTDOWN_TIMEOUT_SECS", 30)?;
        let jwt = JwtConfig::from_env()?;

        let data_dir =
            PathBuf::from(std::env::var("STUDIO_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into()));
        let snakemake_bin =
            PathBuf::from(std::env::var("SNAKEMAKE_BIN").unwrap_or_else(|_| "snakemake".into()));
        let snakefile = std::env::var("SNAKEFILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("Snakefile"));

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            data_dir,
            snakemake_bin,
            snakefile,
        })
    }
}

/// Parse `var` if set, else return `default`.
pub(crate) fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
