use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::fs;

use super::ConfigError;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const DEFAULT_POOL_SIZE: usize = 2;
const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
const DEFAULT_REDIS_PORT: u16 = 6379;
const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 3;
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

/// Loaded once at startup and handed to each component by reference.
#[derive(Clone, Debug)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub redis: RedisConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub server: String,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: Option<PathBuf>,
    pub pool_size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub queue_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub log_successes: bool,
    pub max_delivery_attempts: u32,
    pub shutdown_grace: Duration,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Relative certificate paths resolve against the config file's directory.
    pub async fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&raw, base_dir)
    }

    pub fn parse(raw: &str, base_dir: &Path) -> Result<Config, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;

        let server = required(file.apns_server, "apns_server")?;
        validate_endpoint(&server)?;

        let cert_path = resolve(base_dir, required(file.apns_cert_path, "apns_cert_path")?);
        let key_path = resolve(base_dir, required(file.apns_key_path, "apns_key_path")?);
        let ca_path = file.apns_ca_path.map(|p| resolve(base_dir, p));

        let pool_size = file.pool_size.unwrap_or(DEFAULT_POOL_SIZE);
        if pool_size == 0 {
            return Err(ConfigError::InvalidField {
                field: "pool_size",
                reason: "must be at least 1".into(),
            });
        }

        let queue_key = required(file.redis_queue_key, "redis_queue_key")?;
        if queue_key.trim().is_empty() {
            return Err(ConfigError::MissingField("redis_queue_key"));
        }

        let max_delivery_attempts = file
            .max_delivery_attempts
            .unwrap_or(DEFAULT_MAX_DELIVERY_ATTEMPTS);
        if max_delivery_attempts == 0 {
            return Err(ConfigError::InvalidField {
                field: "max_delivery_attempts",
                reason: "must be at least 1".into(),
            });
        }

        Ok(Config {
            gateway: GatewayConfig {
                server,
                cert_path,
                key_path,
                ca_path,
                pool_size,
            },
            redis: RedisConfig {
                host: file
                    .redis_host
                    .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string()),
                port: file.redis_port.unwrap_or(DEFAULT_REDIS_PORT),
                db: file.redis_db.unwrap_or(0),
                queue_key,
            },
            dispatch: DispatchConfig {
                log_successes: file.log_successes.unwrap_or(false),
                max_delivery_attempts,
                shutdown_grace: file.shutdown_grace.unwrap_or(DEFAULT_SHUTDOWN_GRACE),
            },
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    apns_server: Option<String>,
    apns_cert_path: Option<PathBuf>,
    apns_key_path: Option<PathBuf>,
    apns_ca_path: Option<PathBuf>,
    pool_size: Option<usize>,

    redis_host: Option<String>,
    redis_port: Option<u16>,
    redis_db: Option<i64>,
    redis_queue_key: Option<String>,

    log_successes: Option<bool>,
    max_delivery_attempts: Option<u32>,

    #[serde(default, deserialize_with = "de_humantime")]
    shutdown_grace: Option<Duration>,
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingField(field))
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn validate_endpoint(server: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidField {
        field: "apns_server",
        reason: format!("{reason}: '{server}'"),
    };

    let (host, port) = server
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

    Ok(())
}

fn de_humantime<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
