pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;

pub use cli::{CliArgs, LogLevel};
pub use config::{Config, DispatchConfig, GatewayConfig, RedisConfig};

use std::path::PathBuf;
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("path is not a file: {0:?}")]
    NotAFile(PathBuf),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("the '{0}' setting must be defined")]
    MissingField(&'static str),

    #[error("invalid '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}
