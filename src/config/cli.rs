use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::ConfigError;

// -----------------------------------------------------------------------------
// ----- CliArgs ---------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliArgs {
    pub config_file_location: PathBuf,
    pub log_level: LogLevel,
}

impl CliArgs {
    /// Exits the process on `--help`, `--version` or malformed arguments.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(Args::parse())
    }
}

// -----------------------------------------------------------------------------
// ----- CliArgs: Private ------------------------------------------------------

impl CliArgs {
    fn from_args(args: Args) -> Result<Self, ConfigError> {
        must_exist_file(&args.config_file)?;

        Ok(Self {
            config_file_location: args.config_file,
            log_level: args.log_level,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "pushcrab", version, about = "Push notification gateway worker")]
struct Args {
    // Must exist; no defaults.
    #[arg(long = "config", short = 'c', env = "PUSHCRAB_CONFIG_FILE")]
    config_file: PathBuf,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", env = "PUSHCRAB_LOG", default_value = "info")]
    log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- LogLevel --------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn must_exist_file(path: &Path) -> Result<(), ConfigError> {
    let md = fs::metadata(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if !md.is_file() {
        return Err(ConfigError::NotAFile(path.to_path_buf()));
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
