use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use pushcrab::config::{CliArgs, LogLevel};
use pushcrab::{Config, Dispatcher, RedisQueue, SessionPool};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "🦀 pushcrab";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match CliArgs::from_env() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.log_level);

    let config = match Config::load(&cli.config_file_location).await {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load {:?}: {e}", cli.config_file_location);
            return ExitCode::FAILURE;
        }
    };

    run_forever(&config).await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever(config: &Config) -> ExitCode {
    let pool = match SessionPool::from_config(&config.gateway) {
        Ok(pool) => pool,
        Err(e) => {
            error!("connection pool failed to initialize: {e}");
            return ExitCode::FAILURE;
        }
    };

    let queue = match RedisQueue::connect(&config.redis).await {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!("redis failed to initialize: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut dispatcher = Dispatcher::new(queue, pool.clone(), &config.dispatch);

    info!(
        "{} delivering '{}' to {} with {} sessions",
        APP_NAME, config.redis.queue_key, config.gateway.server, config.gateway.pool_size
    );

    let code = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("{} shutting down", APP_NAME);
            ExitCode::SUCCESS
        }

        res = dispatcher.run() => match res {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("queue pop failed: {e}");
                ExitCode::FAILURE
            }
        },
    };

    dispatcher.drain(config.dispatch.shutdown_grace).await;
    pool.shutdown_all().await;

    code
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
