use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use super::demo::demo_router;
use crate::logging::{init_logging_with_config, LogConfig, LogFormat};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};

/// Command-line interface for wren
#[derive(Parser)]
#[command(name = "wren")]
#[command(about = "wren HTTP router", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo application
    Serve {
        /// Address and port to bind the server to
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,

        /// Log output format; overrides WREN_LOG_FORMAT
        #[arg(long, value_enum)]
        log_format: Option<LogFormat>,

        /// Exact `Authorization` header value required under /admin
        #[arg(long, env = "WREN_ADMIN_TOKEN")]
        admin_token: Option<String>,
    },
    /// Print the demo application's route table
    Routes,
}

/// Parse arguments and execute the selected command.
///
/// # Errors
///
/// Returns an error if logging cannot be initialized, the address cannot be
/// bound, or the server coroutine panics.
pub fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse())
}

/// Execute an already parsed command line.
///
/// # Errors
///
/// See [`run_cli`].
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            addr,
            log_format,
            admin_token,
        } => {
            let mut log_config = LogConfig::from_env();
            if let Some(format) = log_format {
                log_config.format = format;
            }
            init_logging_with_config(&log_config)?;

            let runtime = RuntimeConfig::from_env();
            runtime.apply();
            info!(
                stack_size = runtime.stack_size,
                contain_handler_faults = runtime.contain_handler_faults,
                admin = admin_token.is_some(),
                "Runtime configured"
            );

            let router = demo_router(&runtime, admin_token);
            info!(
                routes = router.routes().len(),
                middleware = router.middleware_count(),
                "Router ready"
            );

            let service = AppService::new(Arc::new(router));
            let handle = HttpServer(service)
                .start(addr.as_str())
                .with_context(|| format!("failed to bind {addr}"))?;
            handle
                .join()
                .map_err(|e| anyhow!("server coroutine panicked: {e:?}"))?;
            Ok(())
        }
        Commands::Routes => {
            demo_router(&RuntimeConfig::from_env(), None).dump_routes();
            Ok(())
        }
    }
}
