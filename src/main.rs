//! Target HA Agent
//!
//! Runs one lifecycle action per invocation. The action's outcome is printed
//! to stdout as JSON; logs go to stderr. The exit code follows the resource
//! agent convention, so the same binary serves as the shim Pacemaker calls
//! for mount, unmount and monitor.

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use target_ha_agent::{action_status, AgentConfig, OcfStatus, TargetAction, TargetManager};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Target HA Agent - Lustre target lifecycle on Pacemaker clusters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Agent configuration file (YAML)
    #[arg(long, env = "TARGET_HA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the local target store
    #[arg(long, env = "TARGET_HA_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Node name used for location constraints
    #[arg(long, env = "TARGET_HA_NODE_NAME")]
    node_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    action: TargetAction,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> std::process::ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            println!("{}", json!({ "error": format!("{:#}", e) }));
            return exit_code(OcfStatus::GenericError);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return exit_code(OcfStatus::GenericError);
        }
    };

    debug!(action = ?args.action, "running action");
    let manager = TargetManager::for_host(&config);
    let outcome = runtime.block_on(manager.run(args.action));
    let status = action_status(&outcome);
    match outcome {
        Ok(value) => println!("{}", json!({ "result": value })),
        Err(e) => {
            error!("{}", e);
            println!("{}", json!({ "error": e.to_string() }));
        }
    }

    info!(exit_code = status.exit_code(), "action finished");
    exit_code(status)
}

fn exit_code(status: OcfStatus) -> std::process::ExitCode {
    std::process::ExitCode::from(status.exit_code() as u8)
}

/// Configuration file (or defaults) with command line overrides applied
fn load_config(args: &Args) -> anyhow::Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AgentConfig::default(),
    };

    if let Some(store_dir) = &args.store_dir {
        config.store_dir = store_dir.clone();
    }
    if let Some(node_name) = &args.node_name {
        config.node_name = Some(node_name.clone());
    }
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
