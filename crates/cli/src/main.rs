//! `lakeflow`: run Data Lake Storage actions from the command line or as a
//! small HTTP host.

mod server;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lakeflow_common::auth::{CallbackMode, TokenLifecycleManager};
use lakeflow_domain::constants::CONTINUATION_HEADER;
use lakeflow_domain::{Config, FlowMessage};
use lakeflow_infra::{config, AccessTokenProvider, NodeKind, Nodes};
use serde_json::{json, Value};
use server::HostServer;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "lakeflow", version)]
#[command(about = "OAuth2-authorized Data Lake Storage Gen2 actions")]
struct Cli {
    /// Path to a JSON or TOML configuration file
    #[arg(short, long, global = true, env = "LAKEFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Obtain a token, opening the browser if needed, and print its status.
    Authorize,
    /// Run one action node and print the resulting message.
    Run {
        /// lease, files, tables or automation
        node: String,
        /// Payload as JSON, or @path to read it from a file
        #[arg(long)]
        payload: Option<String>,
        /// Continuation token for a files list
        #[arg(long)]
        continuation: Option<String>,
    },
    /// Serve the action nodes over HTTP until interrupted.
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded .env");
    }

    match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "lakeflow failed");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so `run` output stays machine-readable.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lakeflow=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
        }
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = match cli.config {
        Some(path) => config::load_from_file(Some(path))?,
        None => config::load()?,
    };

    match cli.command {
        Command::Authorize => authorize(&config).await,
        Command::Run { node, payload, continuation } => {
            run_node(&config, &node, payload.as_deref(), continuation).await
        }
        Command::Serve => serve(&config).await,
    }
}

/// Host server for the callback route while a hosted-mode flow may need it.
async fn callback_host(config: &Config, manager: &TokenLifecycleManager) -> Result<Option<HostServer>> {
    if manager.callback_mode() != CallbackMode::Hosted {
        return Ok(None);
    }
    let app = server::router(Some(manager), None)?;
    Ok(Some(HostServer::start(&config.server.bind, app).await?))
}

#[allow(clippy::print_stdout)]
async fn authorize(config: &Config) -> Result<ExitCode> {
    let manager = config::token_manager(config)?.context("no oauth2 section configured")?;
    let host = callback_host(config, &manager).await?;

    let outcome = manager.get_valid_token().await;
    if let Some(host) = host {
        host.stop().await;
    }
    manager.shutdown().await;
    outcome?;

    let expires_at = manager
        .snapshot()
        .expires_at()
        .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    let status = json!({
        "authenticated": manager.has_usable_token(),
        "expiresAt": expires_at,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::print_stdout)]
async fn run_node(
    config: &Config,
    node: &str,
    payload: Option<&str>,
    continuation: Option<String>,
) -> Result<ExitCode> {
    let kind = node.parse::<NodeKind>().map_err(anyhow::Error::msg)?;
    let mut msg = FlowMessage::new(read_payload(payload)?);
    if let Some(token) = continuation {
        msg.headers.insert(CONTINUATION_HEADER.to_string(), Value::String(token));
    }

    let manager = config::token_manager(config)?;
    let host = match &manager {
        Some(manager) => callback_host(config, manager).await?,
        None => None,
    };
    let provider = manager.clone().map(|m| Arc::new(m) as Arc<dyn AccessTokenProvider>);

    let outcome = match Nodes::from_config(config, provider) {
        Ok(nodes) => nodes.execute(kind, msg.clone()).await,
        Err(err) => Err(err),
    };

    if let Some(host) = host {
        host.stop().await;
    }
    if let Some(manager) = &manager {
        manager.shutdown().await;
    }

    let (out, code) = match outcome {
        Ok(out) => (out, ExitCode::SUCCESS),
        Err(err) => {
            error!(node = %kind, error = %err, "action failed");
            (err.into_message(msg), ExitCode::FAILURE)
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(code)
}

async fn serve(config: &Config) -> Result<ExitCode> {
    let manager = config::token_manager(config)?;
    let provider = manager.clone().map(|m| Arc::new(m) as Arc<dyn AccessTokenProvider>);
    let nodes = Nodes::from_config(config, provider)?;

    let app = server::router(manager.as_ref(), Some(Arc::new(nodes)))?;
    let host = HostServer::start(&config.server.bind, app).await?;
    info!(addr = %host.local_addr(), "serving action nodes");

    host.run_until(shutdown_signal()).await;
    if let Some(manager) = &manager {
        manager.shutdown().await;
    }
    info!("lakeflow stopped gracefully");
    Ok(ExitCode::SUCCESS)
}

/// Payload argument: inline JSON, `@path` to a JSON file, or an empty object.
fn read_payload(raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let text = match raw.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read payload file {path}"))?
        }
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("payload is not valid JSON")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
