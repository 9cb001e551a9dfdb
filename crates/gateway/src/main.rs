//! Gateway entry point: configuration, logging, worker pool, HTTP server.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use arbor_domain::config::{Config, ConfigSeverity};
use arbor_gateway::{api, bootstrap};

#[derive(Parser, Debug)]
#[command(name = "arbor", about = "Arbor agent orchestration gateway")]
struct Args {
    /// Bind host (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Validate configuration and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let issues = config.validate();
    let mut fatal = false;
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Error => {
                tracing::error!("{issue}");
                fatal = true;
            }
            ConfigSeverity::Warning => tracing::warn!("{issue}"),
        }
    }
    if fatal {
        anyhow::bail!("configuration is invalid ({} issue(s))", issues.len());
    }
    if args.check_config {
        println!("configuration ok ({} warning(s))", issues.len());
        return Ok(());
    }

    let bind_addr = config.server.bind_addr();
    let state = bootstrap::build_state(config, Arc::new(bootstrap::UnconfiguredSdk));
    let worker_shutdown = bootstrap::spawn_workers(&state);
    let providers = state.providers.clone();

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    worker_shutdown.notify_waiters();
    providers.shutdown();
    Ok(())
}
