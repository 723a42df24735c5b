//! kpf-mcp - Kubernetes port-forward tool server
//!
//! Speaks JSON-RPC 2.0 on stdin/stdout. Diagnostics, including the output
//! of every forward process, go to stderr.

use anyhow::Result;
use forward_lib::{ForwardService, StructuredLogger};
use forward_server::{api, ForwardMcpServer, ServerConfig};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Resolves on Ctrl-C or SIGTERM with the name of the signal
async fn shutdown_signal() -> &'static str {
    let terminate = async {
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    term.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            "SIGINT"
        }
        _ = terminate => "SIGTERM",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()?;
    init_tracing(config.log_json);

    let logger = StructuredLogger::new();
    logger.log_startup(SERVER_VERSION, &config.kubectl);

    let service = ForwardService::builder()
        .kubectl(config.kubectl.clone())
        .grace_period(config.grace_period())
        .default_remote_port(config.default_remote_port)
        .log_windows(config.log_windows)
        .build()?;
    service.mark_ready().await;
    let service = Arc::new(service);

    let api_handle = config.metrics_port.map(|port| {
        let state = Arc::new(api::AppState::new(service.health().clone()));
        tokio::spawn(async move {
            if let Err(e) = api::serve(port, state).await {
                error!(error = %e, "Health/metrics endpoint failed");
            }
        })
    });

    let server = ForwardMcpServer::new(Arc::clone(&service));
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let reason = tokio::select! {
        result = server.run(stdin, stdout) => {
            if let Err(e) = result {
                error!(error = %e, "Transport failed");
            }
            "stdin closed"
        }
        signal = shutdown_signal() => signal,
    };

    info!(reason, "Shutting down");
    service.shutdown(reason).await;

    if let Some(handle) = api_handle {
        handle.abort();
    }

    // A pending stdin read would otherwise hold the runtime open.
    std::process::exit(0)
}
