// src/main.rs
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use hyper::{header, Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use health_checker::{
    cli::{self, Cli},
    config,
    health::{HealthChecker, HealthService, Singleflight},
    metrics::MetricsRegistry,
    probe::{Executors, ProbeSpec},
    server::{RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() {
    if std::env::args_os().len() <= 1 {
        if let Err(err) = Cli::command().print_help() {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        if cli::is_debug_mode() {
            eprintln!("Error: {:?}", err);
        } else {
            eprintln!("Error: {:#}", err);
            eprintln!(
                "Note: To enable debug mode, set {} to \"true\"",
                cli::DEBUG_ENV_VAR
            );
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let base = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Some(config::load_config(path).await?)
        }
        None => None,
    };
    let config = cli.into_config(base)?;
    let probes = config.probe_specs()?;

    for probe in probes.iter() {
        match probe {
            ProbeSpec::Tcp { address } => info!("Check TCP port: {}", address),
            ProbeSpec::Script { .. } => info!("Check script: {}", probe.identifier()),
            ProbeSpec::Http { url, .. } => info!("Check HTTP endpoint: {}", url),
        }
    }

    let metrics = if config.metrics.enabled {
        let registry = MetricsRegistry::new()?;
        let collector = registry.collector();
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, registry, config.metrics.path.clone())?;
        Some(collector)
    } else {
        None
    };

    let executors = Executors::new(&config.timeouts).context("Failed to build HTTP client")?;
    let checker = HealthChecker::new(probes, executors, metrics.clone());
    let service = Arc::new(HealthService::new(
        checker,
        Singleflight::new(config.singleflight),
        config.detailed_status,
        metrics,
    ));
    let handler = RequestHandler::new(service, config.timeouts.http_write());

    info!("Listening on {}...", config.listener);
    ServerBuilder::new(config.listener)
        .with_handler(handler)
        .with_read_timeout(config.timeouts.http_read())
        .with_idle_timeout(config.timeouts.http_idle())
        .serve_with_shutdown(shutdown_signal())
        .await
}

fn start_metrics_server(addr: SocketAddr, registry: MetricsRegistry, path: String) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    let resp = if req.uri().path() == path.as_str() {
                        let mut resp = Response::new(Body::from(registry.gather()));
                        resp.headers_mut().insert(
                            header::CONTENT_TYPE,
                            header::HeaderValue::from_static("text/plain; version=0.0.4"),
                        );
                        resp
                    } else {
                        let mut resp = Response::new(Body::from("Not Found"));
                        *resp.status_mut() = StatusCode::NOT_FOUND;
                        resp
                    };
                    Ok::<_, Infallible>(resp)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics listener {}", addr))?
        .serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "Failed to install Ctrl+C handler");
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
                error!(%err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
