//! Session Coordinator
//!
//! Admits peers into rooms, allocates a media session per admitted peer and
//! routes renegotiation to the media node that owns each session.
//!
//! # Servers
//!
//! - HTTP signaling API (default: 0.0.0.0:8443)
//! - HTTP health and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Seed the node table from configuration
//! 5. Spawn the message-bus client and its relay worker
//! 6. Build the resolver, peer registry and coordinator
//! 7. Start the health server, then the signaling API
//! 8. Wait for shutdown signal

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use common::types::NodeId;
use sc_service::cluster::{ClusterResolver, NodeInfo, NodeKind, NodeTable};
use sc_service::config::Config;
use sc_service::coordinator::{CoordinatorContext, SessionCoordinator};
use sc_service::observability::{health_router, init_metrics_recorder, HealthState};
use sc_service::registry::PeerRegistry;
use sc_service::routes::{build_routes, AppState};
use sc_service::rpc::{BusClient, BusConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to in-flight HTTP requests after the shutdown signal.
const DRAIN_PERIOD: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration is loaded before tracing so the log level can come from it;
    // a failure here is reported on stderr.
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    let json_logs = config.observability.json_logs;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .observability
                    .filter_directive("sc_service")
                    .into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting Session Coordinator");
    info!(
        node_id = %config.node_id,
        dc = %config.dc,
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        directory_nodes = config.directory_nodes.len(),
        media_nodes = config.media_nodes.len(),
        rpc_timeout_ms = config.rpc_timeout.as_millis(),
        relay_queue_capacity = config.relay_queue_capacity,
        peer_idle_timeout_seconds = config.peer_idle_timeout.as_secs(),
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    // Seed cluster membership
    let seeds = config
        .directory_nodes
        .iter()
        .map(|id| NodeInfo::new(id.clone(), NodeKind::Directory))
        .chain(
            config
                .media_nodes
                .iter()
                .map(|id| NodeInfo::new(id.clone(), NodeKind::Media)),
        )
        .chain(std::iter::once(NodeInfo::new(
            NodeId::from(config.node_id.as_str()),
            NodeKind::Coordinator,
        )));
    let node_table = Arc::new(NodeTable::from_nodes(seeds));
    info!(nodes = node_table.len().await, "Node table seeded");

    // Message bus client (sync RPCs + relay worker)
    let (bus, relay_task) = BusClient::spawn(
        BusConfig {
            url: config.bus_url.clone(),
            rpc_timeout: config.rpc_timeout,
            relay_queue_capacity: config.relay_queue_capacity,
        },
        shutdown_token.child_token(),
    )
    .map_err(|e| {
        error!(error = %e, "Failed to create bus client");
        e
    })?;
    info!("Bus client started");

    let resolver = Arc::new(ClusterResolver::new(
        Arc::clone(&node_table),
        Arc::new(bus),
    ));
    let registry = Arc::new(PeerRegistry::new());
    let coordinator = Arc::new(SessionCoordinator::new(
        CoordinatorContext::new(resolver, registry),
        config.peer_idle_timeout,
        shutdown_token.child_token(),
    ));

    // Health server (liveness, readiness, metrics). Must bind or startup fails.
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let health_app =
        health_router(Arc::clone(&health_state), Arc::clone(&node_table)).merge(metrics_router);

    // Bind listener BEFORE spawning to fail fast on bind errors
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // Signaling API
    let api_addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    let app = build_routes(Arc::new(AppState {
        coordinator: Arc::clone(&coordinator),
    }));

    let api_listener = tokio::net::TcpListener::bind(api_addr).await.map_err(|e| {
        error!(error = %e, addr = %api_addr, "Failed to bind signaling API");
        format!("Failed to bind signaling API to {api_addr}: {e}")
    })?;

    let api_shutdown_token = shutdown_token.child_token();
    let api_task = tokio::spawn(async move {
        info!(addr = %api_addr, "Signaling API starting");
        let server = axum::serve(api_listener, app).with_graceful_shutdown(async move {
            api_shutdown_token.cancelled().await;
            info!("Signaling API shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Signaling API failed");
        }
    });

    health_state.set_ready();
    info!("Session Coordinator running - press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so load balancers stop sending traffic
    health_state.set_not_ready();
    tokio::time::sleep(DRAIN_PERIOD).await;

    shutdown_token.cancel();
    coordinator.shutdown().await;

    for (name, task) in [("health", health_task), ("api", api_task), ("relay", relay_task)] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "Task ended abnormally");
        }
    }

    info!("Session Coordinator shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
