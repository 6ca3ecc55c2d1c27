//! Fleet Coordinator
//!
//! Runs the lease heartbeat and, while leader, the reconciliation sweep.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (JSON when `FC_LOG_JSON=true`)
//! 3. Initialize Prometheus metrics recorder
//! 4. Connect to Redis
//! 5. Build the meeting provider client
//! 6. Start health HTTP server (liveness, readiness, status, metrics)
//! 7. Start the coordinator
//! 8. Wait for shutdown signal, then stop the coordinator and release the lease

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use fleet_coordinator::config::Config;
use fleet_coordinator::coordinator::Coordinator;
use fleet_coordinator::lease::LeaseManager;
use fleet_coordinator::meetings::{HttpMeetingProvider, MeetingProvider};
use fleet_coordinator::observability::{health_router, init_metrics_recorder, HealthState};
use fleet_coordinator::reconciler::Reconciler;
use fleet_coordinator::store::{KvStore, RedisKvStore};
use secrecy::ExposeSecret;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config first: it decides the log format.
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fleet_coordinator=debug,tower_http=info".into());
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(
        server_id = %config.server_id,
        health_bind_address = %config.health_bind_address,
        lease_key = %config.lease_key,
        lease_ttl_ms = config.lease_ttl_ms,
        heartbeat_interval_ms = config.heartbeat_interval_ms,
        sweep_interval_ms = config.sweep_interval_ms,
        max_meeting_delete_attempts = config.max_meeting_delete_attempts,
        "Starting Fleet Coordinator"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());

    info!("Connecting to Redis...");
    let store: Arc<dyn KvStore> = Arc::new(
        RedisKvStore::new(config.redis_url.expose_secret(), &config.redis_store_config())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to connect to Redis");
                e
            })?,
    );
    info!("Redis connection established");

    let provider: Arc<dyn MeetingProvider> = Arc::new(
        HttpMeetingProvider::new(config.provider_config()).map_err(|e| {
            error!(error = %e, "Failed to build meeting provider client");
            e
        })?,
    );

    let lease = LeaseManager::new(
        Arc::clone(&store),
        config.server_id.clone(),
        config.lease_config(),
    );
    let reconciler = Reconciler::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        config.reconciler_config(),
    );
    let coordinator = Arc::new(Coordinator::new(
        lease,
        reconciler,
        config.coordinator_config(),
    ));

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

    let app = health_router(Arc::clone(&health_state), coordinator.clone())
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http());

    // Bind before spawning so a bad address fails startup.
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let shutdown_token = CancellationToken::new();
    let health_shutdown_token = shutdown_token.child_token();
    let health_server = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    coordinator.start();
    health_state.set_ready();

    info!("Fleet Coordinator running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    health_state.set_not_ready();

    coordinator.stop().await;

    shutdown_token.cancel();
    if let Err(e) = health_server.await {
        error!(error = %e, "Health server task failed");
    }

    info!("Fleet Coordinator shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
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
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
