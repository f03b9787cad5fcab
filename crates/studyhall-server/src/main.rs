//! # Studyhall Server
//!
//! Main binary that orchestrates the real-time services:
//! - REST API (room catalog, admin maintenance, health)
//! - WebSocket chat relay (rooms, history, fan-out)
//! - WebSocket video signaling relay (peer mesh negotiation)
//!
//! All services run in a single process; each listens on its own port so
//! deployments can route or scale them independently later.

use std::net::SocketAddr;
use studyhall_api::AppState;
use studyhall_db::Database;
use studyhall_gateway::ChatState;
use studyhall_signal::SignalState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = studyhall_common::config::init()?;

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyhall=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .init();

    tracing::info!("🚀 Starting Studyhall v{}", env!("CARGO_PKG_VERSION"));

    // Connect to the database and run migrations
    let db = Database::connect(config).await?;
    db.migrate().await?;

    // === Chat relay ===
    let chat_state = ChatState::new(db.clone());
    let chat_registry = chat_state.registry.clone();
    let gateway_router = studyhall_gateway::build_router(chat_state);
    let gateway_addr = SocketAddr::new(config.server.host.parse()?, config.server.gateway_port);

    // === Video signaling relay ===
    let signal_state = SignalState::new();
    let signal_registry = signal_state.registry.clone();
    let signal_router = studyhall_signal::build_router(signal_state);
    let signal_addr = SocketAddr::new(config.server.host.parse()?, config.server.signal_port);

    // === REST API ===
    let api_router = studyhall_api::build_router(AppState {
        db,
        chat_registry,
        signal_registry,
    });
    let api_addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    tracing::info!("📡 REST API listening on http://{api_addr}");
    tracing::info!("🔌 Chat relay listening on ws://{gateway_addr}/gateway");
    tracing::info!("🎥 Signaling relay listening on ws://{signal_addr}/video");

    // Run all servers concurrently
    tokio::try_join!(
        async {
            let listener = tokio::net::TcpListener::bind(api_addr).await?;
            axum::serve(listener, api_router).await?;
            Ok::<_, anyhow::Error>(())
        },
        async {
            let listener = tokio::net::TcpListener::bind(gateway_addr).await?;
            axum::serve(listener, gateway_router).await?;
            Ok::<_, anyhow::Error>(())
        },
        async {
            let listener = tokio::net::TcpListener::bind(signal_addr).await?;
            axum::serve(listener, signal_router).await?;
            Ok::<_, anyhow::Error>(())
        },
    )?;

    Ok(())
}
