// Framework bootstrap for the arena server runtime.

use crate::frameworks::config::ServerSettings;
use crate::interface_adapters::net::{connect_handler, stream_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{bots, broadcast, sessions};

use axum::{
    routing::{get, post},
    Router,
};
use engine::{runtime, ArenaMap, World};
use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Serves an already-bound listener. Integration tests call this directly
/// with an ephemeral port and shrunken settings.
pub async fn run(listener: tokio::net::TcpListener, settings: ServerSettings) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(settings).await;

    let app = Router::new()
        .route("/connect", post(connect_handler))
        .route("/stream", get(stream_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config(port: u16, settings: ServerSettings) -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, settings).await
}

async fn build_state(settings: ServerSettings) -> Arc<AppState> {
    // The authoritative world and its writer tasks.
    let (mut world, change_rx) = World::new(ArenaMap::default(), true);
    world.set_round_rules(settings.round_over_score, settings.round_wait);
    let handle = runtime::spawn_simulation(world);

    bots::deploy(&handle, settings.bots).await;

    // Fan engine changes out to whatever sessions exist at delivery time.
    let registry = Arc::new(sessions::SessionRegistry::new());
    tokio::spawn(broadcast::fan_out_changes(change_rx, registry.clone()));

    let state = Arc::new(AppState {
        sessions: registry,
        handle,
        settings,
    });
    tokio::spawn(sessions::supervise_idle(state.clone()));
    state
}
