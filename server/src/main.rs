#![allow(dead_code)]

mod board;
mod config;
mod db;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;

use tracing::{error, info, warn};

use crate::board::PixelStore;
use crate::config::Config;
use crate::state::{AppState, Core};

/// Main database file, created on first run when `useDB` is on.
const DB_PATH: &str = "paintboard.db";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = Config::from_file(&config_path).expect("config load failed");

    tracing_subscriber::fmt()
        .with_max_level(config.log_level.as_level_filter())
        .init();

    if config.key.is_some() {
        info!("TLS key/cert configured; termination is delegated to the fronting proxy");
    }

    let pool = if config.use_db {
        match db::init_pool(DB_PATH).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                error!(error = %e, "storage open failed; running in memory only");
                None
            }
        }
    } else {
        None
    };

    let core = build_core(&config, pool.as_ref()).await;
    let state = AppState::new(config, core, pool);

    let _ticker = services::ticker::spawn_tick_task(state.clone());
    let _autosave = services::persistence::spawn_autosave_task(state.clone());

    let app = routes::app(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    info!(
        port = state.config.port,
        width = state.config.width,
        height = state.config.height,
        ticks_per_second = state.config.ticks_per_second,
        "paintboard listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server failed");

    services::persistence::save_on_shutdown(&state).await;
    info!("shutdown complete");
}

/// Assemble paint state from storage: legacy import, token load, and the
/// board itself unless `clearBoard` asked for a blank start.
async fn build_core(config: &Config, pool: Option<&sqlx::SqlitePool>) -> Core {
    let mut core = Core::new(PixelStore::new(config.width, config.height));
    let Some(pool) = pool else {
        return core;
    };

    if let Err(e) = db::import_legacy(pool, db::LEGACY_DB_PATH).await {
        warn!(error = %e, "legacy token import failed");
    }

    match db::load_tokens(pool).await {
        Ok(rows) => {
            let bindings = rows.into_iter().filter_map(|(token, uid)| {
                let token = token.parse::<uuid::Uuid>().ok()?;
                let uid = u32::try_from(uid).ok()?;
                Some((token, uid))
            });
            let count = core.tokens.load_all(bindings);
            info!(count, "tokens loaded");
        }
        Err(e) => warn!(error = %e, "token load failed; starting with an empty registry"),
    }

    if config.clear_board {
        info!("clearBoard set; starting blank");
        return core;
    }

    match db::load_board(pool).await {
        Ok(Some(stored)) if stored.width == config.width && stored.height == config.height => {
            match PixelStore::from_saved(stored.width, stored.height, stored.pixels) {
                Ok(board) => {
                    info!(width = board.width(), height = board.height(), "board restored");
                    core.board = board;
                }
                Err(e) => warn!(error = %e, "stored board rejected; starting blank"),
            }
        }
        Ok(Some(stored)) => {
            warn!(
                stored_width = stored.width,
                stored_height = stored.height,
                width = config.width,
                height = config.height,
                "stored board dimensions differ; starting blank"
            );
        }
        Ok(None) => info!("no stored board; starting blank"),
        Err(e) => warn!(error = %e, "board load failed; starting blank"),
    }

    core
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
