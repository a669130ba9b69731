//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the HTTP surface and the websocket endpoint under a single Axum
//! router. An IP-ban middleware runs ahead of every route: banned clients
//! get 429 with a `Retry-After` header before any handler executes. CORS
//! is wide open; the board is a public surface.

pub mod admin;
pub mod auth;
pub mod board;
pub mod ws;

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The ban gate covers the HTTP surface only: a banned WS open is
    // accepted and closed with 1008 so the client sees a close code.
    let http = Router::new()
        .route("/api", get(banner))
        .route("/api/paintboard/getboard", get(board::get_board))
        .route("/api/paintboard/getimage", get(board::get_image))
        .route("/api/auth/gettoken", post(auth::get_token))
        .route("/api/root/banuid", post(admin::ban_uid))
        .route("/api/root/unbanuid", post(admin::unban_uid))
        .layer(middleware::from_fn_with_state(state.clone(), ban_gate));

    Router::new()
        .merge(http)
        .route("/api/paintboard/ws", get(ws::handle_ws))
        .layer(cors)
        .with_state(state)
}

async fn banner() -> &'static str {
    "paintboard backend — WS at /api/paintboard/ws"
}

/// Shed requests from banned IPs before they reach any handler.
async fn ban_gate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(secs) = state.ip_bans.retry_after_secs(addr.ip()) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, secs.to_string())],
            "ip temporarily banned",
        )
            .into_response();
    }
    next.run(req).await
}
