//! Admin endpoints — uid ban management.
//!
//! Guarded by the configured `banToken`; when it is unset these endpoints
//! always answer 401.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::db;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminBody {
    pub token: String,
    pub uid: u32,
}

fn authorized(state: &AppState, token: &str) -> bool {
    state
        .config
        .ban_token
        .as_deref()
        .is_some_and(|expected| expected == token)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"statusCode": 401, "data": {"errorType": "UNAUTHORIZED"}})),
    )
        .into_response()
}

/// `POST /api/root/banuid` — deny the uid and revoke its token.
pub async fn ban_uid(State(state): State<AppState>, Json(body): Json<AdminBody>) -> Response {
    if !authorized(&state, &body.token) {
        return unauthorized();
    }

    {
        let mut core = state.core.lock().unwrap();
        core.uid_bans.insert(body.uid);
        core.tokens.revoke_by_uid(body.uid);
    }
    if let Some(pool) = &state.pool {
        if let Err(e) = db::delete_tokens_by_uid(pool, body.uid).await {
            warn!(error = %e, uid = body.uid, "stored token delete failed");
        }
    }

    info!(uid = body.uid, "uid banned");
    Json(json!({"statusCode": 200})).into_response()
}

/// `POST /api/root/unbanuid` — lift a uid ban.
pub async fn unban_uid(State(state): State<AppState>, Json(body): Json<AdminBody>) -> Response {
    if !authorized(&state, &body.token) {
        return unauthorized();
    }

    state.core.lock().unwrap().uid_bans.remove(&body.uid);
    info!(uid = body.uid, "uid unbanned");
    Json(json!({"statusCode": 200})).into_response()
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
