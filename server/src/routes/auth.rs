//! Token issuance endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::services::issuer::{self, PasteClient};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetTokenBody {
    pub uid: u32,
    /// Paste id whose content must match the configured validation string.
    pub paste: String,
}

/// `POST /api/auth/gettoken`
pub async fn get_token(
    State(state): State<AppState>,
    body: Result<Json<GetTokenBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"statusCode": 400, "data": {"errorType": "BAD_REQUEST"}})),
        )
            .into_response();
    };

    let paste = PasteClient::new();
    match issuer::generate_token(&state, &paste, body.uid, &body.paste).await {
        Ok(token) => (
            StatusCode::OK,
            Json(json!({"statusCode": 200, "data": {"token": token}})),
        )
            .into_response(),
        Err(e) if e.is_rejection() => {
            warn!(uid = body.uid, error_type = e.error_type(), "token request rejected");
            (
                StatusCode::FORBIDDEN,
                Json(json!({"statusCode": 403, "data": {"errorType": e.error_type()}})),
            )
                .into_response()
        }
        Err(e) => {
            error!(uid = body.uid, error = %e, "token issuance failed upstream");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"statusCode": 500, "data": {"errorType": "SERVER_ERROR"}})),
            )
                .into_response()
        }
    }
}
