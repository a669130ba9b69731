//! Board snapshot endpoints — raw gzip bytes and lossless WebP.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use flate2::write::GzEncoder;
use flate2::Compression;
use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;
use std::io::Write;
use tracing::error;

use crate::state::AppState;

/// `GET /api/paintboard/getboard` — the raw `W*H*3` grid, gzip-compressed.
pub async fn get_board(State(state): State<AppState>) -> Response {
    let pixels = state.core.lock().unwrap().board.snapshot().to_vec();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let body = match encoder.write_all(&pixels).and_then(|()| encoder.finish()) {
        Ok(gz) => gz,
        Err(e) => {
            error!(error = %e, "board gzip failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        body,
    )
        .into_response()
}

/// `GET /api/paintboard/getimage` — the grid as a lossless WebP.
pub async fn get_image(State(state): State<AppState>) -> Response {
    let (width, height, pixels) = {
        let core = state.core.lock().unwrap();
        (core.board.width(), core.board.height(), core.board.snapshot().to_vec())
    };

    let mut body = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut body);
    if let Err(e) = encoder.encode(&pixels, width, height, ExtendedColorType::Rgb8) {
        error!(error = %e, "webp encode failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([(header::CONTENT_TYPE, "image/webp")], body).into_response()
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
