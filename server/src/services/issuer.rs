//! Token issuer — paste-proof validation and token rotation.
//!
//! DESIGN
//! ======
//! A user proves control of a uid by publishing the configured validation
//! string on the external paste service. The HTTP fetch is isolated in
//! [`PasteClient`]; [`check_paste`] is a pure function over the response so
//! the whole decision table is unit-testable without a live upstream.
//!
//! ERROR HANDLING
//! ==============
//! Rejections (wrong uid, wrong content, missing paste, uid cap) map to
//! stable `errorType` strings for the API. Transport and malformed-response
//! failures collapse into [`IssueError::Upstream`], which surfaces as a
//! generic 500. Storage write failures are logged and swallowed: the
//! in-memory registry stays authoritative.

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::state::AppState;

/// Paste service queried during token issuance.
pub const DEFAULT_PASTE_BASE: &str = "https://www.luogu.com.cn/paste";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IssueError {
    #[error("uid exceeds the allowed maximum")]
    UidNotAllowed,
    #[error("paste not found")]
    PasteNotFound,
    #[error("paste belongs to a different uid")]
    UidMismatch,
    #[error("paste content does not match the validation string")]
    ContentMismatch,
    #[error("paste service failure: {0}")]
    Upstream(String),
}

impl IssueError {
    /// Stable error code carried in the API response body.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UidNotAllowed => "UID_NOT_ALLOWED",
            Self::PasteNotFound => "PASTE_NOT_FOUND",
            Self::UidMismatch => "UID_MISMATCH",
            Self::ContentMismatch => "CONTENT_MISMATCH",
            Self::Upstream(_) => "SERVER_ERROR",
        }
    }

    /// True for a client-side rejection (HTTP 403), false for upstream
    /// trouble (HTTP 500).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Upstream(_))
    }
}

// =============================================================================
// PASTE VALIDATION
// =============================================================================

#[derive(Debug, Deserialize)]
struct PasteEnvelope {
    code: i64,
    #[serde(default)]
    paste: Option<PasteBody>,
}

#[derive(Debug, Deserialize)]
struct PasteBody {
    #[serde(default)]
    data: String,
    user: PasteUser,
}

#[derive(Debug, Deserialize)]
struct PasteUser {
    uid: u32,
}

/// Decide whether a paste response proves ownership of `uid`.
pub fn check_paste(status: u16, body: &str, uid: u32, expected: &str) -> Result<(), IssueError> {
    if status == 404 {
        return Err(IssueError::PasteNotFound);
    }
    if status != 200 {
        return Err(IssueError::Upstream(format!("paste service returned {status}")));
    }

    let envelope: PasteEnvelope = serde_json::from_str(body)
        .map_err(|e| IssueError::Upstream(format!("malformed paste response: {e}")))?;
    if envelope.code != 200 {
        return Err(IssueError::Upstream(format!("paste service code {}", envelope.code)));
    }
    let Some(paste) = envelope.paste else {
        return Err(IssueError::Upstream("paste response missing body".to_string()));
    };

    if paste.user.uid != uid {
        return Err(IssueError::UidMismatch);
    }
    if paste.data.trim() != expected {
        return Err(IssueError::ContentMismatch);
    }
    Ok(())
}

/// Thin transport wrapper around the paste service.
pub struct PasteClient {
    base: String,
    http: reqwest::Client,
}

impl PasteClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base(DEFAULT_PASTE_BASE)
    }

    #[must_use]
    pub fn with_base(base: impl Into<String>) -> Self {
        Self { base: base.into(), http: reqwest::Client::new() }
    }

    /// Fetch a paste, returning the HTTP status and raw body.
    pub async fn fetch(&self, paste_id: &str) -> Result<(u16, String), IssueError> {
        let url = format!("{}/{paste_id}", self.base);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| IssueError::Upstream(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| IssueError::Upstream(e.to_string()))?;
        Ok((status, body))
    }
}

impl Default for PasteClient {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ISSUANCE
// =============================================================================

/// Validate the paste proof and rotate the token for `uid`.
///
/// # Errors
///
/// Returns an [`IssueError`] describing the rejection or upstream failure.
pub async fn generate_token(
    state: &AppState,
    paste: &PasteClient,
    uid: u32,
    paste_id: &str,
) -> Result<String, IssueError> {
    if let Some(max) = state.config.max_allowed_uid {
        if uid > max {
            return Err(IssueError::UidNotAllowed);
        }
    }

    let (status, body) = paste.fetch(paste_id).await?;
    check_paste(status, &body, uid, &state.config.validation_paste)?;

    // One rotation at a time: the registry write and the storage
    // delete+insert happen inside the same critical section.
    let _gate = state.issue_gate.lock().await;
    let token: Uuid = state.core.lock().unwrap().tokens.issue(uid);
    let token_string = token.hyphenated().to_string();

    if let Some(pool) = &state.pool {
        if let Err(e) = db::replace_token(pool, uid, &token_string).await {
            warn!(error = %e, uid, "token persist failed; registry remains authoritative");
        }
    }

    info!(uid, "token issued");
    Ok(token_string)
}

#[cfg(test)]
#[path = "issuer_test.rs"]
mod tests;
