//! Persistence service — periodic board auto-save.
//!
//! DESIGN
//! ======
//! A background task snapshots the byte grid under the core lock, then
//! performs the SQLite write with no locks held, so paints landing during
//! a save are never blocked on I/O.
//!
//! ERROR HANDLING
//! ==============
//! A failed save is logged and dropped; in-memory state is authoritative
//! and the next cycle retries with a fresh snapshot.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::db;
use crate::state::AppState;

/// Interval between automatic board saves.
pub const AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Snapshot the board and write it to storage. Returns false when storage
/// is disabled.
pub async fn save_board_snapshot(state: &AppState) -> Result<bool, sqlx::Error> {
    let Some(pool) = &state.pool else {
        return Ok(false);
    };

    let (width, height, pixels) = {
        let core = state.core.lock().unwrap();
        (core.board.width(), core.board.height(), core.board.snapshot().to_vec())
    };

    db::save_board(pool, width, height, &pixels).await?;
    info!(width, height, bytes = pixels.len(), "board saved");
    Ok(true)
}

/// Spawn the auto-save loop. No-op task when storage is disabled.
pub fn spawn_autosave_task(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        if state.pool.is_none() {
            return;
        }
        loop {
            tokio::time::sleep(AUTO_SAVE_INTERVAL).await;
            if let Err(e) = save_board_snapshot(&state).await {
                error!(error = %e, "auto-save failed; retrying next cycle");
            }
        }
    })
}

/// Final save on graceful shutdown.
pub async fn save_on_shutdown(state: &AppState) {
    match save_board_snapshot(state).await {
        Ok(true) => info!("final board save complete"),
        Ok(false) => {}
        Err(e) => error!(error = %e, "final board save failed"),
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
