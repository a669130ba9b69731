//! SQLite storage for board snapshots and token bindings.
//!
//! DESIGN
//! ======
//! The schema is two tiny tables: `board_data` holds exactly one row with
//! the raw byte grid, and `tokens` maps token strings to uids. All queries
//! are runtime-checked `sqlx::query` calls so the crate builds without a
//! live database.
//!
//! Storage is advisory: in-memory state stays authoritative, callers log
//! write failures and retry on the next cycle.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Legacy token database imported once at startup if present.
pub const LEGACY_DB_PATH: &str = "liucang.db";

/// Board row loaded from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBoard {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Open (creating if missing) the database and ensure the schema exists.
pub async fn init_pool(path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS board_data (
            id INTEGER PRIMARY KEY CHECK(id = 1),
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            pixels BLOB NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tokens (
            token TEXT PRIMARY KEY,
            uid INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// =============================================================================
// BOARD
// =============================================================================

/// Load the persisted board, if one was ever saved.
pub async fn load_board(pool: &SqlitePool) -> Result<Option<StoredBoard>, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64, i64, Vec<u8>)>(
        "SELECT width, height, pixels FROM board_data WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(width, height, pixels)| StoredBoard {
        width: width as u32,
        height: height as u32,
        pixels,
    }))
}

/// Upsert the single board row.
pub async fn save_board(
    pool: &SqlitePool,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO board_data (id, width, height, pixels) VALUES (1, ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
             width = excluded.width, height = excluded.height, pixels = excluded.pixels",
    )
    .bind(i64::from(width))
    .bind(i64::from(height))
    .bind(pixels)
    .execute(pool)
    .await?;
    Ok(())
}

// =============================================================================
// TOKENS
// =============================================================================

/// Load every stored token binding in storage order.
pub async fn load_tokens(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>("SELECT token, uid FROM tokens ORDER BY rowid")
        .fetch_all(pool)
        .await
}

/// Rotate the stored token for `uid`: delete prior rows and insert the new
/// one inside a single transaction.
pub async fn replace_token(pool: &SqlitePool, uid: u32, token: &str) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM tokens WHERE uid = ?1")
        .bind(i64::from(uid))
        .execute(tx.as_mut())
        .await?;
    sqlx::query("INSERT INTO tokens (token, uid) VALUES (?1, ?2)")
        .bind(token)
        .bind(i64::from(uid))
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Delete every token row for `uid`.
pub async fn delete_tokens_by_uid(pool: &SqlitePool, uid: u32) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM tokens WHERE uid = ?1")
        .bind(i64::from(uid))
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop all but the newest token row per uid. Returns rows removed.
pub async fn cleanup_duplicate_tokens(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM tokens WHERE rowid NOT IN (SELECT MAX(rowid) FROM tokens GROUP BY uid)",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// LEGACY IMPORT
// =============================================================================

/// Import tokens from the legacy database file if it exists, then collapse
/// duplicates. Returns the number of imported rows.
pub async fn import_legacy(pool: &SqlitePool, legacy_path: &str) -> Result<u64, sqlx::Error> {
    if !Path::new(legacy_path).exists() {
        return Ok(0);
    }

    let legacy = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(legacy_path).read_only(true))
        .await?;
    let rows = load_tokens(&legacy).await?;
    legacy.close().await;

    let imported = rows.len() as u64;
    let mut tx = pool.begin().await?;
    for (token, uid) in rows {
        sqlx::query("INSERT OR REPLACE INTO tokens (token, uid) VALUES (?1, ?2)")
            .bind(&token)
            .bind(uid)
            .execute(tx.as_mut())
            .await?;
    }
    tx.commit().await?;

    let removed = cleanup_duplicate_tokens(pool).await?;
    info!(imported, removed, path = legacy_path, "legacy token import complete");
    Ok(imported)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
