use super::*;

async fn temp_pool(dir: &tempfile::TempDir, name: &str) -> SqlitePool {
    let path = dir.path().join(name);
    init_pool(path.to_str().unwrap()).await.expect("pool should open")
}

#[tokio::test]
async fn empty_database_has_no_board() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "board.db").await;

    assert_eq!(load_board(&pool).await.unwrap(), None);
}

#[tokio::test]
async fn board_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "board.db").await;

    let pixels: Vec<u8> = (0..24).collect();
    save_board(&pool, 4, 2, &pixels).await.unwrap();

    let stored = load_board(&pool).await.unwrap().unwrap();
    assert_eq!(stored, StoredBoard { width: 4, height: 2, pixels });
}

#[tokio::test]
async fn save_board_overwrites_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "board.db").await;

    save_board(&pool, 4, 2, &[0u8; 24]).await.unwrap();
    save_board(&pool, 4, 2, &[9u8; 24]).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM board_data")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(load_board(&pool).await.unwrap().unwrap().pixels, vec![9u8; 24]);
}

#[tokio::test]
async fn replace_token_leaves_one_row_per_uid() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "tokens.db").await;

    replace_token(&pool, 42, "token-a").await.unwrap();
    replace_token(&pool, 42, "token-b").await.unwrap();
    replace_token(&pool, 7, "token-c").await.unwrap();

    let mut rows = load_tokens(&pool).await.unwrap();
    rows.sort();
    assert_eq!(
        rows,
        vec![("token-b".to_string(), 42), ("token-c".to_string(), 7)]
    );
}

#[tokio::test]
async fn delete_tokens_by_uid_removes_only_that_uid() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "tokens.db").await;

    replace_token(&pool, 42, "token-a").await.unwrap();
    replace_token(&pool, 7, "token-b").await.unwrap();

    delete_tokens_by_uid(&pool, 42).await.unwrap();
    assert_eq!(load_tokens(&pool).await.unwrap(), vec![("token-b".to_string(), 7)]);
}

#[tokio::test]
async fn cleanup_keeps_newest_row_per_uid() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "tokens.db").await;

    // Simulate an older deployment that stacked duplicates.
    for token in ["stale-1", "stale-2", "current"] {
        sqlx::query("INSERT INTO tokens (token, uid) VALUES (?1, 42)")
            .bind(token)
            .execute(&pool)
            .await
            .unwrap();
    }

    let removed = cleanup_duplicate_tokens(&pool).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(load_tokens(&pool).await.unwrap(), vec![("current".to_string(), 42)]);
}

#[tokio::test]
async fn legacy_import_copies_rows_then_deduplicates() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "main.db").await;

    // Build a legacy file with a duplicate uid.
    let legacy_path = dir.path().join("liucang.db");
    let legacy = init_pool(legacy_path.to_str().unwrap()).await.unwrap();
    for (token, uid) in [("old-a", 42), ("old-b", 42), ("old-c", 7)] {
        sqlx::query("INSERT INTO tokens (token, uid) VALUES (?1, ?2)")
            .bind(token)
            .bind(uid)
            .execute(&legacy)
            .await
            .unwrap();
    }
    legacy.close().await;

    let imported = import_legacy(&pool, legacy_path.to_str().unwrap()).await.unwrap();
    assert_eq!(imported, 3);

    let mut rows = load_tokens(&pool).await.unwrap();
    rows.sort();
    assert_eq!(
        rows,
        vec![("old-b".to_string(), 42), ("old-c".to_string(), 7)]
    );
}

#[tokio::test]
async fn legacy_import_without_file_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let pool = temp_pool(&dir, "main.db").await;

    let missing = dir.path().join("liucang.db");
    assert_eq!(import_legacy(&pool, missing.to_str().unwrap()).await.unwrap(), 0);
}
