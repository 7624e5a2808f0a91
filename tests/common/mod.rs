use coral_wallet::database::DbPool;
use sqlx::sqlite::SqlitePoolOptions;

/// Fresh in-memory database with the full schema applied. A single
/// connection keeps every query on the same memory store.
pub async fn pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

/// Signed sum of the transaction log for one user and kind.
pub async fn log_sum(pool: &DbPool, user_id: i64, kind: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ? AND kind = ?",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_one(pool)
    .await
    .expect("log sum")
}

/// Number of log entries for one user.
pub async fn record_count(pool: &DbPool, user_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("record count")
}
