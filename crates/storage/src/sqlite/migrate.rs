use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies pending schema versions, each inside its own transaction.
///
/// Version 1 creates `progress_records`: one row per (domain, subject, slot),
/// where the slot is spread over a kind discriminator, a date column (`''` for
/// the stats marker) and an item column (`-1` unless the slot is a term slot).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        tracing::debug!(version = 1, "applying schema migration");
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress_records (
                    domain TEXT NOT NULL CHECK (domain IN ('general', 'finance')),
                    subject TEXT NOT NULL CHECK (length(subject) > 0),
                    slot_kind TEXT NOT NULL CHECK (slot_kind IN ('date', 'stats', 'terms')),
                    slot_date TEXT NOT NULL DEFAULT '',
                    item_index INTEGER NOT NULL DEFAULT -1,
                    learned_payload TEXT,
                    stats_payload TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (domain, subject, slot_kind, slot_date, item_index),
                    CHECK (slot_kind = 'stats' OR slot_date <> ''),
                    CHECK ((slot_kind = 'terms') = (item_index >= 0))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_progress_subject_kind_date
                    ON progress_records (domain, subject, slot_kind, slot_date);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
