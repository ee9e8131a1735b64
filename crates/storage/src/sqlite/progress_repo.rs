use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{Domain, SlotKey, SubjectId};

use super::SqliteRepository;
use super::mapping::{date_to_column, map_progress_row, slot_columns};
use crate::repository::{ProgressRecord, ProgressRepository, SlotFilter, StorageError};

const SELECT_COLUMNS: &str = r"
    SELECT
        domain, subject, slot_kind, slot_date, item_index,
        learned_payload, stats_payload, created_at, updated_at
    FROM progress_records
";

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl SqliteRepository {
    async fn upsert_row(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        learned_payload: Option<&str>,
        stats_payload: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let (kind, date, item) = slot_columns(&slot);

        sqlx::query(
            r"
                INSERT INTO progress_records (
                    domain, subject, slot_kind, slot_date, item_index,
                    learned_payload, stats_payload, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                ON CONFLICT(domain, subject, slot_kind, slot_date, item_index) DO UPDATE SET
                    learned_payload = excluded.learned_payload,
                    stats_payload = excluded.stats_payload,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(domain.as_str())
        .bind(subject.as_str())
        .bind(kind)
        .bind(date)
        .bind(item)
        .bind(learned_payload)
        .bind(stats_payload)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_record(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let (kind, date, item) = slot_columns(&slot);
        let sql = format!(
            "{SELECT_COLUMNS} WHERE domain = ?1 AND subject = ?2 AND slot_kind = ?3 \
             AND slot_date = ?4 AND item_index = ?5"
        );

        let row = sqlx::query(&sql)
            .bind(domain.as_str())
            .bind(subject.as_str())
            .bind(kind)
            .bind(date)
            .bind(item)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_records(
        &self,
        domain: Domain,
        subject: &SubjectId,
        filter: SlotFilter,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE domain = ?1 AND subject = ?2 AND slot_kind = ?3");
        if filter.date().is_some() {
            sql.push_str(" AND slot_date = ?4");
        }
        sql.push_str(" ORDER BY slot_date ASC, item_index ASC");

        let mut query = sqlx::query(&sql)
            .bind(domain.as_str())
            .bind(subject.as_str())
            .bind(filter.kind().as_str());
        if let Some(date) = filter.date() {
            query = query.bind(date_to_column(Some(date)));
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if slot == SlotKey::Stats {
            return Err(StorageError::Conflict);
        }
        self.upsert_row(domain, subject, slot, Some(payload), None, now)
            .await
    }

    async fn swap_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        expected: Option<&str>,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        if slot == SlotKey::Stats {
            return Err(StorageError::Conflict);
        }
        let (kind, date, item) = slot_columns(&slot);

        let res = match expected {
            None => sqlx::query(
                r"
                    INSERT INTO progress_records (
                        domain, subject, slot_kind, slot_date, item_index,
                        learned_payload, stats_payload, created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)
                    ON CONFLICT(domain, subject, slot_kind, slot_date, item_index) DO NOTHING
                ",
            )
            .bind(domain.as_str())
            .bind(subject.as_str())
            .bind(kind)
            .bind(date)
            .bind(item)
            .bind(payload)
            .bind(now)
            .execute(&self.pool)
            .await,
            Some(expected) => sqlx::query(
                r"
                    UPDATE progress_records
                    SET learned_payload = ?6, updated_at = ?7
                    WHERE domain = ?1 AND subject = ?2 AND slot_kind = ?3
                      AND slot_date = ?4 AND item_index = ?5
                      AND learned_payload = ?8
                ",
            )
            .bind(domain.as_str())
            .bind(subject.as_str())
            .bind(kind)
            .bind(date)
            .bind(item)
            .bind(payload)
            .bind(now)
            .bind(expected)
            .execute(&self.pool)
            .await,
        }
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn upsert_stats(
        &self,
        domain: Domain,
        subject: &SubjectId,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.upsert_row(domain, subject, SlotKey::Stats, None, Some(payload), now)
            .await
    }

    async fn delete_subject(
        &self,
        domain: Domain,
        subject: &SubjectId,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM progress_records WHERE domain = ?1 AND subject = ?2")
            .bind(domain.as_str())
            .bind(subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }
}
