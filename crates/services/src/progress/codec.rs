//! Tolerant reads of stored payloads plus the stats snapshot read/write path
//! shared by the aggregator, the evaluator and the quiz recorder.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use learn_core::model::{Domain, LearnedSet, SlotKey, Statistics, SubjectId};
use storage::repository::{ProgressRecord, ProgressRepository, StorageError};

use crate::error::ProgressError;

/// Decode a record's learned payload.
///
/// Returns `None` when the record carries no payload or the payload is
/// malformed; the latter is logged and otherwise ignored.
pub(crate) fn decode_learned<T>(record: &ProgressRecord) -> Option<LearnedSet<T>>
where
    T: PartialEq + Serialize + DeserializeOwned,
{
    let raw = record.learned_payload.as_deref()?;
    match LearnedSet::decode(raw) {
        Ok(set) => Some(set),
        Err(err) => {
            tracing::warn!(
                domain = %record.domain,
                subject = %record.subject,
                slot = %record.slot,
                error = %err,
                "skipping malformed learned payload"
            );
            None
        }
    }
}

fn normalize(mut stats: Statistics, domain: Domain) -> Statistics {
    stats.total_terms_learned = if domain.tracks_terms() {
        Some(stats.total_terms_learned.unwrap_or(0))
    } else {
        None
    };
    stats
}

/// Load the stored snapshot, treating a missing or malformed one as absent.
pub(crate) async fn load_stats(
    progress: &dyn ProgressRepository,
    domain: Domain,
    subject: &SubjectId,
) -> Result<Option<Statistics>, StorageError> {
    let Some(record) = progress.get_record(domain, subject, SlotKey::Stats).await? else {
        return Ok(None);
    };
    let Some(raw) = record.stats_payload.as_deref() else {
        return Ok(None);
    };
    match Statistics::decode(raw) {
        Ok(stats) => Ok(Some(normalize(stats, domain))),
        Err(err) => {
            tracing::warn!(%domain, %subject, error = %err, "ignoring malformed stats payload");
            Ok(None)
        }
    }
}

pub(crate) async fn load_stats_or_empty(
    progress: &dyn ProgressRepository,
    domain: Domain,
    subject: &SubjectId,
) -> Result<Statistics, StorageError> {
    Ok(load_stats(progress, domain, subject)
        .await?
        .unwrap_or_else(|| Statistics::empty(domain)))
}

pub(crate) async fn save_stats(
    progress: &dyn ProgressRepository,
    domain: Domain,
    subject: &SubjectId,
    stats: &Statistics,
    now: DateTime<Utc>,
) -> Result<(), ProgressError> {
    let payload = normalize(stats.clone(), domain).encode()?;
    progress.upsert_stats(domain, subject, &payload, now).await?;
    Ok(())
}
