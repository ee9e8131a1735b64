use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use learn_core::model::{Domain, SlotKey, SlotKind, SubjectId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of one `(domain, subject, slot)` row.
///
/// Payloads are opaque to storage; the services layer owns their encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub domain: Domain,
    pub subject: SubjectId,
    pub slot: SlotKey,
    pub learned_payload: Option<String>,
    pub stats_payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Selects which of a subject's slots to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFilter {
    /// Every plain date slot.
    Dates,
    /// Every term slot.
    Terms,
    /// Term slots belonging to one date.
    TermsOn(NaiveDate),
    /// The statistics marker.
    Stats,
}

impl SlotFilter {
    #[must_use]
    pub fn kind(self) -> SlotKind {
        match self {
            SlotFilter::Dates => SlotKind::Date,
            SlotFilter::Terms | SlotFilter::TermsOn(_) => SlotKind::Terms,
            SlotFilter::Stats => SlotKind::Stats,
        }
    }

    #[must_use]
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            SlotFilter::TermsOn(date) => Some(date),
            SlotFilter::Dates | SlotFilter::Terms | SlotFilter::Stats => None,
        }
    }

    #[must_use]
    pub fn matches(self, slot: &SlotKey) -> bool {
        slot.kind() == self.kind() && self.date().is_none_or(|date| slot.date() == Some(date))
    }
}

/// Repository contract for progress records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch a single slot.
    ///
    /// Returns `Ok(None)` when the slot has never been written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be read or decoded.
    async fn get_record(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// List a subject's slots matching `filter`, ordered by slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read or decoded.
    async fn list_records(
        &self,
        domain: Domain,
        subject: &SubjectId,
        filter: SlotFilter,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Insert or replace the learned payload of a date or term slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` for the stats slot, or other storage errors.
    async fn upsert_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Replace a learned payload only if the slot still holds `expected`.
    ///
    /// `expected == None` means the slot must not exist yet. Returns `false`
    /// when another writer got there first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` for the stats slot, or other storage errors.
    async fn swap_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        expected: Option<&str>,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Insert or replace the statistics snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn upsert_stats(
        &self,
        domain: Domain,
        subject: &SubjectId,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Remove every slot of a subject. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_subject(&self, domain: Domain, subject: &SubjectId)
    -> Result<u64, StorageError>;
}

type RecordKey = (Domain, SubjectId, SlotKey);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<BTreeMap<RecordKey, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        learned_payload: Option<&str>,
        stats_payload: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .entry((domain, subject.clone(), slot))
            .and_modify(|record| {
                record.learned_payload = learned_payload.map(str::to_owned);
                record.stats_payload = stats_payload.map(str::to_owned);
                record.updated_at = now;
            })
            .or_insert_with(|| ProgressRecord {
                domain,
                subject: subject.clone(),
                slot,
                learned_payload: learned_payload.map(str::to_owned),
                stats_payload: stats_payload.map(str::to_owned),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_record(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(domain, subject.clone(), slot)).cloned())
    }

    async fn list_records(
        &self,
        domain: Domain,
        subject: &SubjectId,
        filter: SlotFilter,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|r| r.domain == domain && &r.subject == subject && filter.matches(&r.slot))
            .cloned()
            .collect())
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
        self.upsert(domain, subject, slot, Some(payload), None, now)
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
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (domain, subject.clone(), slot);
        let current_matches = match (guard.get(&key), expected) {
            (None, None) => true,
            (Some(record), Some(expected)) => record.learned_payload.as_deref() == Some(expected),
            _ => false,
        };
        if !current_matches {
            return Ok(false);
        }
        guard
            .entry(key)
            .and_modify(|record| {
                record.learned_payload = Some(payload.to_owned());
                record.updated_at = now;
            })
            .or_insert_with(|| ProgressRecord {
                domain,
                subject: subject.clone(),
                slot,
                learned_payload: Some(payload.to_owned()),
                stats_payload: None,
                created_at: now,
                updated_at: now,
            });
        Ok(true)
    }

    async fn upsert_stats(
        &self,
        domain: Domain,
        subject: &SubjectId,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.upsert(domain, subject, SlotKey::Stats, None, Some(payload), now)
    }

    async fn delete_subject(
        &self,
        domain: Domain,
        subject: &SubjectId,
    ) -> Result<u64, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        guard.retain(|(d, s, _), _| !(*d == domain && s == subject));
        Ok((before - guard.len()) as u64)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}
