use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use learn_core::model::{Domain, LearnedSet, SlotKey, SubjectId};
use storage::repository::{ProgressRepository, StorageError};

use super::aggregator::StatisticsAggregator;
use super::codec;
use crate::Clock;
use crate::error::ProgressError;
use crate::progress::view::LearnedAck;

/// Attempts at a slot's compare-and-swap before giving up with a conflict.
const MAX_SLOT_ATTEMPTS: u32 = 8;

/// Records learning events and keeps the statistics snapshot current.
#[derive(Clone)]
pub struct EventRecorder {
    domain: Domain,
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    aggregator: StatisticsAggregator,
}

impl EventRecorder {
    #[must_use]
    pub fn new(
        domain: Domain,
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        aggregator: StatisticsAggregator,
    ) -> Self {
        Self {
            domain,
            clock,
            progress,
            aggregator,
        }
    }

    /// Mark `item` as learned on `date` and recompute statistics.
    ///
    /// Recording the same item twice leaves the payload unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the slot or the snapshot cannot be
    /// written, including `StorageError::Conflict` when concurrent writers
    /// keep changing the slot. A failed recompute leaves the slot change in
    /// place.
    pub async fn record_item_learned(
        &self,
        subject: &SubjectId,
        date: NaiveDate,
        item: u32,
    ) -> Result<LearnedAck, ProgressError> {
        let added = self.add_to_slot(subject, SlotKey::Date(date), item).await?;
        tracing::debug!(domain = %self.domain, %subject, %date, item, added, "item learned");
        self.aggregator.recompute(subject).await?;
        Ok(LearnedAck { added })
    }

    /// Mark glossary `term` of `item` as learned on `date` and recompute
    /// statistics.
    ///
    /// Blank terms are not stored, but the recompute still runs.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::TermsNotTracked` for domains without glossary
    /// terms, or `ProgressError::Storage` if persistence fails.
    pub async fn record_term_learned(
        &self,
        subject: &SubjectId,
        date: NaiveDate,
        item: u32,
        term: &str,
    ) -> Result<LearnedAck, ProgressError> {
        if !self.domain.tracks_terms() {
            return Err(ProgressError::TermsNotTracked(self.domain));
        }

        let term = term.trim();
        let added = if term.is_empty() {
            false
        } else {
            self.add_to_slot(subject, SlotKey::Terms { date, item }, term.to_owned())
                .await?
        };
        tracing::debug!(domain = %self.domain, %subject, %date, item, term, added, "term learned");
        self.aggregator.recompute(subject).await?;
        Ok(LearnedAck { added })
    }

    async fn add_to_slot<T>(
        &self,
        subject: &SubjectId,
        slot: SlotKey,
        value: T,
    ) -> Result<bool, ProgressError>
    where
        T: Clone + PartialEq + Serialize + DeserializeOwned,
    {
        for attempt in 1..=MAX_SLOT_ATTEMPTS {
            let existing = self.progress.get_record(self.domain, subject, slot).await?;
            let expected = existing.as_ref().and_then(|r| r.learned_payload.as_deref());
            // A malformed payload decodes as empty, so the first insert rewrites it.
            let mut set: LearnedSet<T> = existing
                .as_ref()
                .and_then(codec::decode_learned)
                .unwrap_or_default();
            if !set.insert(value.clone()) {
                return Ok(false);
            }

            let payload = set.encode()?;
            let swapped = self
                .progress
                .swap_learned(
                    self.domain,
                    subject,
                    slot,
                    expected,
                    &payload,
                    self.clock.now(),
                )
                .await?;
            if swapped {
                return Ok(true);
            }
            tracing::debug!(
                domain = %self.domain,
                %subject,
                %slot,
                attempt,
                "slot changed concurrently, retrying"
            );
        }
        Err(StorageError::Conflict.into())
    }
}
