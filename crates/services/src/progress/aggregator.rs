use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;

use learn_core::model::{Domain, LearnedTerms, SubjectId};
use learn_core::streak::{Streak, compute_streak};
use storage::repository::{ProgressRecord, ProgressRepository, SlotFilter};

use super::codec;
use crate::Clock;
use crate::error::ProgressError;

/// Derived totals for one subject before they are merged into a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub total_learned: u32,
    pub total_terms_learned: Option<u32>,
    pub streak: Streak,
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Sum learned items per date slot and collect the dates that yielded any.
///
/// Malformed payloads contribute nothing and keep their date out of the
/// streak.
pub(crate) fn tally(date_records: &[ProgressRecord], term_records: Option<&[ProgressRecord]>) -> Tally {
    let mut total_learned = 0_u32;
    let mut learned_dates: BTreeSet<NaiveDate> = BTreeSet::new();

    for record in date_records {
        let Some(items) = codec::decode_learned::<u32>(record) else {
            continue;
        };
        if items.is_empty() {
            continue;
        }
        total_learned = total_learned.saturating_add(count(items.len()));
        if let Some(date) = record.slot.date() {
            learned_dates.insert(date);
        }
    }

    let total_terms_learned = term_records.map(|records| {
        records
            .iter()
            .filter_map(codec::decode_learned::<String>)
            .map(|terms: LearnedTerms| count(terms.len()))
            .fold(0_u32, u32::saturating_add)
    });

    Tally {
        total_learned,
        total_terms_learned,
        streak: compute_streak(&learned_dates),
    }
}

/// Rebuilds a subject's statistics snapshot from its date and term slots.
#[derive(Clone)]
pub struct StatisticsAggregator {
    domain: Domain,
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
}

impl StatisticsAggregator {
    #[must_use]
    pub fn new(domain: Domain, clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self {
            domain,
            clock,
            progress,
        }
    }

    /// Recompute and store the full snapshot for `subject`.
    ///
    /// Totals, streak and last learned date are derived from scratch; the
    /// quiz score and achievements are carried over from the stored
    /// snapshot, and `max_streak` never decreases. Callers re-query to
    /// observe the result.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if rows cannot be read or the snapshot
    /// cannot be written.
    pub async fn recompute(&self, subject: &SubjectId) -> Result<(), ProgressError> {
        let progress = self.progress.as_ref();
        let date_records = progress
            .list_records(self.domain, subject, SlotFilter::Dates)
            .await?;
        let term_records = if self.domain.tracks_terms() {
            Some(
                progress
                    .list_records(self.domain, subject, SlotFilter::Terms)
                    .await?,
            )
        } else {
            None
        };

        let tally = tally(&date_records, term_records.as_deref());
        let previous = codec::load_stats_or_empty(progress, self.domain, subject).await?;
        let next = previous.recomputed(tally.total_learned, tally.total_terms_learned, tally.streak);

        codec::save_stats(progress, self.domain, subject, &next, self.clock.now()).await?;

        tracing::debug!(
            domain = %self.domain,
            %subject,
            total_learned = next.total_learned,
            streak_days = next.streak_days,
            max_streak = next.max_streak,
            "statistics recomputed"
        );
        Ok(())
    }
}
