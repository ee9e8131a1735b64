use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;

use learn_core::model::{Domain, SlotKey, Statistics, SubjectId, parse_date};
use storage::repository::{ProgressRecord, ProgressRepository, SlotFilter};

use super::codec;
use super::view::{CompositeProgress, DailyActivity, DayProgress, LearnedTermsEntry, TodaySummary};
use crate::Clock;
use crate::error::ProgressError;

/// Longest window `daily_activity` will report.
pub const MAX_ACTIVITY_DAYS: u32 = 366;

/// Interpret an optional date filter.
///
/// `None`, blank and `all` mean unfiltered; an unparsable value is logged and
/// also treated as unfiltered.
#[must_use]
pub fn parse_date_filter(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return None;
    }
    match parse_date(raw) {
        Ok(date) => Some(date),
        Err(err) => {
            tracing::warn!(filter = raw, error = %err, "ignoring unparsable date filter");
            None
        }
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn term_entries(records: &[ProgressRecord]) -> Vec<LearnedTermsEntry> {
    records
        .iter()
        .filter_map(|record| {
            let SlotKey::Terms { date, item } = record.slot else {
                return None;
            };
            let terms = codec::decode_learned::<String>(record)?;
            Some(LearnedTermsEntry {
                date,
                item,
                terms: terms.into_vec(),
            })
        })
        .collect()
}

/// Read-only projections over a subject's progress.
///
/// Absent data reads as empty and malformed slots are skipped.
#[derive(Clone)]
pub struct ProgressQueries {
    domain: Domain,
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressQueries {
    #[must_use]
    pub fn new(domain: Domain, clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self {
            domain,
            clock,
            progress,
        }
    }

    /// Learned item indices per date.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if rows cannot be read.
    pub async fn get_progress(
        &self,
        subject: &SubjectId,
    ) -> Result<BTreeMap<NaiveDate, Vec<u32>>, ProgressError> {
        let records = self
            .progress
            .list_records(self.domain, subject, SlotFilter::Dates)
            .await?;
        Ok(records
            .iter()
            .filter_map(|record| {
                let date = record.slot.date()?;
                let items = codec::decode_learned::<u32>(record)?;
                Some((date, items.into_vec()))
            })
            .collect())
    }

    /// `get_progress` narrowed by a tolerant date filter.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if rows cannot be read.
    pub async fn progress_on(
        &self,
        subject: &SubjectId,
        date_filter: Option<&str>,
    ) -> Result<BTreeMap<NaiveDate, Vec<u32>>, ProgressError> {
        let mut progress = self.get_progress(subject).await?;
        if let Some(only) = parse_date_filter(date_filter) {
            progress.retain(|date, _| *date == only);
        }
        Ok(progress)
    }

    /// Stored statistics, or the empty snapshot when none exist yet.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the snapshot cannot be read.
    pub async fn get_stats(&self, subject: &SubjectId) -> Result<Statistics, ProgressError> {
        Ok(codec::load_stats_or_empty(self.progress.as_ref(), self.domain, subject).await?)
    }

    /// Per-date items and terms together with the statistics snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if rows cannot be read.
    pub async fn composite_view(
        &self,
        subject: &SubjectId,
        date_filter: Option<&str>,
    ) -> Result<CompositeProgress, ProgressError> {
        let only = parse_date_filter(date_filter);
        let keep = |date: NaiveDate| only.is_none_or(|d| d == date);

        let mut days: BTreeMap<NaiveDate, DayProgress> = BTreeMap::new();
        for (date, items) in self.get_progress(subject).await? {
            if keep(date) {
                days.entry(date).or_default().items = items;
            }
        }

        if self.domain.tracks_terms() {
            let filter = only.map_or(SlotFilter::Terms, SlotFilter::TermsOn);
            let records = self
                .progress
                .list_records(self.domain, subject, filter)
                .await?;
            for entry in term_entries(&records) {
                days.entry(entry.date)
                    .or_default()
                    .terms
                    .insert(entry.item, entry.terms);
            }
        }

        let stats = self.get_stats(subject).await?;
        Ok(CompositeProgress { days, stats })
    }

    /// Learned glossary terms, most recent date first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::TermsNotTracked` for domains without terms, or
    /// `ProgressError::Storage` if rows cannot be read.
    pub async fn learned_terms(
        &self,
        subject: &SubjectId,
        date_filter: Option<&str>,
    ) -> Result<Vec<LearnedTermsEntry>, ProgressError> {
        if !self.domain.tracks_terms() {
            return Err(ProgressError::TermsNotTracked(self.domain));
        }
        let filter = parse_date_filter(date_filter).map_or(SlotFilter::Terms, SlotFilter::TermsOn);
        let records = self
            .progress
            .list_records(self.domain, subject, filter)
            .await?;
        let mut entries = term_entries(&records);
        entries.sort_by(|a, b| b.date.cmp(&a.date).then(a.item.cmp(&b.item)));
        Ok(entries)
    }

    /// Items and terms learned on the current day.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if rows cannot be read.
    pub async fn today_summary(&self, subject: &SubjectId) -> Result<TodaySummary, ProgressError> {
        let today = self.clock.today();
        let items_learned = self
            .progress
            .get_record(self.domain, subject, SlotKey::Date(today))
            .await?
            .as_ref()
            .and_then(codec::decode_learned::<u32>)
            .map_or(0, |items| count(items.len()));

        let terms_learned = if self.domain.tracks_terms() {
            let records = self
                .progress
                .list_records(self.domain, subject, SlotFilter::TermsOn(today))
                .await?;
            term_entries(&records)
                .iter()
                .map(|entry| count(entry.terms.len()))
                .fold(0_u32, u32::saturating_add)
        } else {
            0
        };

        Ok(TodaySummary {
            date: today,
            items_learned,
            terms_learned,
        })
    }

    /// Learned-item counts for the trailing `days` days ending today, oldest
    /// first. Days without records report zero.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if rows cannot be read.
    pub async fn daily_activity(
        &self,
        subject: &SubjectId,
        days: u32,
    ) -> Result<Vec<DailyActivity>, ProgressError> {
        let days = days.min(MAX_ACTIVITY_DAYS);
        let progress = self.get_progress(subject).await?;
        let today = self.clock.today();

        let activity = (0..days)
            .rev()
            .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
            .map(|date| DailyActivity {
                date,
                learned_count: progress.get(&date).map_or(0, |items| count(items.len())),
            })
            .collect();
        Ok(activity)
    }
}
