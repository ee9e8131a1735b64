use std::sync::Arc;

use learn_core::model::{Domain, Statistics, SubjectId};
use storage::repository::ProgressRepository;

use super::codec;
use super::view::AchievementReport;
use crate::Clock;
use crate::error::ProgressError;

/// Apply the domain's rules to `stats`, unlocking each at most once.
///
/// Returns the ids unlocked by this call in rule order.
pub(crate) fn unlock_met(domain: Domain, stats: &mut Statistics) -> Vec<String> {
    let mut unlocked = Vec::new();
    for rule in domain.achievement_rules() {
        if rule.is_met(stats) && stats.unlock(rule.id()) {
            unlocked.push(rule.id().to_owned());
        }
    }
    unlocked
}

/// Unlocks threshold achievements against the stored snapshot.
#[derive(Clone)]
pub struct AchievementEvaluator {
    domain: Domain,
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
}

impl AchievementEvaluator {
    #[must_use]
    pub fn new(domain: Domain, clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self {
            domain,
            clock,
            progress,
        }
    }

    /// Evaluate every rule against the current snapshot of `subject`.
    ///
    /// The snapshot is only written when something new unlocks.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the snapshot cannot be read or
    /// written.
    pub async fn evaluate(&self, subject: &SubjectId) -> Result<AchievementReport, ProgressError> {
        let progress = self.progress.as_ref();
        let mut stats = codec::load_stats_or_empty(progress, self.domain, subject).await?;
        let newly_unlocked = unlock_met(self.domain, &mut stats);

        if !newly_unlocked.is_empty() {
            codec::save_stats(progress, self.domain, subject, &stats, self.clock.now()).await?;
            tracing::info!(
                domain = %self.domain,
                %subject,
                unlocked = ?newly_unlocked,
                "achievements unlocked"
            );
        }

        Ok(AchievementReport {
            current: stats.achievements,
            newly_unlocked,
        })
    }
}
