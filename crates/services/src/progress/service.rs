use std::sync::Arc;

use learn_core::model::{Domain, Statistics, SubjectId};
use storage::repository::ProgressRepository;

use super::achievements::AchievementEvaluator;
use super::aggregator::StatisticsAggregator;
use super::codec;
use super::quiz::QuizScoreRecorder;
use super::queries::ProgressQueries;
use super::recorder::EventRecorder;
use crate::Clock;
use crate::error::ProgressError;

/// Progress components for one learning domain, wired to one repository.
#[derive(Clone)]
pub struct ProgressService {
    domain: Domain,
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    recorder: EventRecorder,
    aggregator: StatisticsAggregator,
    achievements: AchievementEvaluator,
    quiz: QuizScoreRecorder,
    queries: ProgressQueries,
}

impl ProgressService {
    #[must_use]
    pub fn new(domain: Domain, clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        let aggregator = StatisticsAggregator::new(domain, clock, Arc::clone(&progress));
        let achievements = AchievementEvaluator::new(domain, clock, Arc::clone(&progress));
        let recorder = EventRecorder::new(domain, clock, Arc::clone(&progress), aggregator.clone());
        let quiz = QuizScoreRecorder::new(domain, clock, Arc::clone(&progress), achievements.clone());
        let queries = ProgressQueries::new(domain, clock, Arc::clone(&progress));
        Self {
            domain,
            clock,
            progress,
            recorder,
            aggregator,
            achievements,
            quiz,
            queries,
        }
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    #[must_use]
    pub fn aggregator(&self) -> &StatisticsAggregator {
        &self.aggregator
    }

    #[must_use]
    pub fn achievements(&self) -> &AchievementEvaluator {
        &self.achievements
    }

    #[must_use]
    pub fn quiz(&self) -> &QuizScoreRecorder {
        &self.quiz
    }

    #[must_use]
    pub fn queries(&self) -> &ProgressQueries {
        &self.queries
    }

    /// Store an externally supplied snapshot.
    ///
    /// Achievements are merged with the stored ones and `max_streak` never
    /// drops below the stored value or the supplied streak.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the snapshot cannot be read or
    /// written.
    pub async fn replace_stats(
        &self,
        subject: &SubjectId,
        mut stats: Statistics,
    ) -> Result<Statistics, ProgressError> {
        let progress = self.progress.as_ref();
        if let Some(stored) = codec::load_stats(progress, self.domain, subject).await? {
            for id in &stored.achievements {
                stats.unlock(id);
            }
            stats.max_streak = stats.max_streak.max(stored.max_streak);
        }
        stats.max_streak = stats.max_streak.max(stats.streak_days);
        stats.quiz_score = stats.quiz_score.min(100);

        codec::save_stats(progress, self.domain, subject, &stats, self.clock.now()).await?;
        tracing::debug!(domain = %self.domain, %subject, "statistics replaced");
        self.queries.get_stats(subject).await
    }

    /// Remove every slot of `subject` in this domain.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the delete fails.
    pub async fn reset_subject(&self, subject: &SubjectId) -> Result<u64, ProgressError> {
        let removed = self.progress.delete_subject(self.domain, subject).await?;
        tracing::info!(domain = %self.domain, %subject, removed, "progress reset");
        Ok(removed)
    }
}
