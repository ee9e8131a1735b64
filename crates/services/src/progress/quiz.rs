use std::sync::Arc;

use learn_core::model::{Domain, QuizResult, SubjectId};
use storage::repository::ProgressRepository;

use super::achievements::AchievementEvaluator;
use super::codec;
use super::view::QuizOutcome;
use crate::Clock;
use crate::error::ProgressError;

/// Stores externally reported quiz results in the statistics snapshot.
#[derive(Clone)]
pub struct QuizScoreRecorder {
    domain: Domain,
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    achievements: AchievementEvaluator,
}

impl QuizScoreRecorder {
    #[must_use]
    pub fn new(
        domain: Domain,
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        achievements: AchievementEvaluator,
    ) -> Self {
        Self {
            domain,
            clock,
            progress,
            achievements,
        }
    }

    /// Replace the stored quiz score with the percentage of `result`, then
    /// evaluate achievements.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the snapshot cannot be read or
    /// written.
    pub async fn record_quiz_result(
        &self,
        subject: &SubjectId,
        result: QuizResult,
    ) -> Result<QuizOutcome, ProgressError> {
        let progress = self.progress.as_ref();
        let mut stats = codec::load_stats_or_empty(progress, self.domain, subject).await?;
        stats.quiz_score = result.percentage();
        codec::save_stats(progress, self.domain, subject, &stats, self.clock.now()).await?;
        tracing::debug!(
            domain = %self.domain,
            %subject,
            score = result.score,
            total = result.total_questions,
            quiz_score = stats.quiz_score,
            "quiz result recorded"
        );

        let achievements = self.achievements.evaluate(subject).await?;
        Ok(QuizOutcome {
            quiz_score: stats.quiz_score,
            achievements,
        })
    }
}
