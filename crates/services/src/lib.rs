#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progress;

pub use learn_core::Clock;

pub use app_services::ProgressServices;
pub use error::{ProgressError, ProgressServicesError};
pub use progress::{
    AchievementEvaluator, AchievementReport, CompositeProgress, DailyActivity, DayProgress,
    EventRecorder, LearnedAck, LearnedTermsEntry, ProgressQueries, ProgressService,
    QuizOutcome, QuizScoreRecorder, StatisticsAggregator, TodaySummary,
};
