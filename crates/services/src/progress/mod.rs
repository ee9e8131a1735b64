//! Learning progress: event recording, statistics aggregation, achievements
//! and read-only projections.

mod achievements;
mod aggregator;
mod codec;
mod queries;
mod quiz;
mod recorder;
mod service;
mod view;

pub use achievements::AchievementEvaluator;
pub use aggregator::StatisticsAggregator;
pub use queries::{MAX_ACTIVITY_DAYS, ProgressQueries, parse_date_filter};
pub use quiz::QuizScoreRecorder;
pub use recorder::EventRecorder;
pub use service::ProgressService;
pub use view::{
    AchievementReport, CompositeProgress, DailyActivity, DayProgress, LearnedAck,
    LearnedTermsEntry, QuizOutcome, TodaySummary,
};
