use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use learn_core::model::Statistics;

/// Acknowledgement of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LearnedAck {
    /// `false` when the value was already recorded for that slot.
    pub added: bool,
}

/// Items learned on one day plus the glossary terms learned per item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayProgress {
    pub items: Vec<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub terms: BTreeMap<u32, Vec<String>>,
}

/// Per-date progress merged with the statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeProgress {
    pub days: BTreeMap<NaiveDate, DayProgress>,
    pub stats: Statistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub items_learned: u32,
    pub terms_learned: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub learned_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnedTermsEntry {
    pub date: NaiveDate,
    pub item: u32,
    pub terms: Vec<String>,
}

/// Result of one achievement evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AchievementReport {
    pub current: Vec<String>,
    pub newly_unlocked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
    pub quiz_score: u8,
    pub achievements: AchievementReport,
}
