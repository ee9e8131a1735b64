use crate::model::stats::Statistics;

/// One-time badge unlocked when a statistics threshold is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Achievement {
    /// Ten content items learned in total.
    First10,
    /// Fifty content items learned in total.
    First50,
    /// A streak of at least seven consecutive days.
    WeekStreak,
    /// A quiz percentage of 80 or more.
    QuizMaster,
}

/// Rule set shared by every domain, in the order unlocks are reported.
pub const STANDARD_RULES: [Achievement; 4] = [
    Achievement::First10,
    Achievement::First50,
    Achievement::WeekStreak,
    Achievement::QuizMaster,
];

impl Achievement {
    /// Identifier persisted in `Statistics::achievements`.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Achievement::First10 => "first_10",
            Achievement::First50 => "first_50",
            Achievement::WeekStreak => "week_streak",
            Achievement::QuizMaster => "quiz_master",
        }
    }

    #[must_use]
    pub fn is_met(self, stats: &Statistics) -> bool {
        match self {
            Achievement::First10 => stats.total_learned >= 10,
            Achievement::First50 => stats.total_learned >= 50,
            Achievement::WeekStreak => stats.streak_days >= 7,
            Achievement::QuizMaster => stats.quiz_score >= 80,
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        STANDARD_RULES.into_iter().find(|a| a.id() == id)
    }
}
