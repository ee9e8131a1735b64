/// Externally reported quiz outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizResult {
    pub score: u32,
    pub total_questions: u32,
}

impl QuizResult {
    #[must_use]
    pub fn new(score: u32, total_questions: u32) -> Self {
        Self {
            score,
            total_questions,
        }
    }

    /// Whole-number percentage, truncated toward zero and clamped to 0..=100.
    ///
    /// A quiz without questions scores 0.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total_questions == 0 {
            return 0;
        }
        let pct = u64::from(self.score) * 100 / u64::from(self.total_questions);
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}
