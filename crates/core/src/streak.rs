use chrono::{Days, NaiveDate};
use std::collections::BTreeSet;

/// Consecutive-day run ending at the most recent learned day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub days: u32,
    pub last_date: Option<NaiveDate>,
}

/// Count the run of consecutive days ending at the latest date in `dates`.
///
/// Walks backward one day at a time from the maximum date and stops at the
/// first missing day, so the cost is bounded by the streak length.
///
/// ```
/// # use std::collections::BTreeSet;
/// # use chrono::NaiveDate;
/// # use learn_core::streak::compute_streak;
/// let dates: BTreeSet<_> = ["2024-01-01", "2024-01-03"]
///     .iter()
///     .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
///     .collect();
/// assert_eq!(compute_streak(&dates).days, 1);
/// ```
#[must_use]
pub fn compute_streak(dates: &BTreeSet<NaiveDate>) -> Streak {
    let Some(&last) = dates.last() else {
        return Streak::default();
    };

    let mut days = 0_u32;
    let mut cursor = Some(last);
    while let Some(day) = cursor {
        if !dates.contains(&day) {
            break;
        }
        days = days.saturating_add(1);
        cursor = day.checked_sub_days(Days::new(1));
    }

    Streak {
        days,
        last_date: Some(last),
    }
}
