mod achievement;
mod domain;
mod ids;
mod payload;
mod quiz;
mod slot;
mod stats;

pub use achievement::{Achievement, STANDARD_RULES};
pub use domain::{Domain, UnknownDomain};
pub use ids::{ParseIdError, SubjectId};
pub use payload::{LearnedItems, LearnedSet, LearnedTerms, PayloadError};
pub use quiz::QuizResult;
pub use slot::{DATE_FORMAT, SlotKey, SlotKeyError, SlotKind, parse_date};
pub use stats::Statistics;
