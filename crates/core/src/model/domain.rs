use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::achievement::{Achievement, STANDARD_RULES};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown learning domain: {0}")]
pub struct UnknownDomain(pub String);

/// Learning track a subject's progress belongs to.
///
/// Both tracks share the same slot conventions and streak rules; the finance
/// track additionally records glossary terms learned per content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Daily AI-news content, keyed by session token.
    General,
    /// Financial-literacy content, keyed by user id.
    Finance,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::General, Domain::Finance];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::General => "general",
            Domain::Finance => "finance",
        }
    }

    /// Whether term slots exist and `total_terms_learned` is maintained.
    #[must_use]
    pub fn tracks_terms(self) -> bool {
        matches!(self, Domain::Finance)
    }

    /// Threshold rules checked by the achievement evaluator, in unlock order.
    #[must_use]
    pub fn achievement_rules(self) -> &'static [Achievement] {
        match self {
            Domain::General | Domain::Finance => &STANDARD_RULES,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "ai" => Ok(Domain::General),
            "finance" | "financial" => Ok(Domain::Finance),
            _ => Err(UnknownDomain(s.to_owned())),
        }
    }
}
