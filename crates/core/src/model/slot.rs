use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Calendar date format used by date slots and stats payloads.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const LEGACY_STATS_KEY: &str = "__stats__";
const LEGACY_TERMS_PREFIX: &str = "__terms__";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SlotKeyError {
    #[error("invalid slot date: {0}")]
    InvalidDate(String),
    #[error("invalid term slot: {0}")]
    InvalidTermSlot(String),
    #[error("unknown slot kind: {0}")]
    UnknownKind(String),
}

/// Discriminator persisted alongside every progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKind {
    Date,
    Stats,
    Terms,
}

impl SlotKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::Date => "date",
            SlotKind::Stats => "stats",
            SlotKind::Terms => "terms",
        }
    }

    /// # Errors
    ///
    /// Returns `SlotKeyError::UnknownKind` for unrecognized discriminators.
    pub fn parse(s: &str) -> Result<Self, SlotKeyError> {
        match s {
            "date" => Ok(SlotKind::Date),
            "stats" => Ok(SlotKind::Stats),
            "terms" => Ok(SlotKind::Terms),
            other => Err(SlotKeyError::UnknownKind(other.to_owned())),
        }
    }
}

/// Key of a record within one subject's progress namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKey {
    /// Item indices learned on a calendar day.
    Date(NaiveDate),
    /// The aggregated statistics snapshot.
    Stats,
    /// Glossary terms learned for one content item of a day.
    Terms { date: NaiveDate, item: u32 },
}

impl SlotKey {
    #[must_use]
    pub fn kind(&self) -> SlotKind {
        match self {
            SlotKey::Date(_) => SlotKind::Date,
            SlotKey::Stats => SlotKind::Stats,
            SlotKey::Terms { .. } => SlotKind::Terms,
        }
    }

    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            SlotKey::Date(date) | SlotKey::Terms { date, .. } => Some(*date),
            SlotKey::Stats => None,
        }
    }

    #[must_use]
    pub fn item(&self) -> Option<u32> {
        match self {
            SlotKey::Terms { item, .. } => Some(*item),
            SlotKey::Date(_) | SlotKey::Stats => None,
        }
    }

    /// Rebuild a key from its persisted columns.
    ///
    /// # Errors
    ///
    /// Returns `SlotKeyError` when the columns do not describe a valid slot.
    pub fn from_parts(
        kind: SlotKind,
        date: Option<NaiveDate>,
        item: Option<u32>,
    ) -> Result<Self, SlotKeyError> {
        match (kind, date, item) {
            (SlotKind::Stats, _, _) => Ok(SlotKey::Stats),
            (SlotKind::Date, Some(date), _) => Ok(SlotKey::Date(date)),
            (SlotKind::Terms, Some(date), Some(item)) => Ok(SlotKey::Terms { date, item }),
            (SlotKind::Date, None, _) => Err(SlotKeyError::InvalidDate("missing".into())),
            (SlotKind::Terms, _, _) => Err(SlotKeyError::InvalidTermSlot(format!(
                "date={date:?} item={item:?}"
            ))),
        }
    }

    /// Historic single-string form: `YYYY-MM-DD`, `__stats__` or
    /// `__terms__{date}_{item}`.
    #[must_use]
    pub fn legacy_key(&self) -> String {
        match self {
            SlotKey::Date(date) => date.format(DATE_FORMAT).to_string(),
            SlotKey::Stats => LEGACY_STATS_KEY.to_owned(),
            SlotKey::Terms { date, item } => {
                format!("{LEGACY_TERMS_PREFIX}{}_{item}", date.format(DATE_FORMAT))
            }
        }
    }

    /// Parse the historic single-string form.
    ///
    /// # Errors
    ///
    /// Returns `SlotKeyError` if the string is neither a marker nor a date.
    pub fn parse_legacy(raw: &str) -> Result<Self, SlotKeyError> {
        if raw == LEGACY_STATS_KEY {
            return Ok(SlotKey::Stats);
        }
        if let Some(rest) = raw.strip_prefix(LEGACY_TERMS_PREFIX) {
            let (date, item) = rest
                .rsplit_once('_')
                .ok_or_else(|| SlotKeyError::InvalidTermSlot(raw.to_owned()))?;
            let date = parse_date(date)?;
            let item = item
                .parse::<u32>()
                .map_err(|_| SlotKeyError::InvalidTermSlot(raw.to_owned()))?;
            return Ok(SlotKey::Terms { date, item });
        }
        parse_date(raw).map(SlotKey::Date)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.legacy_key())
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
///
/// # Errors
///
/// Returns `SlotKeyError::InvalidDate` if the string is not a valid date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, SlotKeyError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| SlotKeyError::InvalidDate(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn legacy_keys_match_historic_markers() {
        assert_eq!(SlotKey::Date(d("2024-03-01")).legacy_key(), "2024-03-01");
        assert_eq!(SlotKey::Stats.legacy_key(), "__stats__");
        assert_eq!(
            SlotKey::Terms {
                date: d("2024-03-01"),
                item: 2
            }
            .legacy_key(),
            "__terms__2024-03-01_2"
        );
    }

    #[test]
    fn parses_legacy_forms() {
        assert_eq!(SlotKey::parse_legacy("__stats__").unwrap(), SlotKey::Stats);
        assert_eq!(
            SlotKey::parse_legacy("__terms__2024-01-05_11").unwrap(),
            SlotKey::Terms {
                date: d("2024-01-05"),
                item: 11
            }
        );
        assert_eq!(
            SlotKey::parse_legacy("2024-01-05").unwrap(),
            SlotKey::Date(d("2024-01-05"))
        );
    }

    #[test]
    fn rejects_malformed_legacy_keys() {
        assert!(SlotKey::parse_legacy("__terms__2024-01-05").is_err());
        assert!(SlotKey::parse_legacy("__terms__2024-01-05_x").is_err());
        assert!(SlotKey::parse_legacy("yesterday").is_err());
        assert!(SlotKey::parse_legacy("2024-02-30").is_err());
    }

    #[test]
    fn from_parts_requires_date_for_dated_kinds() {
        assert!(SlotKey::from_parts(SlotKind::Date, None, None).is_err());
        assert!(SlotKey::from_parts(SlotKind::Terms, Some(d("2024-01-01")), None).is_err());
        assert_eq!(
            SlotKey::from_parts(SlotKind::Stats, None, None).unwrap(),
            SlotKey::Stats
        );
    }
}
