use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::domain::Domain;
use crate::model::payload::PayloadError;
use crate::streak::Streak;

/// Aggregated learning statistics for one subject.
///
/// Everything except `quiz_score` and `achievements` is derived from the
/// subject's date and term slots; those two are set from outside and carried
/// forward by every recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    #[serde(deserialize_with = "lenient::count")]
    pub total_learned: u32,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::count_opt"
    )]
    pub total_terms_learned: Option<u32>,
    #[serde(deserialize_with = "lenient::count")]
    pub streak_days: u32,
    #[serde(deserialize_with = "lenient::count")]
    pub max_streak: u32,
    #[serde(with = "date_opt")]
    pub last_learned_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::percent")]
    pub quiz_score: u8,
    #[serde(deserialize_with = "lenient::ids")]
    pub achievements: Vec<String>,
}

impl Statistics {
    /// Snapshot returned for a subject with no recorded statistics.
    #[must_use]
    pub fn empty(domain: Domain) -> Self {
        Self {
            total_terms_learned: domain.tracks_terms().then_some(0),
            ..Self::default()
        }
    }

    /// Decode a stored snapshot field by field.
    ///
    /// Out-of-range or mistyped numbers fall back to zero (the quiz score is
    /// clamped instead) and non-string achievement entries are dropped, so one
    /// bad field never discards the rest.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::Malformed` if `raw` is not a JSON object.
    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let mut stats: Self = serde_json::from_str(raw)?;
        stats.quiz_score = stats.quiz_score.min(100);
        let mut seen = Vec::with_capacity(stats.achievements.len());
        stats.achievements.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(id.clone());
                true
            }
        });
        Ok(stats)
    }

    /// # Errors
    ///
    /// Returns `PayloadError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Replace the derived fields with a fresh aggregate, keeping the
    /// externally supplied ones. `max_streak` only ever grows.
    #[must_use]
    pub fn recomputed(
        &self,
        total_learned: u32,
        total_terms_learned: Option<u32>,
        streak: Streak,
    ) -> Self {
        Self {
            total_learned,
            total_terms_learned,
            streak_days: streak.days,
            max_streak: self.max_streak.max(streak.days),
            last_learned_date: streak.last_date,
            quiz_score: self.quiz_score,
            achievements: self.achievements.clone(),
        }
    }

    #[must_use]
    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.iter().any(|a| a == id)
    }

    /// Appends `id` unless present. Returns `true` if it was added.
    pub fn unlock(&mut self, id: &str) -> bool {
        if self.has_achievement(id) {
            return false;
        }
        self.achievements.push(id.to_owned());
        true
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn as_count(value: &Value) -> Option<u32> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
            _ => None,
        }
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(as_count(&Value::deserialize(d)?).unwrap_or(0))
    }

    pub fn count_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(as_count(&Value::deserialize(d)?))
    }

    pub fn percent<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        let value = Value::deserialize(d)?;
        let pct = value.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0);
        Ok(pct.clamp(0.0, 100.0) as u8)
    }

    pub fn ids<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(value
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default())
    }
}

mod date_opt {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::model::slot::DATE_FORMAT;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => s.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    // Unparsable or mistyped dates decode as `None` rather than failing the snapshot.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = serde_json::Value::deserialize(d)?;
        Ok(raw
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok()))
    }
}
