use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Insertion-ordered set persisted as a JSON array.
///
/// Stored arrays are read permissively: duplicates left behind by older
/// writers are dropped on decode, keeping first occurrence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedSet<T> {
    entries: Vec<T>,
}

/// Item indices learned on one date.
pub type LearnedItems = LearnedSet<u32>;

/// Glossary term names learned for one content item.
pub type LearnedTerms = LearnedSet<String>;

impl<T> Default for LearnedSet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: PartialEq> LearnedSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` unless already present. Returns `true` if it was added.
    pub fn insert(&mut self, value: T) -> bool {
        if self.entries.contains(&value) {
            return false;
        }
        self.entries.push(value);
        true
    }

    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.entries.contains(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

impl<T: PartialEq + Serialize + DeserializeOwned> LearnedSet<T> {
    /// # Errors
    ///
    /// Returns `PayloadError::Malformed` if `raw` is not a JSON array of `T`.
    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let values: Vec<T> = serde_json::from_str(raw)?;
        Ok(values.into_iter().collect())
    }

    /// # Errors
    ///
    /// Returns `PayloadError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}

impl<T: PartialEq> FromIterator<T> for LearnedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}
