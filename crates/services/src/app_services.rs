use std::sync::Arc;

use learn_core::model::Domain;
use storage::repository::Storage;

use crate::Clock;
use crate::error::ProgressServicesError;
use crate::progress::ProgressService;

/// Assembles one progress service per learning domain over shared storage.
#[derive(Clone)]
pub struct ProgressServices {
    general: Arc<ProgressService>,
    finance: Arc<ProgressService>,
}

impl ProgressServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, ProgressServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        tracing::debug!(db_url, "progress storage ready");
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over a fresh in-memory repository.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        Self {
            general: Arc::new(ProgressService::new(
                Domain::General,
                clock,
                Arc::clone(&storage.progress),
            )),
            finance: Arc::new(ProgressService::new(
                Domain::Finance,
                clock,
                Arc::clone(&storage.progress),
            )),
        }
    }

    #[must_use]
    pub fn general(&self) -> Arc<ProgressService> {
        Arc::clone(&self.general)
    }

    #[must_use]
    pub fn finance(&self) -> Arc<ProgressService> {
        Arc::clone(&self.finance)
    }

    #[must_use]
    pub fn for_domain(&self, domain: Domain) -> Arc<ProgressService> {
        match domain {
            Domain::General => self.general(),
            Domain::Finance => self.finance(),
        }
    }
}
