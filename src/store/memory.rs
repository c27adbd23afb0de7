use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument};

use super::versioned::{CasOutcome, Versioned, VersionedRepository};
use crate::shared::AppError;

/// In-memory implementation of VersionedRepository for development and testing
///
/// Data is stored in memory and will be lost when the application restarts.
pub struct InMemoryVersionedRepository<T> {
    records: Mutex<HashMap<String, Versioned<T>>>,
}

impl<T> Default for InMemoryVersionedRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryVersionedRepository<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current number of records in the repository
    pub fn record_count(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Versioned<T>>>, AppError> {
        self.records
            .lock()
            .map_err(|_| AppError::DatabaseError("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl<T> VersionedRepository<T> for InMemoryVersionedRepository<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[instrument(skip(self, initial))]
    async fn create_or_get(&self, key: &str, initial: T) -> Result<Versioned<T>, AppError> {
        let mut records = self.lock()?;
        let record = records.entry(key.to_string()).or_insert_with(|| {
            debug!(key, "Creating record in memory");
            Versioned {
                version: 0,
                value: initial,
            }
        });
        Ok(record.clone())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Versioned<T>>, AppError> {
        let records = self.lock()?;
        let record = records.get(key).cloned();
        if record.is_none() {
            debug!(key, "Record not found in memory");
        }
        Ok(record)
    }

    #[instrument(skip(self, value))]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: T,
    ) -> Result<CasOutcome<T>, AppError> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(key)
            .ok_or_else(|| AppError::NotFound(format!("{} not found", key)))?;

        if record.version != expected_version {
            debug!(
                key,
                expected_version,
                actual_version = record.version,
                "Compare-and-swap rejected"
            );
            return Ok(CasOutcome::Conflict);
        }

        record.version += 1;
        record.value = value;
        Ok(CasOutcome::Swapped(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_or_get_returns_existing_record() {
        let repo = InMemoryVersionedRepository::new();

        let first = repo.create_or_get("a", "first".to_string()).await.unwrap();
        let second = repo.create_or_get("a", "second".to_string()).await.unwrap();

        assert_eq!(first.value, "first");
        assert_eq!(second.value, "first");
        assert_eq!(second.version, 0);
        assert_eq!(repo.record_count(), 1);
    }

    #[tokio::test]
    async fn get_nonexistent_record() {
        let repo = InMemoryVersionedRepository::<String>::new();
        assert!(repo.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compare_and_swap_bumps_version() {
        let repo = InMemoryVersionedRepository::new();
        repo.create_or_get("a", 1u32).await.unwrap();

        let outcome = repo.compare_and_swap("a", 0, 2).await.unwrap();
        match outcome {
            CasOutcome::Swapped(stored) => {
                assert_eq!(stored.version, 1);
                assert_eq!(stored.value, 2);
            }
            CasOutcome::Conflict => panic!("expected swap"),
        }
    }

    #[tokio::test]
    async fn stale_version_conflicts_and_keeps_value() {
        let repo = InMemoryVersionedRepository::new();
        repo.create_or_get("a", 1u32).await.unwrap();
        repo.compare_and_swap("a", 0, 2).await.unwrap();

        let outcome = repo.compare_and_swap("a", 0, 3).await.unwrap();
        assert!(matches!(outcome, CasOutcome::Conflict));

        let stored = repo.get("a").await.unwrap().unwrap();
        assert_eq!(stored.value, 2);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn compare_and_swap_on_missing_key_is_not_found() {
        let repo = InMemoryVersionedRepository::<u32>::new();
        let result = repo.compare_and_swap("ghost", 0, 1).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
