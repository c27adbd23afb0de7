use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::shared::AppError;

/// A stored value together with its optimistic-concurrency version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Result of a compare-and-swap attempt
#[derive(Debug, Clone)]
pub enum CasOutcome<T> {
    /// The write was applied, returns the stored record with its new version
    Swapped(Versioned<T>),
    /// Another writer got there first; the caller must re-read
    Conflict,
}

/// Trait for versioned record storage
#[async_trait]
pub trait VersionedRepository<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Returns the record stored under `key`, inserting `initial` at version 0 if absent
    async fn create_or_get(&self, key: &str, initial: T) -> Result<Versioned<T>, AppError>;

    async fn get(&self, key: &str) -> Result<Option<Versioned<T>>, AppError>;

    /// Replaces the record only if its version still equals `expected_version`.
    /// Fails with `NotFound` when the key was never created.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: T,
    ) -> Result<CasOutcome<T>, AppError>;
}

const BASE_BACKOFF_MS: u64 = 2;
const MAX_JITTER_MS: u64 = 3;

/// Read-modify-write loop over a versioned record.
///
/// With a `seed` the record is created on first use, otherwise an absent key is
/// `NotFound`. An error from `mutate` aborts without writing. After `max_attempts`
/// lost races the update surfaces as `ConcurrencyConflict`.
pub async fn update_with_retry<T, R, F>(
    repo: &dyn VersionedRepository<T>,
    key: &str,
    seed: Option<&T>,
    max_attempts: u32,
    mut mutate: F,
) -> Result<(Versioned<T>, R), AppError>
where
    T: Clone + Send + Sync + 'static,
    R: Send,
    F: FnMut(&mut T) -> Result<R, AppError> + Send,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 0..max_attempts {
        let current = match seed {
            Some(initial) => repo.create_or_get(key, initial.clone()).await?,
            None => repo
                .get(key)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{} not found", key)))?,
        };

        let mut next = current.value.clone();
        let output = mutate(&mut next)?;

        match repo.compare_and_swap(key, current.version, next).await? {
            CasOutcome::Swapped(stored) => {
                if attempt > 0 {
                    debug!(key, attempt = attempt + 1, "Versioned update succeeded after retry");
                }
                return Ok((stored, output));
            }
            CasOutcome::Conflict => {
                warn!(
                    key,
                    attempt = attempt + 1,
                    expected_version = current.version,
                    "Version conflict, re-reading record"
                );

                // Exponential backoff with jitter so racing writers spread out
                let jitter = rand::rng().random_range(0..=MAX_JITTER_MS);
                let delay = BASE_BACKOFF_MS * 2_u64.pow(attempt.min(6)) + jitter;
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }

    Err(AppError::ConcurrencyConflict(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryVersionedRepository;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Repository whose CAS always loses, for exercising the retry bound
    struct AlwaysConflicting {
        inner: InMemoryVersionedRepository<u32>,
        cas_calls: AtomicU32,
    }

    #[async_trait]
    impl VersionedRepository<u32> for AlwaysConflicting {
        async fn create_or_get(&self, key: &str, initial: u32) -> Result<Versioned<u32>, AppError> {
            self.inner.create_or_get(key, initial).await
        }

        async fn get(&self, key: &str) -> Result<Option<Versioned<u32>>, AppError> {
            self.inner.get(key).await
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected_version: u64,
            _value: u32,
        ) -> Result<CasOutcome<u32>, AppError> {
            self.cas_calls.fetch_add(1, Ordering::SeqCst);
            Ok(CasOutcome::Conflict)
        }
    }

    #[tokio::test]
    async fn seeded_update_creates_then_mutates() {
        let repo = InMemoryVersionedRepository::<u32>::new();

        let (stored, previous) = update_with_retry(&repo, "counter", Some(&0), 3, |value| {
            let previous = *value;
            *value += 5;
            Ok(previous)
        })
        .await
        .unwrap();

        assert_eq!(previous, 0);
        assert_eq!(stored.value, 5);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn unseeded_update_of_missing_key_is_not_found() {
        let repo = InMemoryVersionedRepository::<u32>::new();

        let result = update_with_retry(&repo, "missing", None, 3, |value| {
            *value += 1;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mutate_error_leaves_record_untouched() {
        let repo = InMemoryVersionedRepository::<u32>::new();
        repo.create_or_get("k", 10).await.unwrap();

        let result: Result<(Versioned<u32>, ()), AppError> =
            update_with_retry(&repo, "k", None, 3, |value| {
                *value = 99;
                Err(AppError::InvalidState("closed".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
        let stored = repo.get("k").await.unwrap().unwrap();
        assert_eq!(stored.value, 10);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_conflict() {
        let repo = AlwaysConflicting {
            inner: InMemoryVersionedRepository::new(),
            cas_calls: AtomicU32::new(0),
        };

        let result = update_with_retry(&repo, "hot", Some(&0), 4, |value| {
            *value += 1;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(AppError::ConcurrencyConflict(key)) if key == "hot"));
        assert_eq!(repo.cas_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_without_locks_do_not_lose_increments() {
        let repo = std::sync::Arc::new(InMemoryVersionedRepository::<u32>::new());

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    update_with_retry(repo.as_ref(), "shared", Some(&0), 64, |value| {
                        *value += 1;
                        Ok(())
                    })
                    .await
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let stored = repo.get("shared").await.unwrap().unwrap();
        assert_eq!(stored.value, 20);
    }
}
