use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{PgPool, Row};
use std::marker::PhantomData;
use tracing::{debug, instrument, warn};

use super::versioned::{CasOutcome, Versioned, VersionedRepository};
use crate::shared::AppError;

/// PostgreSQL implementation of VersionedRepository
///
/// Each record kind lives in its own table with the value stored as a JSON document:
/// `id TEXT PRIMARY KEY, version BIGINT NOT NULL, body TEXT NOT NULL`.
pub struct PostgresVersionedRepository<T> {
    pool: PgPool,
    table: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> PostgresVersionedRepository<T> {
    /// `table` must be a trusted identifier; it is interpolated into SQL.
    pub fn new(pool: PgPool, table: &'static str) -> Self {
        Self {
            pool,
            table,
            _record: PhantomData,
        }
    }

    /// Creates the backing table if it does not exist yet
    #[instrument(skip(self), fields(table = self.table))]
    pub async fn init(&self) -> Result<(), AppError> {
        let statement = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, version BIGINT NOT NULL, body TEXT NOT NULL)",
            self.table
        );
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create table");
                AppError::DatabaseError(e.to_string())
            })?;
        debug!("Table ready");
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| AppError::DatabaseError(e.to_string()))
}

fn decode<T: DeserializeOwned>(version: i64, body: &str) -> Result<Versioned<T>, AppError> {
    let value = serde_json::from_str(body).map_err(|e| AppError::DatabaseError(e.to_string()))?;
    Ok(Versioned {
        version: version as u64,
        value,
    })
}

#[async_trait]
impl<T> VersionedRepository<T> for PostgresVersionedRepository<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[instrument(skip(self, initial), fields(table = self.table))]
    async fn create_or_get(&self, key: &str, initial: T) -> Result<Versioned<T>, AppError> {
        let body = encode(&initial)?;
        let insert = format!(
            "INSERT INTO {} (id, version, body) VALUES ($1, 0, $2) ON CONFLICT (id) DO NOTHING",
            self.table
        );
        sqlx::query(&insert)
            .bind(key)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, key, "Failed to insert record");
                AppError::DatabaseError(e.to_string())
            })?;

        self.get(key)
            .await?
            .ok_or_else(|| AppError::DatabaseError(format!("{} vanished after insert", key)))
    }

    #[instrument(skip(self), fields(table = self.table))]
    async fn get(&self, key: &str) -> Result<Option<Versioned<T>>, AppError> {
        let select = format!("SELECT version, body FROM {} WHERE id = $1", self.table);
        let row = sqlx::query(&select)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, key, "Failed to fetch record");
                AppError::DatabaseError(e.to_string())
            })?;

        match row {
            Some(row) => {
                let version: i64 = row.get("version");
                let body: String = row.get("body");
                Ok(Some(decode(version, &body)?))
            }
            None => {
                debug!(key, "Record not found in database");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), fields(table = self.table))]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: T,
    ) -> Result<CasOutcome<T>, AppError> {
        let body = encode(&value)?;
        let update = format!(
            "UPDATE {} SET version = version + 1, body = $3 WHERE id = $1 AND version = $2",
            self.table
        );
        let result = sqlx::query(&update)
            .bind(key)
            .bind(expected_version as i64)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, key, "Failed to update record");
                AppError::DatabaseError(e.to_string())
            })?;

        if result.rows_affected() == 1 {
            return Ok(CasOutcome::Swapped(Versioned {
                version: expected_version + 1,
                value,
            }));
        }

        match self.get(key).await? {
            Some(_) => {
                debug!(key, expected_version, "Compare-and-swap rejected");
                Ok(CasOutcome::Conflict)
            }
            None => Err(AppError::NotFound(format!("{} not found", key))),
        }
    }
}
