// SQLite-backed store. Documents persist as JSON alongside a version column
// the versioned `put` compares against; sequences live in their own table so
// id allocation never scans data rows.

use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, Row, SqlitePool};
use tracing::info;

use crate::error::StoreError;
use crate::permit::Permit;
use crate::store::{PermitStore, WorkerStore};
use crate::worker::Worker;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect, creating the database file and running migrations if asked.
    pub async fn connect(database_url: &str, auto_migrate: bool) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(database_url)
            .await
            .map_err(unavailable)?
        {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url)
                .await
                .map_err(unavailable)?;
        }

        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(unavailable)?;

        if auto_migrate {
            info!("Running store migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Unavailable {
                    reason: e.to_string(),
                })?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn next_sequence(&self, name: &str) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sequences (name, value) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(name)
        .bind(crate::store::memory::SEQUENCE_FLOOR as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        let value: i64 = row.get("value");
        Ok(value as u64)
    }

    async fn get_doc<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, StoreError> {
        let query = format!("SELECT doc FROM {table} WHERE id = ?1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        let doc: String = row.get("doc");
        serde_json::from_str(&doc).map_err(|e| StoreError::Unavailable {
            reason: format!("corrupt document {id}: {e}"),
        })
    }

    async fn insert_doc(
        &self,
        table: &str,
        id: &str,
        version: u64,
        status: &str,
        doc: &str,
    ) -> Result<(), StoreError> {
        let query =
            format!("INSERT INTO {table} (id, version, status, doc) VALUES (?1, ?2, ?3, ?4)");
        match sqlx::query(&query)
            .bind(id)
            .bind(version as i64)
            .bind(status)
            .bind(doc)
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists { id: id.to_string() })
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn put_doc(
        &self,
        table: &str,
        id: &str,
        version: u64,
        expected_version: u64,
        status: &str,
        doc: &str,
    ) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {table} SET version = ?1, status = ?2, doc = ?3 WHERE id = ?4 AND version = ?5"
        );
        let result = sqlx::query(&query)
            .bind(version as i64)
            .bind(status)
            .bind(doc)
            .bind(id)
            .bind(expected_version as i64)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Distinguish a lost race from a missing record.
        let check = format!("SELECT version FROM {table} WHERE id = ?1");
        let row = sqlx::query(&check)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        match row {
            Some(row) => {
                let found: i64 = row.get("version");
                Err(StoreError::VersionConflict {
                    id: id.to_string(),
                    expected: expected_version,
                    found: found as u64,
                })
            }
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    async fn list_docs<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
    ) -> Result<Vec<T>, StoreError> {
        let query = format!("SELECT doc FROM {table}");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.into_iter()
            .map(|row| {
                let doc: String = row.get("doc");
                serde_json::from_str(&doc).map_err(|e| StoreError::Unavailable {
                    reason: format!("corrupt document in {table}: {e}"),
                })
            })
            .collect()
    }

    pub async fn shutdown(&self) {
        info!("Closing store connections...");
        self.pool.close().await;
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable {
        reason: err.to_string(),
    }
}

fn encode<T: serde::Serialize>(doc: &T) -> Result<String, StoreError> {
    serde_json::to_string(doc).map_err(|e| StoreError::Unavailable {
        reason: format!("encode failure: {e}"),
    })
}

#[async_trait]
impl PermitStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Permit, StoreError> {
        self.get_doc("permits", id).await
    }

    async fn insert(&self, permit: &Permit) -> Result<(), StoreError> {
        self.insert_doc(
            "permits",
            &permit.id,
            permit.version,
            &permit.status.to_string(),
            &encode(permit)?,
        )
        .await
    }

    async fn put(&self, permit: &Permit, expected_version: u64) -> Result<(), StoreError> {
        self.put_doc(
            "permits",
            &permit.id,
            permit.version,
            expected_version,
            &permit.status.to_string(),
            &encode(permit)?,
        )
        .await
    }

    async fn list(&self) -> Result<Vec<Permit>, StoreError> {
        self.list_docs("permits").await
    }

    async fn next_permit_number(&self) -> Result<u64, StoreError> {
        self.next_sequence("permits").await
    }
}

#[async_trait]
impl WorkerStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Worker, StoreError> {
        self.get_doc("workers", id).await
    }

    async fn insert(&self, worker: &Worker) -> Result<(), StoreError> {
        self.insert_doc(
            "workers",
            &worker.id,
            worker.version,
            &worker.status.to_string(),
            &encode(worker)?,
        )
        .await
    }

    async fn put(&self, worker: &Worker, expected_version: u64) -> Result<(), StoreError> {
        self.put_doc(
            "workers",
            &worker.id,
            worker.version,
            expected_version,
            &worker.status.to_string(),
            &encode(worker)?,
        )
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM workers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Worker>, StoreError> {
        self.list_docs("workers").await
    }

    async fn next_worker_number(&self) -> Result<u64, StoreError> {
        self.next_sequence("workers").await
    }
}
