//! SQLite-backed prediction ledger.
//!
//! `rusqlite` is synchronous, so every operation opens its connection and
//! runs inside [`tokio::task::spawn_blocking`], keeping the async workers
//! free while SQLite does I/O. Each append is a single implicit
//! transaction; SQLite provides per-statement atomicity. A busy timeout on
//! every connection absorbs transient file-lock contention between
//! concurrent operations instead of surfacing `SQLITE_BUSY`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tokio::task;
use tracing::debug;

use crate::model::FeatureVector;

use super::{PredictionLedger, PredictionRecord, StorageError};

/// How long a connection waits on a locked database file before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable prediction store on a SQLite database file.
#[derive(Clone)]
pub struct SqliteLedger {
    db_path: PathBuf,
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

impl SqliteLedger {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// predictions table exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = path.as_ref().to_path_buf();
        let setup_path = db_path.clone();

        task::spawn_blocking(move || {
            let conn = open_connection(&setup_path)?;
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS predictions (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    sepal_length    REAL NOT NULL,
                    sepal_width     REAL NOT NULL,
                    petal_length    REAL NOT NULL,
                    petal_width     REAL NOT NULL,
                    predicted_class INTEGER NOT NULL,
                    created_at      TEXT NOT NULL
                );
                "#,
                [],
            )?;
            Ok::<_, StorageError>(())
        })
        .await??;

        debug!(path = %db_path.display(), "prediction ledger ready");
        Ok(Self { db_path })
    }
}

#[async_trait]
impl PredictionLedger for SqliteLedger {
    async fn append(
        &self,
        features: &FeatureVector,
        predicted_class: i64,
    ) -> Result<i64, StorageError> {
        let path = self.db_path.clone();
        let features = *features;
        // Capture time here, not client-supplied.
        let created_at = Utc::now().to_rfc3339();

        let id = task::spawn_blocking(move || {
            let conn = open_connection(&path)?;
            conn.execute(
                r#"
                INSERT INTO predictions
                    (sepal_length, sepal_width, petal_length, petal_width, predicted_class, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    features.sepal_length,
                    features.sepal_width,
                    features.petal_length,
                    features.petal_width,
                    predicted_class,
                    created_at,
                ],
            )?;
            Ok::<_, StorageError>(conn.last_insert_rowid())
        })
        .await??;

        debug!(id, predicted_class, "prediction persisted");
        Ok(id)
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<PredictionRecord>, StorageError> {
        let path = self.db_path.clone();

        let records = task::spawn_blocking(move || {
            let conn = open_connection(&path)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, sepal_length, sepal_width, petal_length, petal_width,
                       predicted_class, created_at
                FROM predictions
                ORDER BY id DESC
                LIMIT ?1 OFFSET ?2
                "#,
            )?;

            let rows = stmt.query_map(params![limit, offset], |row| {
                let created_raw: String = row.get(6)?;
                let created_at = DateTime::parse_from_rfc3339(&created_raw)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            6,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc);

                Ok(PredictionRecord {
                    id: row.get(0)?,
                    sepal_length: row.get(1)?,
                    sepal_width: row.get(2)?,
                    petal_length: row.get(3)?,
                    petal_width: row.get(4)?,
                    predicted_class: row.get(5)?,
                    created_at,
                })
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok::<_, StorageError>(records)
        })
        .await??;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch_ledger() -> (tempfile::TempDir, SqliteLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::open(dir.path().join("predictions.db"))
            .await
            .unwrap();
        (dir, ledger)
    }

    fn vector(petal_length: f64) -> FeatureVector {
        FeatureVector::new(5.1, 3.5, petal_length, 0.2)
    }

    #[tokio::test]
    async fn append_assigns_monotonic_ids() {
        let (_dir, ledger) = scratch_ledger().await;

        let first = ledger.append(&vector(1.0), 0).await.unwrap();
        let second = ledger.append(&vector(2.0), 0).await.unwrap();
        let third = ledger.append(&vector(3.0), 1).await.unwrap();

        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let (_dir, ledger) = scratch_ledger().await;
        for i in 1..=3 {
            ledger.append(&vector(i as f64), i).await.unwrap();
        }

        let records = ledger.list(10, 0).await.unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn list_applies_limit_and_offset() {
        let (_dir, ledger) = scratch_ledger().await;
        for i in 1..=3 {
            ledger.append(&vector(i as f64), i).await.unwrap();
        }

        let page = ledger.list(2, 0).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2]);

        let next = ledger.list(2, 2).await.unwrap();
        let ids: Vec<i64> = next.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn record_round_trips_fields_and_timestamp() {
        let (_dir, ledger) = scratch_ledger().await;
        let features = FeatureVector::new(6.3, 2.9, 5.6, 1.8);

        let before = Utc::now();
        let id = ledger.append(&features, 2).await.unwrap();
        let after = Utc::now();

        let records = ledger.list(1, 0).await.unwrap();
        let record = &records[0];

        assert_eq!(record.id, id);
        assert_eq!(record.sepal_length, 6.3);
        assert_eq!(record.sepal_width, 2.9);
        assert_eq!(record.petal_length, 5.6);
        assert_eq!(record.petal_width, 1.8);
        assert_eq!(record.predicted_class, 2);
        assert!(record.created_at >= before && record.created_at <= after);
    }

    #[tokio::test]
    async fn empty_ledger_lists_nothing() {
        let (_dir, ledger) = scratch_ledger().await;
        assert!(ledger.list(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_all_persist() {
        let (_dir, ledger) = scratch_ledger().await;
        let ledger = std::sync::Arc::new(ledger);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let ledger = std::sync::Arc::clone(&ledger);
            tasks.push(tokio::spawn(async move {
                ledger.append(&vector(i as f64), 0).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.list(20, 0).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.db");

        {
            let ledger = SqliteLedger::open(&path).await.unwrap();
            ledger.append(&vector(4.7), 1).await.unwrap();
        }

        let reopened = SqliteLedger::open(&path).await.unwrap();
        let records = reopened.list(10, 0).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].predicted_class, 1);
    }
}
