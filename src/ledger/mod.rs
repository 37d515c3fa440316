//! Durable, append-only prediction ledger.
//!
//! Every prediction the model actually computes (a cache miss) is appended
//! here exactly once; cache hits never touch the ledger. Records are
//! queryable in reverse-chronological pages ordered by identity.
//!
//! The storage engine sits behind the [`PredictionLedger`] trait so the
//! gateway and its tests can substitute backends; [`SqliteLedger`] is the
//! production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::FeatureVector;

pub mod sqlite;

pub use sqlite::SqliteLedger;

/// A durably recorded prediction.
///
/// `id` is assigned by the store, monotonically increasing in append order.
/// `created_at` is the server-side capture time, serialized as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
    pub predicted_class: i64,
    pub created_at: DateTime<Utc>,
}

/// Ledger persistence failures. Mapped to HTTP 500 at the gateway boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Append-only store of computed predictions.
///
/// # Contract
///
/// - `append` assigns the identity and timestamp itself and persists
///   durably before returning; the caller invokes it at most once per
///   genuine cache miss.
/// - `list` returns records ordered by id descending, skipping `offset`
///   and returning at most `limit`.
/// - An append failure must leave previously persisted records intact; the
///   caller surfaces the failure to the client and keeps its cache entry
///   (re-deriving the class is always safe, so no rollback is needed).
#[async_trait]
pub trait PredictionLedger: Send + Sync {
    async fn append(
        &self,
        features: &FeatureVector,
        predicted_class: i64,
    ) -> Result<i64, StorageError>;

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<PredictionRecord>, StorageError>;
}
