//! SQLite implementation of the storage layer
//!
//! Embeddings are stored as raw f32 blobs next to a JSON metadata column.
//! Similarity queries scan the collection and rank by squared Euclidean
//! distance in memory, which is exact and plenty fast for a personal photo
//! library.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE collections (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     name TEXT UNIQUE NOT NULL,
//!     dimension INTEGER,                -- fixed by the first insert
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! CREATE TABLE records (
//!     seq INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
//!     collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
//!     id TEXT NOT NULL,                 -- opaque record id, unique per collection
//!     embedding BLOB NOT NULL,          -- native-endian f32 values
//!     metadata TEXT,                    -- JSON object
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//! ```
//!
//! ## SQLite Settings
//!
//! - **WAL mode** with a busy timeout, so a reader never blocks the indexer
//! - **Foreign keys** on, so deleting a collection cascades to its records

use super::{Collection, CollectionInfo, Include, Metadata, Record, ScoredRecord};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the database inside the storage directory.
pub const DATABASE_FILE: &str = "image-search.db";

/// SQLite database holding any number of named collections.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    base: Option<PathBuf>,
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the persistent store inside directory `base`.
    pub async fn open(base: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base)
            .await
            .with_context(|| format!("Cannot create storage directory {}", base.display()))?;
        let db_path = base.join(DATABASE_FILE);

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await
        .with_context(|| format!("Cannot open database {}", db_path.display()))?;

        tracing::debug!("Opened vector store at {}", db_path.display());
        Self::new_with_pool(Some(base.to_path_buf()), pool).await
    }

    /// Opens a throwaway in-memory store for testing.
    pub async fn open_memory() -> Result<Self> {
        // An in-memory database lives and dies with its connection, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
            .await?;
        Self::new_with_pool(None, pool).await
    }

    async fn new_with_pool(base: Option<PathBuf>, pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { base, pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                dimension INTEGER,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection_id INTEGER NOT NULL,
                id TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT unique_record UNIQUE(collection_id, id),
                FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Directory backing this store, `None` for in-memory stores
    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Returns the named collection, creating it empty if it does not exist.
    pub async fn get_or_create_collection(&self, name: &str) -> Result<SqliteCollection> {
        if name.trim().is_empty() {
            bail!("Collection name must not be empty");
        }

        sqlx::query("INSERT INTO collections (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM collections WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(SqliteCollection {
            pool: self.pool.clone(),
            id,
            name: name.to_string(),
        })
    }

    /// Deletes the named collection and all of its records.
    /// Returns `false` if there was no such collection.
    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lists every collection with its dimension and record count.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT c.name AS name, c.dimension AS dimension, COUNT(r.seq) AS count
            FROM collections c
            LEFT JOIN records r ON r.collection_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let dimension: Option<i64> = row.get("dimension");
                let count: i64 = row.get("count");
                CollectionInfo {
                    name: row.get("name"),
                    dimension: dimension.map(|d| d as usize),
                    count: count as usize,
                }
            })
            .collect())
    }
}

/// Handle to one collection inside a [`SqliteStore`].
///
/// The handle keeps working against the same collection id; after the
/// collection is deleted, writes fail and reads come back empty.
#[derive(Clone, Debug)]
pub struct SqliteCollection {
    pool: SqlitePool,
    id: i64,
    name: String,
}

impl SqliteCollection {
    /// Dimension fixed by the first insert, `None` while the collection is empty
    pub async fn dimension(&self) -> Result<Option<usize>> {
        let dimension: Option<Option<i64>> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE id = ?1")
                .bind(self.id)
                .fetch_optional(&self.pool)
                .await?;
        match dimension {
            Some(dimension) => Ok(dimension.map(|d| d as usize)),
            None => Err(anyhow!("Collection '{}' no longer exists", self.name)),
        }
    }

    fn row_to_record(row: &SqliteRow, include: Include) -> Result<Record> {
        Ok(Record {
            id: row.get("id"),
            embedding: if include.embeddings {
                Some(decode_embedding(&row.get::<Vec<u8>, _>("embedding"))?)
            } else {
                None
            },
            metadata: if include.metadatas {
                decode_metadata(row.get("metadata"))?
            } else {
                None
            },
        })
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&self, id: &str, embedding: &[f32], metadata: &Metadata) -> Result<()> {
        if embedding.is_empty() {
            bail!("Refusing to store an empty embedding for '{id}'");
        }

        let mut tx = self.pool.begin().await?;

        let dimension: Option<Option<i64>> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE id = ?1")
                .bind(self.id)
                .fetch_optional(&mut *tx)
                .await?;
        match dimension {
            None => bail!("Collection '{}' no longer exists", self.name),
            Some(None) => {
                sqlx::query("UPDATE collections SET dimension = ?1 WHERE id = ?2")
                    .bind(embedding.len() as i64)
                    .bind(self.id)
                    .execute(&mut *tx)
                    .await?;
            }
            Some(Some(expected)) if expected as usize != embedding.len() => bail!(
                "Embedding dimension {} does not match collection '{}' dimension {}",
                embedding.len(),
                self.name,
                expected
            ),
            Some(Some(_)) => {}
        }

        let metadata_json = serde_json::to_string(metadata)?;
        sqlx::query(
            "INSERT INTO records (collection_id, id, embedding, metadata) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(self.id)
        .bind(id)
        .bind(bytemuck::cast_slice::<f32, u8>(embedding))
        .bind(metadata_json)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Cannot insert record '{id}' into '{}'", self.name))?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, ids: Option<&[String]>, include: Include) -> Result<Vec<Record>> {
        match ids {
            Some(ids) => {
                let mut records = Vec::with_capacity(ids.len());
                for id in ids {
                    let row = sqlx::query(
                        "SELECT id, embedding, metadata FROM records WHERE collection_id = ?1 AND id = ?2",
                    )
                    .bind(self.id)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
                    if let Some(row) = row {
                        records.push(Self::row_to_record(&row, include)?);
                    }
                }
                Ok(records)
            }
            None => {
                let rows = sqlx::query(
                    "SELECT id, embedding, metadata FROM records WHERE collection_id = ?1 ORDER BY seq",
                )
                .bind(self.id)
                .fetch_all(&self.pool)
                .await?;
                rows.iter()
                    .map(|row| Self::row_to_record(row, include))
                    .collect()
            }
        }
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        include: Include,
    ) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension().await? {
            if expected != embedding.len() {
                bail!(
                    "Query dimension {} does not match collection '{}' dimension {}",
                    embedding.len(),
                    self.name,
                    expected
                );
            }
        }

        let rows = sqlx::query(
            "SELECT id, embedding, metadata FROM records WHERE collection_id = ?1 ORDER BY seq",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let stored = decode_embedding(&row.get::<Vec<u8>, _>("embedding"))?;
            scored.push((squared_l2(embedding, &stored), row, stored));
        }

        // Stable sort: equal distances keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(distance, row, stored)| -> Result<ScoredRecord> {
                Ok(ScoredRecord {
                    id: row.get("id"),
                    distance: include.distances.then_some(distance),
                    metadata: if include.metadatas {
                        decode_metadata(row.get("metadata"))?
                    } else {
                        None
                    },
                    embedding: include.embeddings.then_some(stored),
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection_id = ?1")
            .bind(self.id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % std::mem::size_of::<f32>() != 0 {
        bail!("Corrupt embedding blob of {} bytes", bytes.len());
    }
    // Copy into an f32 buffer; the blob itself carries no alignment guarantee
    let mut embedding = vec![0f32; bytes.len() / std::mem::size_of::<f32>()];
    bytemuck::cast_slice_mut::<f32, u8>(&mut embedding).copy_from_slice(bytes);
    Ok(embedding)
}

fn decode_metadata(raw: Option<String>) -> Result<Option<Metadata>> {
    raw.map(|json| serde_json::from_str::<Metadata>(&json).context("Corrupt metadata JSON"))
        .transpose()
}

/// Squared Euclidean distance between two vectors of equal length.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
