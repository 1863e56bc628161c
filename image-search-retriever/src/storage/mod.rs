//! Storage abstraction layer for image-search-retriever
//!
//! A *collection* is a named, persistent set of `(id, embedding, metadata)`
//! records. The workflows in [`crate::retrieval`] only talk to the
//! [`Collection`] trait, so the SQLite backend can be swapped for anything
//! that offers the same add / get / nearest-neighbor contract.
//!
//! ## Key Components
//!
//! - **Collection**: record-level operations on one named collection
//! - **SqliteStore**: the database, owning collections (get-or-create, delete, list)
//! - **Data Types**: Record, ScoredRecord, Include and the JSON metadata map
//!
//! ## Architecture
//!
//! ```text
//! SqliteStore ── get_or_create_collection(name) ──> SqliteCollection: Collection
//!      │                                                  │
//!      └── delete_collection(name)              add / get / query / count
//! ```

use anyhow::Result;
use async_trait::async_trait;

pub mod sqlite_store;

/// Free-form record metadata, stored as a JSON object.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Which optional fields a read should populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Include {
    pub embeddings: bool,
    pub metadatas: bool,
    pub distances: bool,
}

impl Include {
    /// Only ids
    pub const NONE: Include = Include {
        embeddings: false,
        metadatas: false,
        distances: false,
    };

    /// Metadata and distances, the usual shape for similarity queries
    pub const METADATAS_AND_DISTANCES: Include = Include {
        embeddings: false,
        metadatas: true,
        distances: true,
    };

    /// Every optional field
    pub const ALL: Include = Include {
        embeddings: true,
        metadatas: true,
        distances: true,
    };

    /// Metadata only
    pub fn metadatas() -> Self {
        Self {
            metadatas: true,
            ..Self::NONE
        }
    }

    pub fn with_embeddings(self) -> Self {
        Self {
            embeddings: true,
            ..self
        }
    }
}

/// One stored record as returned by [`Collection::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Option<Metadata>,
}

/// One hit of a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    /// Squared Euclidean distance to the query vector (smaller is closer)
    pub distance: Option<f32>,
    pub metadata: Option<Metadata>,
    pub embedding: Option<Vec<f32>>,
}

/// Summary row for [`sqlite_store::SqliteStore::list_collections`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: Option<usize>,
    pub count: usize,
}

/// Record-level operations on a single named collection.
///
/// Ids are unique within a collection and every embedding shares the
/// dimensionality fixed by the first insert.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Name the collection was opened under
    fn name(&self) -> &str;

    /// Insert one record. Fails if the id already exists or the dimension differs.
    async fn add(&self, id: &str, embedding: &[f32], metadata: &Metadata) -> Result<()>;

    /// Fetch records by id (missing ids are skipped) or every record when `ids` is `None`.
    /// Results come back in request order, or insertion order for a full scan.
    async fn get(&self, ids: Option<&[String]>, include: Include) -> Result<Vec<Record>>;

    /// Return the `k` records closest to `embedding`, nearest first.
    async fn query(&self, embedding: &[f32], k: usize, include: Include)
    -> Result<Vec<ScoredRecord>>;

    /// Number of records in the collection
    async fn count(&self) -> Result<usize>;
}
