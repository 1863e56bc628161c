//! Boundary API: the operations a UI calls
//!
//! [`ImageSearch`] wires the store, the embedding provider and one bound
//! collection together. Every operation answers with an [`Envelope`] so a
//! caller on the other side of a process or language boundary only ever sees
//! `{success, data}` or `{success, error: {kind, message}}`.
//!
//! ## Concurrency
//!
//! Searches and lookups run freely alongside each other. Index runs are
//! serialized on an internal lock, and `delete_all` refuses to run while an
//! index run holds it.

use crate::error::{ErrorKind, Result, SearchError};
use crate::retrieval::indexer::{IndexSummary, index_folder};
use crate::retrieval::lookup::{StoredImage, get_by_id};
use crate::retrieval::progress::ProgressSink;
use crate::retrieval::query::{SimilarImage, search_similar};
use crate::storage::sqlite_store::{SqliteCollection, SqliteStore};
use crate::storage::{Collection, CollectionInfo};
use image_search_embed::ImageEmbeddingProvider;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

/// Failure half of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Uniform success/failure wrapper returned by every [`ImageSearch`] operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &SearchError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }

    /// Wraps a workflow result, logging failures on the way out.
    pub fn from_result(operation: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => {
                error!("{} failed: {:?}", operation, err);
                Self::failure(&err)
            }
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }
}

/// The image search service around one named collection.
pub struct ImageSearch {
    store: SqliteStore,
    provider: Arc<dyn ImageEmbeddingProvider>,
    collection_name: String,
    collection: RwLock<Option<SqliteCollection>>,
    index_lock: Mutex<()>,
}

impl std::fmt::Debug for ImageSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSearch")
            .field("collection_name", &self.collection_name)
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

impl ImageSearch {
    /// Creates an unbound service. Every collection operation reports
    /// `NotReady` until [`ImageSearch::bind`] succeeds.
    pub fn new(
        store: SqliteStore,
        provider: Arc<dyn ImageEmbeddingProvider>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            collection_name: collection_name.into(),
            collection: RwLock::new(None),
            index_lock: Mutex::new(()),
        }
    }

    /// Creates the service and binds its collection.
    pub async fn open(
        store: SqliteStore,
        provider: Arc<dyn ImageEmbeddingProvider>,
        collection_name: impl Into<String>,
    ) -> Result<Self> {
        let service = Self::new(store, provider, collection_name);
        service.bind().await?;
        Ok(service)
    }

    /// Gets or creates the configured collection and binds to it.
    pub async fn bind(&self) -> Result<()> {
        let collection = self
            .store
            .get_or_create_collection(&self.collection_name)
            .await
            .map_err(SearchError::store)?;
        info!("Bound to collection '{}'", self.collection_name);
        *self.collection.write().await = Some(collection);
        Ok(())
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub async fn is_ready(&self) -> bool {
        self.collection.read().await.is_some()
    }

    async fn bound(&self) -> Result<SqliteCollection> {
        self.collection
            .read()
            .await
            .clone()
            .ok_or(SearchError::NotReady)
    }

    /// Up to `n_results` stored images most similar to the uploaded one.
    pub async fn search_similar_img(
        &self,
        img_b64: &str,
        n_results: usize,
    ) -> Envelope<Vec<SimilarImage>> {
        let result: Result<Vec<SimilarImage>> = async {
            let collection = self.bound().await?;
            search_similar(&collection, self.provider.as_ref(), img_b64, n_results).await
        }
        .await;
        Envelope::from_result("Search", result)
    }

    pub async fn get_image_by_id(&self, id: &str) -> Envelope<StoredImage> {
        let result: Result<StoredImage> = async {
            let collection = self.bound().await?;
            get_by_id(&collection, id).await
        }
        .await;
        Envelope::from_result("Image lookup", result)
    }

    /// Indexes `folder`, waiting for any index run already in progress.
    pub async fn index_images(
        &self,
        folder: &Path,
        sink: &dyn ProgressSink,
    ) -> Envelope<IndexSummary> {
        let result: Result<IndexSummary> = async {
            let _running = self.index_lock.lock().await;
            let collection = self.bound().await?;
            index_folder(folder, &collection, self.provider.as_ref(), sink).await
        }
        .await;
        Envelope::from_result("Indexing", result)
    }

    pub async fn get_count(&self) -> Envelope<usize> {
        let result: Result<usize> = async {
            let collection = self.bound().await?;
            collection.count().await.map_err(SearchError::store)
        }
        .await;
        Envelope::from_result("Count", result)
    }

    /// Drops every record by deleting and recreating the collection.
    ///
    /// Fails with `IndexInProgress` while an index run is active. If the
    /// collection cannot be recreated the service is left unbound.
    pub async fn delete_all(&self) -> Envelope<String> {
        let result: Result<String> = async {
            let _running = self
                .index_lock
                .try_lock()
                .map_err(|_| SearchError::IndexInProgress)?;
            let mut bound = self.collection.write().await;
            let collection = bound.as_ref().ok_or(SearchError::NotReady)?;
            let count = collection.count().await.map_err(SearchError::store)?;

            self.store
                .delete_collection(&self.collection_name)
                .await
                .map_err(SearchError::store)?;
            *bound = None;

            let fresh = self
                .store
                .get_or_create_collection(&self.collection_name)
                .await
                .map_err(SearchError::store)?;
            *bound = Some(fresh);

            info!(
                "Deleted {} images from collection '{}'",
                count, self.collection_name
            );
            Ok(format!("Deleted {count} images"))
        }
        .await;
        Envelope::from_result("Delete all", result)
    }

    /// Every collection in the underlying store.
    pub async fn list_collections(&self) -> Envelope<Vec<CollectionInfo>> {
        let result = self
            .store
            .list_collections()
            .await
            .map_err(SearchError::store);
        Envelope::from_result("List collections", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_search_embed::{EmbedConfig, FastEmbedProvider};
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn test_envelope_shapes() {
        let ok = Envelope::ok(3usize);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"success": true, "data": 3})
        );

        let failed: Envelope<usize> = Envelope::failure(&SearchError::NotReady);
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "success": false,
                "error": {"kind": "NotReady", "message": "Image database is not ready"}
            })
        );
        assert_eq!(failed.error_kind(), Some(ErrorKind::NotReady));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failures_are_logged_before_crossing_the_boundary() {
        let store = SqliteStore::open_memory().await.unwrap();
        let provider = Arc::new(FastEmbedProvider::new(EmbedConfig::default()));
        let search = ImageSearch::new(store, provider, "images");

        let count = search.get_count().await;
        assert_eq!(count.error_kind(), Some(ErrorKind::NotReady));
        assert!(logs_contain("Count failed"));
    }
}
