//! Retrieval of a single stored image by id

use super::ORIGINAL_PATH_KEY;
use super::inline_image::encode_file;
use crate::error::{Result, SearchError};
use crate::storage::{Collection, Include};
use serde::Serialize;
use std::path::PathBuf;

/// A stored image, re-read from its original location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub original_path: PathBuf,
    pub data_url: String,
    pub filename: String,
}

/// Looks up `id` and inlines the file it points at.
///
/// [`SearchError::NotFound`] if there is no such record or it carries no
/// path, [`SearchError::FileMissing`] if the file has since disappeared.
pub async fn get_by_id(collection: &dyn Collection, id: &str) -> Result<StoredImage> {
    let ids = [id.to_string()];
    let record = collection
        .get(Some(&ids), Include::metadatas())
        .await
        .map_err(SearchError::store)?
        .into_iter()
        .next()
        .ok_or_else(|| SearchError::NotFound { id: id.to_string() })?;

    let original_path = record
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.get(ORIGINAL_PATH_KEY))
        .and_then(|value| value.as_str())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            tracing::warn!("Record {} has no {} metadata", id, ORIGINAL_PATH_KEY);
            SearchError::NotFound { id: id.to_string() }
        })?;

    if !tokio::fs::try_exists(&original_path).await.unwrap_or(false) {
        tracing::warn!(
            "File for {} is gone: {}",
            id,
            original_path.display()
        );
        return Err(SearchError::FileMissing {
            path: original_path,
        });
    }

    let data_url = encode_file(&original_path).await?;
    let filename = original_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(StoredImage {
        original_path,
        data_url,
        filename,
    })
}
