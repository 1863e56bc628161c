//! "Find images like this one"
//!
//! Embeds an uploaded image, asks the collection for its nearest neighbors
//! and turns every hit into something a UI can show directly: the stored
//! metadata plus the original file inlined as a data URL.

use super::ORIGINAL_PATH_KEY;
use super::inline_image::{decode_upload, encode_file};
use crate::error::{Result, SearchError};
use crate::storage::{Collection, Include, Metadata, ScoredRecord};
use image_search_embed::ImageEmbeddingProvider;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Displayable form of a hit's source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HitImage {
    Available { image_url: String },
    /// The record points at a file that no longer exists
    FileMissing { original_path: PathBuf },
    /// No usable path in the metadata, or the file is not a readable image
    Unavailable { message: String },
}

/// One similarity search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarImage {
    pub id: String,
    /// Squared Euclidean distance, rounded to 4 decimals
    pub distance: f64,
    pub metadata: Metadata,
    pub image: HitImage,
}

/// Rounds to 4 decimal places.
pub fn round_distance(distance: f32) -> f64 {
    (f64::from(distance) * 10_000.0).round() / 10_000.0
}

/// Returns the `top_k` stored images closest to the uploaded one, nearest first.
///
/// `encoded_image` is bare base64 or a data URL. Fails with a decode error
/// for malformed input, or whatever the provider reports. A hit whose source
/// file is gone keeps its place in the list with a [`HitImage::FileMissing`]
/// marker.
pub async fn search_similar(
    collection: &dyn Collection,
    provider: &dyn ImageEmbeddingProvider,
    encoded_image: &str,
    top_k: usize,
) -> Result<Vec<SimilarImage>> {
    let bytes = decode_upload(encoded_image)?;
    let embedding = provider.embed_image(&bytes).await?;

    if top_k == 0 {
        return Ok(Vec::new());
    }

    let hits = collection
        .query(&embedding, top_k, Include::METADATAS_AND_DISTANCES)
        .await
        .map_err(SearchError::store)?;
    debug!("Query on '{}' returned {} hits", collection.name(), hits.len());

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        results.push(rehydrate(hit).await);
    }
    Ok(results)
}

async fn rehydrate(hit: ScoredRecord) -> SimilarImage {
    let metadata = hit.metadata.unwrap_or_default();
    let original_path = metadata.get(ORIGINAL_PATH_KEY).and_then(|v| v.as_str());

    let image = match original_path {
        None => HitImage::Unavailable {
            message: format!("No original path stored for {}", hit.id),
        },
        Some(original_path) => match encode_file(Path::new(original_path)).await {
            Ok(image_url) => HitImage::Available { image_url },
            Err(SearchError::FileMissing { path }) => {
                warn!("Search hit {} points at missing file {}", hit.id, path.display());
                HitImage::FileMissing {
                    original_path: path,
                }
            }
            Err(e) => {
                warn!("Search hit {} cannot be displayed: {}", hit.id, e);
                HitImage::Unavailable {
                    message: e.to_string(),
                }
            }
        },
    };

    SimilarImage {
        distance: round_distance(hit.distance.unwrap_or_default()),
        id: hit.id,
        metadata,
        image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_distance() {
        assert_eq!(round_distance(0.123456), 0.1235);
        assert_eq!(round_distance(2.0), 2.0);
        assert_eq!(round_distance(0.0), 0.0);
    }

    #[test]
    fn test_hit_image_serialization() {
        let missing = HitImage::FileMissing {
            original_path: PathBuf::from("/photos/gone.png"),
        };
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            json!({"status": "file_missing", "original_path": "/photos/gone.png"})
        );

        let available = HitImage::Available {
            image_url: "data:image/png;base64,AAAA".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&available).unwrap(),
            json!({"status": "available", "image_url": "data:image/png;base64,AAAA"})
        );
    }

    #[tokio::test]
    async fn test_hit_without_path_is_unavailable() {
        let hit = ScoredRecord {
            id: "img_1".to_string(),
            distance: Some(0.5),
            metadata: None,
            embedding: None,
        };
        let result = rehydrate(hit).await;
        assert_eq!(result.distance, 0.5);
        assert!(result.metadata.is_empty());
        assert!(matches!(result.image, HitImage::Unavailable { .. }));
    }
}
