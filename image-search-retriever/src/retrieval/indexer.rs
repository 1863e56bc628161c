//! Folder indexing with path-based deduplication
//!
//! Scans one directory (not recursively), embeds every image file that is not
//! already in the collection and stores it under a fresh id. The image bytes
//! stay where they are; records only point at them through `original_path`.
//!
//! ## Pipeline
//!
//! ```text
//! read_dir → extension filter → sort by name
//!     → resolved path already stored?  ── yes → duplicate
//!     → read bytes → provider.embed_image ── fails → skipped
//!     → collection.add(img_<uuid>, embedding, metadata) ── fails → error
//! ```
//!
//! Per-file problems never abort the run. Only an unreadable folder does.

use super::progress::{Outcome, ProgressEvent, ProgressSink};
use super::{ORIGINAL_FILENAME_KEY, ORIGINAL_PATH_KEY};
use crate::error::{Result, SearchError};
use crate::storage::{Collection, Include, Metadata};
use image_search_embed::ImageEmbeddingProvider;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extensions considered images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "webp"];

pub const NO_IMAGES_MESSAGE: &str = "No processable image files found in the specified folder.";

/// Reason reported for files whose path cannot be stored as text.
pub const NON_UTF8_PATH: &str = "path is not valid UTF-8";

/// Aggregate result of one indexing run.
///
/// `processed_files == added + skipped + errors` and `duplicates <= skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub message: String,
    pub processed_files: usize,
    pub added: usize,
    /// Duplicates plus files the provider could not embed
    pub skipped: usize,
    pub duplicates: usize,
    /// Files that could not be read or stored
    pub errors: usize,
    /// Existing records could not be loaded, so duplicates went undetected
    pub dedup_degraded: bool,
}

impl IndexSummary {
    fn empty(message: &str, dedup_degraded: bool) -> Self {
        Self {
            message: message.to_string(),
            processed_files: 0,
            added: 0,
            skipped: 0,
            duplicates: 0,
            errors: 0,
            dedup_degraded,
        }
    }
}

/// True if the file name has one of [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Fresh record id: `img_` followed by 32 hex characters.
pub fn new_image_id() -> String {
    format!("img_{}", uuid::Uuid::new_v4().simple())
}

/// Canonical form used for duplicate detection. Paths that no longer
/// resolve (file gone, dangling link) keep their lexical form.
async fn resolve(path: &Path) -> PathBuf {
    match tokio::fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Image files directly inside `folder`, sorted by file name.
async fn list_candidates(folder: &Path) -> Result<Vec<PathBuf>> {
    let invalid = || SearchError::InvalidFolder {
        path: folder.to_path_buf(),
    };

    let mut entries = tokio::fs::read_dir(folder).await.map_err(|_| invalid())?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|_| invalid())? {
        let path = entry.path();
        if !has_image_extension(&path) {
            continue;
        }
        // Follows symlinks
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => candidates.push(path),
            Ok(_) => {}
            Err(e) => debug!("Ignoring {}: {}", path.display(), e),
        }
    }
    candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(candidates)
}

/// Resolved `original_path` of every stored record.
async fn existing_paths(collection: &dyn Collection) -> anyhow::Result<HashSet<PathBuf>> {
    let records = collection.get(None, Include::metadatas()).await?;
    let mut paths = HashSet::with_capacity(records.len());
    for record in records {
        let stored = record
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get(ORIGINAL_PATH_KEY))
            .and_then(|value| value.as_str());
        if let Some(stored) = stored {
            paths.insert(resolve(Path::new(stored)).await);
        }
    }
    Ok(paths)
}

/// Indexes every new image file directly inside `folder`.
///
/// Fails only with [`SearchError::InvalidFolder`]; everything that goes wrong
/// with an individual file is counted in the returned [`IndexSummary`].
pub async fn index_folder(
    folder: &Path,
    collection: &dyn Collection,
    provider: &dyn ImageEmbeddingProvider,
    sink: &dyn ProgressSink,
) -> Result<IndexSummary> {
    match tokio::fs::metadata(folder).await {
        Ok(metadata) if metadata.is_dir() => {}
        _ => {
            return Err(SearchError::InvalidFolder {
                path: folder.to_path_buf(),
            });
        }
    }

    let mut dedup_degraded = false;
    let mut seen = match existing_paths(collection).await {
        Ok(paths) => {
            sink.notify(&ProgressEvent::Existing { count: paths.len() });
            paths
        }
        Err(e) => {
            warn!(
                "Could not load existing records of '{}', duplicates will not be detected: {:#}",
                collection.name(),
                e
            );
            sink.notify(&ProgressEvent::DedupDegraded {
                reason: format!("{e:#}"),
            });
            dedup_degraded = true;
            HashSet::new()
        }
    };

    let candidates = list_candidates(folder).await?;
    let folder_display = folder.display().to_string();
    if candidates.is_empty() {
        info!("No image files in {}", folder_display);
        sink.notify(&ProgressEvent::Finished {
            message: NO_IMAGES_MESSAGE.to_string(),
        });
        return Ok(IndexSummary::empty(NO_IMAGES_MESSAGE, dedup_degraded));
    }

    let total = candidates.len();
    info!("Indexing {} image files from {}", total, folder_display);
    sink.notify(&ProgressEvent::Started {
        folder: folder_display.clone(),
        candidates: total,
    });

    let mut summary = IndexSummary::empty("", dedup_degraded);
    for (position, path) in candidates.iter().enumerate() {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        summary.processed_files += 1;

        let outcome = index_file(path, &filename, &mut seen, collection, provider).await;
        match &outcome {
            Outcome::Added { .. } => summary.added += 1,
            Outcome::Duplicate => {
                summary.duplicates += 1;
                summary.skipped += 1;
            }
            Outcome::Skipped { .. } => summary.skipped += 1,
            Outcome::Error { .. } => summary.errors += 1,
        }
        sink.notify(&ProgressEvent::File {
            index: position + 1,
            total,
            filename,
            outcome,
        });
    }

    summary.message = format!("Indexing complete for folder: {folder_display}");
    info!(
        "{}: {} added, {} skipped ({} duplicates), {} errors",
        summary.message, summary.added, summary.skipped, summary.duplicates, summary.errors
    );
    sink.notify(&ProgressEvent::Finished {
        message: summary.message.clone(),
    });
    Ok(summary)
}

async fn index_file(
    path: &Path,
    filename: &str,
    seen: &mut HashSet<PathBuf>,
    collection: &dyn Collection,
    provider: &dyn ImageEmbeddingProvider,
) -> Outcome {
    let resolved = resolve(path).await;
    if seen.contains(&resolved) {
        debug!("Skipping duplicate {}", path.display());
        return Outcome::Duplicate;
    }

    // Metadata is JSON text, so a path that is not UTF-8 could never be found again
    let original_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let Some(original_path) = original_path.to_str().map(str::to_owned) else {
        warn!("Not indexing {}: path is not valid UTF-8", path.display());
        return Outcome::Error {
            reason: NON_UTF8_PATH.to_string(),
        };
    };

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return Outcome::Error {
                reason: e.to_string(),
            };
        }
    };

    let embedding = match provider.embed_image(&bytes).await {
        Ok(embedding) => embedding,
        Err(e) => {
            debug!("No embedding for {}: {}", path.display(), e);
            return Outcome::Skipped {
                reason: e.to_string(),
            };
        }
    };

    let mut metadata = Metadata::new();
    metadata.insert(ORIGINAL_PATH_KEY.to_string(), original_path.into());
    metadata.insert(ORIGINAL_FILENAME_KEY.to_string(), filename.into());

    let id = new_image_id();
    if let Err(e) = collection.add(&id, &embedding, &metadata).await {
        warn!("Cannot store {}: {:#}", path.display(), e);
        return Outcome::Error {
            reason: format!("{e:#}"),
        };
    }

    seen.insert(resolved);
    Outcome::Added { id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions() {
        assert!(has_image_extension(Path::new("/a/photo.JPG")));
        assert!(has_image_extension(Path::new("scan.TiFf")));
        assert!(has_image_extension(Path::new("x.webp")));
        assert!(!has_image_extension(Path::new("note.txt")));
        assert!(!has_image_extension(Path::new("png")));
        assert!(!has_image_extension(Path::new("archive.png.zip")));
    }

    #[test]
    fn test_image_id_format() {
        let id = new_image_id();
        assert_eq!(id.len(), 4 + 32);
        assert!(id.starts_with("img_"));
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_image_id());
    }

    #[tokio::test]
    async fn test_resolve_keeps_vanished_paths() {
        let gone = Path::new("/no/such/dir/picture.png");
        assert_eq!(resolve(gone).await, PathBuf::from("/no/such/dir/picture.png"));
    }
}
