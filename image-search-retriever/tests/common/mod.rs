//! Shared fixtures for the integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use image_search_embed::{EmbedError, EmbeddingResult, ImageEmbeddingProvider};
use image_search_retriever::storage::{
    Collection, Include, Metadata, Record, ScoredRecord, sqlite_store::SqliteStore,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Embeds an image as its mean RGB color scaled to 0..1.
///
/// Deterministic and model-free, so distances between fixtures are known.
#[derive(Debug, Default)]
pub struct MeanColorProvider {
    calls: AtomicUsize,
}

impl MeanColorProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEmbeddingProvider for MeanColorProvider {
    async fn embed_image(&self, image_bytes: &[u8]) -> image_search_embed::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let image = image::load_from_memory(image_bytes)?.to_rgb8();
        let pixels = (image.width() * image.height()).max(1) as f32;
        let mut sum = [0f32; 3];
        for pixel in image.pixels() {
            for (channel, value) in sum.iter_mut().zip(pixel.0) {
                *channel += value as f32;
            }
        }
        Ok(sum.iter().map(|total| total / pixels / 255.0).collect())
    }

    async fn embed_images(&self, images: &[Vec<u8>]) -> image_search_embed::Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(images.len());
        for image in images {
            embeddings.push(self.embed_image(image).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        3
    }

    fn provider_name(&self) -> &str {
        "mean-color"
    }
}

/// Provider whose model always fails, for error mapping tests.
#[derive(Debug, Default)]
pub struct BrokenModelProvider;

#[async_trait]
impl ImageEmbeddingProvider for BrokenModelProvider {
    async fn embed_image(&self, _image_bytes: &[u8]) -> image_search_embed::Result<Vec<f32>> {
        Err(EmbedError::embedding_gen(anyhow::anyhow!("model crashed")))
    }

    async fn embed_images(&self, _images: &[Vec<u8>]) -> image_search_embed::Result<EmbeddingResult> {
        Err(EmbedError::embedding_gen(anyhow::anyhow!("model crashed")))
    }

    fn embedding_dimension(&self) -> usize {
        3
    }

    fn provider_name(&self) -> &str {
        "broken"
    }
}

/// Wraps the mean color provider and parks every call until released.
#[derive(Debug, Default)]
pub struct GatedProvider {
    inner: MeanColorProvider,
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl ImageEmbeddingProvider for GatedProvider {
    async fn embed_image(&self, image_bytes: &[u8]) -> image_search_embed::Result<Vec<f32>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.embed_image(image_bytes).await
    }

    async fn embed_images(&self, images: &[Vec<u8>]) -> image_search_embed::Result<EmbeddingResult> {
        self.inner.embed_images(images).await
    }

    fn embedding_dimension(&self) -> usize {
        3
    }

    fn provider_name(&self) -> &str {
        "gated"
    }
}

/// Collection whose full scan fails, while everything else passes through.
pub struct UnreadableCollection<C> {
    pub inner: C,
}

#[async_trait]
impl<C: Collection> Collection for UnreadableCollection<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn add(&self, id: &str, embedding: &[f32], metadata: &Metadata) -> Result<()> {
        self.inner.add(id, embedding, metadata).await
    }

    async fn get(&self, ids: Option<&[String]>, include: Include) -> Result<Vec<Record>> {
        match ids {
            None => Err(anyhow::anyhow!("metadata scan failed")),
            Some(ids) => self.inner.get(Some(ids), include).await,
        }
    }

    async fn query(&self, embedding: &[f32], k: usize, include: Include) -> Result<Vec<ScoredRecord>> {
        self.inner.query(embedding, k, include).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// Collection that refuses to store the record for one file name.
pub struct RejectingCollection<C> {
    pub inner: C,
    pub rejected_filename: String,
}

#[async_trait]
impl<C: Collection> Collection for RejectingCollection<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn add(&self, id: &str, embedding: &[f32], metadata: &Metadata) -> Result<()> {
        if metadata.get("original_filename").and_then(|v| v.as_str())
            == Some(self.rejected_filename.as_str())
        {
            anyhow::bail!("disk full while writing {}", self.rejected_filename);
        }
        self.inner.add(id, embedding, metadata).await
    }

    async fn get(&self, ids: Option<&[String]>, include: Include) -> Result<Vec<Record>> {
        self.inner.get(ids, include).await
    }

    async fn query(&self, embedding: &[f32], k: usize, include: Include) -> Result<Vec<ScoredRecord>> {
        self.inner.query(embedding, k, include).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// Encodes a solid-color image in the given format.
pub fn solid_image(color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(8, 8, Rgb(color))
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("encode fixture image");
    bytes
}

/// Writes a solid-color PNG to `dir/name` and returns its path.
pub fn write_png(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, solid_image(color, ImageFormat::Png)).expect("write fixture image");
    path
}

pub fn provider() -> Arc<MeanColorProvider> {
    Arc::new(MeanColorProvider::default())
}

pub async fn memory_store() -> SqliteStore {
    SqliteStore::open_memory().await.expect("open in-memory store")
}
