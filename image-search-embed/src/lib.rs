//! # image-search-embed
//!
//! Turns encoded images into fixed-length embedding vectors using pretrained
//! vision models run locally through FastEmbed (ONNX). Visually similar images
//! land near each other in the embedding space, which is what the retriever
//! crate's similarity search relies on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use image_search_embed::{EmbedConfig, FastEmbedProvider, ImageEmbeddingProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let bytes = std::fs::read("holiday.jpg")?;
//! let embedding = provider.embed_image(&bytes).await?;
//! assert_eq!(embedding.len(), provider.embedding_dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Models
//!
//! - **CLIP ViT-B/32** (`clip-ViT-B-32`, default): general purpose, 512 dimensions
//! - **ResNet-50** (`resnet50`): 2048 dimensions
//! - **Unicom ViT-B/16 and ViT-B/32**: 768 and 512 dimensions
//! - **Nomic Embed Vision v1.5**: 768 dimensions
//!
//! ## Lifecycle
//!
//! Loading a model is expensive (weights are downloaded on first use and an
//! ONNX session is built). Create one provider per process and share it as
//! `Arc<dyn ImageEmbeddingProvider>`.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using [`EmbedError`].
//! [`EmbedError::is_decode_error`] separates "these bytes are not an image"
//! from model failures.

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::{DEFAULT_MODEL_NAME, EmbedConfig, ImageModel};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingResult, FastEmbedProvider, ImageEmbeddingProvider};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_creation() {
        // Configuration alone never touches the model
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::from_model_name("unicom-ViT-B-32")
            .unwrap()
            .with_cache_dir(temp_dir.path());

        assert_eq!(config.model, ImageModel::UnicomVitB32);
        assert_eq!(config.cache_dir, temp_dir.path());

        let provider = FastEmbedProvider::new(config);
        assert_eq!(provider.embedding_dimension(), 512);
    }
}
