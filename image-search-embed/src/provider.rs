//! Embedding provider implementations

use crate::config::{EmbedConfig, ImageModel};
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input image
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result, inferring the dimension from the first vector.
    ///
    /// If the embeddings vector is empty, dimension defaults to 0.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for providers that turn encoded image bytes into embedding vectors.
///
/// Implementations must keep [`embedding_dimension`](Self::embedding_dimension)
/// stable for their whole lifetime: vectors written today are compared with
/// vectors computed for tomorrow's queries.
#[async_trait]
pub trait ImageEmbeddingProvider: Send + Sync {
    /// Generate the embedding for one encoded image (PNG, JPEG, ...)
    async fn embed_image(&self, image_bytes: &[u8]) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple encoded images (batch processing)
    async fn embed_images(&self, images: &[Vec<u8>]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// FastEmbed-based provider running an ONNX image model locally
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<ImageEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a new uninitialized provider. Call [`initialize`](Self::initialize) before embedding.
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config.model.expected_dimension();
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Downloads (on first use) and loads the image model, then measures its output dimension.
    pub async fn initialize(&mut self) -> Result<()> {
        tracing::info!(
            "Initializing FastEmbed image provider for model: {}",
            self.config.model_name()
        );
        self.config.validate()?;

        let config = self.config.clone();
        let model = tokio::task::spawn_blocking(move || -> Result<ImageEmbedding> {
            tracing::info!("Loading image embedding model: {}", config.model_name());

            let init_options = ImageInitOptions::new(fastembed_model(config.model))
                .with_cache_dir(config.cache_dir.clone())
                .with_show_download_progress(config.show_download_progress);

            ImageEmbedding::try_new(init_options).map_err(EmbedError::model_init)
        })
        .await??;

        self.model = Some(Arc::new(Mutex::new(model)));
        self.dimension = self.validate_model().await?;

        tracing::info!(
            "Model {} loaded successfully. Dimension: {}",
            self.config.model_name(),
            self.dimension
        );
        Ok(())
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// The configuration this provider was created with
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Embed a synthetic image and return the observed dimension.
    async fn validate_model(&self) -> Result<usize> {
        let sample = sample_image()?;
        let embeddings = self.run_model(vec![sample]).await?;

        let embedding = embeddings.into_iter().next().ok_or_else(|| {
            EmbedError::invalid_config("Model validation failed: no embeddings generated")
        })?;
        if embedding.is_empty() {
            return Err(EmbedError::invalid_config(
                "Model validation failed: empty embedding",
            ));
        }
        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_config(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        if embedding.len() != self.config.model.expected_dimension() {
            tracing::warn!(
                "Model {} produced {} dimensions, expected {}",
                self.config.model_name(),
                embedding.len(),
                self.config.model.expected_dimension()
            );
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name());
        Ok(embedding.len())
    }

    /// Decode every image, then run the model over the whole batch in a blocking task.
    async fn run_model(&self, images: Vec<Vec<u8>>) -> Result<Vec<Vec<f32>>> {
        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;
        let model = Arc::clone(model);

        tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            // fastembed reports every failure as anyhow, so codec errors are caught first
            for bytes in &images {
                image::load_from_memory(bytes)?;
            }

            let slices: Vec<&[u8]> = images.iter().map(Vec::as_slice).collect();
            let mut model_guard = model
                .lock()
                .map_err(|_| EmbedError::embedding_gen("image model mutex poisoned"))?;
            model_guard
                .embed_bytes(&slices, None)
                .map_err(EmbedError::embedding_gen)
        })
        .await?
    }

    fn normalize(&self, embeddings: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        if !self.config.normalize {
            return embeddings;
        }
        embeddings.into_iter().map(l2_normalize).collect()
    }
}

#[async_trait]
impl ImageEmbeddingProvider for FastEmbedProvider {
    async fn embed_image(&self, image_bytes: &[u8]) -> Result<Vec<f32>> {
        let result = self.embed_images(&[image_bytes.to_vec()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::embedding_gen("No embedding generated for image"))
    }

    async fn embed_images(&self, images: &[Vec<u8>]) -> Result<EmbeddingResult> {
        if images.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!("Generating embeddings for {} images", images.len());
        let embeddings = self.run_model(images.to_vec()).await?;
        let embeddings = self.normalize(embeddings);

        tracing::debug!("Generated {} embeddings", embeddings.len());
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

fn fastembed_model(model: ImageModel) -> ImageEmbeddingModel {
    match model {
        ImageModel::ClipVitB32 => ImageEmbeddingModel::ClipVitB32,
        ImageModel::Resnet50 => ImageEmbeddingModel::Resnet50,
        ImageModel::UnicomVitB16 => ImageEmbeddingModel::UnicomVitB16,
        ImageModel::UnicomVitB32 => ImageEmbeddingModel::UnicomVitB32,
        ImageModel::NomicEmbedVisionV15 => ImageEmbeddingModel::NomicEmbedVisionV15,
    }
}

/// Scale a vector to unit length; zero vectors are returned unchanged.
pub fn l2_normalize(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut embedding {
            *value /= norm;
        }
    }
    embedding
}

/// A small PNG gradient used to check a freshly loaded model.
fn sample_image() -> Result<Vec<u8>> {
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
    });
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img).write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
