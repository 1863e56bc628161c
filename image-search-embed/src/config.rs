//! Configuration for image embedding models

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default model identifier, the CLIP ViT-B/32 vision tower.
pub const DEFAULT_MODEL_NAME: &str = "clip-ViT-B-32";

/// Image embedding models known to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageModel {
    /// CLIP ViT-B/32 vision encoder (512 dimensions)
    #[default]
    ClipVitB32,
    /// ResNet-50 (2048 dimensions)
    Resnet50,
    /// Unicom ViT-B/16 (768 dimensions)
    UnicomVitB16,
    /// Unicom ViT-B/32 (512 dimensions)
    UnicomVitB32,
    /// Nomic Embed Vision v1.5 (768 dimensions)
    NomicEmbedVisionV15,
}

impl ImageModel {
    /// Canonical identifier, accepted back by [`FromStr`](std::str::FromStr).
    pub fn name(&self) -> &'static str {
        match self {
            ImageModel::ClipVitB32 => "clip-ViT-B-32",
            ImageModel::Resnet50 => "resnet50",
            ImageModel::UnicomVitB16 => "unicom-ViT-B-16",
            ImageModel::UnicomVitB32 => "unicom-ViT-B-32",
            ImageModel::NomicEmbedVisionV15 => "nomic-embed-vision-v1.5",
        }
    }

    /// Published output dimension. The provider still measures the real one at load time.
    pub fn expected_dimension(&self) -> usize {
        match self {
            ImageModel::ClipVitB32 | ImageModel::UnicomVitB32 => 512,
            ImageModel::UnicomVitB16 | ImageModel::NomicEmbedVisionV15 => 768,
            ImageModel::Resnet50 => 2048,
        }
    }
}

impl std::fmt::Display for ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ImageModel {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "clip-vit-b-32" | "qdrant/clip-vit-b-32-vision" | "clip" => Ok(ImageModel::ClipVitB32),
            "resnet50" | "resnet-50" | "qdrant/resnet50-onnx" => Ok(ImageModel::Resnet50),
            "unicom-vit-b-16" | "qdrant/unicom-vit-b-16" => Ok(ImageModel::UnicomVitB16),
            "unicom-vit-b-32" | "qdrant/unicom-vit-b-32" => Ok(ImageModel::UnicomVitB32),
            "nomic-embed-vision-v1.5" | "nomic-ai/nomic-embed-vision-v1.5" => {
                Ok(ImageModel::NomicEmbedVisionV15)
            }
            _ => Err(EmbedError::invalid_config(format!(
                "Unknown image embedding model: {s}"
            ))),
        }
    }
}

/// Configuration for image embedding models
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct EmbedConfig {
    /// Which model to load
    #[builder(default)]
    pub model: ImageModel,
    /// Directory where downloaded model weights are cached
    #[builder(default = r#"PathBuf::from("models")"#)]
    pub cache_dir: PathBuf,
    /// Whether to L2-normalize embeddings
    #[builder(default = "true")]
    pub normalize: bool,
    /// Whether to print a download progress bar on first use
    #[builder(default = "false")]
    pub show_download_progress: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a configuration for a model identifier such as `clip-ViT-B-32`.
    pub fn from_model_name(name: &str) -> Result<Self> {
        let model = name.parse::<ImageModel>()?;
        Ok(Self {
            model,
            ..Self::default()
        })
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set whether to show download progress (builder style)
    pub fn with_download_progress(self, show_download_progress: bool) -> Self {
        Self {
            show_download_progress,
            ..self
        }
    }

    /// Get the model identifier
    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Validate settings that can be checked without touching the model
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(EmbedError::invalid_config("cache_dir must not be empty"));
        }
        if self.cache_dir.exists() && !self.cache_dir.is_dir() {
            tracing::error!("Model cache path is not a directory: {}", self.cache_dir.display());
            return Err(EmbedError::invalid_config(format!(
                "Model cache path is not a directory: {}",
                self.cache_dir.display()
            )));
        }

        tracing::debug!("Configuration validated for: {}", self.model_name());
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        EmbedConfigBuilder::default()
            .build()
            .expect("all EmbedConfig fields have defaults")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();

        assert_eq!(config.model, ImageModel::ClipVitB32);
        assert_eq!(config.model_name(), DEFAULT_MODEL_NAME);
        assert_eq!(config.cache_dir, PathBuf::from("models"));
        assert!(config.normalize);
        assert!(!config.show_download_progress);
    }

    #[test]
    fn test_model_name_parsing() {
        assert_eq!(
            "clip-ViT-B-32".parse::<ImageModel>().unwrap(),
            ImageModel::ClipVitB32
        );
        assert_eq!(
            "Qdrant/clip-ViT-B-32-vision".parse::<ImageModel>().unwrap(),
            ImageModel::ClipVitB32
        );
        assert_eq!(
            "RESNET50".parse::<ImageModel>().unwrap(),
            ImageModel::Resnet50
        );
        assert_eq!(
            "nomic-embed-vision-v1.5".parse::<ImageModel>().unwrap(),
            ImageModel::NomicEmbedVisionV15
        );

        let err = "clip-ViT-L-14".parse::<ImageModel>().unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }

    #[test]
    fn test_names_round_trip() {
        for model in [
            ImageModel::ClipVitB32,
            ImageModel::Resnet50,
            ImageModel::UnicomVitB16,
            ImageModel::UnicomVitB32,
            ImageModel::NomicEmbedVisionV15,
        ] {
            assert_eq!(model.name().parse::<ImageModel>().unwrap(), model);
        }
        assert_eq!(ImageModel::Resnet50.expected_dimension(), 2048);
    }

    #[test]
    fn test_builder_and_setters() {
        let temp_dir = tempdir().unwrap();

        let config = EmbedConfig::builder()
            .model(ImageModel::UnicomVitB16)
            .cache_dir(temp_dir.path())
            .normalize(false)
            .build()
            .unwrap();
        assert_eq!(config.model_name(), "unicom-ViT-B-16");
        assert_eq!(config.cache_dir, temp_dir.path());
        assert!(!config.normalize);

        let config = EmbedConfig::from_model_name("resnet50")
            .unwrap()
            .with_cache_dir(temp_dir.path())
            .with_download_progress(true)
            .with_normalize(false);
        assert_eq!(config.model, ImageModel::Resnet50);
        assert!(config.show_download_progress);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_file_as_cache_dir() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let config = EmbedConfig::default().with_cache_dir(&file);
        assert!(matches!(
            config.validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }
}
