//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Callers mostly care about one distinction: whether the input bytes were
/// not an image at all ([`EmbedError::ImageDecode`]) or whether the model side
/// failed (every other variant). [`EmbedError::is_decode_error`] answers that.
///
/// # Error Categories
///
/// - **Input Errors**: Bytes that no image codec understands
/// - **Configuration Errors**: Unknown model identifiers or invalid settings
/// - **Initialization Errors**: Failures during model download or setup
/// - **Runtime Errors**: Problems during actual embedding generation
/// - **Async Errors**: Blocking tasks that panicked or were cancelled
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The input bytes could not be decoded as an image
    #[error("Could not decode image: {source}")]
    ImageDecode {
        #[source]
        source: image::ImageError,
    },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    pub fn model_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Create an embedding generation error from any error type.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` when the failure is about the input bytes rather than the model.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::ImageDecode { .. })
    }
}

impl From<image::ImageError> for EmbedError {
    fn from(source: image::ImageError) -> Self {
        Self::ImageDecode { source }
    }
}
