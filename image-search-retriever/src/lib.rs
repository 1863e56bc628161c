//! image-search-retriever: reverse image search over a local photo folder
//!
//! Indexes a folder of images into a persistent vector collection and answers
//! "which stored images look like this one?" by nearest-neighbor search in
//! embedding space. Image bytes are never copied into the store; every record
//! points back at its original file, which is re-read whenever it is shown.
//!
//! ## Key Modules
//!
//! - **[`storage`]**: `Collection` trait and its SQLite implementation
//! - **[`retrieval`]**: indexing, similarity query and lookup-by-id workflows
//! - **[`api`]**: the `ImageSearch` service returning success/failure envelopes
//! - **[`config`]**: storage location, collection and model selection
//! - **[`error`]**: the `SearchError` taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use image_search_embed::FastEmbedProvider;
//! use image_search_retriever::{
//!     api::ImageSearch, config::SearchConfig, retrieval::progress::TracingSink,
//!     storage::sqlite_store::SqliteStore,
//! };
//! use std::{path::Path, sync::Arc};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SearchConfig::from_env();
//! let provider = Arc::new(FastEmbedProvider::create(config.embed_config()?).await?);
//! let store = SqliteStore::open(&config.db_path).await?;
//! let search = ImageSearch::open(store, provider, &config.collection_name).await?;
//!
//! let summary = search.index_images(Path::new("./photos"), &TracingSink).await;
//! println!("{}", serde_json::to_string_pretty(&summary)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! folder → indexer → ImageEmbeddingProvider → Collection (SQLite)
//!                                                  ↓
//! upload → query ──→ ImageEmbeddingProvider → nearest hits → inline images
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;
