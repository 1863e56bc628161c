use base64::Engine;
use clap::{Parser, Subcommand};
use image_search_embed::{EmbedConfig, FastEmbedProvider, ImageEmbeddingProvider};
use image_search_retriever::{
    api::{Envelope, ImageSearch},
    config::{self, DEFAULT_N_RESULTS, SearchConfig},
    retrieval::progress::TracingSink,
    storage::sqlite_store::SqliteStore,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Index a folder of images and find visually similar ones.
///
/// Every command prints a JSON envelope on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the image database
    #[arg(long, env = config::DB_PATH_ENV, default_value = config::DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// Collection to operate on
    #[arg(long, env = config::COLLECTION_NAME_ENV, default_value = config::DEFAULT_COLLECTION_NAME)]
    collection: String,

    /// Embedding model identifier
    #[arg(long, env = config::MODEL_NAME_ENV, default_value = image_search_embed::DEFAULT_MODEL_NAME)]
    model: String,

    /// Where model weights are cached
    #[arg(long, env = config::MODEL_CACHE_DIR_ENV, default_value = config::DEFAULT_MODEL_CACHE_DIR)]
    model_cache_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index every image directly inside a folder
    Index {
        folder: PathBuf,
    },
    /// Find stored images similar to an image file
    Search {
        image: PathBuf,
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_N_RESULTS)]
        n_results: usize,
    },
    /// Show a stored image by id
    Get {
        id: String,
    },
    /// Count stored images
    Count,
    /// Delete every stored image from the collection
    DeleteAll,
    /// List collections in the database
    Collections,
}

impl Commands {
    fn needs_model(&self) -> bool {
        matches!(self, Commands::Index { .. } | Commands::Search { .. })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
async fn run() -> anyhow::Result<bool> {
    let args = Args::parse();
    let config = SearchConfig::default()
        .with_db_path(args.db_path)
        .with_collection_name(args.collection)
        .with_model_name(args.model)
        .with_model_cache_dir(args.model_cache_dir);

    let provider: Arc<dyn ImageEmbeddingProvider> = if args.command.needs_model() {
        // Model load failure is fatal, there is no degraded mode
        Arc::new(FastEmbedProvider::create(config.embed_config()?).await?)
    } else {
        // Never embeds, so the model setting is not even parsed
        Arc::new(FastEmbedProvider::new(EmbedConfig::default()))
    };

    let store = SqliteStore::open(&config.db_path).await?;
    let search = ImageSearch::new(store, provider, config.collection_name.clone());
    if let Err(e) = search.bind().await {
        tracing::error!("Could not open collection '{}': {e}", config.collection_name);
    }

    match args.command {
        Commands::Index { folder } => print(search.index_images(&folder, &TracingSink).await),
        Commands::Search { image, n_results } => {
            let bytes = tokio::fs::read(&image).await?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            print(search.search_similar_img(&encoded, n_results).await)
        }
        Commands::Get { id } => print(search.get_image_by_id(&id).await),
        Commands::Count => print(search.get_count().await),
        Commands::DeleteAll => print(search.delete_all().await),
        Commands::Collections => print(search.list_collections().await),
    }
}

fn print<T: Serialize>(envelope: Envelope<T>) -> anyhow::Result<bool> {
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.success)
}
