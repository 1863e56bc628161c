//! Embed a few images and print how similar they are to each other
//!
//! cargo run -p image-search-embed --example embed_image -- a.jpg b.png c.webp

use image_search_embed::{EmbedConfig, FastEmbedProvider, ImageEmbeddingProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: embed_image <image> [<image> ...]");
        std::process::exit(2);
    }

    let config = EmbedConfig::default().with_download_progress(true);
    println!("Loading {} (cache: {})", config.model_name(), config.cache_dir.display());
    let provider = FastEmbedProvider::create(config).await?;
    println!("Dimension: {}", provider.embedding_dimension());

    let mut images = Vec::with_capacity(paths.len());
    for path in &paths {
        images.push(std::fs::read(path)?);
    }
    let result = provider.embed_images(&images).await?;

    for (path, embedding) in paths.iter().zip(&result.embeddings) {
        println!("{path}: first values {:?}", &embedding[..4.min(embedding.len())]);
    }

    // Embeddings are normalized, so the dot product is the cosine similarity
    for i in 0..paths.len() {
        for j in (i + 1)..paths.len() {
            let similarity: f32 = result.embeddings[i]
                .iter()
                .zip(&result.embeddings[j])
                .map(|(a, b)| a * b)
                .sum();
            println!("{} <-> {}: {similarity:.3}", paths[i], paths[j]);
        }
    }

    Ok(())
}
