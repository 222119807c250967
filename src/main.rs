use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stylesync::{
    annotator::{AnnotationPool, OpenAiVisionLabeler, RetryPolicy},
    catalog::{CatalogIndex, MeilisearchCatalog},
    config::Config,
    embeddings::{ClipEmbeddingProvider, EmbeddingProvider},
    models::{AnnotationRecord, CatalogItem, StyleProfile},
    recommender::{OpenAiStylist, Stylist},
    utils,
};

#[derive(Parser)]
#[command(name = "stylesync")]
#[command(about = "StyleSync — vision-tagged fashion catalog with semantic search and styling advice")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label every image in a directory with the vision model and write
    /// the results to a CSV file
    Annotate {
        /// Directory of catalog images (.jpg/.png)
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        /// Output CSV path (overwritten if present)
        #[arg(long, default_value = "data/annotations.csv")]
        output: PathBuf,
        /// Maximum simultaneous labeling requests (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Cap on the number of images sampled; 0 disables the cap (overrides config)
        #[arg(long)]
        sample_size: Option<usize>,
        /// Shuffle seed for reproducible sampling (overrides config)
        #[arg(long)]
        seed: Option<u64>,
        /// Attempts per image, including the first (overrides config)
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Delay before the first retry, in seconds (overrides config)
        #[arg(long)]
        retry_delay: Option<u64>,
        /// Overall batch deadline in seconds (overrides config)
        #[arg(long)]
        deadline: Option<u64>,
    },
    /// Embed catalog images and upsert them into the search index
    Ingest {
        /// Directory of catalog images
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        /// Annotation CSV produced by `annotate`, joined into the index
        #[arg(long)]
        annotations: Option<PathBuf>,
        /// Meilisearch URL (overrides config)
        #[arg(long)]
        meili_url: Option<String>,
        /// Meilisearch API key (overrides config and env)
        #[arg(long)]
        meili_key: Option<String>,
        /// Meilisearch index name (overrides config)
        #[arg(long)]
        index_name: Option<String>,
    },
    /// Search the catalog with a text query
    Search {
        /// Search query
        #[arg(value_name = "QUERY")]
        query: String,
        /// Number of results
        #[arg(long, default_value_t = 3)]
        limit: usize,
        /// Meilisearch URL (overrides config)
        #[arg(long)]
        meili_url: Option<String>,
        /// Meilisearch API key (overrides config and env)
        #[arg(long)]
        meili_key: Option<String>,
        /// Meilisearch index name (overrides config)
        #[arg(long)]
        index_name: Option<String>,
    },
    /// Retrieve similar items and narrate a styling recommendation
    Recommend {
        /// Free-text description of the desired style
        #[arg(long, conflicts_with = "image")]
        query: Option<String>,
        /// Image of the desired style; labeled first, then used as query
        #[arg(long)]
        image: Option<PathBuf>,
        /// Number of catalog items to retrieve
        #[arg(long, default_value_t = 3)]
        limit: usize,
        /// Free-text description of the client's personal style
        #[arg(long)]
        style: Option<String>,
        /// Colors the client enjoys wearing
        #[arg(long)]
        colors: Option<String>,
        /// Preferred patterns
        #[arg(long)]
        patterns: Option<String>,
        /// Classic/timeless versus trend-forward
        #[arg(long)]
        preference: Option<String>,
        /// Admired fashion icons or designers
        #[arg(long)]
        designers: Option<String>,
        /// Target occasion (repeatable)
        #[arg(long = "occasion")]
        occasions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();

    match cli.command {
        Commands::Annotate {
            dir,
            output,
            concurrency,
            sample_size,
            seed,
            max_attempts,
            retry_delay,
            deadline,
        } => {
            let mut annotator = config.annotator.clone();
            if let Some(v) = concurrency {
                annotator.concurrency = v;
            }
            if let Some(v) = sample_size {
                annotator.sample_size = v;
            }
            if let Some(v) = seed {
                annotator.shuffle_seed = Some(v);
            }
            if let Some(v) = max_attempts {
                annotator.max_attempts = v;
            }
            if let Some(v) = retry_delay {
                annotator.retry_delay_secs = v;
            }
            if let Some(v) = deadline {
                annotator.batch_deadline_secs = Some(v);
            }
            annotate_command(&config, &annotator, &dir, &output).await
        }
        Commands::Ingest {
            dir,
            annotations,
            meili_url,
            meili_key,
            index_name,
        } => {
            let catalog = open_catalog(&config, meili_url, meili_key, index_name).await?;
            ingest_command(&config, &catalog, &dir, annotations.as_deref()).await
        }
        Commands::Search {
            query,
            limit,
            meili_url,
            meili_key,
            index_name,
        } => {
            let catalog = open_catalog(&config, meili_url, meili_key, index_name).await?;
            search_command(&config, &catalog, &query, limit).await
        }
        Commands::Recommend {
            query,
            image,
            limit,
            style,
            colors,
            patterns,
            preference,
            designers,
            occasions,
        } => {
            let profile = StyleProfile {
                style_description: style,
                colors,
                patterns,
                style_preference: preference,
                icons_designers: designers,
                occasions,
            };
            let catalog = open_catalog(&config, None, None, None).await?;
            recommend_command(&config, &catalog, query, image.as_deref(), limit, &profile).await
        }
    }
}

fn require_openai_key(config: &Config) -> Result<String> {
    config
        .openai_api_key()
        .context("OpenAI API key not configured (set [openai].api_key or OPENAI_API_KEY)")
}

fn retry_policy_from(annotator: &stylesync::config::AnnotatorConfig) -> RetryPolicy {
    let initial = annotator.retry_delay();
    RetryPolicy {
        max_attempts: annotator.max_attempts,
        initial_delay: initial,
        multiplier: annotator.backoff_multiplier,
        max_delay: initial.max(Duration::from_secs(60)),
        jitter: annotator.jitter,
    }
}

fn build_pool(
    config: &Config,
    annotator: &stylesync::config::AnnotatorConfig,
) -> Result<AnnotationPool> {
    let api_key = require_openai_key(config)?;
    let labeler = Arc::new(OpenAiVisionLabeler::new(
        &config.openai.api_base,
        &api_key,
        &config.openai.vision_model,
        annotator.request_timeout(),
    )?);

    let mut pool = AnnotationPool::new(labeler, annotator.concurrency, retry_policy_from(annotator))?;
    if let Some(deadline) = annotator.batch_deadline() {
        pool = pool.with_deadline(deadline);
    }
    Ok(pool)
}

async fn open_catalog(
    config: &Config,
    meili_url: Option<String>,
    meili_key: Option<String>,
    index_name: Option<String>,
) -> Result<MeilisearchCatalog> {
    let url = meili_url.unwrap_or_else(|| config.meilisearch.url.clone());
    let key = meili_key.or_else(|| config.meilisearch_api_key());
    let index_name = index_name.unwrap_or_else(|| config.meilisearch.index_name.clone());

    MeilisearchCatalog::new(&url, key.as_deref(), &index_name, config.clip.dims)
        .await
        .context("Failed to open catalog index")
}

async fn annotate_command(
    config: &Config,
    annotator: &stylesync::config::AnnotatorConfig,
    dir: &Path,
    output: &Path,
) -> Result<()> {
    println!("Annotating images in: {}", dir.display());

    let mut files = utils::list_image_files(dir)?;
    println!("Found {} image(s)", files.len());

    // Shuffle, then truncate to the working sample
    let mut rng = match annotator.shuffle_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    files.shuffle(&mut rng);
    if annotator.sample_size > 0 && files.len() > annotator.sample_size {
        files.truncate(annotator.sample_size);
        println!("Sampled {} image(s)", files.len());
    }

    let pool = build_pool(config, annotator)?;

    println!(
        "🚀 Labeling with {} (max {} concurrent requests, {} attempt(s) per image)...",
        config.openai.vision_model, annotator.concurrency, annotator.max_attempts
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} images ({msg})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let records = pool
        .run_batch_with_progress(&files, |record| {
            pb.set_message(record.file_name.clone());
            pb.inc(1);
        })
        .await;
    pb.finish_with_message("done");

    let failed = records.iter().filter(|r| !r.is_annotated()).count();

    write_annotations_csv(output, &records)?;
    println!(
        "✓ Wrote {} row(s) to {} ({} failed)",
        records.len(),
        output.display(),
        failed
    );
    if failed > 0 {
        println!("ℹ️  Failed rows keep their file_name with empty fields; filter and re-run to re-queue them");
    }

    Ok(())
}

/// Persist the result set as a flat CSV table, one row per input image.
/// Overwrites any previous file at that path.
fn write_annotations_csv(path: &Path, records: &[AnnotationRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open output file: {}", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .context("Failed to write annotation row")?;
    }
    writer.flush().context("Failed to flush output file")?;

    Ok(())
}

/// Load an annotation CSV back into a map keyed by file name
fn read_annotations_csv(path: &Path) -> Result<HashMap<String, AnnotationRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read annotations: {}", path.display()))?;

    let mut by_name = HashMap::new();
    for row in reader.deserialize() {
        let record: AnnotationRecord = row.context("Failed to parse annotation row")?;
        by_name.insert(record.file_name.clone(), record);
    }
    Ok(by_name)
}

async fn ingest_command(
    config: &Config,
    catalog: &MeilisearchCatalog,
    dir: &Path,
    annotations: Option<&Path>,
) -> Result<()> {
    println!("Ingesting images from: {}", dir.display());

    let files = utils::list_image_files(dir)?;
    println!("Found {} image(s)", files.len());

    let annotations = match annotations {
        Some(path) => {
            let map = read_annotations_csv(path)?;
            println!("Loaded {} annotation row(s) from {}", map.len(), path.display());
            map
        }
        None => HashMap::new(),
    };

    let provider = ClipEmbeddingProvider::new(Some(&config.clip.url), Some(config.clip.dims));
    println!(
        "📊 Embedding with CLIP server at {} ({} dimensions)",
        config.clip.url,
        provider.dimension()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} images ({msg})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let concurrency = config.annotator.concurrency.max(1);
    let provider_ref = &provider;
    let annotations_ref = &annotations;
    let pb_ref = &pb;

    let items: Vec<CatalogItem> = stream::iter(files.iter())
        .map(|path| async move {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());

            let result = async {
                let image_base64 = utils::read_image_base64(path)?;
                provider_ref.embed_image(&image_base64).await
            }
            .await;

            pb_ref.set_message(file_name.clone());
            pb_ref.inc(1);

            match result {
                Ok(embedding) => Some(CatalogItem::new(
                    file_name.clone(),
                    embedding,
                    annotations_ref.get(&file_name),
                )),
                Err(e) => {
                    eprintln!("Warning: failed to embed {}: {}", file_name, e);
                    None
                }
            }
        })
        .buffer_unordered(concurrency)
        .filter_map(|item| async move { item })
        .collect()
        .await;
    pb.finish_with_message("done");

    let skipped = files.len() - items.len();
    for chunk in items.chunks(100) {
        catalog.add_items(chunk).await?;
    }

    println!("✓ Indexed {} item(s) ({} skipped)", items.len(), skipped);
    Ok(())
}

async fn search_command(
    config: &Config,
    catalog: &MeilisearchCatalog,
    query: &str,
    limit: usize,
) -> Result<()> {
    let provider = ClipEmbeddingProvider::new(Some(&config.clip.url), Some(config.clip.dims));
    let embedding = provider
        .embed_text(query)
        .await
        .context("Failed to embed query")?;

    let hits = catalog.search_vector(&embedding, limit).await?;
    if hits.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }

    println!("Results for \"{}\":", query);
    for (i, hit) in hits.iter().enumerate() {
        let score = hit
            .score
            .map(|s| format!(" (score {:.3})", s))
            .unwrap_or_default();
        println!("{}. {}{}", i + 1, hit.file_name, score);
        if let Some(description) = &hit.description {
            println!("   {}", description);
        }
    }
    Ok(())
}

async fn recommend_command(
    config: &Config,
    catalog: &MeilisearchCatalog,
    query: Option<String>,
    image: Option<&Path>,
    limit: usize,
    profile: &StyleProfile,
) -> Result<()> {
    // Derive the query text: either given directly, or extracted from an
    // example image via the vision model
    let (query_text, image_context) = match (query, image) {
        (Some(text), _) => (text, None),
        (None, Some(path)) => {
            println!("Labeling example image: {}", path.display());
            let pool = build_pool(config, &config.annotator)?;
            let record = pool.annotate_one(path).await;
            let description = record.description.clone().context(
                "Could not label the example image; try again or pass --query instead",
            )?;
            println!("Image description: {}", description);
            (description, Some(record))
        }
        (None, None) => anyhow::bail!("Pass either --query or --image"),
    };

    let provider = ClipEmbeddingProvider::new(Some(&config.clip.url), Some(config.clip.dims));
    let embedding = provider
        .embed_text(&query_text)
        .await
        .context("Failed to embed query")?;

    let hits = catalog.search_vector(&embedding, limit).await?;
    if hits.is_empty() {
        println!("No matching catalog items found");
        return Ok(());
    }

    println!("Retrieved {} item(s):", hits.len());
    for hit in &hits {
        println!("  - {}", hit.file_name);
    }

    let mut client_context = String::new();
    if let Some(record) = image_context {
        client_context.push_str(&format!("Example image: {}\n", record.file_name));
    }
    client_context.push_str(&format!("Desired style: {}\n", query_text));
    let profile_text = profile.to_prompt_text();
    if !profile_text.is_empty() {
        client_context.push_str(&profile_text);
    }

    let api_key = require_openai_key(config)?;
    let stylist = OpenAiStylist::new(&config.openai.api_base, &api_key, &config.openai.chat_model);
    let narration = stylist
        .narrate(&client_context, &hits)
        .await
        .context("Failed to generate recommendation")?;

    println!("\n{}", narration);
    Ok(())
}
