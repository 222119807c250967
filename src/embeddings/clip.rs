use crate::embeddings::EmbeddingProvider;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embedding provider backed by a CLIP-style inference server (e.g. a
/// uform model behind HTTP) that embeds text and images into one space
pub struct ClipEmbeddingProvider {
    base_url: String,
    dimension: AtomicUsize, // AtomicUsize allows runtime dimension updates (thread-safe)
}

impl ClipEmbeddingProvider {
    /// Create a new CLIP embedding provider
    /// Default URL: http://127.0.0.1:8686
    pub fn new(base_url: Option<&str>, dimension: Option<usize>) -> Self {
        Self {
            base_url: base_url.unwrap_or("http://127.0.0.1:8686").to_string(),
            dimension: AtomicUsize::new(dimension.unwrap_or(256)), // uform-vl-english-small
        }
    }

    async fn request_embedding<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<Vec<f32>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);

        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding server returned error {}: {}", status, error_text);
        }

        let embedding_response: ClipEmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        let embedding = embedding_response.embedding;
        if embedding.is_empty() {
            anyhow::bail!("Embedding server returned an empty vector");
        }

        // Keep the tracked dimension in sync with what the model returns
        let actual_dimension = embedding.len();
        let expected_dimension = self.dimension.load(Ordering::Relaxed);
        if actual_dimension != expected_dimension {
            eprintln!(
                "Info: embedding server returned dimension {} (expected {}). Updating to match.",
                actual_dimension, expected_dimension
            );
            self.dimension.store(actual_dimension, Ordering::Relaxed);
        }

        Ok(embedding)
    }
}

#[derive(Serialize)]
struct TextEmbeddingRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ImageEmbeddingRequest<'a> {
    image_base64: &'a str,
}

#[derive(Deserialize)]
struct ClipEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for ClipEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("Cannot generate embedding for empty text");
        }
        self.request_embedding("embed/text", &TextEmbeddingRequest { text })
            .await
    }

    async fn embed_image(&self, image_base64: &str) -> Result<Vec<f32>> {
        if image_base64.is_empty() {
            anyhow::bail!("Cannot generate embedding for an empty image payload");
        }
        self.request_embedding("embed/image", &ImageEmbeddingRequest { image_base64 })
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }
}
