use anyhow::Result;

/// Trait for providers that embed text and images into one joint vector
/// space, so a text query can retrieve visually similar catalog images
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute an embedding vector for a text snippet
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Compute an embedding vector for a base64-encoded image
    async fn embed_image(&self, image_base64: &str) -> Result<Vec<f32>>;

    /// Dimension of the vectors this provider produces
    fn dimension(&self) -> usize;
}
