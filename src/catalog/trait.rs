use crate::models::{CatalogHit, CatalogItem};
use anyhow::Result;

/// Trait for catalogs that can store embedded fashion items and retrieve
/// nearest neighbors for a query vector
#[async_trait::async_trait]
pub trait CatalogIndex: Send + Sync {
    /// Upsert one catalog item
    async fn add_item(&self, item: &CatalogItem) -> Result<()>;

    /// Upsert a batch of catalog items
    async fn add_items(&self, items: &[CatalogItem]) -> Result<()>;

    /// Return the `limit` items nearest to the query embedding
    async fn search_vector(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogHit>>;
}
