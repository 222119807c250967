use crate::models::CatalogHit;
use anyhow::Result;

/// Trait for services that can narrate a styling recommendation from the
/// client's context and the retrieved catalog items
#[async_trait::async_trait]
pub trait Stylist: Send + Sync {
    /// Write a short, friendly paragraph explaining why the retrieved
    /// items fit the client's style
    async fn narrate(&self, client_context: &str, hits: &[CatalogHit]) -> Result<String>;
}
