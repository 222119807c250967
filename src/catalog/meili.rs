use crate::catalog::CatalogIndex;
use crate::models::{CatalogHit, CatalogItem, Category, Color, Gender, Occasion};
use anyhow::{Context, Result};
use meilisearch_sdk::{client::Client, indexes::Index};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Name of the user-provided embedder configured on the index
const EMBEDDER_NAME: &str = "clip";

/// Document structure stored in Meilisearch
#[derive(Debug, Serialize, Deserialize)]
struct CatalogDoc {
    id: String,
    file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    occasion: Option<Occasion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
    /// User-provided vectors, keyed by embedder name. Not returned on
    /// search hits unless explicitly requested.
    #[serde(rename = "_vectors", skip_serializing_if = "Option::is_none")]
    vectors: Option<HashMap<String, Vec<f32>>>,
}

/// One raw search hit: the document plus Meilisearch's ranking score
#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(flatten)]
    doc: CatalogDoc,
    #[serde(rename = "_rankingScore")]
    ranking_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    hits: Vec<RawHit>,
}

/// Generate a stable document id from the catalog file name
pub(crate) fn generate_item_id(file_name: &str) -> String {
    let hash = blake3::hash(file_name.as_bytes());
    format!("item_{}", &hash.to_hex()[..32])
}

/// Meilisearch implementation of the CatalogIndex trait.
///
/// Documents are written through the SDK; embedder settings and vector
/// search go over raw HTTP, which the SDK does not cover.
pub struct MeilisearchCatalog {
    index: Index,
    url: String,
    api_key: Option<String>,
}

impl MeilisearchCatalog {
    /// Create a new catalog, ensuring the index exists with `id` as primary
    /// key and a user-provided embedder of the given dimension
    pub async fn new(
        url: &str,
        api_key: Option<&str>,
        index_name: &str,
        dimensions: usize,
    ) -> Result<Self> {
        let client = if let Some(key) = api_key {
            Client::new(url, Some(key.to_string()))?
        } else {
            Client::new(url, None::<String>)?
        };

        let create_result = client.create_index(index_name, Some("id")).await;
        if let Err(e) = create_result {
            let error_msg = e.to_string();
            // Ignore error if index already exists
            if !error_msg.contains("already exists") && !error_msg.contains("index_already_exists") {
                return Err(e).context("Failed to create catalog index");
            }
        }

        let catalog = Self {
            index: client.index(index_name),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.to_string()),
        };
        catalog.configure_embedder(dimensions).await?;

        Ok(catalog)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Register the user-provided embedder on the index settings
    async fn configure_embedder(&self, dimensions: usize) -> Result<()> {
        let client = reqwest::Client::new();
        let endpoint = format!("{}/indexes/{}/settings", self.url, self.index.uid);

        let body = json!({
            "embedders": {
                EMBEDDER_NAME: {
                    "source": "userProvided",
                    "dimensions": dimensions,
                }
            }
        });

        let response = self
            .authorized(client.patch(&endpoint))
            .json(&body)
            .send()
            .await
            .context("Failed to reach Meilisearch for embedder settings")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to configure embedder ({}): {}", status, text);
        }

        Ok(())
    }

    fn to_doc(item: &CatalogItem) -> CatalogDoc {
        let mut vectors = HashMap::new();
        vectors.insert(EMBEDDER_NAME.to_string(), item.embedding.clone());

        CatalogDoc {
            id: generate_item_id(&item.file_name),
            file_name: item.file_name.clone(),
            description: item.description.clone(),
            category: item.category,
            gender: item.gender,
            occasion: item.occasion,
            color: item.color,
            vectors: Some(vectors),
        }
    }
}

#[async_trait::async_trait]
impl CatalogIndex for MeilisearchCatalog {
    async fn add_item(&self, item: &CatalogItem) -> Result<()> {
        self.add_items(std::slice::from_ref(item)).await
    }

    async fn add_items(&self, items: &[CatalogItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let docs: Vec<CatalogDoc> = items.iter().map(Self::to_doc).collect();

        // add_documents with the same id updates the existing document
        self.index
            .add_documents(&docs, Some("id"))
            .await
            .context("Failed to add catalog items to Meilisearch")?;

        Ok(())
    }

    async fn search_vector(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogHit>> {
        let client = reqwest::Client::new();
        let endpoint = format!("{}/indexes/{}/search", self.url, self.index.uid);

        let body = json!({
            "vector": embedding,
            "limit": limit,
            "hybrid": {
                "embedder": EMBEDDER_NAME,
                "semanticRatio": 1.0,
            },
            "showRankingScore": true,
        });

        let response = self
            .authorized(client.post(&endpoint))
            .json(&body)
            .send()
            .await
            .context("Failed to reach Meilisearch for vector search")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Vector search failed ({}): {}", status, text);
        }

        let results: RawSearchResponse = response
            .json()
            .await
            .context("Failed to parse vector search response")?;

        Ok(results
            .hits
            .into_iter()
            .map(|hit| CatalogHit {
                file_name: hit.doc.file_name,
                description: hit.doc.description,
                category: hit.doc.category,
                gender: hit.doc.gender,
                occasion: hit.doc.occasion,
                color: hit.doc.color,
                score: hit.ranking_score,
            })
            .collect())
    }
}
