use crate::constants::{NARRATION_MAX_TOKENS, STYLIST_SYSTEM_PROMPT};
use crate::models::CatalogHit;
use crate::recommender::Stylist;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Styling narrator backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiStylist {
    api_base: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiStylist {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

/// Render retrieved catalog items as the plain-text context block the
/// model unpacks in its narration
pub(crate) fn format_hits(hits: &[CatalogHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut parts = vec![format!("{}. {}", i + 1, hit.file_name)];
            if let Some(description) = &hit.description {
                parts.push(format!("description: {}", description));
            }
            if let Some(category) = &hit.category {
                parts.push(format!("category: {}", serde_plain_value(category)));
            }
            if let Some(occasion) = &hit.occasion {
                parts.push(format!("occasion: {}", serde_plain_value(occasion)));
            }
            if let Some(color) = &hit.color {
                parts.push(format!("color: {}", serde_plain_value(color)));
            }
            parts.join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn serde_plain_value<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
impl Stylist for OpenAiStylist {
    async fn narrate(&self, client_context: &str, hits: &[CatalogHit]) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);

        let user_message = format!(
            "[Client information]\n{}\n\n[Returned results]\n{}",
            client_context,
            format_hits(hits)
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: STYLIST_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
            temperature: 0.0,
            max_tokens: NARRATION_MAX_TOKENS,
            top_p: 0.95,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach chat completions endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Narration request failed ({}): {}", status, text);
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .context("Failed to parse narration response")?;

        envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Narration reply had no choices"))
    }
}
