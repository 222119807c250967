use crate::annotator::{LabelError, VisionLabeler};
use crate::constants::{LABEL_MAX_TOKENS, LABEL_SYSTEM_PROMPT};
use crate::models::Annotation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vision labeler backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiVisionLabeler {
    api_base: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiVisionLabeler {
    /// Create a new labeler. `request_timeout` bounds every HTTP call so a
    /// hung request cannot hold a pool slot indefinitely.
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: &str,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
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

/// Decode a labeling reply body into an `Annotation`.
///
/// The decode is strict: the body must be exactly one JSON object with the
/// five schema keys. Code fences, surrounding prose, extra keys or
/// off-enum values all fail here and surface as a retryable parse error.
pub fn parse_annotation(content: &str) -> Result<Annotation, LabelError> {
    serde_json::from_str(content.trim()).map_err(|e| LabelError::Malformed {
        reason: e.to_string(),
        raw: content.to_string(),
    })
}

#[async_trait::async_trait]
impl VisionLabeler for OpenAiVisionLabeler {
    async fn label_image(&self, image_base64: &str) -> Result<Annotation, LabelError> {
        let url = format!("{}/chat/completions", self.api_base);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(LABEL_SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", image_base64),
                            detail: "low",
                        },
                    }]),
                },
            ],
            max_tokens: LABEL_MAX_TOKENS,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LabelError::Timeout
                } else {
                    LabelError::Service {
                        status: None,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LabelError::Service {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LabelError::Timeout
            } else {
                LabelError::Service {
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

        let envelope: ChatResponse =
            serde_json::from_str(&body).map_err(|e| LabelError::Malformed {
                reason: format!("bad completion envelope: {}", e),
                raw: body.clone(),
            })?;

        let content = envelope
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| LabelError::Malformed {
                reason: "completion reply had no choices".to_string(),
                raw: body.clone(),
            })?;

        parse_annotation(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Color, Gender, Occasion};

    #[test]
    fn test_parse_annotation_canned_reply() {
        let reply = r#"{"description":"d","category":"top","gender":"unisex","occasion":"work","color":"blue"}"#;
        let annotation = parse_annotation(reply).unwrap();
        assert_eq!(annotation.description, "d");
        assert_eq!(annotation.category, Category::Top);
        assert_eq!(annotation.gender, Gender::Unisex);
        assert_eq!(annotation.occasion, Occasion::Work);
        assert_eq!(annotation.color, Color::Blue);
    }

    #[test]
    fn test_parse_annotation_tolerates_whitespace() {
        let reply = "\n  {\"description\":\"d\",\"category\":\"shoes\",\"gender\":\"female\",\"occasion\":\"formal\",\"color\":\"red\"}  \n";
        let annotation = parse_annotation(reply).unwrap();
        assert_eq!(annotation.category, Category::Shoes);
    }

    #[test]
    fn test_parse_annotation_rejects_code_fence() {
        let reply = "```json\n{\"description\":\"d\",\"category\":\"top\",\"gender\":\"unisex\",\"occasion\":\"work\",\"color\":\"blue\"}\n```";
        let err = parse_annotation(reply).unwrap_err();
        match err {
            LabelError::Malformed { raw, .. } => assert!(raw.contains("```json")),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_annotation_rejects_prose() {
        let err = parse_annotation("Sure! Here is the JSON you asked for.").unwrap_err();
        assert!(matches!(err, LabelError::Malformed { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_annotation_rejects_missing_key() {
        let reply = r#"{"description":"d","category":"top","gender":"unisex","occasion":"work"}"#;
        assert!(matches!(
            parse_annotation(reply),
            Err(LabelError::Malformed { .. })
        ));
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = ChatRequest {
            model: "gpt-4-vision-preview",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text("prompt"),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,aGk=".to_string(),
                            detail: "low",
                        },
                    }]),
                },
            ],
            max_tokens: 500,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["content"], "prompt");
        assert_eq!(value["messages"][1]["content"][0]["type"], "image_url");
        assert_eq!(
            value["messages"][1]["content"][0]["image_url"]["detail"],
            "low"
        );
    }
}
