use crate::models::Annotation;
use thiserror::Error;

/// Failure modes of a single labeling attempt.
///
/// The retry loop decides on this closed set rather than on ad hoc error
/// matching: everything except `Input` is worth retrying, since a later
/// call against the same service may succeed.
#[derive(Debug, Error)]
pub enum LabelError {
    /// The local image could not be read. Retrying cannot fix a bad file,
    /// so this fails the image immediately.
    #[error("unreadable input image: {0}")]
    Input(#[source] std::io::Error),

    /// The service rejected or failed the request (network error,
    /// rate-limit response, 5xx)
    #[error("labeling service error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Service {
        status: Option<u16>,
        message: String,
    },

    /// The per-request timeout elapsed before a response arrived
    #[error("labeling request timed out")]
    Timeout,

    /// The reply body was not the expected JSON object (prose, code
    /// fences, missing or extra keys, off-enum values)
    #[error("malformed labeling reply: {reason}")]
    Malformed {
        reason: String,
        /// Raw reply text, kept for operator diagnosis
        raw: String,
    },
}

impl LabelError {
    /// Whether a subsequent attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LabelError::Input(_))
    }
}

/// Trait for services that can label one clothing image
#[async_trait::async_trait]
pub trait VisionLabeler: Send + Sync {
    /// Issue one labeling request for a base64-encoded image and decode
    /// the structured reply. One call means one attempt; retry scheduling
    /// belongs to the caller.
    async fn label_image(&self, image_base64: &str) -> Result<Annotation, LabelError>;
}
