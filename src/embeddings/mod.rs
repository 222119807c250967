pub mod clip;
pub mod r#trait;

pub use clip::ClipEmbeddingProvider;
pub use r#trait::EmbeddingProvider;
