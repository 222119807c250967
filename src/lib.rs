pub mod annotator;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod models;
pub mod recommender;
pub mod utils;

pub use annotator::{AnnotationPool, LabelError, RetryPolicy, VisionLabeler};
pub use catalog::CatalogIndex;
pub use embeddings::EmbeddingProvider;
pub use models::{Annotation, AnnotationRecord, CatalogHit, CatalogItem, StyleProfile};
pub use recommender::Stylist;
