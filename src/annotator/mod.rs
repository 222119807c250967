pub mod openai;
pub mod pool;
pub mod retry;
pub mod r#trait;

pub use openai::{parse_annotation, OpenAiVisionLabeler};
pub use pool::AnnotationPool;
pub use retry::RetryPolicy;
pub use r#trait::{LabelError, VisionLabeler};
