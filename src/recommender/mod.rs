pub mod openai;
pub mod r#trait;

pub use openai::OpenAiStylist;
pub use r#trait::Stylist;
