pub mod meili;
pub mod r#trait;

pub use meili::MeilisearchCatalog;
pub use r#trait::CatalogIndex;
