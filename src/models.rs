use serde::{Deserialize, Serialize};

/// Clothing category assigned by the vision model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Top,
    Bottom,
    // "one piece" appears in an older prompt variant
    #[serde(alias = "one piece")]
    OnePiece,
    Outerwear,
    Shoes,
    Accessories,
    Hats,
}

/// Target gender assigned by the vision model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

/// Occasion the clothing item suits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Occasion {
    Work,
    Leisure,
    Formal,
}

/// Dominant color assigned by the vision model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Black,
    White,
    Grey,
    Brown,
    Orange,
    Purple,
    Pink,
    #[serde(alias = "multi color", alias = "multicolor")]
    MultiColor,
}

/// Structured labeling reply for one image.
///
/// This is the strict wire schema: the vision model must return exactly
/// these five keys, so unknown keys are rejected and anything off-enum
/// fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Annotation {
    pub description: String,
    pub category: Category,
    pub gender: Gender,
    pub occasion: Occasion,
    pub color: Color,
}

/// One row of the annotation result set.
///
/// Every input image produces exactly one record. On terminal failure the
/// file name is kept and every other field is null, so downstream consumers
/// can filter or re-queue failed rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub file_name: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub gender: Option<Gender>,
    pub occasion: Option<Occasion>,
    pub color: Option<Color>,
}

impl AnnotationRecord {
    /// Build a fully populated record from a successful annotation
    pub fn from_annotation(file_name: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            file_name: file_name.into(),
            description: Some(annotation.description),
            category: Some(annotation.category),
            gender: Some(annotation.gender),
            occasion: Some(annotation.occasion),
            color: Some(annotation.color),
        }
    }

    /// Build a null-filled record for an image that could not be annotated
    pub fn failed(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            description: None,
            category: None,
            gender: None,
            occasion: None,
            color: None,
        }
    }

    /// Whether the annotation succeeded
    pub fn is_annotated(&self) -> bool {
        self.category.is_some()
    }
}

/// A catalog entry ready for indexing: one image with its embedding and any
/// annotation metadata produced by the labeling pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub file_name: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub gender: Option<Gender>,
    pub occasion: Option<Occasion>,
    pub color: Option<Color>,
    pub embedding: Vec<f32>,
}

impl CatalogItem {
    /// Build a catalog item from an embedding plus an optional annotation row
    pub fn new(file_name: impl Into<String>, embedding: Vec<f32>, record: Option<&AnnotationRecord>) -> Self {
        Self {
            file_name: file_name.into(),
            description: record.and_then(|r| r.description.clone()),
            category: record.and_then(|r| r.category),
            gender: record.and_then(|r| r.gender),
            occasion: record.and_then(|r| r.occasion),
            color: record.and_then(|r| r.color),
            embedding,
        }
    }
}

/// One nearest-neighbor search result from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogHit {
    pub file_name: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub gender: Option<Gender>,
    pub occasion: Option<Occasion>,
    pub color: Option<Color>,
    /// Similarity score reported by the index, when available
    pub score: Option<f64>,
}

/// Explicit style-preference input for the recommendation flow.
///
/// Replaces the session-keyed form state of the original UI: the
/// recommender only ever sees this struct, never global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleProfile {
    /// Free-text description of the client's personal style
    pub style_description: Option<String>,
    /// Colors the client enjoys wearing
    pub colors: Option<String>,
    /// Preferred patterns (stripes, floral, ...)
    pub patterns: Option<String>,
    /// Classic/timeless versus trend-forward
    pub style_preference: Option<String>,
    /// Fashion icons or designers the client admires
    pub icons_designers: Option<String>,
    /// Events the client needs outfits for
    pub occasions: Vec<String>,
}

impl StyleProfile {
    /// Render the profile as the plain-text client context sent to the model
    pub fn to_prompt_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(desc) = &self.style_description {
            lines.push(format!("Personal style: {}", desc));
        }
        if let Some(colors) = &self.colors {
            lines.push(format!("Preferred colors: {}", colors));
        }
        if let Some(patterns) = &self.patterns {
            lines.push(format!("Preferred patterns: {}", patterns));
        }
        if let Some(pref) = &self.style_preference {
            lines.push(format!("Style preference: {}", pref));
        }
        if let Some(icons) = &self.icons_designers {
            lines.push(format!("Admired icons/designers: {}", icons));
        }
        if !self.occasions.is_empty() {
            lines.push(format!("Occasions: {}", self.occasions.join(", ")));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_round_trip() {
        let raw = r#"{"description":"d","category":"top","gender":"unisex","occasion":"work","color":"blue"}"#;
        let annotation: Annotation = serde_json::from_str(raw).unwrap();
        assert_eq!(annotation.description, "d");
        assert_eq!(annotation.category, Category::Top);
        assert_eq!(annotation.gender, Gender::Unisex);
        assert_eq!(annotation.occasion, Occasion::Work);
        assert_eq!(annotation.color, Color::Blue);

        let serialized = serde_json::to_string(&annotation).unwrap();
        let back: Annotation = serde_json::from_str(&serialized).unwrap();
        assert_eq!(annotation, back);
    }

    #[test]
    fn test_kebab_case_values() {
        assert_eq!(serde_json::to_string(&Category::OnePiece).unwrap(), "\"one-piece\"");
        assert_eq!(serde_json::to_string(&Color::MultiColor).unwrap(), "\"multi-color\"");
        assert_eq!(serde_json::to_string(&Occasion::Leisure).unwrap(), "\"leisure\"");
    }

    #[test]
    fn test_legacy_value_aliases() {
        let category: Category = serde_json::from_str("\"one piece\"").unwrap();
        assert_eq!(category, Category::OnePiece);
        let color: Color = serde_json::from_str("\"multi color\"").unwrap();
        assert_eq!(color, Color::MultiColor);
    }

    #[test]
    fn test_annotation_rejects_extra_keys() {
        let raw = r#"{"description":"d","category":"top","gender":"unisex","occasion":"work","color":"blue","note":"x"}"#;
        assert!(serde_json::from_str::<Annotation>(raw).is_err());
    }

    #[test]
    fn test_annotation_rejects_missing_description() {
        let raw = r#"{"category":"top","gender":"unisex","occasion":"work","color":"blue"}"#;
        assert!(serde_json::from_str::<Annotation>(raw).is_err());
    }

    #[test]
    fn test_annotation_rejects_off_enum_value() {
        let raw = r#"{"description":"d","category":"jacket","gender":"unisex","occasion":"work","color":"blue"}"#;
        assert!(serde_json::from_str::<Annotation>(raw).is_err());
    }

    #[test]
    fn test_failed_record_is_null_filled() {
        let record = AnnotationRecord::failed("a.jpg");
        assert_eq!(record.file_name, "a.jpg");
        assert!(record.description.is_none());
        assert!(record.category.is_none());
        assert!(record.gender.is_none());
        assert!(record.occasion.is_none());
        assert!(record.color.is_none());
        assert!(!record.is_annotated());
    }

    #[test]
    fn test_style_profile_prompt_text() {
        let profile = StyleProfile {
            style_description: Some("Classic".to_string()),
            colors: Some("navy and white".to_string()),
            patterns: None,
            style_preference: Some("Classic / Timeless".to_string()),
            icons_designers: None,
            occasions: vec!["Conference".to_string(), "Meeting".to_string()],
        };
        let text = profile.to_prompt_text();
        assert!(text.contains("Personal style: Classic"));
        assert!(text.contains("Occasions: Conference, Meeting"));
        assert!(!text.contains("patterns"));
    }

    #[test]
    fn test_empty_profile_prompt_text() {
        assert_eq!(StyleProfile::default().to_prompt_text(), "");
    }
}
