use crate::constants::IMAGE_EXTENSIONS;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Encode raw image bytes to base64 for transport
pub fn encode_image_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Read an image file and return its base64-encoded contents
pub fn read_image_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image file: {}", path.display()))?;
    Ok(encode_image_base64(&bytes))
}

/// Get file extension from path (without the dot)
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

/// Check whether the path looks like a supported catalog image
pub fn is_image_file(path: &Path) -> bool {
    get_extension(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// List supported image files directly under a directory
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        if entry.path().is_file() && is_image_file(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    // WalkDir order is platform-dependent; sort so sampling is reproducible
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_image_base64() {
        let encoded = encode_image_base64(b"hello");
        assert_eq!(encoded, "aGVsbG8=");
    }

    #[test]
    fn test_get_extension_lowercase() {
        let path = Path::new("/images/photo.JPG");
        assert_eq!(get_extension(path), Some("jpg".to_string()));
    }

    #[test]
    fn test_get_extension_no_extension() {
        let path = Path::new("/images/photo");
        assert_eq!(get_extension(path), None);
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("a.jpeg")));
        assert!(is_image_file(Path::new("a.png")));
        assert!(!is_image_file(Path::new("a.gif")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("a")));
    }

    #[test]
    fn test_read_image_base64_missing_file() {
        let result = read_image_base64(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn test_list_image_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.jpg"), b"x").unwrap();

        let files = list_image_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn test_list_image_files_not_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(list_image_files(file.path()).is_err());
    }
}
