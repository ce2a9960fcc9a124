use crate::error::{ProcessingError, Result};
use crate::models::{RawArrayDocument, RawNestedDocument};
use crate::utils::constants::{
    ARRAY_SOURCE_DIR, DOCUMENT_EXTENSION, LOCATION_SEPARATOR, NESTED_SOURCE_DIR,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Raw documents produced by the fetcher, keyed by location.
///
/// A `None` document means the fetcher produced nothing for that location in
/// this window; the pipeline skips such locations.
pub trait DocumentSource: Send + Sync {
    fn locations(&self) -> Result<Vec<String>>;

    fn array_document(&self, location: &str) -> Result<Option<RawArrayDocument>>;

    fn nested_document(&self, location: &str) -> Result<Option<RawNestedDocument>>;
}

/// Reads `<root>/array/<island>/<name>.json` and `<root>/nested/<island>/<name>.json`.
pub struct DirectoryDocumentSource {
    root: PathBuf,
}

impl DirectoryDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, source_dir: &str, location: &str) -> PathBuf {
        let mut path = self.root.join(source_dir);
        let mut parts = location.split(LOCATION_SEPARATOR).peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                path.push(part);
            } else {
                path.push(format!("{}.{}", part, DOCUMENT_EXTENSION));
            }
        }
        path
    }

    fn read_document(&self, source_dir: &str, location: &str) -> Result<Option<String>> {
        let path = self.document_path(source_dir, location);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Collect location ids from every `.json` file below `dir`
    fn collect_locations(dir: &Path, prefix: &[String], out: &mut BTreeSet<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if path.is_dir() {
                let mut nested = prefix.to_vec();
                nested.push(name.to_string());
                Self::collect_locations(&path, &nested, out)?;
            } else if path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    let mut parts = prefix.to_vec();
                    parts.push(stem.to_string());
                    out.insert(parts.join(&LOCATION_SEPARATOR.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl DocumentSource for DirectoryDocumentSource {
    /// Union of the locations found under both source directories, sorted
    /// and de-duplicated.
    fn locations(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(ProcessingError::Config(format!(
                "Input directory not found: {}",
                self.root.display()
            )));
        }

        let mut locations = BTreeSet::new();
        for source_dir in [ARRAY_SOURCE_DIR, NESTED_SOURCE_DIR] {
            let dir = self.root.join(source_dir);
            if dir.is_dir() {
                Self::collect_locations(&dir, &[], &mut locations)?;
            }
        }
        Ok(locations.into_iter().collect())
    }

    fn array_document(&self, location: &str) -> Result<Option<RawArrayDocument>> {
        self.read_document(ARRAY_SOURCE_DIR, location)?
            .map(|json| RawArrayDocument::from_json_str(&json))
            .transpose()
    }

    fn nested_document(&self, location: &str) -> Result<Option<RawNestedDocument>> {
        self.read_document(NESTED_SOURCE_DIR, location)?
            .map(|json| RawNestedDocument::from_json_str(&json))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_locations_are_union_of_both_sources() {
        let dir = TempDir::new().unwrap();
        let nested = r#"{"latitude": 20.9, "longitude": -156.4, "days": []}"#;
        let array = r#"{"latitude": 20.9, "longitude": -156.4, "daily": {"date": []}}"#;
        write(dir.path(), "array/Maui/Kahului.json", array);
        write(dir.path(), "nested/Maui/Kahului.json", nested);
        write(dir.path(), "nested/Oahu/Honolulu.json", nested);
        write(dir.path(), "array/Oahu/notes.txt", "ignored");

        let source = DirectoryDocumentSource::new(dir.path());
        assert_eq!(
            source.locations().unwrap(),
            vec!["Maui/Kahului".to_string(), "Oahu/Honolulu".to_string()]
        );

        assert!(source.array_document("Maui/Kahului").unwrap().is_some());
        assert!(source.array_document("Oahu/Honolulu").unwrap().is_none());
        assert!(source.nested_document("Oahu/Honolulu").unwrap().is_some());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let source = DirectoryDocumentSource::new("/definitely/not/here");
        assert!(source.locations().is_err());
    }
}
