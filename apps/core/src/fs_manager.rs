use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix of a persisted vocabulary, appended to the catalog's file stem
pub const VOCABULARY_SUFFIX: &str = ".vocab.json";

/// Suffix of a persisted network, appended to the model name
pub const MODEL_SUFFIX: &str = ".model.json";

/// Where training writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    output_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `intents/faq.json` -> `<output_dir>/faq.vocab.json`
    pub fn vocabulary_path(&self, catalog_path: &Path) -> PathBuf {
        let stem = catalog_path
            .file_stem()
            .and_then(OsStr::to_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("intents");
        self.output_dir.join(format!("{}{}", stem, VOCABULARY_SUFFIX))
    }

    /// `mymodel` -> `<output_dir>/mymodel.model.json`
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", model_name, MODEL_SUFFIX))
    }

    /// Create the output directory if it doesn't exist.
    pub fn init(&self) -> Result<(), std::io::Error> {
        if !self.output_dir.exists() {
            info!("Creating models directory: {:?}", self.output_dir);
            fs::create_dir_all(&self.output_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names() {
        let paths = ArtifactPaths::new("data/models");

        assert_eq!(
            paths.vocabulary_path(Path::new("assets/intents.json")),
            PathBuf::from("data/models/intents.vocab.json")
        );
        assert_eq!(
            paths.model_path("mymodel"),
            PathBuf::from("data/models/mymodel.model.json")
        );
    }

    #[test]
    fn test_init_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("nested").join("models"));

        paths.init().unwrap();
        assert!(paths.output_dir().is_dir());
        paths.init().unwrap();
    }
}
