//! Intent catalog: the labeled example sentences and canned responses the
//! vocabulary is built from.
//!
//! ```json
//! { "intents": [
//!     { "tag": "noanswer", "patterns": [], "responses": ["Je n'ai pas compris..."], "context": [] },
//!     { "tag": "hello_intent", "patterns": ["Hello !", "hi"], "responses": ["Hey you !", "Hello."] }
//! ] }
//! ```

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Tag of the mandatory fallback intent, answered whenever no prediction is confident enough
pub const NOANSWER_TAG: &str = "noanswer";

/// One entry of the catalog. A tag may be split across several entries.
///
/// Every field is optional at parse time so that an empty `{}` can be told
/// apart from a record that is missing its tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRecord {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
    #[serde(default)]
    pub responses: Option<Vec<String>>,
    /// Accepted and ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl IntentRecord {
    pub fn new(tag: &str, patterns: &[&str], responses: &[&str]) -> Self {
        Self {
            tag: Some(tag.to_string()),
            patterns: Some(patterns.iter().map(|p| p.to_string()).collect()),
            responses: Some(responses.iter().map(|r| r.to_string()).collect()),
            context: None,
        }
    }

    /// An entry with no key at all (`{}`), skipped during ingestion.
    /// A key that is present counts even when its value is empty.
    pub fn is_blank(&self) -> bool {
        self.tag.is_none()
            && self.patterns.is_none()
            && self.responses.is_none()
            && self.context.is_none()
    }
}

/// A record whose required fields have been checked
#[derive(Debug, Clone, Copy)]
pub struct ValidIntent<'a> {
    pub tag: &'a str,
    pub patterns: &'a [String],
    pub responses: &'a [String],
}

/// The whole `{ "intents": [...] }` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentCatalog {
    pub intents: Vec<IntentRecord>,
}

impl IntentCatalog {
    pub fn new(intents: Vec<IntentRecord>) -> Self {
        Self { intents }
    }

    /// Parse a catalog from its JSON text
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|e| AppError::MalformedCatalog(e.to_string()))
    }

    /// Read a catalog file. Fails with `NotFound` before reading anything if the path is not a file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.is_file() {
            return Err(AppError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        info!(
            "Loaded intent catalog {:?} ({} entries)",
            path,
            catalog.intents.len()
        );
        Ok(catalog)
    }

    /// Check every non-blank record has a tag and responses.
    pub fn validated(&self) -> Result<Vec<ValidIntent<'_>>, AppError> {
        let mut valid = Vec::with_capacity(self.intents.len());

        for (index, record) in self.intents.iter().enumerate() {
            if record.is_blank() {
                continue;
            }

            let tag = match record.tag.as_deref() {
                Some(tag) if !tag.trim().is_empty() => tag,
                Some(_) => {
                    return Err(AppError::MalformedCatalog(format!(
                        "intent #{} has an empty tag",
                        index
                    )))
                }
                None => {
                    return Err(AppError::MalformedCatalog(format!(
                        "intent #{} has no tag",
                        index
                    )))
                }
            };

            let responses = record.responses.as_deref().ok_or_else(|| {
                AppError::MalformedCatalog(format!("intent '{}' (#{}) has no responses", tag, index))
            })?;

            valid.push(ValidIntent {
                tag,
                patterns: record.patterns.as_deref().unwrap_or_default(),
                responses,
            });
        }

        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_format() {
        let json = r#"{
            "intents": [
                {"tag": "noanswer", "patterns": [], "responses": ["Je n'ai pas compris..."], "context": []},
                {"tag": "hello_intent", "patterns": ["Hello !", "hi"], "responses": ["Hey you !", "Hello."], "context": ["other_intent"]}
            ]
        }"#;

        let catalog = IntentCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.intents.len(), 2);

        let expected = IntentRecord {
            context: Some(serde_json::json!(["other_intent"])),
            ..IntentRecord::new("hello_intent", &["Hello !", "hi"], &["Hey you !", "Hello."])
        };
        assert_eq!(catalog.intents[1], expected);
    }

    #[test]
    fn test_missing_intents_key_is_malformed() {
        let result = IntentCatalog::from_json_str(r#"{"tags": []}"#);
        assert!(matches!(result, Err(AppError::MalformedCatalog(_))));
    }

    #[test]
    fn test_missing_patterns_defaults_to_empty() {
        let catalog =
            IntentCatalog::from_json_str(r#"{"intents": [{"tag": "noanswer", "responses": ["?"]}]}"#)
                .unwrap();
        assert!(catalog.intents[0].patterns.is_none());
        assert!(catalog.validated().unwrap()[0].patterns.is_empty());
    }

    #[test]
    fn test_validated_rejects_missing_tag() {
        let catalog =
            IntentCatalog::from_json_str(r#"{"intents": [{"patterns": ["hi"], "responses": ["hey"]}]}"#)
                .unwrap();
        assert!(matches!(catalog.validated(), Err(AppError::MalformedCatalog(_))));
    }

    #[test]
    fn test_validated_rejects_missing_responses() {
        let catalog =
            IntentCatalog::from_json_str(r#"{"intents": [{"tag": "greeting", "patterns": ["hi"]}]}"#)
                .unwrap();
        let err = catalog.validated().unwrap_err();
        assert!(err.to_string().contains("greeting"));
    }

    #[test]
    fn test_blank_records_are_skipped() {
        let catalog = IntentCatalog::from_json_str(
            r#"{"intents": [{}, {"tag": "noanswer", "patterns": [], "responses": ["?"]}]}"#,
        )
        .unwrap();
        let valid = catalog.validated().unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].tag, NOANSWER_TAG);
    }

    #[test]
    fn test_records_with_keys_but_no_tag_are_malformed() {
        for record in [
            r#"{"patterns": []}"#,
            r#"{"context": ["x"]}"#,
            r#"{"patterns": [], "context": []}"#,
            r#"{"responses": []}"#,
        ] {
            let json = format!(
                r#"{{"intents": [{}, {{"tag": "noanswer", "patterns": [], "responses": ["?"]}}]}}"#,
                record
            );
            let catalog = IntentCatalog::from_json_str(&json).unwrap();
            assert!(
                matches!(catalog.validated(), Err(AppError::MalformedCatalog(_))),
                "{} should be rejected",
                record
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = IntentCatalog::load(Path::new("/nonexistent/intents.json"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
