//! Intent vocabulary: the stem axis and tag axis every feature and label
//! vector is laid out on.
//!
//! Tags are kept in a `BTreeMap` and stems in a sorted `Vec`, so both axes are
//! always in lexicographic order. A classifier trained against one vocabulary
//! is only meaningful against a vocabulary with the same two axes.
//!
//! Construction goes through [`VocabularyBuilder`]; [`VocabularyBuilder::finalize`]
//! consumes it and returns a frozen [`Vocabulary`], the only type that can encode.

use crate::brain::catalog::{IntentCatalog, NOANSWER_TAG};
use crate::brain::stemming::Normalizer;
use crate::error::AppError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Stems and answers of one intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Sorted, deduplicated stems seen in the intent's patterns
    pub stems: Vec<String>,
    /// Candidate responses, in catalog order
    pub answers: Vec<String>,
}

/// Persisted form of a vocabulary: `{ "tags": {...}, "stems": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularySnapshot {
    pub tags: BTreeMap<String, TagEntry>,
    pub stems: Vec<String>,
}

/// Feature/label matrices, one row per (tag, stem) pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingData {
    pub features: Vec<Vec<bool>>,
    pub labels: Vec<Vec<bool>>,
    /// Length of every feature vector (number of stems)
    pub feature_width: usize,
    /// Length of every label vector (number of tags)
    pub label_width: usize,
}

impl TrainingData {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Default)]
struct PendingTag {
    stems: BTreeSet<String>,
    answers: Vec<String>,
}

/// Accumulates intents before the vocabulary is frozen
#[derive(Debug, Default)]
pub struct VocabularyBuilder {
    tags: BTreeMap<String, PendingTag>,
    stems: BTreeSet<String>,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a whole catalog.
    ///
    /// The catalog is validated before anything is recorded, so a failing
    /// catalog leaves the builder untouched.
    pub fn ingest(
        &mut self,
        catalog: &IntentCatalog,
        normalizer: &Normalizer,
    ) -> Result<(), AppError> {
        let intents = catalog.validated()?;

        let fallback_answers = self
            .tags
            .get(NOANSWER_TAG)
            .map(|t| t.answers.len())
            .unwrap_or(0)
            + intents
                .iter()
                .filter(|i| i.tag == NOANSWER_TAG)
                .map(|i| i.responses.len())
                .sum::<usize>();
        let fallback_defined = self.tags.contains_key(NOANSWER_TAG)
            || intents.iter().any(|i| i.tag == NOANSWER_TAG);

        if !fallback_defined {
            return Err(AppError::MalformedCatalog(format!(
                "the mandatory '{}' intent is not defined",
                NOANSWER_TAG
            )));
        }
        if fallback_answers == 0 {
            return Err(AppError::MalformedCatalog(format!(
                "the '{}' intent has no responses",
                NOANSWER_TAG
            )));
        }

        for intent in &intents {
            let entry = self.tags.entry(intent.tag.to_string()).or_default();
            entry.answers.extend(intent.responses.iter().cloned());

            for pattern in intent.patterns {
                for stem in normalizer.stems(pattern) {
                    self.stems.insert(stem.clone());
                    entry.stems.insert(stem);
                }
            }
        }

        for (tag, entry) in &self.tags {
            if entry.answers.is_empty() {
                warn!("Intent '{}' has no responses", tag);
            }
        }

        debug!(
            "Ingested {} intents ({} tags, {} stems so far)",
            intents.len(),
            self.tags.len(),
            self.stems.len()
        );
        Ok(())
    }

    /// Freeze the vocabulary. Stem lists come out sorted and deduplicated.
    pub fn finalize(self) -> Vocabulary {
        let tags: BTreeMap<String, TagEntry> = self
            .tags
            .into_iter()
            .map(|(tag, pending)| {
                (
                    tag,
                    TagEntry {
                        stems: pending.stems.into_iter().collect(),
                        answers: pending.answers,
                    },
                )
            })
            .collect();
        let stems: Vec<String> = self.stems.into_iter().collect();

        info!(
            "Vocabulary finalized: {} tags, {} stems",
            tags.len(),
            stems.len()
        );
        Vocabulary { tags, stems }
    }
}

/// Frozen vocabulary shared by training-time and inference-time encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tags: BTreeMap<String, TagEntry>,
    stems: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from a single catalog
    pub fn from_catalog(catalog: &IntentCatalog, normalizer: &Normalizer) -> Result<Self, AppError> {
        let mut builder = VocabularyBuilder::new();
        builder.ingest(catalog, normalizer)?;
        Ok(builder.finalize())
    }

    pub fn tags(&self) -> &BTreeMap<String, TagEntry> {
        &self.tags
    }

    /// Tag names in label-vector order
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.keys().map(String::as_str).collect()
    }

    /// The global stem axis, in feature-vector order
    pub fn stems(&self) -> &[String] {
        &self.stems
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn stem_count(&self) -> usize {
        self.stems.len()
    }

    /// Tag at a label-vector position
    pub fn tag_at(&self, index: usize) -> Option<&str> {
        self.tags.keys().nth(index).map(String::as_str)
    }

    /// Label-vector position of a tag
    pub fn tag_index(&self, tag: &str) -> Option<usize> {
        self.tags.keys().position(|t| t == tag)
    }

    /// Feature-vector position of a stem
    pub fn stem_index(&self, stem: &str) -> Option<usize> {
        self.stems.binary_search_by(|s| s.as_str().cmp(stem)).ok()
    }

    pub fn answers(&self, tag: &str) -> Option<&[String]> {
        self.tags.get(tag).map(|entry| entry.answers.as_slice())
    }

    /// One example per stem per tag: the feature vector has only that stem's
    /// bit set, the label vector only that tag's bit. Rows are shuffled with `rng`.
    pub fn build_training_data<R: Rng + ?Sized>(&self, rng: &mut R) -> TrainingData {
        let feature_width = self.stems.len();
        let label_width = self.tags.len();
        let mut examples: Vec<(Vec<bool>, Vec<bool>)> = Vec::new();

        for (tag_index, entry) in self.tags.values().enumerate() {
            for stem in &entry.stems {
                let Some(stem_index) = self.stem_index(stem) else {
                    continue;
                };
                let mut features = vec![false; feature_width];
                features[stem_index] = true;
                let mut labels = vec![false; label_width];
                labels[tag_index] = true;
                examples.push((features, labels));
            }
        }

        examples.shuffle(rng);
        let (features, labels) = examples.into_iter().unzip();

        TrainingData {
            features,
            labels,
            feature_width,
            label_width,
        }
    }

    /// Feature vector of already-stemmed text. Unknown stems contribute nothing.
    pub fn encode_stems(&self, stems: &[String]) -> Vec<bool> {
        let present: HashSet<&str> = stems.iter().map(String::as_str).collect();
        self.stems
            .iter()
            .map(|stem| present.contains(stem.as_str()))
            .collect()
    }

    /// Feature vector of a sentence, stemmed the same way patterns were
    pub fn encode_sentence(&self, normalizer: &Normalizer, text: &str) -> Vec<bool> {
        self.encode_stems(&normalizer.stems(text))
    }

    pub fn snapshot(&self) -> VocabularySnapshot {
        VocabularySnapshot {
            tags: self.tags.clone(),
            stems: self.stems.clone(),
        }
    }

    /// Rebuild a vocabulary from its persisted form, checking the ordering invariants.
    pub fn restore(snapshot: VocabularySnapshot) -> Result<Self, AppError> {
        if !is_sorted_unique(&snapshot.stems) {
            return Err(AppError::InvalidSnapshot(
                "global stems are not sorted and unique".to_string(),
            ));
        }

        let mut union = BTreeSet::new();
        for (tag, entry) in &snapshot.tags {
            if !is_sorted_unique(&entry.stems) {
                return Err(AppError::InvalidSnapshot(format!(
                    "stems of '{}' are not sorted and unique",
                    tag
                )));
            }
            union.extend(entry.stems.iter().map(String::as_str));
        }

        if !union.iter().copied().eq(snapshot.stems.iter().map(String::as_str)) {
            return Err(AppError::InvalidSnapshot(
                "global stems differ from the union of tag stems".to_string(),
            ));
        }

        match snapshot.tags.get(NOANSWER_TAG) {
            None => {
                return Err(AppError::InvalidSnapshot(format!(
                    "the '{}' tag is missing",
                    NOANSWER_TAG
                )))
            }
            Some(entry) if entry.answers.is_empty() => {
                return Err(AppError::InvalidSnapshot(format!(
                    "the '{}' tag has no answers",
                    NOANSWER_TAG
                )))
            }
            Some(_) => {}
        }

        Ok(Self {
            tags: snapshot.tags,
            stems: snapshot.stems,
        })
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let snapshot: VocabularySnapshot =
            serde_json::from_str(json).map_err(|e| AppError::InvalidSnapshot(e.to_string()))?;
        Self::restore(snapshot)
    }

    /// Write the snapshot as JSON
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        fs::write(path, self.to_json()?)?;
        info!("Vocabulary saved to {:?}", path);
        Ok(())
    }

    /// Read a snapshot file. Fails with `NotFound` if the path is not a file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.is_file() {
            return Err(AppError::NotFound(path.to_path_buf()));
        }
        let vocabulary = Self::from_json(&fs::read_to_string(path)?)?;
        info!(
            "Vocabulary loaded from {:?}: {} tags, {} stems",
            path,
            vocabulary.tag_count(),
            vocabulary.stem_count()
        );
        Ok(vocabulary)
    }
}

fn is_sorted_unique(items: &[String]) -> bool {
    items.windows(2).all(|pair| pair[0] < pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::catalog::IntentRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hello_catalog() -> IntentCatalog {
        IntentCatalog::new(vec![
            IntentRecord::new(NOANSWER_TAG, &[], &["Je n'ai pas compris..."]),
            IntentRecord::new("hello_intent", &["Hello !", "hi"], &["Hey you !", "Hello."]),
        ])
    }

    #[test]
    fn test_hello_vocabulary() {
        let vocabulary = Vocabulary::from_catalog(&hello_catalog(), &Normalizer::default()).unwrap();

        assert_eq!(vocabulary.stems(), &["hello".to_string(), "hi".to_string()]);
        assert_eq!(vocabulary.tag_names(), vec!["hello_intent", NOANSWER_TAG]);
        assert!(vocabulary.tags()[NOANSWER_TAG].stems.is_empty());
    }

    #[test]
    fn test_encode_hello_world() {
        let normalizer = Normalizer::default();
        let vocabulary = Vocabulary::from_catalog(&hello_catalog(), &normalizer).unwrap();

        assert_eq!(
            vocabulary.encode_sentence(&normalizer, "Hello World !"),
            vec![true, false]
        );
        assert_eq!(
            vocabulary.encode_sentence(&normalizer, "nothing known"),
            vec![false, false]
        );
    }

    #[test]
    fn test_training_rows_per_stem_per_tag() {
        let vocabulary = Vocabulary::from_catalog(&hello_catalog(), &Normalizer::default()).unwrap();
        let data = vocabulary.build_training_data(&mut StdRng::seed_from_u64(7));

        assert_eq!(data.len(), 2);
        assert_eq!(data.feature_width, 2);
        assert_eq!(data.label_width, 2);

        let mut rows: Vec<(Vec<bool>, Vec<bool>)> =
            data.features.into_iter().zip(data.labels).collect();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                (vec![false, true], vec![true, false]),
                (vec![true, false], vec![true, false]),
            ]
        );
    }

    #[test]
    fn test_training_shuffle_depends_only_on_rng() {
        let catalog = IntentCatalog::new(vec![
            IntentRecord::new(NOANSWER_TAG, &[], &["?"]),
            IntentRecord::new("a", &["alpha beta gamma delta"], &["A"]),
            IntentRecord::new("b", &["epsilon zeta eta theta"], &["B"]),
        ]);
        let vocabulary = Vocabulary::from_catalog(&catalog, &Normalizer::default()).unwrap();

        let first = vocabulary.build_training_data(&mut StdRng::seed_from_u64(42));
        let second = vocabulary.build_training_data(&mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeated_tags_accumulate() {
        let catalog = IntentCatalog::new(vec![
            IntentRecord::new(NOANSWER_TAG, &[], &["?"]),
            IntentRecord::new("greeting", &["bonjour"], &["Salut !"]),
            IntentRecord::new("greeting", &["bonsoir", "bonjour"], &["Bonsoir !"]),
        ]);
        let vocabulary = Vocabulary::from_catalog(&catalog, &Normalizer::default()).unwrap();

        let entry = &vocabulary.tags()["greeting"];
        assert_eq!(entry.answers, vec!["Salut !", "Bonsoir !"]);
        assert_eq!(entry.stems.len(), 2);
        assert!(entry.stems.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_missing_noanswer_rejected_without_side_effects() {
        let normalizer = Normalizer::default();
        let mut builder = VocabularyBuilder::new();
        let catalog = IntentCatalog::new(vec![IntentRecord::new("greeting", &["bonjour"], &["Salut"])]);

        let result = builder.ingest(&catalog, &normalizer);
        assert!(matches!(result, Err(AppError::MalformedCatalog(_))));

        let vocabulary = builder.finalize();
        assert_eq!(vocabulary.tag_count(), 0);
        assert_eq!(vocabulary.stem_count(), 0);
    }

    #[test]
    fn test_noanswer_without_responses_rejected() {
        let catalog = IntentCatalog::new(vec![IntentRecord::new(NOANSWER_TAG, &[], &[])]);
        let result = Vocabulary::from_catalog(&catalog, &Normalizer::default());
        assert!(matches!(result, Err(AppError::MalformedCatalog(_))));
    }

    #[test]
    fn test_noanswer_from_previous_ingest_counts() {
        let normalizer = Normalizer::default();
        let mut builder = VocabularyBuilder::new();
        builder
            .ingest(
                &IntentCatalog::new(vec![IntentRecord::new(NOANSWER_TAG, &[], &["?"])]),
                &normalizer,
            )
            .unwrap();
        builder
            .ingest(
                &IntentCatalog::new(vec![IntentRecord::new("greeting", &["salut"], &["Salut"])]),
                &normalizer,
            )
            .unwrap();

        assert_eq!(builder.finalize().tag_count(), 2);
    }

    #[test]
    fn test_snapshot_shape() {
        let vocabulary = Vocabulary::from_catalog(&hello_catalog(), &Normalizer::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&vocabulary.to_json().unwrap()).unwrap();

        assert_eq!(value["stems"], serde_json::json!(["hello", "hi"]));
        assert_eq!(
            value["tags"]["hello_intent"],
            serde_json::json!({"stems": ["hello", "hi"], "answers": ["Hey you !", "Hello."]})
        );
    }

    #[test]
    fn test_restore_rejects_missing_keys() {
        let result = Vocabulary::from_json(r#"{"tags": {}}"#);
        assert!(matches!(result, Err(AppError::InvalidSnapshot(_))));

        let result = Vocabulary::from_json(r#"{"stems": []}"#);
        assert!(matches!(result, Err(AppError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_restore_rejects_unsorted_or_inconsistent_stems() {
        let result = Vocabulary::from_json(
            r#"{"tags": {"a": {"stems": ["b", "a"], "answers": []}}, "stems": ["a", "b"]}"#,
        );
        assert!(matches!(result, Err(AppError::InvalidSnapshot(_))));

        let result = Vocabulary::from_json(
            r#"{"tags": {"a": {"stems": ["a"], "answers": []}}, "stems": ["a", "b"]}"#,
        );
        assert!(matches!(result, Err(AppError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_restore_rejects_unusable_fallback() {
        let result = Vocabulary::from_json(
            r#"{"tags": {"a": {"stems": ["x"], "answers": ["A"]}, "b": {"stems": ["y"], "answers": ["B"]}},
                "stems": ["x", "y"]}"#,
        );
        assert!(matches!(result, Err(AppError::InvalidSnapshot(msg)) if msg.contains(NOANSWER_TAG)));

        let result = Vocabulary::from_json(
            r#"{"tags": {"a": {"stems": ["x"], "answers": ["A"]}, "noanswer": {"stems": [], "answers": []}},
                "stems": ["x"]}"#,
        );
        assert!(matches!(result, Err(AppError::InvalidSnapshot(_))));

        let result = Vocabulary::from_json(
            r#"{"tags": {"a": {"stems": ["x"], "answers": ["A"]}, "noanswer": {"stems": [], "answers": ["?"]}},
                "stems": ["x"]}"#,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.vocab.json");
        let vocabulary = Vocabulary::from_catalog(&hello_catalog(), &Normalizer::default()).unwrap();

        vocabulary.save(&path).unwrap();
        assert_eq!(Vocabulary::load(&path).unwrap(), vocabulary);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Vocabulary::load(Path::new("/nonexistent/intents.vocab.json"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
