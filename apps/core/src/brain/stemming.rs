//! Sentence normalization: tokenization, stopword filtering and stemming.
//!
//! The stem sequence produced here is the encoding contract shared between
//! training and inference, so it must stay deterministic for a given language.

use crate::error::AppError;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// NOTE: expect() is acceptable here: the pattern is a literal and cannot fail to compile.
static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("Invalid regex: word pattern"));

/// Stopwords for French language
const STOPWORDS_FR: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "eux", "il",
    "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "même", "mes", "moi",
    "mon", "ne", "nos", "notre", "nous", "on", "ou", "par", "pas", "pour", "qu", "que", "qui",
    "sa", "se", "ses", "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une", "vos",
    "votre", "vous", "c", "d", "j", "l", "à", "m", "n", "s", "t", "y", "été", "étée", "étées",
    "étés", "étant", "étante", "étants", "étantes", "suis", "es", "est", "sommes", "êtes", "sont",
    "serai", "seras", "sera", "serons", "serez", "seront", "serais", "serait", "serions",
    "seriez", "seraient", "étais", "était", "étions", "étiez", "étaient", "fus", "fut", "fûmes",
    "fûtes", "furent", "sois", "soit", "soyons", "soyez", "soient", "fusse", "fusses", "fût",
    "fussions", "fussiez", "fussent", "ayant", "ayante", "ayantes", "ayants", "eu", "eue", "eues",
    "eus", "ai", "as", "avons", "avez", "ont", "aurai", "auras", "aura", "aurons", "aurez",
    "auront", "aurais", "aurait", "aurions", "auriez", "auraient", "avais", "avait", "avions",
    "aviez", "avaient", "eut", "eûmes", "eûtes", "eurent", "aie", "aies", "ait", "ayons", "ayez",
    "aient", "eusse", "eusses", "eût", "eussions", "eussiez", "eussent",
];

/// Stopwords for English language
const STOPWORDS_EN: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "couldn", "didn",
    "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn", "needn", "shan", "shouldn",
    "wasn", "weren", "won", "wouldn",
];

/// Language used for stopword filtering and stemming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    French,
    English,
}

impl Language {
    /// Returns the language code
    pub fn code(&self) -> &'static str {
        match self {
            Language::French => "fr",
            Language::English => "en",
        }
    }

    fn algorithm(&self) -> Algorithm {
        match self {
            Language::French => Algorithm::French,
            Language::English => Algorithm::English,
        }
    }

    fn stopwords(&self) -> &'static [&'static str] {
        match self {
            Language::French => STOPWORDS_FR,
            Language::English => STOPWORDS_EN,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::French => write!(f, "french"),
            Language::English => write!(f, "english"),
        }
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "french" | "fr" | "français" | "francais" => Ok(Language::French),
            "english" | "en" => Ok(Language::English),
            other => Err(AppError::Config(format!("Unsupported language: {}", other))),
        }
    }
}

/// Turns free text into the stem sequence used for feature encoding.
pub struct Normalizer {
    language: Language,
    stopwords: HashSet<&'static str>,
    stemmer: Stemmer,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("language", &self.language)
            .field("stopwords", &self.stopwords.len())
            .finish()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

impl Normalizer {
    /// Create a normalizer for the given language
    pub fn new(language: Language) -> Self {
        Self {
            language,
            stopwords: language.stopwords().iter().copied().collect(),
            stemmer: Stemmer::create(language.algorithm()),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Check if an already lower-cased word is a stopword
    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    /// Split text into lower-cased word tokens (runs of word characters)
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        WORD_PATTERN
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    /// Tokenize, drop stopwords and stem what remains.
    ///
    /// Token order is preserved and duplicates are kept.
    pub fn stems(&self, text: &str) -> Vec<String> {
        self.tokenize(text)
            .into_iter()
            .filter(|word| !self.is_stopword(word))
            .map(|word| self.stemmer.stem(&word).into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_word_boundaries() {
        let normalizer = Normalizer::new(Language::French);

        let tokens = normalizer.tokenize("Hello World ! Ça va, l'ami?");
        assert_eq!(tokens, vec!["hello", "world", "ça", "va", "l", "ami"]);
    }

    #[test]
    fn test_stopwords_removed_after_lowercasing() {
        let normalizer = Normalizer::new(Language::French);

        let stems = normalizer.stems("Le Chat et LA souris");
        assert_eq!(stems.len(), 2);
        assert!(!stems.iter().any(|s| s == "le" || s == "la" || s == "et"));
    }

    #[test]
    fn test_stems_are_deterministic() {
        let normalizer = Normalizer::new(Language::French);

        let sentence = "Quelle est la réponse à la grande question ?";
        assert_eq!(normalizer.stems(sentence), normalizer.stems(sentence));
    }

    #[test]
    fn test_plain_words_keep_their_form() {
        let normalizer = Normalizer::new(Language::French);

        assert_eq!(normalizer.stems("Hello !"), vec!["hello"]);
        assert_eq!(normalizer.stems("hi"), vec!["hi"]);
    }

    #[test]
    fn test_english_stemming() {
        let normalizer = Normalizer::new(Language::English);

        let stems = normalizer.stems("The cats are running");
        assert_eq!(stems, vec!["cat", "run"]);
    }

    #[test]
    fn test_empty_text() {
        let normalizer = Normalizer::default();

        assert!(normalizer.stems("").is_empty());
        assert!(normalizer.stems("   !?  ").is_empty());
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("fr".parse::<Language>().unwrap(), Language::French);
        assert_eq!("English".parse::<Language>().unwrap(), Language::English);
        assert!(matches!("klingon".parse::<Language>(), Err(AppError::Config(_))));
    }
}
