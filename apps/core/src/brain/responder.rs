//! Responder: sentence in, canned answer out.
//!
//! Per request: encode the sentence on the vocabulary's stem axis, get a
//! distribution from the model, keep the top tag only if it is confident
//! enough (otherwise fall back to `noanswer`), then pick one of that tag's
//! answers at random. Nothing is mutated after construction, so a single
//! `Responder` can serve concurrent callers behind an `Arc`.

use crate::brain::catalog::NOANSWER_TAG;
use crate::brain::classifier::{self, IntentModel, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::brain::stemming::Normalizer;
use crate::brain::vocabulary::Vocabulary;
use crate::error::AppError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

/// Outcome of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// Resolved tag (`noanswer` on fallback)
    pub tag: String,
    /// Highest probability returned by the model
    pub confidence: f32,
    /// Chosen answer
    pub text: String,
    /// True when the prediction was not confident enough
    pub fallback: bool,
}

/// Answers sentences with a trained model and a frozen vocabulary
#[derive(Debug)]
pub struct Responder<M> {
    vocabulary: Vocabulary,
    normalizer: Normalizer,
    model: M,
    threshold: f32,
}

impl<M: IntentModel> Responder<M> {
    pub fn new(vocabulary: Vocabulary, normalizer: Normalizer, model: M) -> Self {
        Self {
            vocabulary,
            normalizer,
            model,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Override the confidence threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Feature vector of a sentence
    pub fn encode(&self, sentence: &str) -> Vec<bool> {
        self.vocabulary.encode_sentence(&self.normalizer, sentence)
    }

    /// Model output, checked against the tag axis
    pub fn distribution(&self, features: &[bool]) -> Result<Vec<f32>, AppError> {
        let probabilities = self.model.predict(features)?;
        if probabilities.len() != self.vocabulary.tag_count() {
            return Err(AppError::InvalidModel(format!(
                "model returned {} probabilities for {} tags",
                probabilities.len(),
                self.vocabulary.tag_count()
            )));
        }
        Ok(probabilities)
    }

    /// Tag position if the model is confident enough, `None` otherwise
    pub fn classify(&self, features: &[bool]) -> Result<Option<usize>, AppError> {
        let probabilities = self.distribution(features)?;
        Ok(classifier::classify(&probabilities, self.threshold))
    }

    /// Tag for a classification result; `None` always maps to `noanswer`
    pub fn resolve_tag(&self, index: Option<usize>) -> &str {
        index
            .and_then(|i| self.vocabulary.tag_at(i))
            .unwrap_or(NOANSWER_TAG)
    }

    /// Uniformly random answer of `tag`
    pub fn choose_answer<R: Rng + ?Sized>(&self, tag: &str, rng: &mut R) -> Result<&str, AppError> {
        self.vocabulary
            .answers(tag)
            .and_then(|answers| answers.choose(rng))
            .map(String::as_str)
            .ok_or_else(|| AppError::EmptyAnswerList(tag.to_string()))
    }

    /// Full request with details, drawing randomness from `rng`
    pub fn reply_with<R: Rng + ?Sized>(&self, sentence: &str, rng: &mut R) -> Result<Reply, AppError> {
        let features = self.encode(sentence);
        let known = features.iter().filter(|f| **f).count();
        debug!("Encoded sentence: {} known stems", known);

        let probabilities = self.distribution(&features)?;
        let confidence = classifier::argmax(&probabilities)
            .map(|(_, p)| p)
            .unwrap_or(0.0);
        let index = classifier::classify(&probabilities, self.threshold);

        let tag = self.resolve_tag(index);
        let fallback = index.is_none();
        if fallback {
            debug!("Fallback to '{}' (confidence {:.3})", tag, confidence);
        } else {
            debug!("Resolved '{}' (confidence {:.3})", tag, confidence);
        }

        let text = self.choose_answer(tag, rng)?.to_string();
        Ok(Reply {
            tag: tag.to_string(),
            confidence,
            text,
            fallback,
        })
    }

    /// Answer a sentence, drawing randomness from `rng`
    pub fn answer_with<R: Rng + ?Sized>(&self, sentence: &str, rng: &mut R) -> Result<String, AppError> {
        self.reply_with(sentence, rng).map(|reply| reply.text)
    }

    /// Answer a sentence
    pub fn answer(&self, sentence: &str) -> Result<String, AppError> {
        self.answer_with(sentence, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::catalog::{IntentCatalog, IntentRecord};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FixedModel(Vec<f32>);

    impl IntentModel for FixedModel {
        fn predict(&self, _features: &[bool]) -> Result<Vec<f32>, AppError> {
            Ok(self.0.clone())
        }
    }

    fn responder(probabilities: Vec<f32>) -> Responder<FixedModel> {
        let catalog = IntentCatalog::new(vec![
            IntentRecord::new(NOANSWER_TAG, &[], &["Je n'ai pas compris..."]),
            IntentRecord::new("hello_intent", &["Hello !", "hi"], &["Hey you !", "Hello."]),
        ]);
        let normalizer = Normalizer::default();
        let vocabulary = Vocabulary::from_catalog(&catalog, &normalizer).unwrap();
        Responder::new(vocabulary, normalizer, FixedModel(probabilities))
    }

    #[test]
    fn test_confident_answer() {
        // tag order: hello_intent, noanswer
        let responder = responder(vec![0.97, 0.03]);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            let answer = responder.answer_with("Hello World !", &mut rng).unwrap();
            assert!(["Hey you !", "Hello."].contains(&answer.as_str()));
        }
    }

    #[test]
    fn test_low_confidence_falls_back() {
        let responder = responder(vec![0.6, 0.4]);

        let reply = responder
            .reply_with("quel temps fait-il", &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert!(reply.fallback);
        assert_eq!(reply.tag, NOANSWER_TAG);
        assert_eq!(reply.text, "Je n'ai pas compris...");
        assert!((reply.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_same_seed_same_answers() {
        let responder = responder(vec![0.99, 0.01]);

        let first: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(11);
            (0..10).map(|_| responder.answer_with("hi", &mut rng).unwrap()).collect()
        };
        let second: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(11);
            (0..10).map(|_| responder.answer_with("hi", &mut rng).unwrap()).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_tag() {
        let responder = responder(vec![0.5, 0.5]);

        assert_eq!(responder.resolve_tag(None), NOANSWER_TAG);
        assert_eq!(responder.resolve_tag(Some(0)), "hello_intent");
        assert_eq!(responder.resolve_tag(Some(1)), NOANSWER_TAG);
        assert_eq!(responder.resolve_tag(Some(42)), NOANSWER_TAG);
    }

    #[test]
    fn test_choose_answer_unknown_tag() {
        let responder = responder(vec![0.5, 0.5]);
        let result = responder.choose_answer("missing", &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(AppError::EmptyAnswerList(tag)) if tag == "missing"));
    }

    #[test]
    fn test_distribution_length_checked() {
        let responder = responder(vec![1.0]);
        assert!(matches!(responder.answer("hi"), Err(AppError::InvalidModel(_))));
    }

    #[test]
    fn test_threshold_override() {
        let responder = responder(vec![0.6, 0.4]).with_threshold(0.5);
        assert_eq!(responder.classify(&[true, false]).unwrap(), Some(0));
    }
}
