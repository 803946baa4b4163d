//! Classifier seam and the confidence policy applied to its output.
//!
//! Any model able to turn a feature vector into a probability distribution
//! over tags (in vocabulary tag order) can back a [`Responder`](super::Responder).

use crate::brain::vocabulary::TrainingData;
use crate::error::AppError;

/// Probability a prediction must strictly exceed to be trusted
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.9;

/// A trained model mapping feature vectors to tag probabilities.
pub trait IntentModel: Send + Sync {
    /// Returns one probability per tag, in vocabulary tag order, summing to 1.
    fn predict(&self, features: &[bool]) -> Result<Vec<f32>, AppError>;
}

/// Produces an [`IntentModel`] from encoded training data.
pub trait ModelTrainer {
    type Model: IntentModel;

    fn train(&self, data: &TrainingData) -> Result<Self::Model, AppError>;
}

impl<M: IntentModel + ?Sized> IntentModel for Box<M> {
    fn predict(&self, features: &[bool]) -> Result<Vec<f32>, AppError> {
        (**self).predict(features)
    }
}

impl<M: IntentModel + ?Sized> IntentModel for std::sync::Arc<M> {
    fn predict(&self, features: &[bool]) -> Result<Vec<f32>, AppError> {
        (**self).predict(features)
    }
}

/// Highest probability and its position. Ties keep the first position; NaN never wins.
pub fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &p) in probabilities.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((index, p)),
        }
    }
    best
}

/// Position of the most probable tag if its probability is strictly above `threshold`.
pub fn classify(probabilities: &[f32], threshold: f32) -> Option<usize> {
    argmax(probabilities)
        .filter(|&(_, p)| p > threshold)
        .map(|(index, _)| index)
}
