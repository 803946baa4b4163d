//! Training and loading workflow.
//!
//! `train_from_catalog` turns an intent catalog into two artifacts (the
//! vocabulary and the network), `load_responder` reads them back.

use crate::brain::catalog::IntentCatalog;
use crate::brain::classifier::ModelTrainer;
use crate::brain::network::{FeedForwardNetwork, SgdTrainer};
use crate::brain::responder::Responder;
use crate::brain::stemming::{Language, Normalizer};
use crate::brain::vocabulary::Vocabulary;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::fs_manager::ArtifactPaths;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files written by a training run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainedArtifacts {
    pub vocabulary_path: PathBuf,
    pub model_path: PathBuf,
}

/// Load a catalog and build its frozen vocabulary
pub fn build_vocabulary(catalog_path: &Path, normalizer: &Normalizer) -> Result<Vocabulary, AppError> {
    let catalog = IntentCatalog::load(catalog_path)?;
    let vocabulary = Vocabulary::from_catalog(&catalog, normalizer)?;
    info!(
        "Vocabulary built: {} tags, {} stems",
        vocabulary.tag_count(),
        vocabulary.stem_count()
    );
    Ok(vocabulary)
}

/// Train a new model from a catalog and write both artifacts to `output_dir`.
///
/// `rng` drives the training-row shuffle; the network itself is seeded from
/// `config.network.seed`.
pub fn train_from_catalog<R: Rng + ?Sized>(
    catalog_path: &Path,
    model_name: &str,
    output_dir: &Path,
    config: &AppConfig,
    rng: &mut R,
) -> Result<(TrainedArtifacts, Responder<FeedForwardNetwork>), AppError> {
    let model_name = model_name.trim();
    if model_name.is_empty() {
        return Err(AppError::Validation("model name must not be empty".to_string()));
    }
    let trainer = SgdTrainer::new(config.network.clone())?;

    let normalizer = Normalizer::new(config.language);
    let vocabulary = build_vocabulary(catalog_path, &normalizer)?;

    let paths = ArtifactPaths::new(output_dir);
    paths.init()?;
    let vocabulary_path = paths.vocabulary_path(catalog_path);
    vocabulary.save(&vocabulary_path)?;

    let data = vocabulary.build_training_data(rng);
    let network = trainer.train(&data)?;

    let model_path = paths.model_path(model_name);
    network.save(&model_path)?;

    info!("Model '{}' trained", model_name);
    let artifacts = TrainedArtifacts {
        vocabulary_path,
        model_path,
    };
    let responder = Responder::new(vocabulary, normalizer, network)
        .with_threshold(config.confidence_threshold);
    Ok((artifacts, responder))
}

/// Read a trained model and its vocabulary back into a [`Responder`]
pub fn load_responder(
    model_path: &Path,
    vocabulary_path: &Path,
    language: Language,
    threshold: f32,
) -> Result<Responder<FeedForwardNetwork>, AppError> {
    for path in [model_path, vocabulary_path] {
        if !path.is_file() {
            return Err(AppError::NotFound(path.to_path_buf()));
        }
    }

    let vocabulary = Vocabulary::load(vocabulary_path)?;
    let network = FeedForwardNetwork::load(model_path)?;
    network.check_dimensions(vocabulary.stem_count(), vocabulary.tag_count())?;

    Ok(Responder::new(vocabulary, Normalizer::new(language), network).with_threshold(threshold))
}
