//! # Brain Module
//!
//! Intent recognition for Parlot.
//!
//! ## Components
//! - `stemming`: tokenizer, stopwords and Snowball stemmer
//! - `catalog`: intent catalog input
//! - `vocabulary`: stem and tag axes, training data, snapshots
//! - `classifier`: model seam and confidence policy
//! - `network`: built-in feed-forward classifier
//! - `responder`: sentence to answer
//! - `pipeline`: train and load workflows

pub mod catalog;
pub mod classifier;
pub mod network;
pub mod pipeline;
pub mod responder;
pub mod stemming;
pub mod vocabulary;

pub use catalog::{IntentCatalog, IntentRecord, NOANSWER_TAG};
pub use classifier::{IntentModel, ModelTrainer, DEFAULT_CONFIDENCE_THRESHOLD};
pub use network::{FeedForwardNetwork, NetworkConfig, SgdTrainer};
pub use pipeline::{load_responder, train_from_catalog, TrainedArtifacts};
pub use responder::{Reply, Responder};
pub use stemming::{Language, Normalizer};
pub use vocabulary::{TrainingData, Vocabulary, VocabularyBuilder, VocabularySnapshot};
