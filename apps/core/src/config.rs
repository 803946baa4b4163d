//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is honored) with the
//! `PARLOT_` prefix; anything unset keeps its default. Command-line flags
//! override the result.

use crate::brain::classifier::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::brain::network::NetworkConfig;
use crate::brain::stemming::Language;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use validator::Validate;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Stemming and stopword language
    pub language: Language,
    /// Probability a prediction must strictly exceed to be answered
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f32,
    /// Root directory for trained artifacts (./data by default)
    pub data_dir: PathBuf,
    /// Address the websocket server binds to
    #[validate(length(min = 1))]
    pub bind_address: String,
    /// Incoming messages are cut to this many characters
    #[validate(range(min = 1))]
    pub max_message_length: usize,
    pub network: NetworkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            data_dir: PathBuf::from("data"),
            bind_address: "0.0.0.0".to_string(),
            max_message_length: 256,
            network: NetworkConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from `PARLOT_*` environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Some(language) = read_var::<Language>("PARLOT_LANGUAGE")? {
            config.language = language;
        }
        if let Some(threshold) = read_var("PARLOT_CONFIDENCE_THRESHOLD")? {
            config.confidence_threshold = threshold;
        }
        if let Some(dir) = read_var::<String>("PARLOT_DATA_DIR")? {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(bind) = read_var("PARLOT_BIND_ADDRESS")? {
            config.bind_address = bind;
        }
        if let Some(max) = read_var("PARLOT_MAX_MESSAGE_LENGTH")? {
            config.max_message_length = max;
        }
        if let Some(epochs) = read_var("PARLOT_EPOCHS")? {
            config.network.epochs = epochs;
        }
        if let Some(rate) = read_var("PARLOT_LEARNING_RATE")? {
            config.network.learning_rate = rate;
        }
        if let Some(batch) = read_var("PARLOT_BATCH_SIZE")? {
            config.network.batch_size = batch;
        }
        if let Some(seed) = read_var("PARLOT_SEED")? {
            config.network.seed = Some(seed);
        }

        config.check()?;
        Ok(config)
    }

    /// Validate this config and its network section
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        self.network.check()
    }

    /// Apply a command-line threshold, then validate the result
    pub fn override_threshold(&mut self, threshold: Option<f32>) -> Result<(), AppError> {
        if let Some(threshold) = threshold {
            self.confidence_threshold = threshold;
        }
        self.check()
    }

    /// Directory trained models and vocabularies are written to
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }
}

/// Read and parse an optional variable. Empty values count as unset.
fn read_var<T: FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", name, value))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(AppError::Config(format!("{}: {}", name, e))),
    }
}
