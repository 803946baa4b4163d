//! Feed-forward intent network.
//!
//! Dense ReLU hidden layers with dropout and a softmax output, trained with
//! categorical cross-entropy and mini-batch SGD (time-based learning-rate
//! decay, optional Nesterov momentum).

use crate::brain::classifier::{argmax, IntentModel, ModelTrainer};
use crate::brain::vocabulary::TrainingData;
use crate::error::AppError;
use ndarray::{Array1, Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use validator::Validate;

/// Hyperparameters of the network and of its training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NetworkConfig {
    /// Units of each hidden layer, input side first
    #[validate(length(min = 1))]
    pub hidden_units: Vec<usize>,
    /// Dropout rate after each hidden layer
    pub dropout: Vec<f32>,
    #[validate(range(exclusive_min = 0.0, max = 10.0))]
    pub learning_rate: f32,
    #[validate(range(min = 0.0))]
    pub decay: f32,
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub momentum: f32,
    pub nesterov: bool,
    #[validate(range(min = 1))]
    pub epochs: usize,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    /// Fixed seed for weight init, dropout and batch order
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_units: vec![256, 128],
            dropout: vec![0.25, 0.15],
            learning_rate: 0.01,
            decay: 1e-6,
            momentum: 0.9,
            nesterov: true,
            epochs: 200,
            batch_size: 32,
            seed: None,
        }
    }
}

impl NetworkConfig {
    /// Field validation plus the cross-field constraints `validator` can't express
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;

        if self.dropout.len() != self.hidden_units.len() {
            return Err(AppError::Validation(format!(
                "{} dropout rates given for {} hidden layers",
                self.dropout.len(),
                self.hidden_units.len()
            )));
        }
        if self.hidden_units.contains(&0) {
            return Err(AppError::Validation(
                "hidden layers must have at least one unit".to_string(),
            ));
        }
        if let Some(rate) = self.dropout.iter().find(|r| !(0.0..1.0).contains(*r)) {
            return Err(AppError::Validation(format!(
                "dropout rate {} outside [0, 1)",
                rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// (inputs, outputs)
    weights: Array2<f32>,
    biases: Array1<f32>,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero biases
    fn glorot<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit)),
            biases: Array1::zeros(outputs),
        }
    }
}

/// Trained network. Hidden layers use ReLU, the last layer softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardNetwork {
    layers: Vec<DenseLayer>,
}

impl FeedForwardNetwork {
    /// Randomly initialized network
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        hidden_units: &[usize],
        outputs: usize,
        rng: &mut R,
    ) -> Self {
        let mut widths = Vec::with_capacity(hidden_units.len() + 2);
        widths.push(inputs);
        widths.extend_from_slice(hidden_units);
        widths.push(outputs);

        let layers = widths
            .windows(2)
            .map(|pair| DenseLayer::glorot(pair[0], pair[1], &mut *rng))
            .collect();
        Self { layers }
    }

    pub fn input_width(&self) -> usize {
        self.layers.first().map(|l| l.weights.nrows()).unwrap_or(0)
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map(|l| l.weights.ncols()).unwrap_or(0)
    }

    fn check_shape(&self) -> Result<(), AppError> {
        if self.layers.is_empty() {
            return Err(AppError::InvalidModel("network has no layers".to_string()));
        }
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.weights.ncols() != layer.biases.len() {
                return Err(AppError::InvalidModel(format!(
                    "layer {} has {} outputs but {} biases",
                    index,
                    layer.weights.ncols(),
                    layer.biases.len()
                )));
            }
            if index > 0 && layer.weights.nrows() != self.layers[index - 1].weights.ncols() {
                return Err(AppError::InvalidModel(format!(
                    "layer {} expects {} inputs, previous layer has {} outputs",
                    index,
                    layer.weights.nrows(),
                    self.layers[index - 1].weights.ncols()
                )));
            }
        }
        Ok(())
    }

    /// Check the network was trained for a vocabulary of this size
    pub fn check_dimensions(&self, stems: usize, tags: usize) -> Result<(), AppError> {
        if self.input_width() != stems || self.output_width() != tags {
            return Err(AppError::InvalidModel(format!(
                "network maps {} features to {} tags, vocabulary has {} stems and {} tags",
                self.input_width(),
                self.output_width(),
                stems,
                tags
            )));
        }
        Ok(())
    }

    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let last = self.layers.len().saturating_sub(1);
        let mut activation = input.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            let z = activation.dot(&layer.weights) + &layer.biases;
            activation = if index == last {
                softmax(z)
            } else {
                z.mapv(|v| v.max(0.0))
            };
        }
        activation
    }

    /// One SGD update on a batch. Returns the batch loss and the number of correct rows.
    fn train_step<R: Rng + ?Sized>(
        &mut self,
        input: &Array2<f32>,
        target: &Array2<f32>,
        config: &NetworkConfig,
        learning_rate: f32,
        velocities: &mut [(Array2<f32>, Array1<f32>)],
        rng: &mut R,
    ) -> (f32, usize) {
        let batch = input.nrows() as f32;
        let last = self.layers.len() - 1;

        // Layer inputs and the ReLU/dropout masks are kept for backprop
        let mut layer_inputs: Vec<Array2<f32>> = Vec::with_capacity(self.layers.len());
        let mut masks: Vec<Array2<f32>> = Vec::with_capacity(last);
        let mut activation = input.clone();

        for (index, layer) in self.layers.iter().enumerate() {
            let z = activation.dot(&layer.weights) + &layer.biases;
            layer_inputs.push(activation);

            if index == last {
                activation = softmax(z);
            } else {
                let rate = config.dropout.get(index).copied().unwrap_or(0.0);
                let scale = 1.0 / (1.0 - rate);
                let mask = Array2::from_shape_fn(z.raw_dim(), |(row, col)| {
                    if z[(row, col)] <= 0.0 || (rate > 0.0 && rng.gen::<f32>() < rate) {
                        0.0
                    } else {
                        scale
                    }
                });
                activation = &z * &mask;
                masks.push(mask);
            }
        }

        let output = activation;
        let loss = -(target * &output.mapv(|p| p.max(1e-7).ln())).sum() / batch;
        let correct = output
            .rows()
            .into_iter()
            .zip(target.rows())
            .filter(|(predicted, expected)| {
                let predicted = predicted.to_vec();
                let expected = expected.to_vec();
                argmax(&predicted).map(|(i, _)| i) == argmax(&expected).map(|(i, _)| i)
            })
            .count();

        let momentum = config.momentum;
        let mut delta = (&output - target) / batch;

        for index in (0..=last).rev() {
            let grad_weights = layer_inputs[index].t().dot(&delta);
            let grad_biases = delta.sum_axis(Axis(0));

            if index > 0 {
                delta = delta.dot(&self.layers[index].weights.t()) * &masks[index - 1];
            }

            let layer = &mut self.layers[index];
            let (velocity_weights, velocity_biases) = &mut velocities[index];

            velocity_weights.zip_mut_with(&grad_weights, |v, &g| {
                *v = momentum * *v - learning_rate * g
            });
            velocity_biases.zip_mut_with(&grad_biases, |v, &g| {
                *v = momentum * *v - learning_rate * g
            });

            let nesterov = config.nesterov;
            Zip::from(&mut layer.weights)
                .and(&*velocity_weights)
                .and(&grad_weights)
                .for_each(|w, &v, &g| {
                    *w += if nesterov { momentum * v - learning_rate * g } else { v };
                });
            Zip::from(&mut layer.biases)
                .and(&*velocity_biases)
                .and(&grad_biases)
                .for_each(|b, &v, &g| {
                    *b += if nesterov { momentum * v - learning_rate * g } else { v };
                });
        }

        (loss, correct)
    }

    /// Write the network as JSON
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        fs::write(path, serde_json::to_string(self)?)?;
        info!("Model saved to {:?}", path);
        Ok(())
    }

    /// Read a network file. Fails with `NotFound` if the path is not a file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.is_file() {
            return Err(AppError::NotFound(path.to_path_buf()));
        }
        let network: Self = serde_json::from_str(&fs::read_to_string(path)?)
            .map_err(|e| AppError::InvalidModel(e.to_string()))?;
        network.check_shape()?;
        info!(
            "Model loaded from {:?}: {} inputs, {} outputs",
            path,
            network.input_width(),
            network.output_width()
        );
        Ok(network)
    }
}

impl IntentModel for FeedForwardNetwork {
    fn predict(&self, features: &[bool]) -> Result<Vec<f32>, AppError> {
        if features.len() != self.input_width() {
            return Err(AppError::InvalidModel(format!(
                "expected {} features, got {}",
                self.input_width(),
                features.len()
            )));
        }
        let input = Array2::from_shape_fn((1, features.len()), |(_, j)| {
            if features[j] {
                1.0
            } else {
                0.0
            }
        });
        let output = self.forward(&input);
        Ok(output.row(0).to_vec())
    }
}

/// Trains a [`FeedForwardNetwork`] with mini-batch SGD
#[derive(Debug, Clone, Default)]
pub struct SgdTrainer {
    config: NetworkConfig,
}

impl SgdTrainer {
    pub fn new(config: NetworkConfig) -> Result<Self, AppError> {
        config.check()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

impl ModelTrainer for SgdTrainer {
    type Model = FeedForwardNetwork;

    fn train(&self, data: &TrainingData) -> Result<FeedForwardNetwork, AppError> {
        if data.is_empty() {
            return Err(AppError::Validation(
                "no training examples: the catalog has no usable patterns".to_string(),
            ));
        }

        let features = to_matrix(&data.features, data.feature_width)?;
        let labels = to_matrix(&data.labels, data.label_width)?;
        let config = &self.config;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut network = FeedForwardNetwork::new(
            data.feature_width,
            &config.hidden_units,
            data.label_width,
            &mut rng,
        );
        let mut velocities: Vec<(Array2<f32>, Array1<f32>)> = network
            .layers
            .iter()
            .map(|l| (Array2::zeros(l.weights.raw_dim()), Array1::zeros(l.biases.len())))
            .collect();

        info!(
            "Training network {} -> {:?} -> {} on {} examples for {} epochs",
            data.feature_width,
            config.hidden_units,
            data.label_width,
            data.len(),
            config.epochs
        );

        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut iterations: u64 = 0;
        let mut last_loss = 0.0;
        let mut last_accuracy = 0.0;

        for epoch in 1..=config.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            let mut correct = 0;

            for batch in order.chunks(config.batch_size) {
                let batch_features = features.select(Axis(0), batch);
                let batch_labels = labels.select(Axis(0), batch);
                let learning_rate =
                    config.learning_rate / (1.0 + config.decay * iterations as f32);

                let (loss, hits) = network.train_step(
                    &batch_features,
                    &batch_labels,
                    config,
                    learning_rate,
                    &mut velocities,
                    &mut rng,
                );
                epoch_loss += loss * batch.len() as f32;
                correct += hits;
                iterations += 1;
            }

            last_loss = epoch_loss / data.len() as f32;
            last_accuracy = correct as f32 / data.len() as f32;
            debug!(epoch, loss = last_loss, accuracy = last_accuracy, "epoch done");
        }

        info!(
            "Training finished: loss {:.4}, accuracy {:.2}",
            last_loss, last_accuracy
        );
        Ok(network)
    }
}

fn to_matrix(rows: &[Vec<bool>], width: usize) -> Result<Array2<f32>, AppError> {
    if let Some(row) = rows.iter().find(|r| r.len() != width) {
        return Err(AppError::Validation(format!(
            "row of length {} in a matrix of width {}",
            row.len(),
            width
        )));
    }
    Ok(Array2::from_shape_fn((rows.len(), width), |(i, j)| {
        if rows[i][j] {
            1.0
        } else {
            0.0
        }
    }))
}

fn softmax(mut z: Array2<f32>) -> Array2<f32> {
    for mut row in z.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
    z
}
