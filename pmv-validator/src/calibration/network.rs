//! Feed-forward calibration network (8 → 16 → 8 → 1, sigmoid)
//!
//! Retraining runs mini-batch gradient descent on squared error and
//! backpropagates through every layer.

use super::factors::ConfidenceFactors;
use super::readings::{TrainingSample, POSITIVE_PREDICTION};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const LAYER_SIZES: [usize; 4] = [ConfidenceFactors::LEN, 16, 8, 1];

/// Share of samples held out for validation metrics
const VALIDATION_SPLIT: f64 = 0.2;

/// Relative spread of initial weights around each layer's base weight
const WEIGHT_SPREAD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Sigmoid,
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Derivative expressed in terms of the activation output
    pub fn derivative(&self, output: f64) -> f64 {
        match self {
            Activation::Sigmoid => output * (1.0 - output),
        }
    }
}

/// Fully connected layer; `weights[out][in]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    /// Deterministic weights spread evenly around `weight`
    ///
    /// Every row is a different permutation of the same offsets, so each
    /// unit weighs the inputs differently while all rows keep the same sum.
    fn spread(inputs: usize, outputs: usize, weight: f64, bias: f64) -> Self {
        let weights = (0..outputs)
            .map(|unit| {
                let sign = if (unit / inputs) % 2 == 0 { 1.0 } else { -1.0 };
                (0..inputs)
                    .map(|input| {
                        let offset = if inputs < 2 {
                            0.0
                        } else {
                            let rank = (input * (2 * unit + 1) + unit) % inputs;
                            2.0 * rank as f64 / (inputs - 1) as f64 - 1.0
                        };
                        weight * (1.0 + WEIGHT_SPREAD * sign * offset)
                    })
                    .collect()
            })
            .collect();
        Self {
            weights,
            biases: vec![bias; outputs],
        }
    }

    fn zeroed(&self) -> Self {
        Self {
            weights: self.weights.iter().map(|row| vec![0.0; row.len()]).collect(),
            biases: vec![0.0; self.biases.len()],
        }
    }

    fn descend(&mut self, gradient: &DenseLayer, scale: f64) {
        for (row, grad_row) in self.weights.iter_mut().zip(&gradient.weights) {
            for (w, g) in row.iter_mut().zip(grad_row) {
                *w -= scale * g;
            }
        }
        for (b, g) in self.biases.iter_mut().zip(&gradient.biases) {
            *b -= scale * g;
        }
    }

    fn forward(&self, input: &[f64], activation: Activation) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                let sum: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum();
                activation.apply(sum + bias)
            })
            .collect()
    }
}

/// Rolling training metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Cumulative epochs across every retraining pass
    pub training_epochs: usize,
    pub validation_loss: f64,
    pub last_trained: Option<DateTime<Utc>>,
    pub samples_trained: usize,
}

/// Retraining hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub batch_size: usize,
    pub max_epochs: usize,
    pub early_stop_loss: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralCalibrationModel {
    layers: Vec<DenseLayer>,
    activation: Activation,
    layer_sizes: Vec<usize>,
    metrics: TrainingMetrics,
}

impl Default for NeuralCalibrationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl NeuralCalibrationModel {
    /// Deterministic initial weights
    ///
    /// An error-free response starts near 0.99 and a uniformly weak factor
    /// vector near 0.17. Hidden units stay out of deep saturation so
    /// retraining can still move them.
    pub fn new() -> Self {
        let [input, hidden1, hidden2, output] = LAYER_SIZES;
        Self {
            layers: vec![
                DenseLayer::spread(input, hidden1, 0.5, -2.0),
                DenseLayer::spread(hidden1, hidden2, 0.25, -1.5),
                DenseLayer::spread(hidden2, output, 1.5, -5.9),
            ],
            activation: Activation::Sigmoid,
            layer_sizes: LAYER_SIZES.to_vec(),
            metrics: TrainingMetrics::default(),
        }
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Base confidence for a factor vector
    pub fn predict(&self, inputs: &[f64; ConfidenceFactors::LEN]) -> f64 {
        self.output_of(inputs)
    }

    fn output_of(&self, inputs: &[f64]) -> f64 {
        self.activations(inputs)
            .last()
            .and_then(|out| out.first())
            .copied()
            .unwrap_or(0.0)
    }

    /// Inputs followed by the output of every layer
    fn activations(&self, inputs: &[f64]) -> Vec<Vec<f64>> {
        let mut out = Vec::with_capacity(self.layers.len() + 1);
        out.push(inputs.to_vec());
        for layer in &self.layers {
            let next = match out.last() {
                Some(previous) => layer.forward(previous, self.activation),
                None => Vec::new(),
            };
            out.push(next);
        }
        out
    }

    /// Retrain every layer on `samples`
    ///
    /// Returns the metrics of this pass (also stored on the model).
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        samples: &[TrainingSample],
        params: &TrainingParams,
        rng: &mut R,
    ) -> TrainingMetrics {
        let mut shuffled = samples.to_vec();
        shuffled.shuffle(rng);

        let holdout = if shuffled.len() >= 5 {
            ((shuffled.len() as f64) * VALIDATION_SPLIT).round() as usize
        } else {
            0
        };
        let validation = shuffled.split_off(shuffled.len() - holdout);
        let mut training = shuffled;

        let batch_size = params.batch_size.max(1);
        let mut epochs = 0;
        for _ in 0..params.max_epochs {
            training.shuffle(rng);
            epochs += 1;

            let mut loss_sum = 0.0;
            let mut batches = 0usize;
            for batch in training.chunks(batch_size) {
                loss_sum += self.step(batch, params.learning_rate);
                batches += 1;
            }

            let average = if batches == 0 { 0.0 } else { loss_sum / batches as f64 };
            if average < params.early_stop_loss {
                break;
            }
        }

        let eval_set = if validation.is_empty() { &training } else { &validation };
        let mut metrics = self.evaluate(eval_set);
        metrics.training_epochs = self.metrics.training_epochs + epochs;
        metrics.last_trained = Some(Utc::now());
        metrics.samples_trained = samples.len();
        self.metrics = metrics.clone();
        metrics
    }

    /// One backpropagation step over `batch`; returns the batch mean loss
    fn step(&mut self, batch: &[TrainingSample], learning_rate: f64) -> f64 {
        let mut gradients: Vec<DenseLayer> = self.layers.iter().map(DenseLayer::zeroed).collect();
        let mut loss = 0.0;

        for sample in batch {
            let activations = self.activations(&sample.inputs);
            let output = activations
                .last()
                .and_then(|out| out.first())
                .copied()
                .unwrap_or(0.0);
            let error = output - sample.target;
            loss += error * error;

            let mut delta = vec![error * self.activation.derivative(output)];
            for (index, layer) in self.layers.iter().enumerate().rev() {
                let input = &activations[index];
                let gradient = &mut gradients[index];
                let rows = gradient.weights.iter_mut().zip(&mut gradient.biases);
                for ((row, bias), d) in rows.zip(&delta) {
                    for (g, x) in row.iter_mut().zip(input) {
                        *g += d * x;
                    }
                    *bias += d;
                }
                if index > 0 {
                    delta = input
                        .iter()
                        .enumerate()
                        .map(|(i, a)| {
                            let back: f64 = layer
                                .weights
                                .iter()
                                .zip(&delta)
                                .map(|(row, d)| row[i] * d)
                                .sum();
                            back * self.activation.derivative(*a)
                        })
                        .collect();
                }
            }
        }

        let n = batch.len().max(1) as f64;
        for (layer, gradient) in self.layers.iter_mut().zip(&gradients) {
            layer.descend(gradient, learning_rate / n);
        }
        loss / n
    }

    fn evaluate(&self, samples: &[TrainingSample]) -> TrainingMetrics {
        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        let mut loss = 0.0;
        for sample in samples {
            let predicted = self.output_of(&sample.inputs);
            loss += (predicted - sample.target).powi(2);
            match (predicted >= POSITIVE_PREDICTION, sample.target >= POSITIVE_PREDICTION) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, false) => tn += 1,
                (false, true) => fn_ += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        TrainingMetrics {
            accuracy: ratio(tp + tn, samples.len()),
            precision,
            recall,
            f1_score,
            training_epochs: 0,
            validation_loss: if samples.is_empty() { 0.0 } else { loss / samples.len() as f64 },
            last_trained: None,
            samples_trained: 0,
        }
    }
}
