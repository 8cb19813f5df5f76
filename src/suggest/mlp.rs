//! Minimal multilayer perceptron used by the destination classifier.
//!
//! A three-layer feed-forward net with a symmetric sigmoid (tanh, range
//! `[-1, +1]`) on every layer, trained by plain online back-propagation.
//! Training stops after a fixed number of iterations or once the mean
//! squared training error drops below a target, whichever comes first.
//!
//! The trained model is serialised to JSON so a run's classifier can be
//! inspected after the fact.

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while persisting a trained model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model file could not be written.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: std::path::PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The model could not be serialised.
    #[error("serialisation error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One fully connected layer. `weights[j]` holds neuron `j`'s input
/// weights; the final element is the bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Layer {
    weights: Vec<Vec<f64>>,
}

impl Layer {
    fn new<R: Rng + ?Sized>(inputs: usize, neurons: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs.max(1) as f64).sqrt();
        let weights = (0..neurons)
            .map(|_| (0..=inputs).map(|_| rng.gen_range(-bound..bound)).collect())
            .collect();
        Self { weights }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|w| {
                let bias = w[w.len() - 1];
                let net: f64 = w[..w.len() - 1]
                    .iter()
                    .zip(input)
                    .map(|(wi, xi)| wi * xi)
                    .sum();
                (net + bias).tanh()
            })
            .collect()
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainingReport {
    /// Number of iterations (full passes over the training set) performed.
    pub iterations: usize,
    /// Mean squared error after the final iteration.
    pub error: f64,
}

/// A three-layer feed-forward network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Layer>,
}

impl Mlp {
    /// Create a network with randomly initialised weights.
    #[must_use]
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        hidden: usize,
        outputs: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            layers: vec![Layer::new(inputs, hidden, rng), Layer::new(hidden, outputs, rng)],
        }
    }

    /// Run inference, returning one score per output neuron in `[-1, +1]`.
    #[must_use]
    pub fn predict(&self, input: &[f32]) -> Vec<f32> {
        let mut activation: Vec<f64> = input.iter().map(|&x| f64::from(x)).collect();
        for layer in &self.layers {
            activation = layer.forward(&activation);
        }
        activation.iter().map(|&x| x as f32).collect()
    }

    /// Train with online back-propagation.
    ///
    /// Rows are visited in the order given; stops after `max_iterations`
    /// passes or when the mean squared error over the set drops to
    /// `target_error`.
    pub fn train(
        &mut self,
        inputs: &[Vec<f32>],
        targets: &[Vec<f32>],
        learning_rate: f64,
        max_iterations: usize,
        target_error: f64,
    ) -> TrainingReport {
        debug_assert_eq!(inputs.len(), targets.len());

        let mut report = TrainingReport {
            iterations: 0,
            error: f64::INFINITY,
        };
        if inputs.is_empty() {
            return report;
        }
        let output_width = targets[0].len();

        for iteration in 1..=max_iterations {
            let mut squared_error = 0.0;
            for (input, target) in inputs.iter().zip(targets) {
                squared_error += self.fit_row(input, target, learning_rate);
            }
            report.iterations = iteration;
            report.error = squared_error / (inputs.len() * output_width) as f64;
            if report.error <= target_error {
                break;
            }
        }
        report
    }

    /// One backprop step for a single row; returns the row's squared error.
    fn fit_row(&mut self, input: &[f32], target: &[f32], learning_rate: f64) -> f64 {
        // forward pass, keeping every layer's activation
        let mut activations: Vec<Vec<f64>> =
            vec![input.iter().map(|&x| f64::from(x)).collect()];
        for layer in &self.layers {
            let next = layer.forward(activations.last().expect("nonempty activations"));
            activations.push(next);
        }

        let output = activations.last().expect("nonempty activations");
        let squared_error: f64 = output
            .iter()
            .zip(target)
            .map(|(o, &t)| (o - f64::from(t)).powi(2))
            .sum();

        // output delta: dE/dnet with tanh' = 1 - y^2
        let mut delta: Vec<f64> = output
            .iter()
            .zip(target)
            .map(|(o, &t)| (o - f64::from(t)) * (1.0 - o * o))
            .collect();

        for index in (0..self.layers.len()).rev() {
            let layer_input = &activations[index];

            // propagate through the pre-update weights
            let previous_delta: Vec<f64> = if index > 0 {
                (0..layer_input.len())
                    .map(|i| {
                        let upstream: f64 = self.layers[index]
                            .weights
                            .iter()
                            .zip(&delta)
                            .map(|(w, d)| w[i] * d)
                            .sum();
                        upstream * (1.0 - layer_input[i] * layer_input[i])
                    })
                    .collect()
            } else {
                Vec::new()
            };

            for (weights, d) in self.layers[index].weights.iter_mut().zip(&delta) {
                let bias_index = weights.len() - 1;
                for (w, x) in weights[..bias_index].iter_mut().zip(layer_input) {
                    *w -= learning_rate * d * x;
                }
                weights[bias_index] -= learning_rate * d;
            }

            delta = previous_delta;
        }

        squared_error
    }

    /// Serialise the model to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written; callers log and
    /// continue.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn larger_first_set() -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        // +1 when the first input dominates, -1 otherwise
        let inputs = vec![
            vec![0.9, 0.1],
            vec![0.8, 0.3],
            vec![0.2, 0.7],
            vec![0.1, 0.9],
        ];
        let targets = vec![vec![1.0], vec![1.0], vec![-1.0], vec![-1.0]];
        (inputs, targets)
    }

    #[test]
    fn test_predict_shape_and_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let mlp = Mlp::new(4, 6, 3, &mut rng);
        let out = mlp.predict(&[0.5, -0.5, 1.0, 0.0]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_training_reduces_error() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut mlp = Mlp::new(2, 8, 1, &mut rng);
        let (inputs, targets) = larger_first_set();

        let first = mlp.train(&inputs, &targets, 0.1, 1, 0.0);
        let last = mlp.train(&inputs, &targets, 0.1, 2000, 0.0);
        assert!(last.error < first.error);
    }

    #[test]
    fn test_training_learns_simple_rule() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut mlp = Mlp::new(2, 8, 1, &mut rng);
        let (inputs, targets) = larger_first_set();

        mlp.train(&inputs, &targets, 0.1, 10_000, 0.01);

        assert!(mlp.predict(&[0.95, 0.05])[0] > 0.0);
        assert!(mlp.predict(&[0.05, 0.95])[0] < 0.0);
    }

    #[test]
    fn test_training_stops_at_target_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut mlp = Mlp::new(2, 8, 1, &mut rng);
        let (inputs, targets) = larger_first_set();

        let report = mlp.train(&inputs, &targets, 0.1, 10_000, 0.5);
        assert!(report.iterations < 10_000);
        assert!(report.error <= 0.5);
    }

    #[test]
    fn test_training_empty_set_is_noop() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut mlp = Mlp::new(2, 4, 1, &mut rng);
        let report = mlp.train(&[], &[], 0.1, 100, 0.01);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mlpfile");

        let mut rng = StdRng::seed_from_u64(9);
        let mlp = Mlp::new(3, 5, 2, &mut rng);
        mlp.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let restored: Mlp = serde_json::from_str(&text).unwrap();
        let input = [0.1, 0.2, 0.3];
        assert_eq!(mlp.predict(&input), restored.predict(&input));
    }

    #[test]
    fn test_save_to_unwritable_path_errors() {
        let mut rng = StdRng::seed_from_u64(9);
        let mlp = Mlp::new(2, 2, 1, &mut rng);
        assert!(mlp
            .save(Path::new("/nonexistent-dir-xyz/mlpfile"))
            .is_err());
    }
}
