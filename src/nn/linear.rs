//! Bias-free dense projection
//!
//! `y = x W` with `W` stored as `(in_features, out_features)`.

use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gain used for Xavier initialisation (ReLU-family gain)
pub const XAVIER_GAIN: f64 = std::f64::consts::SQRT_2;

/// Linear layer without bias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// Weight matrix (in_features x out_features)
    pub weight: Array2<f64>,
}

impl Linear {
    /// Create a layer with Xavier uniform initialisation
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let limit = XAVIER_GAIN * (6.0 / (in_features + out_features) as f64).sqrt();
        let weight = Array2::random_using(
            (in_features, out_features),
            Uniform::new_inclusive(-limit, limit),
            rng,
        );
        Self { weight }
    }

    /// Wrap an existing weight matrix
    pub fn from_weight(weight: Array2<f64>) -> Self {
        Self { weight }
    }

    /// Input dimension
    pub fn in_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Output dimension
    pub fn out_features(&self) -> usize {
        self.weight.ncols()
    }

    /// Forward pass
    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weight)
    }

    /// Backward pass
    ///
    /// Returns `(input_gradient, weight_gradient)`.
    pub fn backward(&self, input: &Array2<f64>, grad: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let weight_grad = input.t().dot(grad);
        let input_grad = grad.dot(&self.weight.t());
        (input_grad, weight_grad)
    }

    /// Number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weight.len()
    }
}
