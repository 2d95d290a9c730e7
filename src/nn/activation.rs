//! Activation functions and their derivatives
//!
//! Scalar forms are used inside the attention loop; batch forms apply
//! element-wise to whole feature matrices.

use ndarray::Array2;

/// Default negative slope for LeakyReLU on attention logits
pub const DEFAULT_NEGATIVE_SLOPE: f64 = 0.01;

/// Default alpha for ELU between layers
pub const DEFAULT_ELU_ALPHA: f64 = 1.0;

/// LeakyReLU activation
pub fn leaky_relu(x: f64, negative_slope: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        negative_slope * x
    }
}

/// LeakyReLU derivative
pub fn leaky_relu_grad(x: f64, negative_slope: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        negative_slope
    }
}

/// ELU activation
pub fn elu(x: f64, alpha: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        alpha * (x.exp() - 1.0)
    }
}

/// ELU derivative
pub fn elu_grad(x: f64, alpha: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        alpha * x.exp()
    }
}

/// Apply ELU to every element
pub fn elu_batch(x: &Array2<f64>, alpha: f64) -> Array2<f64> {
    x.mapv(|v| elu(v, alpha))
}

/// Backpropagate through ELU given the pre-activation input
pub fn elu_backward(pre_activation: &Array2<f64>, grad: &Array2<f64>, alpha: f64) -> Array2<f64> {
    pre_activation.mapv(|v| elu_grad(v, alpha)) * grad
}

/// Softmax function
///
/// Subtracts the maximum before exponentiating. Empty input gives
/// empty output.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp_scores: Vec<f64> = scores.iter().map(|&s| (s - max_score).exp()).collect();
    let sum: f64 = exp_scores.iter().sum();

    exp_scores.into_iter().map(|e| e / sum).collect()
}

/// Softmax backward: `dx_i = y_i * (dy_i - Σ_j y_j dy_j)`
pub fn softmax_backward(output: &[f64], grad: &[f64]) -> Vec<f64> {
    let dot: f64 = output.iter().zip(grad).map(|(y, g)| y * g).sum();
    output
        .iter()
        .zip(grad)
        .map(|(y, g)| y * (g - dot))
        .collect()
}
