//! Neural network building blocks
//!
//! Activations, a bias-free linear projection, the classification loss
//! and the optimizers used to train the attention layers.

pub mod activation;
pub mod linear;
pub mod loss;
pub mod optimizer;

pub use activation::{elu, leaky_relu, softmax};
pub use linear::Linear;
pub use loss::{argmax_rows, cross_entropy};
pub use optimizer::{build_optimizer, Adam, Optimizer, OptimizerKind, Sgd};
