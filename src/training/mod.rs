//! Training loop and metrics
//!
//! Full-batch gradient descent on a node classification task with
//! validation-based early stopping.

mod metrics;
mod trainer;

pub use metrics::{accuracy, evaluate, evaluate_logits, EpochMetrics, Evaluation, TrainingHistory};
pub use trainer::Trainer;
