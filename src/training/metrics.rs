//! Training metrics

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{GatError, Result};
use crate::gat::Gat;
use crate::graph::Graph;
use crate::nn::{argmax_rows, cross_entropy};

/// Loss and accuracy on one node set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

/// Metrics recorded after one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val: Option<Evaluation>,
    pub grad_norm: f64,
}

/// Full record of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    /// Epoch whose parameters were kept
    pub best_epoch: usize,
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Metrics of the kept epoch
    pub fn best(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().find(|m| m.epoch == self.best_epoch)
    }

    /// Metrics of the last epoch run
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Save as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Fraction of masked nodes whose prediction equals the label
pub fn accuracy(predictions: &[usize], labels: &[usize], mask: &[usize]) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    let correct = mask
        .iter()
        .filter(|&&node| predictions[node] == labels[node])
        .count();
    correct as f64 / mask.len() as f64
}

/// Evaluate from precomputed logits
pub fn evaluate_logits(logits: &Array2<f64>, labels: &[usize], mask: &[usize]) -> Result<Evaluation> {
    let (loss, _) = cross_entropy(logits, labels, mask)?;
    let predictions = argmax_rows(logits);
    Ok(Evaluation {
        loss,
        accuracy: accuracy(&predictions, labels, mask),
    })
}

/// Run inference and evaluate on `mask`
pub fn evaluate(
    model: &Gat,
    graph: &Graph,
    features: &Array2<f64>,
    labels: &[usize],
    mask: &[usize],
) -> Result<Evaluation> {
    if mask.is_empty() {
        return Err(GatError::EmptyMask("evaluate"));
    }
    let logits = model.forward(graph, features)?;
    evaluate_logits(&logits, labels, mask)
}
