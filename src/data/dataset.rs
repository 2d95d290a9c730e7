//! Node classification dataset
//!
//! Graph, node features, labels and the train/validation/test split,
//! stored together as JSON.

use std::collections::HashSet;
use std::path::Path;

use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GatError, Result};
use crate::graph::Graph;

/// Disjoint node index sets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSplit {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

impl NodeSplit {
    /// Shuffle `0..num_nodes` and cut it into train, validation and test
    ///
    /// Training gets at least one node when `num_nodes > 0`.
    pub fn random<R: Rng + ?Sized>(
        num_nodes: usize,
        train_fraction: f64,
        val_fraction: f64,
        rng: &mut R,
    ) -> Self {
        let mut nodes: Vec<usize> = (0..num_nodes).collect();
        nodes.shuffle(rng);

        let n_train = ((num_nodes as f64 * train_fraction).round() as usize)
            .max(1)
            .min(num_nodes);
        let n_val = ((num_nodes as f64 * val_fraction).round() as usize).min(num_nodes - n_train);

        let test = nodes.split_off(n_train + n_val);
        let val = nodes.split_off(n_train);

        Self {
            train: nodes,
            val,
            test,
        }
    }

    fn validate(&self, num_nodes: usize) -> Result<()> {
        let mut seen = HashSet::new();
        for &node in self.train.iter().chain(&self.val).chain(&self.test) {
            if node >= num_nodes {
                return Err(GatError::InvalidNode { node, num_nodes });
            }
            if !seen.insert(node) {
                return Err(GatError::InvalidConfig(format!(
                    "node {node} appears in more than one split"
                )));
            }
        }
        Ok(())
    }
}

/// A graph with labelled node features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub graph: Graph,
    /// Node features (num_nodes x feature_dim)
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
    pub num_classes: usize,
    pub split: NodeSplit,
}

impl Dataset {
    /// Create and validate a dataset
    pub fn new(
        graph: Graph,
        features: Array2<f64>,
        labels: Vec<usize>,
        num_classes: usize,
        split: NodeSplit,
    ) -> Result<Self> {
        let dataset = Self {
            graph,
            features,
            labels,
            num_classes,
            split,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    /// Feature dimension
    pub fn feature_dim(&self) -> usize {
        self.features.ncols()
    }

    /// Nodes per class
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// Check that every part agrees on the node count
    pub fn validate(&self) -> Result<()> {
        let n = self.graph.num_nodes();
        if self.features.nrows() != n {
            return Err(GatError::shape("Dataset features", n, self.features.nrows()));
        }
        if self.labels.len() != n {
            return Err(GatError::shape("Dataset labels", n, self.labels.len()));
        }
        if let Some(&bad) = self.labels.iter().find(|&&l| l >= self.num_classes) {
            return Err(GatError::shape(
                "Dataset label",
                format!("class < {}", self.num_classes),
                bad,
            ));
        }
        self.split.validate(n)
    }

    /// Save as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Load from JSON and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let dataset: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        dataset.validate()?;
        Ok(dataset)
    }
}
