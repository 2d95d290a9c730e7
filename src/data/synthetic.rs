//! Synthetic community graphs
//!
//! Stochastic block model: one community per class, dense inside,
//! sparse across. Features are noisy copies of a per-class prototype.

use ndarray::Array2;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;
use tracing::debug;

use super::dataset::{Dataset, NodeSplit};
use crate::config::SyntheticConfig;
use crate::error::Result;
use crate::graph::Graph;

impl Dataset {
    /// Generate a stochastic block model dataset
    ///
    /// The graph is bidirected and every node has a self loop, so each
    /// node attends at least to itself.
    pub fn synthetic<R: Rng + ?Sized>(config: &SyntheticConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let n = config.num_nodes();
        let labels: Vec<usize> = (0..n).map(|i| i / config.nodes_per_class).collect();

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let p = if labels[i] == labels[j] {
                    config.p_in
                } else {
                    config.p_out
                };
                if rng.gen::<f64>() < p {
                    edges.push((i, j));
                }
            }
        }
        let graph = Graph::new(n, &edges)?.to_bidirected().with_self_loops();

        let prototypes: Array2<f64> =
            Array2::random_using((config.num_classes, config.feature_dim), StandardNormal, rng);
        let noise: Array2<f64> =
            Array2::random_using((n, config.feature_dim), StandardNormal, rng);
        let mut features = noise * config.noise;
        for (i, mut row) in features.rows_mut().into_iter().enumerate() {
            row += &prototypes.row(labels[i]);
        }

        let split = NodeSplit::random(n, config.train_fraction, config.val_fraction, rng);

        debug!(
            nodes = n,
            edges = graph.num_edges(),
            classes = config.num_classes,
            "generated synthetic dataset"
        );

        Dataset::new(graph, features, labels, config.num_classes, split)
    }
}
