//! Graph Attention Networks
//!
//! This crate implements Graph Attention Networks (GAT) on top of `ndarray`:
//! node representations are learned by attention-weighted aggregation over
//! each node's incoming neighbours.
//!
//! # Features
//!
//! - **Graph**: directed graph with an incoming-edge index for message passing
//! - **GAT layers**: single-head attention, multi-head concat/mean merge, stacked network
//! - **Training**: hand-derived gradients, SGD/Adam, early stopping
//! - **Data**: JSON datasets and a synthetic community-graph generator
//!
//! # Example
//!
//! ```rust,no_run
//! use graph_attention::{Gat, Graph};
//! use ndarray::Array2;
//!
//! fn main() -> anyhow::Result<()> {
//!     // A small ring where every node also attends to itself
//!     let graph = Graph::new(4, &[(0, 1), (1, 2), (2, 3), (3, 0)])?
//!         .to_bidirected()
//!         .with_self_loops();
//!
//!     // in_dim 8, hidden [16, 16, 16] per head, 3 outputs, 4 heads
//!     let gat = Gat::new(8, [16, 16, 16], 3, 4)?;
//!     let features = Array2::zeros((4, 8));
//!     let logits = gat.forward(&graph, &features)?;
//!     assert_eq!(logits.dim(), (4, 3));
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod gat;
pub mod graph;
pub mod nn;
pub mod training;

// Re-export commonly used types
pub use config::{Config, GatConfig, SyntheticConfig, TrainConfig};
pub use data::{Dataset, NodeSplit};
pub use error::{GatError, Result};
pub use gat::{Gat, GatLayer, Merge, MultiHeadGatLayer};
pub use graph::Graph;
pub use training::{Trainer, TrainingHistory};
