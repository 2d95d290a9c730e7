//! Datasets for node classification
//!
//! A JSON-backed dataset type and a synthetic community-graph generator.

mod dataset;
mod synthetic;

pub use dataset::{Dataset, NodeSplit};
