//! Graph Attention Network implementation
//!
//! Provides the single-head attention layer, the multi-head wrapper and
//! the stacked network.

pub mod attention;
mod layer;
mod multi_head;
mod network;

pub use attention::top_attended_neighbors;
pub use layer::{GatLayer, HeadGradients};
pub use multi_head::{Merge, MultiHeadGatLayer};
pub use network::{AttentionMaps, Gat, GatGradients};
