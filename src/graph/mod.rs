//! Graph data structures
//!
//! A directed graph indexed for message passing: edges send data from
//! their source to their destination, and each node reduces the messages
//! on its incoming edges.

mod edge_list;
mod sparse;

pub use sparse::Graph;
