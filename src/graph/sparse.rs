//! Directed graph with a CSR index over incoming edges
//!
//! Message passing reduces at the destination node, so the index is
//! grouped by destination: `in_ptr[t]..in_ptr[t + 1]` is the range of
//! `in_edges` holding the ids of every edge that ends at `t`.

use std::collections::HashSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{GatError, Result};

/// Directed graph stored as an edge list plus a destination-grouped CSR index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EdgeList", into = "EdgeList")]
pub struct Graph {
    /// Number of nodes
    num_nodes: usize,
    /// Source node of each edge
    src: Vec<usize>,
    /// Destination node of each edge
    dst: Vec<usize>,
    /// Row pointers into `in_edges`, one row per destination node
    in_ptr: Vec<usize>,
    /// Edge ids sorted by destination, insertion order within a row
    in_edges: Vec<usize>,
}

/// Serialized form: the index is rebuilt on load
#[derive(Serialize, Deserialize)]
struct EdgeList {
    num_nodes: usize,
    edges: Vec<(usize, usize)>,
}

impl TryFrom<EdgeList> for Graph {
    type Error = GatError;

    fn try_from(list: EdgeList) -> Result<Self> {
        Graph::new(list.num_nodes, &list.edges)
    }
}

impl From<Graph> for EdgeList {
    fn from(graph: Graph) -> Self {
        EdgeList {
            num_nodes: graph.num_nodes,
            edges: graph.edges().collect(),
        }
    }
}

impl Graph {
    /// Create a graph from `(src, dst)` pairs
    ///
    /// Edge ids follow the order of `edges`.
    pub fn new(num_nodes: usize, edges: &[(usize, usize)]) -> Result<Self> {
        for &(s, d) in edges {
            for node in [s, d] {
                if node >= num_nodes {
                    return Err(GatError::InvalidNode { node, num_nodes });
                }
            }
        }

        Ok(Self::build(num_nodes, edges))
    }

    fn build(num_nodes: usize, edges: &[(usize, usize)]) -> Self {
        let src: Vec<usize> = edges.iter().map(|e| e.0).collect();
        let dst: Vec<usize> = edges.iter().map(|e| e.1).collect();

        // Counting sort by destination keeps insertion order within each row
        let mut in_ptr = vec![0usize; num_nodes + 1];
        for &d in &dst {
            in_ptr[d + 1] += 1;
        }
        for i in 0..num_nodes {
            in_ptr[i + 1] += in_ptr[i];
        }

        let mut cursor = in_ptr.clone();
        let mut in_edges = vec![0usize; dst.len()];
        for (edge, &d) in dst.iter().enumerate() {
            in_edges[cursor[d]] = edge;
            cursor[d] += 1;
        }

        Self {
            num_nodes,
            src,
            dst,
            in_ptr,
            in_edges,
        }
    }

    /// Create from dense adjacency matrix
    ///
    /// Every non-zero entry `a[[i, j]]` becomes the edge `i -> j`.
    pub fn from_dense(adjacency: &Array2<f64>) -> Result<Self> {
        let (rows, cols) = adjacency.dim();
        if rows != cols {
            return Err(GatError::shape(
                "Graph::from_dense",
                format!("square matrix ({rows}, {rows})"),
                format!("({rows}, {cols})"),
            ));
        }

        let edges: Vec<(usize, usize)> = adjacency
            .indexed_iter()
            .filter(|(_, &w)| w != 0.0)
            .map(|((i, j), _)| (i, j))
            .collect();

        Self::new(rows, &edges)
    }

    /// Get number of nodes
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Get number of edges
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    /// Source node of an edge
    pub fn src(&self, edge: usize) -> usize {
        self.src[edge]
    }

    /// Destination node of an edge
    pub fn dst(&self, edge: usize) -> usize {
        self.dst[edge]
    }

    /// Iterate over `(src, dst)` pairs in edge-id order
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }

    /// Ids of the edges ending at `node`
    ///
    /// # Panics
    ///
    /// Panics if `node >= num_nodes()`.
    pub fn incoming(&self, node: usize) -> &[usize] {
        &self.in_edges[self.in_ptr[node]..self.in_ptr[node + 1]]
    }

    /// Number of edges ending at `node`
    ///
    /// # Panics
    ///
    /// Panics if `node >= num_nodes()`.
    pub fn in_degree(&self, node: usize) -> usize {
        self.in_ptr[node + 1] - self.in_ptr[node]
    }

    /// Number of edges starting at `node`
    pub fn out_degree(&self, node: usize) -> usize {
        self.src.iter().filter(|&&s| s == node).count()
    }

    /// Check if edge exists
    pub fn has_edge(&self, src: usize, dst: usize) -> bool {
        dst < self.num_nodes && self.incoming(dst).iter().any(|&e| self.src[e] == src)
    }

    /// Nodes that receive no messages
    pub fn isolated_nodes(&self) -> Vec<usize> {
        (0..self.num_nodes)
            .filter(|&n| self.in_degree(n) == 0)
            .collect()
    }

    /// Get graph density (self loops excluded from the denominator)
    pub fn density(&self) -> f64 {
        let max_edges = self.num_nodes * self.num_nodes.saturating_sub(1);
        if max_edges == 0 {
            0.0
        } else {
            self.num_edges() as f64 / max_edges as f64
        }
    }

    /// Check if every edge has its reverse
    pub fn is_symmetric(&self) -> bool {
        self.edges().all(|(s, d)| self.has_edge(d, s))
    }

    /// Add a self loop to every node that lacks one
    ///
    /// Existing edges keep their ids; loops are appended in node order.
    pub fn with_self_loops(&self) -> Self {
        let mut edges: Vec<(usize, usize)> = self.edges().collect();
        for node in 0..self.num_nodes {
            if !self.has_edge(node, node) {
                edges.push((node, node));
            }
        }
        Self::build(self.num_nodes, &edges)
    }

    /// Add the reverse of every edge that has none
    pub fn to_bidirected(&self) -> Self {
        let mut seen: HashSet<(usize, usize)> = self.edges().collect();
        let mut edges: Vec<(usize, usize)> = self.edges().collect();
        for (s, d) in self.edges() {
            if seen.insert((d, s)) {
                edges.push((d, s));
            }
        }
        Self::build(self.num_nodes, &edges)
    }

    /// Convert to dense adjacency matrix (edge multiplicity as weight)
    pub fn to_dense(&self) -> Array2<f64> {
        let mut adj = Array2::zeros((self.num_nodes, self.num_nodes));
        for (s, d) in self.edges() {
            adj[[s, d]] += 1.0;
        }
        adj
    }
}
