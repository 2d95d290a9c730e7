//! Edge attention and message passing
//!
//! Per-edge scores are normalised with a softmax over each destination's
//! incoming edges, and each destination sums the source features weighted
//! by those coefficients.

use ndarray::{Array1, Array2, ArrayView1};
use ordered_float::OrderedFloat;

use crate::error::{GatError, Result};
use crate::graph::Graph;
use crate::nn::softmax;

/// Unnormalised attention logits `a_src · z_s + a_dst · z_t` for every edge
pub fn edge_logits(
    graph: &Graph,
    z: &Array2<f64>,
    a_src: ArrayView1<f64>,
    a_dst: ArrayView1<f64>,
) -> Vec<f64> {
    graph
        .edges()
        .map(|(s, t)| a_src.dot(&z.row(s)) + a_dst.dot(&z.row(t)))
        .collect()
}

/// Softmax of edge scores over the incoming edges of each node
///
/// Result is indexed by edge id.
pub fn edge_softmax(graph: &Graph, scores: &[f64]) -> Vec<f64> {
    let mut alpha = vec![0.0; graph.num_edges()];

    for node in 0..graph.num_nodes() {
        let incoming = graph.incoming(node);
        if incoming.is_empty() {
            continue;
        }
        let node_scores: Vec<f64> = incoming.iter().map(|&e| scores[e]).collect();
        for (&e, a) in incoming.iter().zip(softmax(&node_scores)) {
            alpha[e] = a;
        }
    }

    alpha
}

/// Weighted sum of source features at each destination
///
/// Nodes without incoming edges get a zero row.
pub fn aggregate(graph: &Graph, z: &Array2<f64>, alpha: &[f64]) -> Array2<f64> {
    let mut out = Array2::zeros((graph.num_nodes(), z.ncols()));

    for node in 0..graph.num_nodes() {
        let mut row = out.row_mut(node);
        for &e in graph.incoming(node) {
            row.scaled_add(alpha[e], &z.row(graph.src(e)));
        }
    }

    out
}

/// The `k` sources that `node` attends to most, strongest first
///
/// `attention` holds one coefficient per edge, as returned by
/// `forward_with_attention`.
pub fn top_attended_neighbors(
    graph: &Graph,
    attention: &Array1<f64>,
    node: usize,
    k: usize,
) -> Result<Vec<(usize, f64)>> {
    if node >= graph.num_nodes() {
        return Err(GatError::InvalidNode {
            node,
            num_nodes: graph.num_nodes(),
        });
    }
    if attention.len() != graph.num_edges() {
        return Err(GatError::shape(
            "top_attended_neighbors attention",
            graph.num_edges(),
            attention.len(),
        ));
    }

    let mut neighbors: Vec<(usize, f64)> = graph
        .incoming(node)
        .iter()
        .map(|&e| (graph.src(e), attention[e]))
        .collect();

    neighbors.sort_by_key(|&(src, weight)| (std::cmp::Reverse(OrderedFloat(weight)), src));
    neighbors.truncate(k);
    Ok(neighbors)
}
