//! Attention Inspection
//!
//! This example builds a small graph from an edge list, runs a GAT with
//! mean-merged heads and prints the attention each node gives its neighbours.
//!
//! Run with: cargo run --example attention_inspection

use anyhow::Result;
use graph_attention::gat::top_attended_neighbors;
use graph_attention::{Gat, GatConfig, Graph, Merge};
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

const EDGES: &str = "\
# two triangles joined by a bridge
nodes 6
0 1
1 2
2 0
2 3
3 4
4 5
5 3
";

fn main() -> Result<()> {
    println!("=== GAT Attention Inspection ===\n");

    // Build graph
    println!("1. Parsing edge list...");
    let graph = Graph::from_edge_list_str(EDGES)?
        .to_bidirected()
        .with_self_loops();
    println!("   Graph: {} nodes, {} edges", graph.num_nodes(), graph.num_edges());
    println!("   Density: {:.3}", graph.density());

    // Build model
    println!("\n2. Creating GAT with mean-merged heads...");
    let config = GatConfig {
        in_dim: 4,
        hidden_dims: vec![8, 8],
        out_dim: 3,
        num_heads: 3,
        hidden_merge: Merge::Mean,
        output_heads: 2,
        output_merge: Merge::Mean,
        ..GatConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(11);
    let model = Gat::from_config(&config, &mut rng)?;
    for (i, layer) in model.layers().iter().enumerate() {
        println!(
            "   layer {}: {} -> {} x {} heads ({:?})",
            i,
            layer.in_features(),
            layer.head_features(),
            layer.num_heads(),
            layer.merge()
        );
    }

    // Forward pass
    println!("\n3. Running forward pass...");
    let features = Array2::random_using((graph.num_nodes(), 4), Uniform::new(-1.0, 1.0), &mut rng);
    let (logits, attention) = model.forward_with_attention(&graph, &features)?;
    println!("   Output shape: {:?}", logits.dim());

    // Inspect first-layer attention
    println!("\n4. First-layer attention (head 0):");
    let weights = &attention[0][0];
    for node in 0..graph.num_nodes() {
        let total: f64 = graph.incoming(node).iter().map(|&e| weights[e]).sum();
        let top = top_attended_neighbors(&graph, weights, node, 2)?;
        let listing: Vec<String> = top.iter().map(|(src, w)| format!("{src}:{w:.3}")).collect();
        println!("   node {node}: top [{}]  (sum {:.3})", listing.join(", "), total);
    }

    println!("\n=== Inspection Complete ===");
    Ok(())
}
