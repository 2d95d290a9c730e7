//! Node Classification with a Graph Attention Network
//!
//! This example generates a community graph, trains the four-layer GAT
//! on a fraction of the labels and reports accuracy on the rest.
//!
//! Run with: cargo run --example node_classification

use anyhow::Result;
use graph_attention::training::evaluate;
use graph_attention::{Config, Dataset, Gat, Trainer};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<()> {
    println!("=== GAT Node Classification Demo ===\n");

    let mut config = Config::default();
    config.training.epochs = 150;
    config.training.log_every = 0;

    println!("Configuration:");
    println!("  Classes: {}", config.data.num_classes);
    println!("  Nodes per class: {}", config.data.nodes_per_class);
    println!("  Input features: {}", config.model.in_dim);
    println!("  Hidden dims: {:?}", config.model.hidden_dims);
    println!("  Attention heads: {}", config.model.num_heads);

    // Generate data
    println!("\n1. Generating stochastic block model...");
    let mut rng = StdRng::seed_from_u64(config.data.seed);
    let dataset = Dataset::synthetic(&config.data, &mut rng)?;
    println!(
        "   Graph: {} nodes, {} edges (symmetric: {})",
        dataset.num_nodes(),
        dataset.graph.num_edges(),
        dataset.graph.is_symmetric()
    );
    println!(
        "   Split: {} train, {} val, {} test",
        dataset.split.train.len(),
        dataset.split.val.len(),
        dataset.split.test.len()
    );

    // Build model
    println!("\n2. Creating Graph Attention Network...");
    let mut model = Gat::from_config(&config.model, &mut StdRng::seed_from_u64(config.training.seed))?;
    println!("   Layers: {}", model.num_layers());
    println!("   Parameters: {}", model.num_parameters());

    let before = evaluate(
        &model,
        &dataset.graph,
        &dataset.features,
        &dataset.labels,
        &dataset.split.test,
    )?;
    println!("   Untrained test accuracy: {:.3}", before.accuracy);

    // Train
    println!("\n3. Training...");
    let mut trainer = Trainer::new(config.training.clone())?;
    let history = trainer.fit(&mut model, &dataset)?;
    for metrics in history.epochs.iter().step_by(25) {
        let val_acc = metrics.val.map(|v| v.accuracy).unwrap_or(0.0);
        println!(
            "   epoch {:>4}  train loss {:.4}  train acc {:.3}  val acc {:.3}",
            metrics.epoch, metrics.train_loss, metrics.train_accuracy, val_acc
        );
    }
    println!(
        "   Kept epoch {} of {} (stopped early: {})",
        history.best_epoch,
        history.epochs.len(),
        history.stopped_early
    );

    // Evaluate
    println!("\n4. Evaluating on test nodes...");
    let after = evaluate(
        &model,
        &dataset.graph,
        &dataset.features,
        &dataset.labels,
        &dataset.split.test,
    )?;
    println!("   Test loss: {:.4}", after.loss);
    println!("   Test accuracy: {:.3}", after.accuracy);

    println!("\n=== Demo Complete ===");
    Ok(())
}
