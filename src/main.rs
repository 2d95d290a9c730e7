//! Graph Attention Network CLI
//!
//! Command-line interface for generating data, training and inspecting GAT models.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graph_attention::{
    gat::top_attended_neighbors,
    training::{accuracy, evaluate},
    Config, Dataset, Gat, Trainer,
};

#[derive(Parser)]
#[command(name = "gat")]
#[command(about = "Graph Attention Networks for node classification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    InitConfig {
        /// Output file path
        #[arg(short, long, default_value = "gat.toml")]
        output: PathBuf,
    },

    /// Generate a synthetic community-graph dataset
    Generate {
        /// Configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output dataset file
        #[arg(short, long, default_value = "dataset.json")]
        output: PathBuf,
    },

    /// Train a GAT model
    Train {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset file (a synthetic one is generated when omitted)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Override the number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Output model file
        #[arg(short, long, default_value = "model.json")]
        output: PathBuf,

        /// Write the per-epoch history as JSON
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Predict classes with a trained model
    Predict {
        /// Model file
        #[arg(short, long)]
        model: PathBuf,

        /// Dataset file
        #[arg(short, long)]
        dataset: PathBuf,
    },

    /// Show which neighbours a node attends to
    Inspect {
        /// Model file
        #[arg(short, long)]
        model: PathBuf,

        /// Dataset file
        #[arg(short, long)]
        dataset: PathBuf,

        /// Node to inspect
        #[arg(short, long, default_value = "0")]
        node: usize,

        /// Number of neighbours to list per head
        #[arg(short, long, default_value = "5")]
        top: usize,
    },

    /// Generate data, train and inspect attention in one run
    Demo,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { output } => {
            Config::default().to_file(&output)?;
            info!("Default configuration written to {}", output.display());
        }

        Commands::Generate { config, output } => {
            let config = load_config(config.as_ref())?;
            let mut rng = StdRng::seed_from_u64(config.data.seed);
            let dataset = Dataset::synthetic(&config.data, &mut rng)?;
            dataset.save(&output)?;
            info!(
                "Dataset with {} nodes and {} edges saved to {}",
                dataset.num_nodes(),
                dataset.graph.num_edges(),
                output.display()
            );
        }

        Commands::Train {
            config,
            dataset,
            epochs,
            output,
            history,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }

            let dataset = match dataset {
                Some(path) => {
                    let dataset = Dataset::load(&path)
                        .with_context(|| format!("loading dataset {}", path.display()))?;
                    config
                        .model
                        .fit_to_data(dataset.feature_dim(), dataset.num_classes)
                        .context("model configuration does not fit the dataset")?;
                    dataset
                }
                None => {
                    let mut rng = StdRng::seed_from_u64(config.data.seed);
                    Dataset::synthetic(&config.data, &mut rng)?
                }
            };

            let (model, run) = train(&config, &dataset)?;
            model.save(&output)?;
            info!("Model saved to {}", output.display());

            if let Some(path) = history {
                std::fs::write(&path, run.to_json()?)?;
                info!("History saved to {}", path.display());
            }

            if !dataset.split.test.is_empty() {
                let test = evaluate(
                    &model,
                    &dataset.graph,
                    &dataset.features,
                    &dataset.labels,
                    &dataset.split.test,
                )?;
                info!("Test loss {:.4}, accuracy {:.3}", test.loss, test.accuracy);
            }
        }

        Commands::Predict { model, dataset } => {
            let model = Gat::load(&model)?;
            let dataset = Dataset::load(&dataset)?;
            let predictions = model.predict(&dataset.graph, &dataset.features)?;

            for (node, class) in predictions.iter().enumerate() {
                println!("{node}\t{class}");
            }
            if !dataset.split.test.is_empty() {
                let acc = accuracy(&predictions, &dataset.labels, &dataset.split.test);
                info!("Test accuracy: {:.3}", acc);
            }
        }

        Commands::Inspect {
            model,
            dataset,
            node,
            top,
        } => {
            let model = Gat::load(&model)?;
            let dataset = Dataset::load(&dataset)?;
            inspect(&model, &dataset, node, top)?;
        }

        Commands::Demo => {
            info!("Running GAT demo...");
            run_demo()?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn train(config: &Config, dataset: &Dataset) -> Result<(Gat, graph_attention::TrainingHistory)> {
    let mut rng = StdRng::seed_from_u64(config.training.seed);
    let mut model = Gat::from_config(&config.model, &mut rng)?;
    info!(
        "Model: {} layers, {} parameters",
        model.num_layers(),
        model.num_parameters()
    );

    let mut trainer = Trainer::new(config.training.clone())?;
    let history = trainer.fit(&mut model, dataset)?;
    Ok((model, history))
}

fn inspect(model: &Gat, dataset: &Dataset, node: usize, top: usize) -> Result<()> {
    if node >= dataset.num_nodes() {
        bail!("node {node} out of range (dataset has {} nodes)", dataset.num_nodes());
    }

    let (_, attention) = model.forward_with_attention(&dataset.graph, &dataset.features)?;
    info!(
        "Node {} (label {}) has {} incoming edges",
        node,
        dataset.labels[node],
        dataset.graph.in_degree(node)
    );

    for (layer, heads) in attention.iter().enumerate() {
        for (head, weights) in heads.iter().enumerate() {
            let neighbors = top_attended_neighbors(&dataset.graph, weights, node, top)?;
            let listing: Vec<String> = neighbors
                .iter()
                .map(|(src, w)| format!("{src} (label {}) {:.3}", dataset.labels[*src], w))
                .collect();
            info!("  layer {} head {}: {}", layer, head, listing.join(", "));
        }
    }

    Ok(())
}

fn run_demo() -> Result<()> {
    info!("=== Graph Attention Network Demo ===");

    let mut config = Config::default();
    config.training.epochs = 100;

    info!("1. Generating a stochastic block model");
    let mut rng = StdRng::seed_from_u64(config.data.seed);
    let dataset = Dataset::synthetic(&config.data, &mut rng)?;
    info!(
        "   {} nodes, {} edges, {} classes, density {:.3}",
        dataset.num_nodes(),
        dataset.graph.num_edges(),
        dataset.num_classes,
        dataset.graph.density()
    );

    info!("2. Training a {}-layer GAT", config.model.hidden_dims.len() + 1);
    let (model, history) = train(&config, &dataset)?;
    if let Some(best) = history.best() {
        info!("   Best epoch {} (train loss {:.4})", best.epoch, best.train_loss);
    }

    info!("3. Evaluating on held-out nodes");
    let test = evaluate(
        &model,
        &dataset.graph,
        &dataset.features,
        &dataset.labels,
        &dataset.split.test,
    )?;
    info!("   Test accuracy: {:.3}", test.accuracy);

    info!("4. Attention of node 0");
    inspect(&model, &dataset, 0, 3)?;

    info!("=== Demo Complete ===");
    Ok(())
}
