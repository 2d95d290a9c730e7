//! Integration tests for Graph Attention Networks

use approx::assert_abs_diff_eq;
use graph_attention::gat::top_attended_neighbors;
use graph_attention::training::evaluate;
use graph_attention::{
    Config, Dataset, Gat, GatConfig, Graph, Merge, MultiHeadGatLayer, SyntheticConfig, TrainConfig,
    Trainer,
};
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Ring of `n` nodes in both directions, every node attending to itself
fn ring(n: usize) -> Graph {
    let edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
    Graph::new(n, &edges).unwrap().to_bidirected().with_self_loops()
}

fn random_features(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::random_using((rows, cols), Uniform::new(-1.0, 1.0), &mut rng)
}

fn small_problem(seed: u64) -> (Config, Dataset) {
    let config = Config {
        model: GatConfig {
            in_dim: 6,
            hidden_dims: vec![4, 4, 4],
            out_dim: 3,
            num_heads: 2,
            ..GatConfig::default()
        },
        training: TrainConfig {
            epochs: 40,
            learning_rate: 0.01,
            weight_decay: 0.0,
            patience: 0,
            log_every: 0,
            seed,
            ..TrainConfig::default()
        },
        data: SyntheticConfig {
            num_classes: 3,
            nodes_per_class: 10,
            feature_dim: 6,
            noise: 0.5,
            seed,
            ..SyntheticConfig::default()
        },
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let dataset = Dataset::synthetic(&config.data, &mut rng).unwrap();
    (config, dataset)
}

#[test]
fn test_four_layer_network_shapes() {
    let config = GatConfig::four_layer(5, [4, 6, 3], 2, 3);
    let gat = Gat::from_config(&config, &mut StdRng::seed_from_u64(0)).unwrap();
    let graph = ring(7);

    let logits = gat.forward(&graph, &random_features(7, 5, 1)).unwrap();

    assert_eq!(gat.num_layers(), 4);
    let dims: Vec<usize> = gat.layers().iter().map(|l| l.output_dim()).collect();
    assert_eq!(dims, vec![12, 18, 9, 2]);
    assert_eq!(gat.layers()[3].num_heads(), 1);
    assert_eq!(logits.dim(), (7, 2));
    assert!(logits.iter().all(|v| v.is_finite()));
}

#[test]
fn test_attention_sums_to_one_per_node() {
    let gat = Gat::from_config(
        &GatConfig::four_layer(4, [3, 3, 3], 2, 2),
        &mut StdRng::seed_from_u64(5),
    )
    .unwrap();
    let graph = ring(6);

    let (_, attention) = gat
        .forward_with_attention(&graph, &random_features(6, 4, 2))
        .unwrap();

    assert_eq!(attention.len(), 4);
    for heads in &attention {
        for weights in heads {
            assert_eq!(weights.len(), graph.num_edges());
            for node in 0..graph.num_nodes() {
                let total: f64 = graph.incoming(node).iter().map(|&e| weights[e]).sum();
                assert_abs_diff_eq!(total, 1.0, epsilon = 1e-10);
            }
        }
    }
}

#[test]
fn test_mean_merge_averages_heads() {
    let mut rng = StdRng::seed_from_u64(9);
    let layer = MultiHeadGatLayer::new(4, 3, 3, Merge::Mean, 0.01, &mut rng);
    let graph = ring(5);
    let h = random_features(5, 4, 3);

    let merged = layer.forward(&graph, &h).unwrap();

    let mut expected = Array2::<f64>::zeros((5, 3));
    for head in layer.heads() {
        expected += &head.forward(&graph, &h).unwrap();
    }
    expected /= 3.0;

    assert_eq!(merged.dim(), (5, 3));
    for (a, b) in merged.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn test_node_without_incoming_edges_outputs_zero() {
    // Node 2 only sends
    let graph = Graph::new(3, &[(0, 1), (1, 0), (2, 0), (0, 0), (1, 1)]).unwrap();
    let gat = Gat::from_config(
        &GatConfig::four_layer(3, [2, 2, 2], 2, 2),
        &mut StdRng::seed_from_u64(4),
    )
    .unwrap();

    let logits = gat.forward(&graph, &random_features(3, 3, 8)).unwrap();

    assert_eq!(graph.isolated_nodes(), vec![2]);
    assert!(logits.row(2).iter().all(|&v| v == 0.0));
    assert!(logits.row(0).iter().any(|&v| v != 0.0));
}

#[test]
fn test_train_save_load_predict() {
    let (config, dataset) = small_problem(21);
    let dir = tempfile::tempdir().unwrap();

    let mut model = Gat::from_config(&config.model, &mut StdRng::seed_from_u64(1)).unwrap();
    let mut trainer = Trainer::new(config.training.clone()).unwrap();
    let history = trainer.fit(&mut model, &dataset).unwrap();

    assert_eq!(history.epochs.len(), 40);
    let first = history.epochs.first().unwrap().train_loss;
    let last = history.last().unwrap().train_loss;
    assert!(last < first, "loss went from {first} to {last}");

    let model_path = dir.path().join("model.json");
    let data_path = dir.path().join("dataset.json");
    model.save(&model_path).unwrap();
    dataset.save(&data_path).unwrap();

    let restored = Gat::load(&model_path).unwrap();
    let reloaded = Dataset::load(&data_path).unwrap();

    assert_eq!(reloaded.graph, dataset.graph);
    assert_eq!(reloaded.labels, dataset.labels);
    assert_eq!(reloaded.split, dataset.split);
    assert_eq!(restored.num_parameters(), model.num_parameters());
    assert_eq!(
        restored.predict(&reloaded.graph, &reloaded.features).unwrap(),
        model.predict(&dataset.graph, &dataset.features).unwrap()
    );

    let a = evaluate(&model, &dataset.graph, &dataset.features, &dataset.labels, &dataset.split.test).unwrap();
    let b = evaluate(
        &restored,
        &reloaded.graph,
        &reloaded.features,
        &reloaded.labels,
        &reloaded.split.test,
    )
    .unwrap();
    assert_abs_diff_eq!(a.loss, b.loss, epsilon = 1e-9);
}

#[test]
fn test_edge_list_file_to_attention() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.txt");
    std::fs::write(&path, "# star\nnodes 4\n1 0\n2 0\n3,0\n").unwrap();

    let graph = Graph::load_edge_list(&path).unwrap().with_self_loops();
    assert_eq!(graph.num_nodes(), 4);
    assert_eq!(graph.in_degree(0), 4);
    assert_eq!(graph.in_degree(3), 1);

    let gat = Gat::from_config(
        &GatConfig::four_layer(2, [2, 2, 2], 2, 1),
        &mut StdRng::seed_from_u64(2),
    )
    .unwrap();
    let (_, attention) = gat
        .forward_with_attention(&graph, &random_features(4, 2, 6))
        .unwrap();

    let top = top_attended_neighbors(&graph, &attention[0][0], 0, 10).unwrap();
    assert_eq!(top.len(), 4);
    assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    assert_abs_diff_eq!(top.iter().map(|(_, w)| w).sum::<f64>(), 1.0, epsilon = 1e-10);
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gat.toml");

    let mut config = Config::default();
    config.model.hidden_merge = Merge::Mean;
    config.training.epochs = 7;
    config.to_file(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}
