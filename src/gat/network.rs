//! Graph Attention Network
//!
//! Stacked multi-head attention layers with ELU between them.

use std::path::Path;

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layer::HeadGradients;
use super::multi_head::MultiHeadGatLayer;
use crate::config::GatConfig;
use crate::error::{GatError, Result};
use crate::graph::Graph;
use crate::nn::activation::{elu_backward, elu_batch};
use crate::nn::{argmax_rows, Optimizer};

/// Parameter gradients for the whole network, `layers[layer][head]`
#[derive(Debug, Clone)]
pub struct GatGradients {
    pub layers: Vec<Vec<HeadGradients>>,
}

impl GatGradients {
    /// Global L2 norm of all gradients
    pub fn norm(&self) -> f64 {
        self.layers
            .iter()
            .flatten()
            .map(|g| g.fc.mapv(|v| v * v).sum() + g.attn.mapv(|v| v * v).sum())
            .sum::<f64>()
            .sqrt()
    }
}

/// Per-layer attention, `[layer][head]`, each indexed by edge id
pub type AttentionMaps = Vec<Vec<Array1<f64>>>;

#[derive(Debug, Clone, Default)]
struct NetworkCache {
    /// Layer outputs before ELU, all layers but the last
    pre_activations: Vec<Array2<f64>>,
    /// Inverted-dropout masks applied to each layer input
    dropout_masks: Vec<Option<Array2<f64>>>,
}

/// Graph Attention Network
///
/// Multi-layer GAT producing per-node logits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gat {
    config: GatConfig,
    layers: Vec<MultiHeadGatLayer>,
    #[serde(skip)]
    cache: Option<NetworkCache>,
}

impl Gat {
    /// Create the four-layer network
    ///
    /// Three hidden layers with `num_heads` concatenated heads each, then a
    /// single-head output layer.
    pub fn new(
        in_dim: usize,
        hidden_dims: [usize; 3],
        out_dim: usize,
        num_heads: usize,
    ) -> Result<Self> {
        let config = GatConfig::four_layer(in_dim, hidden_dims, out_dim, num_heads);
        Self::from_config(&config, &mut rand::thread_rng())
    }

    /// Create from configuration
    pub fn from_config<R: Rng + ?Sized>(config: &GatConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let layers = config
            .layer_shapes()
            .into_iter()
            .map(|(in_dim, out_dim, heads, merge)| {
                MultiHeadGatLayer::new(in_dim, out_dim, heads, merge, config.negative_slope, rng)
            })
            .collect();

        Ok(Self {
            config: config.clone(),
            layers,
            cache: None,
        })
    }

    /// Architecture this network was built from
    pub fn config(&self) -> &GatConfig {
        &self.config
    }

    /// Get input dimension
    pub fn input_dim(&self) -> usize {
        self.config.in_dim
    }

    /// Get output dimension
    pub fn output_dim(&self) -> usize {
        self.config.output_dim()
    }

    /// Get number of layers
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Access the layers
    pub fn layers(&self) -> &[MultiHeadGatLayer] {
        &self.layers
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(MultiHeadGatLayer::num_parameters).sum()
    }

    /// Forward pass through all layers (inference, no dropout)
    pub fn forward(&self, graph: &Graph, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(graph, x)?;
        let last = self.layers.len() - 1;
        let mut h = x.clone();

        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(graph, &h)?;
            if i < last {
                h = elu_batch(&h, self.config.elu_alpha);
            }
        }

        Ok(h)
    }

    /// Forward pass that also returns every head's edge attention
    pub fn forward_with_attention(
        &self,
        graph: &Graph,
        x: &Array2<f64>,
    ) -> Result<(Array2<f64>, AttentionMaps)> {
        self.check_input(graph, x)?;
        let last = self.layers.len() - 1;
        let mut h = x.clone();
        let mut attention = Vec::with_capacity(self.layers.len());

        for (i, layer) in self.layers.iter().enumerate() {
            let (out, heads) = layer.forward_with_attention(graph, &h)?;
            attention.push(heads);
            h = if i < last {
                elu_batch(&out, self.config.elu_alpha)
            } else {
                out
            };
        }

        Ok((h, attention))
    }

    /// Node representations from the last hidden layer (after ELU)
    pub fn embeddings(&self, graph: &Graph, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(graph, x)?;
        let mut h = x.clone();

        for layer in &self.layers[..self.layers.len() - 1] {
            h = elu_batch(&layer.forward(graph, &h)?, self.config.elu_alpha);
        }

        Ok(h)
    }

    /// Predicted class per node
    pub fn predict(&self, graph: &Graph, x: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.forward(graph, x)?))
    }

    /// Training forward pass
    ///
    /// Applies feature dropout and caches what `backward` needs.
    pub fn forward_train<R: Rng + ?Sized>(
        &mut self,
        graph: &Graph,
        x: &Array2<f64>,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        self.check_input(graph, x)?;
        let last = self.layers.len() - 1;
        let p = self.config.feat_drop;
        let alpha = self.config.elu_alpha;
        let mut cache = NetworkCache::default();
        let mut h = x.clone();

        for (i, layer) in self.layers.iter_mut().enumerate() {
            let mask = (p > 0.0).then(|| {
                let keep = 1.0 / (1.0 - p);
                Array2::from_shape_fn(h.dim(), |_| if rng.gen::<f64>() < p { 0.0 } else { keep })
            });
            if let Some(ref m) = mask {
                h = h * m;
            }
            cache.dropout_masks.push(mask);

            let out = layer.forward_train(graph, &h)?;
            h = if i < last {
                let activated = elu_batch(&out, alpha);
                cache.pre_activations.push(out);
                activated
            } else {
                out
            };
        }

        self.cache = Some(cache);
        Ok(h)
    }

    /// Backpropagate a gradient on the logits of the last `forward_train`
    pub fn backward(&self, graph: &Graph, grad: &Array2<f64>) -> Result<GatGradients> {
        let cache = self.cache.as_ref().ok_or(GatError::MissingCache("Gat"))?;
        let expected = (graph.num_nodes(), self.output_dim());
        if grad.dim() != expected {
            return Err(GatError::shape(
                "Gat::backward",
                format!("{expected:?}"),
                format!("{:?}", grad.dim()),
            ));
        }

        let last = self.layers.len() - 1;
        let mut g = grad.clone();
        let mut layer_grads = Vec::with_capacity(self.layers.len());

        for i in (0..self.layers.len()).rev() {
            if i < last {
                g = elu_backward(&cache.pre_activations[i], &g, self.config.elu_alpha);
            }
            let (mut input_grad, head_grads) = self.layers[i].backward(graph, &g)?;
            if let Some(mask) = &cache.dropout_masks[i] {
                input_grad *= mask;
            }
            layer_grads.push(head_grads);
            g = input_grad;
        }

        layer_grads.reverse();
        Ok(GatGradients {
            layers: layer_grads,
        })
    }

    /// Apply one optimizer step
    ///
    /// Slots are assigned in layer, head, (weight, attention) order.
    pub fn apply_gradients(&mut self, grads: &GatGradients, optimizer: &mut dyn Optimizer) -> Result<()> {
        if grads.layers.len() != self.layers.len() {
            return Err(GatError::shape(
                "Gat::apply_gradients layers",
                self.layers.len(),
                grads.layers.len(),
            ));
        }

        optimizer.begin_step();
        let mut slot = 0;
        for (layer, layer_grads) in self.layers.iter_mut().zip(&grads.layers) {
            if layer_grads.len() != layer.num_heads() {
                return Err(GatError::shape(
                    "Gat::apply_gradients heads",
                    layer.num_heads(),
                    layer_grads.len(),
                ));
            }
            for (head, g) in layer.heads_mut().iter_mut().zip(layer_grads) {
                let (weight, attn) = head.params_mut();
                optimizer.update_matrix(slot, weight, &g.fc);
                optimizer.update_vector(slot + 1, attn, &g.attn);
                slot += 2;
            }
        }
        Ok(())
    }

    /// Drop cached training intermediates
    pub fn clear_cache(&mut self) {
        self.cache = None;
        for layer in &mut self.layers {
            for head in layer.heads_mut() {
                head.clear_cache();
            }
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.check_layers()?;
        Ok(model)
    }

    /// Save model to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load model from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn check_input(&self, graph: &Graph, x: &Array2<f64>) -> Result<()> {
        let expected = (graph.num_nodes(), self.input_dim());
        if x.dim() != expected {
            return Err(GatError::shape(
                "Gat input features",
                format!("{expected:?}"),
                format!("{:?}", x.dim()),
            ));
        }
        Ok(())
    }

    /// Stored layers must agree with the stored config
    fn check_layers(&self) -> Result<()> {
        self.config.validate()?;
        let shapes = self.config.layer_shapes();
        if shapes.len() != self.layers.len() {
            return Err(GatError::shape("Gat layers", shapes.len(), self.layers.len()));
        }
        for (layer, (in_dim, out_dim, heads, merge)) in self.layers.iter().zip(shapes) {
            let actual = (layer.in_features(), layer.head_features(), layer.num_heads(), layer.merge());
            if actual != (in_dim, out_dim, heads, merge) {
                return Err(GatError::shape(
                    "Gat layer",
                    format!("{:?}", (in_dim, out_dim, heads, merge)),
                    format!("{actual:?}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gat::Merge;
    use crate::nn::loss::cross_entropy;
    use crate::nn::Sgd;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_graph(n: usize) -> Graph {
        let edges: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| [(i, (i + 1) % n), (i, (i + 2) % n)])
            .collect();
        Graph::new(n, &edges).unwrap().to_bidirected().with_self_loops()
    }

    fn small_config() -> GatConfig {
        GatConfig {
            in_dim: 4,
            hidden_dims: vec![3, 2],
            out_dim: 3,
            num_heads: 2,
            negative_slope: 0.2,
            ..GatConfig::default()
        }
    }

    #[test]
    fn test_network_creation() {
        let gat = Gat::new(10, [16, 8, 4], 3, 4).unwrap();

        assert_eq!(gat.input_dim(), 10);
        assert_eq!(gat.output_dim(), 3);
        assert_eq!(gat.num_layers(), 4);
        assert_eq!(gat.layers()[0].num_heads(), 4);
        assert_eq!(gat.layers()[3].num_heads(), 1);
        // weights + attention vectors per head
        let expected = 4 * (10 * 16 + 32) + 4 * (64 * 8 + 16) + 4 * (32 * 4 + 8) + (16 * 3 + 6);
        assert_eq!(gat.num_parameters(), expected);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Gat::new(10, [16, 0, 4], 3, 4).is_err());
        assert!(Gat::new(10, [16, 8, 4], 3, 0).is_err());
    }

    #[test]
    fn test_forward_pass() {
        let mut rng = StdRng::seed_from_u64(21);
        let gat = Gat::from_config(&small_config(), &mut rng).unwrap();
        let graph = sample_graph(6);
        let x = Array2::random_using((6, 4), Uniform::new(-1.0, 1.0), &mut rng);

        let logits = gat.forward(&graph, &x).unwrap();
        assert_eq!(logits.dim(), (6, 3));

        let (with_attention, maps) = gat.forward_with_attention(&graph, &x).unwrap();
        assert_eq!(with_attention, logits);
        assert_eq!(maps.len(), 3);
        assert_eq!(maps[0].len(), 2);
        assert_eq!(maps[2].len(), 1);
        assert_eq!(maps[0][0].len(), graph.num_edges());

        assert_eq!(gat.embeddings(&graph, &x).unwrap().dim(), (6, 4));
        assert_eq!(gat.predict(&graph, &x).unwrap().len(), 6);
    }

    #[test]
    fn test_wrong_feature_shape() {
        let mut rng = StdRng::seed_from_u64(22);
        let gat = Gat::from_config(&small_config(), &mut rng).unwrap();
        let graph = sample_graph(6);

        let err = gat.forward(&graph, &Array2::zeros((5, 4))).unwrap_err();
        assert!(matches!(err, GatError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_train_forward_matches_inference_without_dropout() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut gat = Gat::from_config(&small_config(), &mut rng).unwrap();
        let graph = sample_graph(6);
        let x = Array2::random_using((6, 4), Uniform::new(-1.0, 1.0), &mut rng);

        let inference = gat.forward(&graph, &x).unwrap();
        let train = gat.forward_train(&graph, &x, &mut rng).unwrap();
        assert_eq!(inference, train);
    }

    #[test]
    fn test_backward_requires_forward_train() {
        let mut rng = StdRng::seed_from_u64(24);
        let mut gat = Gat::from_config(&small_config(), &mut rng).unwrap();
        let graph = sample_graph(6);

        assert!(matches!(
            gat.backward(&graph, &Array2::zeros((6, 3))),
            Err(GatError::MissingCache(_))
        ));

        gat.forward_train(&graph, &Array2::zeros((6, 4)), &mut rng).unwrap();
        assert!(gat.backward(&graph, &Array2::zeros((6, 2))).is_err());

        gat.clear_cache();
        assert!(gat.backward(&graph, &Array2::zeros((6, 3))).is_err());
    }

    #[test]
    fn test_input_gradient_path_matches_finite_differences() {
        // perturb a first-layer weight and compare with the analytic gradient
        for merge in [Merge::Concat, Merge::Mean] {
            let config = GatConfig {
                hidden_merge: merge,
                output_heads: 2,
                output_merge: Merge::Mean,
                ..small_config()
            };
            let mut rng = StdRng::seed_from_u64(25);
            let mut gat = Gat::from_config(&config, &mut rng).unwrap();
            let graph = sample_graph(6);
            let x = Array2::random_using((6, 4), Uniform::new(-1.0, 1.0), &mut rng);
            let labels = [0, 1, 2, 0, 1, 2];
            let mask = [0, 2, 3, 5];

            let loss_of = |model: &Gat| -> f64 {
                let logits = model.forward(&graph, &x).unwrap();
                cross_entropy(&logits, &labels, &mask).unwrap().0
            };

            let logits = gat.forward_train(&graph, &x, &mut rng).unwrap();
            let (_, grad) = cross_entropy(&logits, &labels, &mask).unwrap();
            let grads = gat.backward(&graph, &grad).unwrap();

            let h = 1e-6;
            for layer in 0..gat.num_layers() {
                for (i, j) in [(0, 0), (1, 1), (2, 0)] {
                    let mut plus = gat.clone();
                    let mut minus = gat.clone();
                    plus.layers[layer].heads_mut()[0].params_mut().0[[i, j]] += h;
                    minus.layers[layer].heads_mut()[0].params_mut().0[[i, j]] -= h;
                    let numeric = (loss_of(&plus) - loss_of(&minus)) / (2.0 * h);
                    assert_abs_diff_eq!(grads.layers[layer][0].fc[[i, j]], numeric, epsilon = 1e-5);
                }

                let mut plus = gat.clone();
                let mut minus = gat.clone();
                plus.layers[layer].heads_mut()[0].params_mut().1[1] += h;
                minus.layers[layer].heads_mut()[0].params_mut().1[1] -= h;
                let numeric = (loss_of(&plus) - loss_of(&minus)) / (2.0 * h);
                assert_abs_diff_eq!(grads.layers[layer][0].attn[1], numeric, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_dropout_masks_inputs() {
        let config = GatConfig {
            feat_drop: 0.5,
            ..small_config()
        };
        let mut rng = StdRng::seed_from_u64(26);
        let mut gat = Gat::from_config(&config, &mut rng).unwrap();
        let graph = sample_graph(6);
        let x = Array2::random_using((6, 4), Uniform::new(-1.0, 1.0), &mut rng);

        let inference = gat.forward(&graph, &x).unwrap();
        let train = gat.forward_train(&graph, &x, &mut rng).unwrap();
        assert_ne!(inference, train);

        let grads = gat.backward(&graph, &Array2::ones((6, 3))).unwrap();
        assert_eq!(grads.layers.len(), 3);
    }

    #[test]
    fn test_sgd_step_reduces_loss() {
        let mut rng = StdRng::seed_from_u64(27);
        let mut gat = Gat::from_config(&small_config(), &mut rng).unwrap();
        let graph = sample_graph(6);
        let x = Array2::random_using((6, 4), Uniform::new(-1.0, 1.0), &mut rng);
        let labels = [0, 1, 2, 0, 1, 2];
        let mask = [0, 1, 2, 3, 4, 5];

        let logits = gat.forward_train(&graph, &x, &mut rng).unwrap();
        let (before, grad) = cross_entropy(&logits, &labels, &mask).unwrap();
        let grads = gat.backward(&graph, &grad).unwrap();
        assert!(grads.norm() > 0.0);

        let mut optimizer = Sgd::new(1e-3);
        gat.apply_gradients(&grads, &mut optimizer).unwrap();

        let after = cross_entropy(&gat.forward(&graph, &x).unwrap(), &labels, &mask)
            .unwrap()
            .0;
        assert!(after < before);
    }

    #[test]
    fn test_serialization() {
        let gat = Gat::new(10, [8, 8, 8], 3, 2).unwrap();

        let json = gat.to_json().unwrap();
        let restored = Gat::from_json(&json).unwrap();

        assert_eq!(gat.num_parameters(), restored.num_parameters());
        assert_eq!(gat.config(), restored.config());
    }

    #[test]
    fn test_from_json_rejects_inconsistent_layers() {
        let mut rng = StdRng::seed_from_u64(28);
        let gat = Gat::from_config(&small_config(), &mut rng).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&gat.to_json().unwrap()).unwrap();
        value["config"]["num_heads"] = serde_json::json!(3);

        assert!(Gat::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut rng = StdRng::seed_from_u64(29);
        let gat = Gat::from_config(&small_config(), &mut rng).unwrap();
        let graph = sample_graph(6);
        let x = Array2::random_using((6, 4), Uniform::new(-1.0, 1.0), &mut rng);

        gat.save(&path).unwrap();
        let loaded = Gat::load(&path).unwrap();

        let a = gat.forward(&graph, &x).unwrap();
        let b = loaded.forward(&graph, &x).unwrap();
        for (u, v) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(u, v, epsilon = 1e-12);
        }
    }
}
