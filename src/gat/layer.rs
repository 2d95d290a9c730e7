//! Single-head graph attention layer
//!
//! 1. Project node features: `z = h W`.
//! 2. Score every edge `s -> t`: `e = LeakyReLU(a · [z_s ‖ z_t])`.
//! 3. Normalise scores over each node's incoming edges.
//! 4. Each node sums its sources' `z` weighted by the coefficients.

use ndarray::{s, Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::attention::{aggregate, edge_logits, edge_softmax};
use crate::error::{GatError, Result};
use crate::graph::Graph;
use crate::nn::activation::{leaky_relu, leaky_relu_grad, softmax_backward};
use crate::nn::linear::XAVIER_GAIN;
use crate::nn::Linear;

/// Gradients of one attention head's parameters
#[derive(Debug, Clone)]
pub struct HeadGradients {
    /// Gradient of the projection weight
    pub fc: Array2<f64>,
    /// Gradient of the attention vector
    pub attn: Array1<f64>,
}

/// Intermediates kept from the last training forward pass
#[derive(Debug, Clone)]
struct LayerCache {
    input: Array2<f64>,
    z: Array2<f64>,
    /// Pre-activation edge logits
    logits: Vec<f64>,
    /// Normalised attention per edge
    alpha: Vec<f64>,
}

/// Graph Attention Layer (one head)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatLayer {
    /// Bias-free feature projection
    fc: Linear,
    /// Attention vector `[a_src ‖ a_dst]` of length `2 * out_features`
    attn: Array1<f64>,
    /// Negative slope for LeakyReLU on edge logits
    negative_slope: f64,
    #[serde(skip)]
    cache: Option<LayerCache>,
}

impl GatLayer {
    /// Create a new layer with Xavier initialisation
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        negative_slope: f64,
        rng: &mut R,
    ) -> Self {
        let fc = Linear::new(in_features, out_features, rng);

        // attn_fc maps 2 * out -> 1
        let limit = XAVIER_GAIN * (6.0 / (2 * out_features + 1) as f64).sqrt();
        let attn = Array1::random_using(
            2 * out_features,
            Uniform::new_inclusive(-limit, limit),
            rng,
        );

        Self {
            fc,
            attn,
            negative_slope,
            cache: None,
        }
    }

    /// Build from explicit parameters
    pub fn from_parts(fc: Linear, attn: Array1<f64>, negative_slope: f64) -> Result<Self> {
        if attn.len() != 2 * fc.out_features() {
            return Err(GatError::shape(
                "GatLayer attention vector",
                2 * fc.out_features(),
                attn.len(),
            ));
        }
        Ok(Self {
            fc,
            attn,
            negative_slope,
            cache: None,
        })
    }

    /// Input dimension
    pub fn in_features(&self) -> usize {
        self.fc.in_features()
    }

    /// Output dimension
    pub fn out_features(&self) -> usize {
        self.fc.out_features()
    }

    /// Number of parameters
    pub fn num_parameters(&self) -> usize {
        self.fc.num_parameters() + self.attn.len()
    }

    /// Forward pass
    pub fn forward(&self, graph: &Graph, h: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.compute(graph, h)?.0)
    }

    /// Forward pass returning the normalised attention of every edge
    pub fn forward_with_attention(
        &self,
        graph: &Graph,
        h: &Array2<f64>,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let (out, cache) = self.compute(graph, h)?;
        Ok((out, Array1::from(cache.alpha)))
    }

    /// Normalised attention coefficient of every edge, indexed by edge id
    pub fn edge_attention(&self, graph: &Graph, h: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.forward_with_attention(graph, h)?.1)
    }

    /// Forward pass that keeps intermediates for `backward`
    pub fn forward_train(&mut self, graph: &Graph, h: &Array2<f64>) -> Result<Array2<f64>> {
        let (out, cache) = self.compute(graph, h)?;
        self.cache = Some(cache);
        Ok(out)
    }

    /// Backward pass through the last `forward_train`
    ///
    /// Returns the gradient with respect to the layer input and the
    /// parameter gradients.
    pub fn backward(&self, graph: &Graph, grad: &Array2<f64>) -> Result<(Array2<f64>, HeadGradients)> {
        let cache = self
            .cache
            .as_ref()
            .ok_or(GatError::MissingCache("GatLayer"))?;
        let d = self.out_features();
        let n = graph.num_nodes();
        if grad.dim() != (n, d) || cache.z.nrows() != n {
            return Err(GatError::shape(
                "GatLayer::backward",
                format!("({n}, {d})"),
                format!("{:?}", grad.dim()),
            ));
        }

        let z = &cache.z;
        let a_src = self.attn.slice(s![..d]);
        let a_dst = self.attn.slice(s![d..]);

        let mut dz = Array2::<f64>::zeros((n, d));
        let mut d_attn = Array1::<f64>::zeros(2 * d);

        for t in 0..n {
            let incoming = graph.incoming(t);
            if incoming.is_empty() {
                continue;
            }
            let g_t = grad.row(t);

            // out_t = Σ α_k z_{s_k}
            let alpha: Vec<f64> = incoming.iter().map(|&e| cache.alpha[e]).collect();
            let d_alpha: Vec<f64> = incoming
                .iter()
                .map(|&e| g_t.dot(&z.row(graph.src(e))))
                .collect();
            let d_score = softmax_backward(&alpha, &d_alpha);

            for (k, &e) in incoming.iter().enumerate() {
                let src = graph.src(e);
                dz.row_mut(src).scaled_add(alpha[k], &g_t);

                let d_logit = d_score[k] * leaky_relu_grad(cache.logits[e], self.negative_slope);
                dz.row_mut(src).scaled_add(d_logit, &a_src);
                dz.row_mut(t).scaled_add(d_logit, &a_dst);
                d_attn.slice_mut(s![..d]).scaled_add(d_logit, &z.row(src));
                d_attn.slice_mut(s![d..]).scaled_add(d_logit, &z.row(t));
            }
        }

        let (input_grad, fc_grad) = self.fc.backward(&cache.input, &dz);

        Ok((
            input_grad,
            HeadGradients {
                fc: fc_grad,
                attn: d_attn,
            },
        ))
    }

    /// Mutable access to `(projection weight, attention vector)` for optimizers
    pub(crate) fn params_mut(&mut self) -> (&mut Array2<f64>, &mut Array1<f64>) {
        (&mut self.fc.weight, &mut self.attn)
    }

    /// Drop cached intermediates
    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    fn compute(&self, graph: &Graph, h: &Array2<f64>) -> Result<(Array2<f64>, LayerCache)> {
        let expected = (graph.num_nodes(), self.in_features());
        if h.dim() != expected {
            return Err(GatError::shape(
                "GatLayer::forward",
                format!("{expected:?}"),
                format!("{:?}", h.dim()),
            ));
        }

        let d = self.out_features();
        let z = self.fc.forward(h);
        let logits = edge_logits(
            graph,
            &z,
            self.attn.slice(s![..d]),
            self.attn.slice(s![d..]),
        );
        let scores: Vec<f64> = logits
            .iter()
            .map(|&x| leaky_relu(x, self.negative_slope))
            .collect();
        let alpha = edge_softmax(graph, &scores);
        let out = aggregate(graph, &z, &alpha);

        Ok((
            out,
            LayerCache {
                input: h.clone(),
                z,
                logits,
                alpha,
            },
        ))
    }
}
