//! Multi-head graph attention
//!
//! Runs independent attention heads over the same input and merges their
//! outputs by concatenation or averaging.

use ndarray::{s, Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layer::{GatLayer, HeadGradients};
use crate::error::{GatError, Result};
use crate::graph::Graph;

/// How head outputs are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Merge {
    /// Concatenate along the feature axis
    #[default]
    Concat,
    /// Element-wise mean across heads
    Mean,
}

/// Multi-head Graph Attention Layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiHeadGatLayer {
    heads: Vec<GatLayer>,
    merge: Merge,
}

impl MultiHeadGatLayer {
    /// Create `num_heads` freshly initialised heads
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        num_heads: usize,
        merge: Merge,
        negative_slope: f64,
        rng: &mut R,
    ) -> Self {
        let heads = (0..num_heads)
            .map(|_| GatLayer::new(in_features, out_features, negative_slope, rng))
            .collect();

        Self { heads, merge }
    }

    /// Build from existing heads
    pub fn from_heads(heads: Vec<GatLayer>, merge: Merge) -> Result<Self> {
        let first = heads
            .first()
            .ok_or_else(|| GatError::InvalidConfig("multi-head layer needs at least one head".into()))?;
        let dims = (first.in_features(), first.out_features());
        if let Some(bad) = heads
            .iter()
            .find(|h| (h.in_features(), h.out_features()) != dims)
        {
            return Err(GatError::shape(
                "MultiHeadGatLayer heads",
                format!("{dims:?}"),
                format!("{:?}", (bad.in_features(), bad.out_features())),
            ));
        }
        Ok(Self { heads, merge })
    }

    /// Get number of heads
    pub fn num_heads(&self) -> usize {
        self.heads.len()
    }

    /// Merge mode
    pub fn merge(&self) -> Merge {
        self.merge
    }

    /// Input dimension
    pub fn in_features(&self) -> usize {
        self.heads[0].in_features()
    }

    /// Output dimension of a single head
    pub fn head_features(&self) -> usize {
        self.heads[0].out_features()
    }

    /// Output dimension after merging
    pub fn output_dim(&self) -> usize {
        match self.merge {
            Merge::Concat => self.head_features() * self.num_heads(),
            Merge::Mean => self.head_features(),
        }
    }

    /// Number of parameters
    pub fn num_parameters(&self) -> usize {
        self.heads.iter().map(GatLayer::num_parameters).sum()
    }

    /// Access the heads
    pub fn heads(&self) -> &[GatLayer] {
        &self.heads
    }

    pub(crate) fn heads_mut(&mut self) -> &mut [GatLayer] {
        &mut self.heads
    }

    /// Forward pass
    pub fn forward(&self, graph: &Graph, h: &Array2<f64>) -> Result<Array2<f64>> {
        let outputs = self
            .heads
            .iter()
            .map(|head| head.forward(graph, h))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.combine(&outputs))
    }

    /// Forward pass returning every head's edge attention
    pub fn forward_with_attention(
        &self,
        graph: &Graph,
        h: &Array2<f64>,
    ) -> Result<(Array2<f64>, Vec<Array1<f64>>)> {
        let (outputs, attention): (Vec<_>, Vec<_>) = self
            .heads
            .iter()
            .map(|head| head.forward_with_attention(graph, h))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();
        Ok((self.combine(&outputs), attention))
    }

    /// Forward pass that keeps intermediates for `backward`
    pub fn forward_train(&mut self, graph: &Graph, h: &Array2<f64>) -> Result<Array2<f64>> {
        let outputs = self
            .heads
            .iter_mut()
            .map(|head| head.forward_train(graph, h))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.combine(&outputs))
    }

    /// Backward pass; input gradients of all heads are summed
    pub fn backward(
        &self,
        graph: &Graph,
        grad: &Array2<f64>,
    ) -> Result<(Array2<f64>, Vec<HeadGradients>)> {
        let d = self.head_features();
        if grad.ncols() != self.output_dim() {
            return Err(GatError::shape(
                "MultiHeadGatLayer::backward",
                self.output_dim(),
                grad.ncols(),
            ));
        }

        let mut input_grad = Array2::<f64>::zeros((grad.nrows(), self.in_features()));
        let mut head_grads = Vec::with_capacity(self.num_heads());

        for (idx, head) in self.heads.iter().enumerate() {
            let head_grad = match self.merge {
                Merge::Concat => grad.slice(s![.., idx * d..(idx + 1) * d]).to_owned(),
                Merge::Mean => grad / self.num_heads() as f64,
            };
            let (dx, g) = head.backward(graph, &head_grad)?;
            input_grad += &dx;
            head_grads.push(g);
        }

        Ok((input_grad, head_grads))
    }

    fn combine(&self, outputs: &[Array2<f64>]) -> Array2<f64> {
        let n = outputs[0].nrows();
        let d = self.head_features();

        match self.merge {
            Merge::Concat => {
                let mut combined = Array2::zeros((n, d * outputs.len()));
                for (idx, out) in outputs.iter().enumerate() {
                    combined.slice_mut(s![.., idx * d..(idx + 1) * d]).assign(out);
                }
                combined
            }
            Merge::Mean => {
                let mut avg = Array2::zeros((n, d));
                for out in outputs {
                    avg += out;
                }
                avg / outputs.len() as f64
            }
        }
    }
}
