//! Optimization algorithms
//!
//! - SGD (with optional momentum)
//! - Adam (Adaptive Moment Estimation)
//!
//! One optimizer instance drives every parameter of a model. Parameters
//! are addressed by a slot index that the model assigns in a fixed
//! traversal order, and per-slot state is created lazily.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use serde::{Deserialize, Serialize};

/// Optimizer trait for parameter updates
pub trait Optimizer: Send + Sync {
    /// Advance the step counter; call once before updating the parameters of a step
    fn begin_step(&mut self);

    /// Update a matrix parameter in place
    fn update_matrix(&mut self, slot: usize, param: &mut Array2<f64>, grad: &Array2<f64>) {
        self.update(slot, param.view_mut().into_dyn(), grad.view().into_dyn());
    }

    /// Update a vector parameter in place
    fn update_vector(&mut self, slot: usize, param: &mut Array1<f64>, grad: &Array1<f64>) {
        self.update(slot, param.view_mut().into_dyn(), grad.view().into_dyn());
    }

    /// Update a parameter of any dimension
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f64>, grad: ArrayViewD<f64>);

    /// Reset optimizer state (for new training run)
    fn reset(&mut self);

    /// Current learning rate
    fn learning_rate(&self) -> f64;
}

/// Which optimizer to build from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

/// Build a boxed optimizer
pub fn build_optimizer(
    kind: OptimizerKind,
    learning_rate: f64,
    weight_decay: f64,
) -> Box<dyn Optimizer> {
    match kind {
        OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate).with_weight_decay(weight_decay)),
        OptimizerKind::Adam => Box::new(Adam::new(learning_rate).with_weight_decay(weight_decay)),
    }
}

/// Gradient plus L2 penalty
fn decayed_gradient(param: &ArrayViewMutD<f64>, grad: ArrayViewD<f64>, weight_decay: f64) -> ArrayD<f64> {
    let mut g = grad.to_owned();
    if weight_decay > 0.0 {
        g.scaled_add(weight_decay, param);
    }
    g
}

/// Stochastic Gradient Descent with optional momentum
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    velocity: HashMap<usize, ArrayD<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            weight_decay: 0.0,
            velocity: HashMap::new(),
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for Sgd {
    fn begin_step(&mut self) {}

    fn update(&mut self, slot: usize, mut param: ArrayViewMutD<f64>, grad: ArrayViewD<f64>) {
        let g = decayed_gradient(&param, grad, self.weight_decay);
        let lr = self.learning_rate;

        if self.momentum > 0.0 {
            let mu = self.momentum;
            let v = self
                .velocity
                .entry(slot)
                .or_insert_with(|| ArrayD::zeros(param.raw_dim()));
            Zip::from(&mut param).and(v).and(&g).for_each(|p, v, &g| {
                *v = mu * *v - lr * g;
                *p += *v;
            });
        } else {
            param.scaled_add(-lr, &g);
        }
    }

    fn reset(&mut self) {
        self.velocity.clear();
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

#[derive(Debug, Clone)]
struct Moments {
    m: ArrayD<f64>,
    v: ArrayD<f64>,
}

/// Adam optimizer (Adaptive Moment Estimation)
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub weight_decay: f64,
    t: i32,
    moments: HashMap<usize, Moments>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
            t: 0,
            moments: HashMap::new(),
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Number of completed steps
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update(&mut self, slot: usize, mut param: ArrayViewMutD<f64>, grad: ArrayViewD<f64>) {
        let g = decayed_gradient(&param, grad, self.weight_decay);
        let (b1, b2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);
        // An update before any begin_step counts as step one
        let t = self.t.max(1);
        let bias1 = 1.0 - b1.powi(t);
        let bias2 = 1.0 - b2.powi(t);

        let state = self.moments.entry(slot).or_insert_with(|| Moments {
            m: ArrayD::zeros(param.raw_dim()),
            v: ArrayD::zeros(param.raw_dim()),
        });

        Zip::from(&mut param)
            .and(&mut state.m)
            .and(&mut state.v)
            .and(&g)
            .for_each(|p, m, v, &g| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }

    fn reset(&mut self) {
        self.t = 0;
        self.moments.clear();
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
