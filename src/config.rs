//! Configuration handling.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GatError, Result};
use crate::gat::Merge;
use crate::nn::activation::{DEFAULT_ELU_ALPHA, DEFAULT_NEGATIVE_SLOPE};
use crate::nn::OptimizerKind;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model architecture
    #[serde(default)]
    pub model: GatConfig,
    /// Training loop
    #[serde(default)]
    pub training: TrainConfig,
    /// Synthetic data generation
    #[serde(default)]
    pub data: SyntheticConfig,
}

impl Config {
    /// Load configuration from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every section, and that the model input matches the data
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.training.validate()?;
        self.data.validate()?;
        if self.model.in_dim != self.data.feature_dim {
            return Err(GatError::InvalidConfig(format!(
                "model.in_dim ({}) must equal data.feature_dim ({})",
                self.model.in_dim, self.data.feature_dim
            )));
        }
        if self.model.output_dim() != self.data.num_classes {
            return Err(GatError::InvalidConfig(format!(
                "model output dimension ({}) must equal data.num_classes ({})",
                self.model.output_dim(),
                self.data.num_classes
            )));
        }
        Ok(())
    }
}

/// Graph attention network architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatConfig {
    /// Input feature dimension
    pub in_dim: usize,
    /// Per-head output dimension of each hidden layer
    pub hidden_dims: Vec<usize>,
    /// Per-head output dimension of the final layer
    pub out_dim: usize,
    /// Attention heads on hidden layers
    pub num_heads: usize,
    /// Attention heads on the output layer
    pub output_heads: usize,
    /// Merge used by hidden layers
    pub hidden_merge: Merge,
    /// Merge used by the output layer
    pub output_merge: Merge,
    /// LeakyReLU slope on attention logits
    pub negative_slope: f64,
    /// ELU alpha between layers
    pub elu_alpha: f64,
    /// Dropout on each layer input while training
    pub feat_drop: f64,
}

impl Default for GatConfig {
    fn default() -> Self {
        Self {
            in_dim: 16,
            hidden_dims: vec![8, 8, 8],
            out_dim: 4,
            num_heads: 4,
            output_heads: 1,
            hidden_merge: Merge::Concat,
            output_merge: Merge::Concat,
            negative_slope: DEFAULT_NEGATIVE_SLOPE,
            elu_alpha: DEFAULT_ELU_ALPHA,
            feat_drop: 0.0,
        }
    }
}

impl GatConfig {
    /// Four-layer network: three hidden layers plus the output layer
    pub fn four_layer(
        in_dim: usize,
        hidden_dims: [usize; 3],
        out_dim: usize,
        num_heads: usize,
    ) -> Self {
        Self {
            in_dim,
            hidden_dims: hidden_dims.to_vec(),
            out_dim,
            num_heads,
            ..Self::default()
        }
    }

    /// Output dimension of the whole network
    pub fn output_dim(&self) -> usize {
        merged_dim(self.out_dim, self.output_heads, self.output_merge)
    }

    /// Size the input and output layers for a dataset
    ///
    /// With concatenated output heads every head gets an equal share of
    /// the classes, so the class count must divide evenly.
    pub fn fit_to_data(&mut self, feature_dim: usize, num_classes: usize) -> Result<()> {
        let out_dim = match self.output_merge {
            Merge::Mean => num_classes,
            Merge::Concat if self.output_heads > 0 && num_classes % self.output_heads == 0 => {
                num_classes / self.output_heads
            }
            Merge::Concat => {
                return Err(GatError::InvalidConfig(format!(
                    "{} classes cannot be split across {} concatenated output heads",
                    num_classes, self.output_heads
                )))
            }
        };
        self.in_dim = feature_dim;
        self.out_dim = out_dim;
        self.validate()
    }

    /// `(in, per-head out, heads, merge)` for every layer in order
    pub fn layer_shapes(&self) -> Vec<(usize, usize, usize, Merge)> {
        let mut shapes = Vec::with_capacity(self.hidden_dims.len() + 1);
        let mut current = self.in_dim;

        for &dim in &self.hidden_dims {
            shapes.push((current, dim, self.num_heads, self.hidden_merge));
            current = merged_dim(dim, self.num_heads, self.hidden_merge);
        }
        shapes.push((current, self.out_dim, self.output_heads, self.output_merge));

        shapes
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(GatError::InvalidConfig(msg));

        if self.in_dim == 0 || self.out_dim == 0 {
            return invalid("in_dim and out_dim must be positive".into());
        }
        if let Some(i) = self.hidden_dims.iter().position(|&d| d == 0) {
            return invalid(format!("hidden_dims[{i}] must be positive"));
        }
        if self.num_heads == 0 || self.output_heads == 0 {
            return invalid("num_heads and output_heads must be positive".into());
        }
        if !self.negative_slope.is_finite() || self.negative_slope < 0.0 {
            return invalid(format!("negative_slope {} must be >= 0", self.negative_slope));
        }
        if !self.elu_alpha.is_finite() || self.elu_alpha <= 0.0 {
            return invalid(format!("elu_alpha {} must be > 0", self.elu_alpha));
        }
        if !(0.0..1.0).contains(&self.feat_drop) {
            return invalid(format!("feat_drop {} must be in [0, 1)", self.feat_drop));
        }
        Ok(())
    }
}

fn merged_dim(dim: usize, heads: usize, merge: Merge) -> usize {
    match merge {
        Merge::Concat => dim * heads,
        Merge::Mean => dim,
    }
}

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Optimizer
    pub optimizer: OptimizerKind,
    /// Learning rate
    pub learning_rate: f64,
    /// L2 penalty added to gradients
    pub weight_decay: f64,
    /// Maximum number of epochs
    pub epochs: usize,
    /// Epochs without validation improvement before stopping (0 disables)
    pub patience: usize,
    /// Log every n-th epoch at info level
    pub log_every: usize,
    /// Seed for initialisation and dropout
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.005,
            weight_decay: 5e-4,
            epochs: 200,
            patience: 50,
            log_every: 10,
            seed: 42,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(GatError::InvalidConfig(format!(
                "learning_rate {} must be > 0",
                self.learning_rate
            )));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(GatError::InvalidConfig(format!(
                "weight_decay {} must be >= 0",
                self.weight_decay
            )));
        }
        if self.epochs == 0 {
            return Err(GatError::InvalidConfig("epochs must be positive".into()));
        }
        Ok(())
    }
}

/// Synthetic community-graph configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of classes (one community each)
    pub num_classes: usize,
    /// Nodes in each community
    pub nodes_per_class: usize,
    /// Feature dimension
    pub feature_dim: usize,
    /// Edge probability inside a community
    pub p_in: f64,
    /// Edge probability across communities
    pub p_out: f64,
    /// Standard deviation of feature noise around class prototypes
    pub noise: f64,
    /// Fraction of nodes used for training
    pub train_fraction: f64,
    /// Fraction of nodes used for validation
    pub val_fraction: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_classes: 4,
            nodes_per_class: 30,
            feature_dim: 16,
            p_in: 0.3,
            p_out: 0.02,
            noise: 1.0,
            train_fraction: 0.3,
            val_fraction: 0.2,
            seed: 7,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        let probability = |name: &str, p: f64| -> Result<()> {
            if (0.0..=1.0).contains(&p) {
                Ok(())
            } else {
                Err(GatError::InvalidConfig(format!("{name} {p} must be in [0, 1]")))
            }
        };

        if self.num_classes < 2 || self.nodes_per_class == 0 || self.feature_dim == 0 {
            return Err(GatError::InvalidConfig(
                "need at least two classes, one node per class and one feature".into(),
            ));
        }
        probability("p_in", self.p_in)?;
        probability("p_out", self.p_out)?;
        probability("train_fraction", self.train_fraction)?;
        probability("val_fraction", self.val_fraction)?;
        if self.train_fraction + self.val_fraction >= 1.0 {
            return Err(GatError::InvalidConfig(
                "train_fraction + val_fraction must leave room for a test split".into(),
            ));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(GatError::InvalidConfig(format!("noise {} must be >= 0", self.noise)));
        }
        Ok(())
    }

    /// Total number of nodes
    pub fn num_nodes(&self) -> usize {
        self.num_classes * self.nodes_per_class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.model.hidden_dims, vec![8, 8, 8]);
        assert_eq!(config.training.optimizer, OptimizerKind::Adam);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layer_shapes_follow_four_layer_layout() {
        let config = GatConfig::four_layer(10, [8, 6, 4], 3, 2);
        let shapes = config.layer_shapes();

        assert_eq!(
            shapes,
            vec![
                (10, 8, 2, Merge::Concat),
                (16, 6, 2, Merge::Concat),
                (12, 4, 2, Merge::Concat),
                (8, 3, 1, Merge::Concat),
            ]
        );
        assert_eq!(config.output_dim(), 3);
    }

    #[test]
    fn test_fit_to_data_respects_output_heads() {
        let mut config = GatConfig {
            output_heads: 2,
            ..GatConfig::default()
        };
        config.fit_to_data(5, 6).unwrap();
        assert_eq!(config.in_dim, 5);
        assert_eq!(config.out_dim, 3);
        assert_eq!(config.output_dim(), 6);

        assert!(matches!(
            config.fit_to_data(5, 7),
            Err(GatError::InvalidConfig(_))
        ));

        config.output_merge = Merge::Mean;
        config.fit_to_data(5, 7).unwrap();
        assert_eq!(config.output_dim(), 7);

        let mut single = GatConfig::default();
        single.fit_to_data(3, 2).unwrap();
        assert_eq!(single.output_dim(), 2);
    }

    #[test]
    fn test_mean_merge_shapes() {
        let config = GatConfig {
            hidden_dims: vec![5],
            hidden_merge: Merge::Mean,
            output_heads: 3,
            output_merge: Merge::Mean,
            ..GatConfig::default()
        };
        assert_eq!(config.layer_shapes()[1].0, 5);
        assert_eq!(config.output_dim(), config.out_dim);
    }

    #[test]
    fn test_invalid_values() {
        let mut model = GatConfig::default();
        model.num_heads = 0;
        assert!(model.validate().is_err());

        let model = GatConfig {
            feat_drop: 1.0,
            ..GatConfig::default()
        };
        assert!(model.validate().is_err());

        let training = TrainConfig {
            learning_rate: 0.0,
            ..TrainConfig::default()
        };
        assert!(training.validate().is_err());

        let data = SyntheticConfig {
            train_fraction: 0.6,
            val_fraction: 0.4,
            ..SyntheticConfig::default()
        };
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_mismatched_sections() {
        let mut config = Config::default();
        config.data.feature_dim = 3;
        assert!(matches!(config.validate(), Err(GatError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str("[model]\nnum_heads = 2\n").unwrap();
        assert_eq!(parsed.model.num_heads, 2);
        assert_eq!(parsed.model.hidden_dims, vec![8, 8, 8]);
        assert_eq!(parsed.training, TrainConfig::default());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gat.toml");

        Config::default().to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
