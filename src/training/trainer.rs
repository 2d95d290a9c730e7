//! Full-batch node classification training

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::metrics::{evaluate, evaluate_logits, EpochMetrics, TrainingHistory};
use crate::config::TrainConfig;
use crate::data::Dataset;
use crate::error::{GatError, Result};
use crate::gat::Gat;
use crate::nn::{build_optimizer, cross_entropy, Optimizer};

/// Trains a [`Gat`] on the training split of a dataset
pub struct Trainer {
    config: TrainConfig,
    optimizer: Box<dyn Optimizer>,
    rng: StdRng,
}

impl Trainer {
    /// Create a trainer with the configured optimizer
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = build_optimizer(config.optimizer, config.learning_rate, config.weight_decay);
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            optimizer,
            rng,
        })
    }

    /// Use a custom optimizer
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Training configuration
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train `model` in place
    ///
    /// With a non-empty validation split the parameters with the lowest
    /// validation loss are kept, and `patience` epochs without improvement
    /// stop the run. Otherwise the kept parameters are those with the lowest
    /// training loss, measured after each update without dropout, and that
    /// measurement is what the history records as `train_loss`.
    pub fn fit(&mut self, model: &mut Gat, dataset: &Dataset) -> Result<TrainingHistory> {
        if dataset.split.train.is_empty() {
            return Err(GatError::EmptyMask("training split"));
        }
        if model.output_dim() != dataset.num_classes {
            return Err(GatError::InvalidConfig(format!(
                "model produces {} logits but the dataset has {} classes",
                model.output_dim(),
                dataset.num_classes
            )));
        }

        let graph = &dataset.graph;
        let isolated = graph.isolated_nodes();
        if !isolated.is_empty() {
            warn!(
                count = isolated.len(),
                "nodes without incoming edges will output zeros; consider adding self loops"
            );
        }

        info!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            parameters = model.num_parameters(),
            train = dataset.split.train.len(),
            val = dataset.split.val.len(),
            "starting training"
        );

        let has_val = !dataset.split.val.is_empty();
        let mut history = TrainingHistory::default();
        let mut best: Option<(f64, Gat)> = None;
        let mut since_best = 0;

        for epoch in 1..=self.config.epochs {
            let logits = model.forward_train(graph, &dataset.features, &mut self.rng)?;
            let (_, grad) = cross_entropy(&logits, &dataset.labels, &dataset.split.train)?;
            let step = evaluate_logits(&logits, &dataset.labels, &dataset.split.train)?;

            let grads = model.backward(graph, &grad)?;
            let grad_norm = grads.norm();
            model.apply_gradients(&grads, self.optimizer.as_mut())?;

            // Without a validation split the updated parameters are scored on
            // the training nodes, so the kept snapshot matches its score.
            let (train, val) = if has_val {
                let val = evaluate(
                    model,
                    graph,
                    &dataset.features,
                    &dataset.labels,
                    &dataset.split.val,
                )?;
                (step, Some(val))
            } else {
                let train = evaluate(
                    model,
                    graph,
                    &dataset.features,
                    &dataset.labels,
                    &dataset.split.train,
                )?;
                (train, None)
            };

            let metrics = EpochMetrics {
                epoch,
                train_loss: train.loss,
                train_accuracy: train.accuracy,
                val,
                grad_norm,
            };
            debug!(?metrics, "epoch finished");
            if self.config.log_every > 0 && epoch % self.config.log_every == 0 {
                match val {
                    Some(v) => info!(
                        "epoch {:>4} | train loss {:.4} acc {:.3} | val loss {:.4} acc {:.3}",
                        epoch, train.loss, train.accuracy, v.loss, v.accuracy
                    ),
                    None => info!(
                        "epoch {:>4} | train loss {:.4} acc {:.3}",
                        epoch, train.loss, train.accuracy
                    ),
                }
            }
            history.epochs.push(metrics);

            if !train.loss.is_finite() {
                warn!(epoch, "training loss is not finite, stopping");
                history.stopped_early = true;
                break;
            }

            let score = val.map(|v| v.loss).unwrap_or(train.loss);
            if best.as_ref().map_or(true, |(b, _)| score < *b) {
                let mut snapshot = model.clone();
                snapshot.clear_cache();
                best = Some((score, snapshot));
                history.best_epoch = epoch;
                since_best = 0;
            } else {
                since_best += 1;
                if has_val && self.config.patience > 0 && since_best >= self.config.patience {
                    info!(epoch, best_epoch = history.best_epoch, "early stopping");
                    history.stopped_early = true;
                    break;
                }
            }
        }

        if let Some((_, snapshot)) = best {
            *model = snapshot;
        }
        model.clear_cache();

        if let Some(best) = history.best() {
            info!(
                best_epoch = best.epoch,
                train_loss = best.train_loss,
                val_accuracy = ?best.val.map(|v| v.accuracy),
                "training finished"
            );
        }

        Ok(history)
    }
}
