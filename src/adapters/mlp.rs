use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use machine_learning::{
    MlErr,
    arch::{Model, Sequential, activations::ActFn, layers::Layer, loss::Mse},
    dataset::Dataset,
    optimization::{GradientDescentWithMomentum, Optimizer},
    training::{ModelTrainer, Snapshot},
};
use rand::{SeedableRng, rngs::StdRng};
use serde_json::Value;

use crate::{
    BoxError, Evaluator, Hyperparameters, Kwargs, PbtErr, Result, Trainable, Trainer,
};

pub const LEARNING_RATE: &str = "learning_rate";
pub const MOMENTUM: &str = "momentum";

/// Parameters plus optimizer velocity.
pub type MlpState = Snapshot<GradientDescentWithMomentum>;

type Backend = ModelTrainer<Sequential, GradientDescentWithMomentum, Mse>;

/// A multi-layer perceptron of sigmoid dense layers trained with momentum gradient descent.
///
/// Hyperparameters: `learning_rate` (required) and `momentum` (defaults to 0).
#[derive(Debug)]
pub struct MlpTrainable {
    backend: Backend,
    rng: StdRng,
}

impl MlpTrainable {
    /// Creates a new `MlpTrainable`.
    ///
    /// # Arguments
    /// * `widths` - The width of every layer, input first.
    /// * `hyperparameters` - The optimizer's hyperparameters.
    /// * `seed` - Seeds weight initialization and shuffling.
    pub fn new(widths: &[usize], hyperparameters: &Hyperparameters, seed: u64) -> Result<Self> {
        if widths.len() < 2 {
            return Err(PbtErr::InvalidConfig(
                "model must have an input and an output width".into(),
            ));
        }

        let model = Sequential::new(
            widths
                .windows(2)
                .map(|w| Layer::dense((w[0], w[1]), Some(ActFn::sigmoid(1.)))),
        );

        let (learning_rate, momentum) = optimizer_params(hyperparameters)?;
        let optimizer = GradientDescentWithMomentum::new(model.size(), learning_rate, momentum);

        let mut rng = StdRng::seed_from_u64(seed);
        let backend = ModelTrainer::new(model, optimizer, Mse, &mut rng)?;

        Ok(Self { backend, rng })
    }

    pub fn learning_rate(&self) -> f32 {
        self.backend.optimizer().learning_rate()
    }

    pub fn momentum(&self) -> f32 {
        self.backend.optimizer().momentum()
    }

    pub fn params(&self) -> &[f32] {
        self.backend.params()
    }

    /// Trains on `dataset`.
    ///
    /// # Arguments
    /// * `kwargs` - `epochs` (default 1) and `batch_size` (default: the whole dataset).
    ///
    /// # Returns
    /// The loss of every epoch.
    pub fn fit(&mut self, dataset: &Dataset, kwargs: &Kwargs) -> Result<Vec<f64>> {
        let epochs = kwarg_usize(kwargs, "epochs")?.unwrap_or(1);
        let batch_size = kwarg_usize(kwargs, "batch_size")?.unwrap_or(dataset.len());
        let batch_size = NonZeroUsize::new(batch_size)
            .ok_or_else(|| PbtErr::InvalidConfig("'batch_size' must be positive".into()))?;

        let losses = self
            .backend
            .train(dataset, epochs, batch_size, &mut self.rng)?;

        Ok(losses.into_iter().map(f64::from).collect())
    }

    /// Scores the model on `dataset`.
    ///
    /// # Arguments
    /// * `kwargs` - `metric`: `"mse"` (default, lower is better) or `"accuracy"` (higher is
    ///   better), and `threshold` (default 0.5) separating positive from negative outputs.
    pub fn score(&mut self, dataset: &Dataset, kwargs: &Kwargs) -> Result<f64> {
        match kwargs.get("metric").and_then(Value::as_str).unwrap_or("mse") {
            "mse" => Ok(f64::from(self.backend.evaluate(dataset)?)),
            "accuracy" => {
                let threshold = kwargs
                    .get("threshold")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.5) as f32;

                let (x, y) = dataset.xy()?;
                let y_pred = self.backend.predict(x)?;
                if y_pred.dim() != y.dim() {
                    return Err(PbtErr::Model(MlErr::SizeMismatch {
                        what: "model output width",
                        got: y_pred.ncols(),
                        expected: y.ncols(),
                    }));
                }

                let hits = y_pred
                    .iter()
                    .zip(y.iter())
                    .filter(|&(&p, &t)| (p >= threshold) == (t >= threshold))
                    .count();

                Ok(hits as f64 / y.len() as f64)
            }
            other => Err(PbtErr::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

impl Trainable for MlpTrainable {
    type State = MlpState;

    fn state(&self) -> MlpState {
        self.backend.snapshot()
    }

    fn set_state(&mut self, state: MlpState) -> std::result::Result<(), BoxError> {
        Ok(self.backend.restore(state)?)
    }

    fn set_hyperparameters(
        &mut self,
        hyperparameters: &Hyperparameters,
    ) -> std::result::Result<(), BoxError> {
        let (learning_rate, momentum) = optimizer_params(hyperparameters)?;
        let optimizer = self.backend.optimizer_mut();
        optimizer.set_learning_rate(learning_rate);
        optimizer.set_momentum(momentum);
        Ok(())
    }
}

/// Builds `MlpTrainable`s sharing one architecture, each seeded differently.
#[derive(Debug)]
pub struct MlpFactory {
    widths: Vec<usize>,
    next_seed: AtomicU64,
}

impl MlpFactory {
    pub fn new(widths: Vec<usize>, seed: u64) -> Self {
        Self {
            widths,
            next_seed: AtomicU64::new(seed),
        }
    }

    pub fn create(
        &self,
        hyperparameters: &Hyperparameters,
    ) -> std::result::Result<MlpTrainable, BoxError> {
        let seed = self.next_seed.fetch_add(1, Ordering::Relaxed);
        Ok(MlpTrainable::new(&self.widths, hyperparameters, seed)?)
    }
}

/// Train capability fitting an `MlpTrainable` on a shared dataset.
#[derive(Debug, Clone)]
pub struct MlpTrainer {
    dataset: Arc<Dataset>,
}

impl MlpTrainer {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }
}

impl Trainer<MlpTrainable> for MlpTrainer {
    fn train(
        &self,
        trainable: &mut MlpTrainable,
        kwargs: &Kwargs,
    ) -> std::result::Result<Vec<f64>, BoxError> {
        Ok(trainable.fit(&self.dataset, kwargs)?)
    }
}

/// Evaluate capability scoring an `MlpTrainable` on a shared dataset.
#[derive(Debug, Clone)]
pub struct MlpEvaluator {
    dataset: Arc<Dataset>,
}

impl MlpEvaluator {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }
}

impl Evaluator<MlpTrainable> for MlpEvaluator {
    fn evaluate(
        &self,
        trainable: &mut MlpTrainable,
        kwargs: &Kwargs,
    ) -> std::result::Result<f64, BoxError> {
        Ok(trainable.score(&self.dataset, kwargs)?)
    }
}

fn optimizer_params(hyperparameters: &Hyperparameters) -> Result<(f32, f32)> {
    let learning_rate = *hyperparameters
        .get(LEARNING_RATE)
        .ok_or_else(|| PbtErr::MissingHyperparameter(LEARNING_RATE.into()))?;
    let momentum = hyperparameters.get(MOMENTUM).copied().unwrap_or(0.0);

    Ok((learning_rate as f32, momentum as f32))
}

fn kwarg_usize(kwargs: &Kwargs, key: &str) -> Result<Option<usize>> {
    let Some(value) = kwargs.get(key) else {
        return Ok(None);
    };

    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| PbtErr::InvalidConfig(format!("'{key}' must be a non-negative integer")))
}
