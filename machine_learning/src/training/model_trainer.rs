use std::num::NonZeroUsize;

use log::trace;
use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::{
    Result,
    arch::{Model, check_output, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// A copy of everything a `ModelTrainer` learns: its parameters and its optimizer's state.
#[derive(Debug, Clone)]
pub struct Snapshot<O> {
    pub params: Vec<f32>,
    pub optimizer: O,
}

/// A model `Trainer`. Contains the relevant components needed for training a model,
/// including the model itself and its parameters.
#[derive(Debug, Clone)]
pub struct ModelTrainer<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    model: M,
    optimizer: O,
    loss_fn: L,
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl<M, O, L> ModelTrainer<M, O, L>
where
    M: Model,
    O: Optimizer + Clone,
    L: LossFn,
{
    /// Returns a new `ModelTrainer` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer that updates the parameters.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `rng` - A random number generator used for the initialization.
    pub fn new<R: Rng>(model: M, optimizer: O, loss_fn: L, rng: &mut R) -> Result<Self> {
        let size = model.size();
        let mut params = vec![0.; size];
        model.init_params(&mut params, rng)?;

        Ok(Self {
            model,
            optimizer,
            loss_fn,
            params,
            grad: vec![0.; size],
        })
    }

    /// Performs `epochs` epochs of training over the dataset, shuffling it before each one.
    ///
    /// # Arguments
    /// * `dataset` - The dataset the model will be trained with.
    /// * `epochs` - The amount of passes over the dataset.
    /// * `batch_size` - The amount of samples per optimizer step.
    /// * `rng` - A random number generator used for shuffling.
    ///
    /// # Returns
    /// The loss of every epoch.
    pub fn train<R: Rng>(
        &mut self,
        dataset: &Dataset,
        epochs: usize,
        batch_size: NonZeroUsize,
        rng: &mut R,
    ) -> Result<Vec<f32>> {
        let mut losses = Vec::new();

        for epoch in 0..epochs {
            let order = dataset.shuffled_order(rng);
            let batches = dataset.batches(&order, batch_size.get())?;

            let loss = self.model.backprop(
                &mut self.params,
                &mut self.grad,
                &self.loss_fn,
                &mut self.optimizer,
                batches,
            )?;

            trace!(epoch = epoch, loss = loss; "finished epoch");
            losses.push(loss);
        }

        Ok(losses)
    }

    /// Predicts the output for every row of `x`.
    pub fn predict(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.model.forward(&self.params, x)
    }

    /// Computes the loss over the whole dataset without touching the parameters.
    pub fn evaluate(&mut self, dataset: &Dataset) -> Result<f32> {
        let (x, y) = dataset.xy()?;
        let y_pred = self.predict(x)?;
        check_output(y_pred.view(), y)?;
        Ok(self.loss_fn.loss(y_pred.view(), y))
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut O {
        &mut self.optimizer
    }

    /// Copies the learned state.
    pub fn snapshot(&self) -> Snapshot<O> {
        Snapshot {
            params: self.params.clone(),
            optimizer: self.optimizer.clone(),
        }
    }

    /// Replaces the learned state with `snapshot`.
    pub fn restore(&mut self, snapshot: Snapshot<O>) -> Result<()> {
        let expected = self.model.size();
        if snapshot.params.len() != expected {
            return Err(crate::MlErr::SizeMismatch {
                what: "snapshot parameters",
                got: snapshot.params.len(),
                expected,
            });
        }

        self.params = snapshot.params;
        self.optimizer = snapshot.optimizer;
        Ok(())
    }
}
