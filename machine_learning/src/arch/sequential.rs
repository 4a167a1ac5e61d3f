use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, layers::Layer, loss::LossFn};
use crate::{MlErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        self.check_len("model parameters", params.len())?;

        let mut rest = params;
        for layer in &self.layers {
            let (layer_params, tail) = std::mem::take(&mut rest).split_at_mut(layer.size());
            layer.init(layer_params, rng)?;
            rest = tail;
        }

        Ok(())
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;

        let mut a = x.to_owned();
        let mut rest = params;

        for layer in self.layers.iter_mut() {
            let (layer_params, tail) = rest.split_at(layer.size());
            a = layer.forward(layer_params, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    // NOTE: the epoch loss is approximated by averaging the loss at each batch, since getting
    // the actual one would require forwarding over all batches again at the end.
    fn backprop<L, O, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        batches: I,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer,
        I: Iterator<Item = (Array2<f32>, Array2<f32>)>,
    {
        self.check_len("model gradient", grad.len())?;

        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            grad.fill(0.);

            let y_pred = self.forward(params, x.view())?;
            check_output(y_pred.view(), y.view())?;
            total_loss += loss_fn.loss(y_pred.view(), y.view());
            num_batches += 1;

            let mut d = loss_fn.loss_prime(y_pred.view(), y.view());
            let mut end = params.len();

            for layer in self.layers.iter_mut().rev() {
                let start = end - layer.size();
                d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
                end = start;
            }

            optimizer.update_params(grad, params)?;
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(total_loss / num_batches as f32)
    }
}

/// Predictions and targets must have the same shape before computing a loss.
pub(crate) fn check_output(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<()> {
    if y_pred.dim() != y.dim() {
        return Err(MlErr::SizeMismatch {
            what: "model output width",
            got: y_pred.ncols(),
            expected: y.ncols(),
        });
    }

    Ok(())
}
