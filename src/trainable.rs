use crate::{BoxError, Hyperparameters, Kwargs};

/// The capabilities the scheduler needs from a population member's trainable unit.
///
/// Implement this as an adapter over a concrete model: the scheduler only ever snapshots,
/// restores and retunes it.
pub trait Trainable {
    /// An opaque snapshot of everything the unit has learned (weights, optimizer state).
    type State;

    /// Takes a snapshot of the internal state.
    fn state(&self) -> Self::State;

    /// Replaces the internal state with `state`.
    fn set_state(&mut self, state: Self::State) -> Result<(), BoxError>;

    /// Applies new hyperparameters in place, without rebuilding the unit.
    fn set_hyperparameters(&mut self, hyperparameters: &Hyperparameters) -> Result<(), BoxError>;
}

/// The train capability: runs training on a unit, returning its losses.
pub trait Trainer<T> {
    fn train(&self, trainable: &mut T, kwargs: &Kwargs) -> Result<Vec<f64>, BoxError>;
}

/// The evaluate capability: scores a unit.
pub trait Evaluator<T> {
    fn evaluate(&self, trainable: &mut T, kwargs: &Kwargs) -> Result<f64, BoxError>;
}

impl<T, F> Trainer<T> for F
where
    F: Fn(&mut T, &Kwargs) -> Result<Vec<f64>, BoxError>,
{
    fn train(&self, trainable: &mut T, kwargs: &Kwargs) -> Result<Vec<f64>, BoxError> {
        self(trainable, kwargs)
    }
}

impl<T, F> Evaluator<T> for F
where
    F: Fn(&mut T, &Kwargs) -> Result<f64, BoxError>,
{
    fn evaluate(&self, trainable: &mut T, kwargs: &Kwargs) -> Result<f64, BoxError> {
        self(trainable, kwargs)
    }
}
