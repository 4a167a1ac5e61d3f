use crate::Result;

pub trait Optimizer {
    /// Updates `params` in place by taking a step guided by `grad`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, learning_rate: f32);
}
