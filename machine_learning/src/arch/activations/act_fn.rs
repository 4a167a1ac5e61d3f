use super::Sigmoid;

/// An activation function applied element-wise to the output of a layer.
#[derive(Debug, Clone, Copy)]
pub enum ActFn {
    Sigmoid(Sigmoid),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
        }
    }
}
