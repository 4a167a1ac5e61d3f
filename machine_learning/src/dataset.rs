use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory dataset of samples stored row by row, each row holding the `x_size` input
/// values followed by the `y_size` expected output values.
#[derive(Debug, Clone)]
pub struct Dataset {
    data: Vec<f32>,
    x_size: usize,
    y_size: usize,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `data` - The raw samples, row-major.
    /// * `x_size` - The amount of input values per sample.
    /// * `y_size` - The amount of output values per sample.
    ///
    /// # Returns
    /// A new `Dataset` or an error if the data can't be split in whole samples.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row_size = x_size + y_size;
        if row_size == 0 || data.len() % row_size != 0 {
            return Err(MlErr::InvalidDataset {
                len: data.len(),
                row_size,
            });
        }

        if data.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        Ok(Self {
            data,
            x_size,
            y_size,
        })
    }

    /// Returns the amount of samples in the dataset.
    pub fn len(&self) -> usize {
        self.data.len() / self.row_size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Splits the whole dataset into its inputs and expected outputs.
    pub fn xy(&self) -> Result<(ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        Ok(self.view()?.split_at(Axis(1), self.x_size))
    }

    /// Returns a random permutation of the sample indices.
    pub fn shuffled_order<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        order
    }

    /// Iterates over the samples in the given order, grouped in batches.
    ///
    /// # Arguments
    /// * `order` - The sample indices to visit.
    /// * `batch_size` - The maximum amount of samples per batch.
    ///
    /// # Returns
    /// An iterator of `(x, y)` batches.
    pub fn batches<'a>(
        &'a self,
        order: &'a [usize],
        batch_size: usize,
    ) -> Result<impl Iterator<Item = (Array2<f32>, Array2<f32>)> + 'a> {
        let view = self.view()?;
        let x_size = self.x_size;

        Ok(order.chunks(batch_size.max(1)).map(move |rows| {
            let batch = view.select(Axis(0), rows);
            let x = batch.slice(s![.., ..x_size]).to_owned();
            let y = batch.slice(s![.., x_size..]).to_owned();
            (x, y)
        }))
    }

    fn row_size(&self) -> usize {
        self.x_size + self.y_size
    }

    fn view(&self) -> Result<ArrayView2<'_, f32>> {
        Ok(ArrayView2::from_shape(
            (self.len(), self.row_size()),
            &self.data,
        )?)
    }
}
