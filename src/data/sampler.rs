//! Samplers producing key batches over a dataset's key space.

use crate::data::Id;
use crate::data::dataset::Dataset;
use crate::error::Error;

/// Batches keys in dataset iteration order, sequentially, with no
/// shuffling or repetition.
///
/// The key space is snapshotted at construction. With `drop_last` a final
/// batch shorter than `batch_size` is discarded, giving
/// `floor(N / batch_size)` batches; otherwise the short tail is kept and
/// there are `ceil(N / batch_size)` batches. Every call to
/// [`BatchedSequentialSampler::iter`] restarts from the first key.
#[derive(Debug)]
pub struct BatchedSequentialSampler {
    keys: Vec<Id>,
    batch_size: usize,
    drop_last: bool,
}

impl BatchedSequentialSampler {
    pub fn new<T>(dataset: &Dataset<T>, batch_size: usize, drop_last: bool) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::invalid_argument("batch_size must be > 0"));
        }
        Ok(Self {
            keys: dataset.keys()?,
            batch_size,
            drop_last,
        })
    }

    pub fn num_batches(&self) -> usize {
        if self.drop_last {
            self.keys.len() / self.batch_size
        } else {
            self.keys.len().div_ceil(self.batch_size)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Vec<Id>> + '_ {
        self.keys
            .chunks(self.batch_size)
            .filter(|chunk| !self.drop_last || chunk.len() == self.batch_size)
            .map(<[Id]>::to_vec)
    }
}
