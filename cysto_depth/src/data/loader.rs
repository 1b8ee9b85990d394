//! Parallel batch loading.
//!
//! Each loader owns a rayon pool. The samples of one batch are fetched in
//! parallel and collected in index order, so the batch content depends only
//! on the epoch and never on thread scheduling.

use std::sync::Arc;

use burn::prelude::*;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use super::batcher::{DepthBatch, DepthBatcher};
use super::dataset::{Sample, SampleSource};
use super::rng::SampleRng;
use crate::error::Result;

/// Iterates a [`SampleSource`] in batches.
pub struct BatchLoader {
    source: Arc<dyn SampleSource>,
    batcher: DepthBatcher,
    batch_size: usize,
    shuffle: bool,
    rng: SampleRng,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for BatchLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("source", &self.source.name())
            .field("len", &self.source.len())
            .field("batch_size", &self.batch_size)
            .field("shuffle", &self.shuffle)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

impl BatchLoader {
    /// Loader over `source` with `workers` fetch threads.
    ///
    /// Shuffling loaders draw a new permutation and new augmentation every
    /// epoch; sequential loaders keep both fixed so evaluation is comparable
    /// across epochs.
    ///
    /// # Errors
    /// Returns [`crate::CystoDepthError::ThreadPool`] if the pool cannot be
    /// created.
    pub fn new(
        source: Arc<dyn SampleSource>,
        batch_size: usize,
        workers: usize,
        shuffle: bool,
        rng: SampleRng,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("cysto-loader-{i}"))
            .build()?;
        let batcher = DepthBatcher::new(source.layout());
        Ok(Self {
            source,
            batcher,
            batch_size: batch_size.max(1),
            shuffle,
            rng,
            pool,
        })
    }

    /// The underlying source.
    pub fn source(&self) -> &Arc<dyn SampleSource> {
        &self.source
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Whether there is nothing to load.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Number of batches per epoch; the last batch may be smaller.
    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    /// Sample order for `epoch`.
    pub fn order(&self, epoch: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng.for_epoch(epoch));
        }
        order
    }

    fn augmentation_epoch(&self, epoch: usize) -> usize {
        if self.shuffle {
            epoch
        } else {
            0
        }
    }

    /// Fetch the given samples in parallel, preserving their order.
    ///
    /// # Errors
    /// Returns the first fetch error.
    pub fn fetch(&self, indices: &[usize], epoch: usize) -> Result<Vec<Sample>> {
        let source = &self.source;
        let epoch = self.augmentation_epoch(epoch);
        self.pool.install(|| {
            indices
                .par_iter()
                .map(|&i| source.fetch(i, epoch))
                .collect::<Result<Vec<_>>>()
        })
    }

    /// Batches of `epoch` on `device`.
    pub fn iter<'a, B: Backend>(&'a self, epoch: usize, device: &'a B::Device) -> BatchIter<'a, B> {
        BatchIter {
            loader: self,
            order: self.order(epoch),
            cursor: 0,
            epoch,
            device,
        }
    }
}

/// Iterator over the batches of one epoch.
pub struct BatchIter<'a, B: Backend> {
    loader: &'a BatchLoader,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    device: &'a B::Device,
}

impl<B: Backend> Iterator for BatchIter<'_, B> {
    type Item = Result<DepthBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;
        log::trace!("loading batch of {} samples", indices.len());
        Some(
            self.loader
                .fetch(indices, self.epoch)
                .and_then(|samples| self.loader.batcher.batch(samples, self.device)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ChannelRole;
    use crate::error::CystoDepthError;
    use burn::backend::NdArray;
    use cysto_core::Image;
    use rand::Rng;

    type TestBackend = NdArray;

    /// Sample `i` is filled with `i` plus an epoch-dependent random offset.
    struct Counting(usize, SampleRng);

    impl SampleSource for Counting {
        fn len(&self) -> usize {
            self.0
        }

        fn layout(&self) -> &[ChannelRole] {
            &[ChannelRole::Color]
        }

        fn fetch(&self, index: usize, epoch: usize) -> Result<Sample> {
            if index >= self.0 {
                return Err(CystoDepthError::Data("out of range".into()));
            }
            let jitter: f32 = self.1.for_sample(epoch, index).gen_range(0.0..0.5);
            Ok(Sample {
                index,
                channels: vec![Image::filled(3, 2, 2, index as f32 + jitter)],
            })
        }
    }

    fn loader(n: usize, shuffle: bool) -> BatchLoader {
        let rng = SampleRng::new(5);
        BatchLoader::new(Arc::new(Counting(n, rng)), 3, 2, shuffle, rng).unwrap()
    }

    fn epoch_indices(loader: &BatchLoader, epoch: usize) -> Vec<usize> {
        let device = Default::default();
        loader
            .iter::<TestBackend>(epoch, &device)
            .flat_map(|b| b.unwrap().indices)
            .collect()
    }

    #[test]
    fn test_sequential_order_and_partial_batch() {
        let loader = loader(7, false);
        assert_eq!(loader.num_batches(), 3);
        let device = Default::default();
        let sizes: Vec<usize> = loader
            .iter::<TestBackend>(0, &device)
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(epoch_indices(&loader, 0), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_is_deterministic_permutation() {
        let loader = loader(10, true);
        let a = epoch_indices(&loader, 1);
        assert_eq!(a, epoch_indices(&loader, 1));
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
        assert_ne!(loader.order(1), loader.order(2));
    }

    #[test]
    fn test_sequential_loader_keeps_augmentation_fixed() {
        let fixed = loader(4, false);
        assert_eq!(fixed.fetch(&[2], 0).unwrap(), fixed.fetch(&[2], 3).unwrap());
        let shuffled = loader(4, true);
        assert_ne!(shuffled.fetch(&[2], 0).unwrap(), shuffled.fetch(&[2], 3).unwrap());
    }

    #[test]
    fn test_fetch_error_propagates() {
        assert!(loader(2, false).fetch(&[0, 5], 0).is_err());
    }
}
