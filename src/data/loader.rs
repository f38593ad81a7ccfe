//! Batched, optionally prefetching iteration over a split
//!
//! With `num_workers == 0` batches are built on the calling thread. Otherwise
//! batch `b` is built by worker `b % num_workers` and sent over that worker's
//! bounded channel. The consumer reads the channels round-robin, so batches
//! come out in plan order no matter which worker finishes first, and a worker
//! blocks once it is `prefetch_factor` batches ahead.

use crossbeam_channel::{bounded, Receiver};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use super::collate::{collate, Batch};
use super::image::ImageLoader;
use super::stager::DatasetSplit;
use crate::error::{Error, Result};

/// Batching and worker-pool settings for one loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub batch_size: usize,
    pub num_workers: usize,
    /// Batches each worker may hold ahead of the consumer
    pub prefetch_factor: usize,
    pub shuffle: bool,
    pub drop_last: bool,
    pub seed: u64,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { batch_size: 1, num_workers: 0, prefetch_factor: 2, shuffle: false, drop_last: false, seed: 0 }
    }
}

/// Per-sample seed, so augmentation does not depend on which worker runs it
fn sample_seed(seed: u64, epoch: u64, index: usize) -> u64 {
    // splitmix64 finalizer over the combined key
    let mut z = seed
        .wrapping_add(epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn build_batch(
    split: &DatasetSplit,
    images: &dyn ImageLoader,
    indices: &[usize],
    seed: u64,
    epoch: u64,
) -> Result<Batch> {
    let samples = indices
        .iter()
        .map(|&idx| {
            let mut rng = StdRng::seed_from_u64(sample_seed(seed, epoch, idx));
            split.load_sample(idx, images, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;
    collate(samples)
}

/// Produces the batches of one split, epoch by epoch
#[derive(Clone)]
pub struct DataLoader {
    split: Arc<DatasetSplit>,
    images: Arc<dyn ImageLoader>,
    options: LoaderOptions,
}

impl DataLoader {
    pub fn new(split: Arc<DatasetSplit>, images: Arc<dyn ImageLoader>, options: LoaderOptions) -> Self {
        let options = LoaderOptions {
            batch_size: options.batch_size.max(1),
            prefetch_factor: options.prefetch_factor.max(1),
            ..options
        };
        Self { split, images, options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn split(&self) -> &Arc<DatasetSplit> {
        &self.split
    }

    /// Number of images in the underlying split
    pub fn dataset_len(&self) -> usize {
        self.split.len()
    }

    pub fn num_batches(&self) -> usize {
        let n = self.split.len();
        let bs = self.options.batch_size;
        if self.options.drop_last {
            n / bs
        } else {
            n.div_ceil(bs)
        }
    }

    /// Record indices of every batch of `epoch`, in consumption order
    pub fn batch_plan(&self, epoch: u64) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.split.len()).collect();
        if self.options.shuffle {
            let mut rng = StdRng::seed_from_u64(self.options.seed.wrapping_add(epoch));
            order.shuffle(&mut rng);
        }
        let mut plan: Vec<Vec<usize>> =
            order.chunks(self.options.batch_size).map(<[usize]>::to_vec).collect();
        if self.options.drop_last && plan.last().is_some_and(|b| b.len() < self.options.batch_size) {
            plan.pop();
        }
        plan
    }

    /// Iterate the batches of `epoch`
    pub fn epoch(&self, epoch: u64) -> BatchStream {
        let plan = self.batch_plan(epoch);
        if self.options.num_workers == 0 || plan.is_empty() {
            BatchStream::Inline(InlineBatches { loader: self.clone(), plan, position: 0, epoch })
        } else {
            BatchStream::Prefetch(PrefetchBatches::spawn(self, plan, epoch))
        }
    }
}

pub struct InlineBatches {
    loader: DataLoader,
    plan: Vec<Vec<usize>>,
    position: usize,
    epoch: u64,
}

impl Iterator for InlineBatches {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.plan.get(self.position)?;
        self.position += 1;
        let l = &self.loader;
        Some(build_batch(&l.split, l.images.as_ref(), indices, l.options.seed, self.epoch))
    }
}

pub struct PrefetchBatches {
    receivers: Vec<Receiver<Result<Batch>>>,
    /// Taken once a worker has been joined
    handles: Vec<Option<JoinHandle<()>>>,
    next: usize,
    total: usize,
}

impl PrefetchBatches {
    fn spawn(loader: &DataLoader, plan: Vec<Vec<usize>>, epoch: u64) -> Self {
        let total = plan.len();
        let workers = loader.options.num_workers.min(total).max(1);
        let mut assignments: Vec<Vec<Vec<usize>>> = vec![Vec::new(); workers];
        for (b, indices) in plan.into_iter().enumerate() {
            assignments[b % workers].push(indices);
        }

        let mut receivers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for (worker, batches) in assignments.into_iter().enumerate() {
            let (tx, rx) = bounded(loader.options.prefetch_factor);
            let split = Arc::clone(&loader.split);
            let images = Arc::clone(&loader.images);
            let seed = loader.options.seed;
            handles.push(Some(thread::spawn(move || {
                for indices in batches {
                    let batch = build_batch(&split, images.as_ref(), &indices, seed, epoch);
                    let failed = batch.is_err();
                    if tx.send(batch).is_err() || failed {
                        debug!(worker, "data-loading worker stopping");
                        return;
                    }
                }
            })));
            receivers.push(rx);
        }

        Self { receivers, handles, next: 0, total }
    }
}

impl Iterator for PrefetchBatches {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let worker = self.next % self.receivers.len();
        match self.receivers[worker].recv() {
            Ok(batch) => {
                self.next += 1;
                Some(batch)
            }
            Err(_) => {
                let missing = self.next;
                self.next = self.total;
                let cause = match self.handles[worker].take().map(JoinHandle::join) {
                    Some(Err(payload)) => format!("panicked: {}", panic_message(payload.as_ref())),
                    _ => "exited early".to_string(),
                };
                Some(Err(Error::Worker(format!("worker {worker} {cause} before producing batch {missing}"))))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl Drop for PrefetchBatches {
    fn drop(&mut self) {
        // Disconnect first so blocked workers observe a send error and exit.
        self.receivers.clear();
        for handle in self.handles.drain(..).flatten() {
            if handle.join().is_err() {
                debug!("data-loading worker panicked during shutdown");
            }
        }
    }
}

/// Batches of one epoch, built inline or by the worker pool
pub enum BatchStream {
    Inline(InlineBatches),
    Prefetch(PrefetchBatches),
}

impl Iterator for BatchStream {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            BatchStream::Inline(iter) => iter.next(),
            BatchStream::Prefetch(iter) => iter.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        AugmentationPipeline, BoundingBox, ImageRecord, ImageTensor, InMemoryImageLoader,
        SourceStats, Stage, TargetRecord, TransformSpec,
    };
    use ndarray::Array3;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn split(n: usize, pipeline: AugmentationPipeline) -> (Arc<DatasetSplit>, Arc<dyn ImageLoader>) {
        let mut images = InMemoryImageLoader::new();
        let records = (0..n)
            .map(|i| {
                let path = PathBuf::from(format!("img_{i}.png"));
                images.insert(path.clone(), Array3::from_elem((3, 4, 6), i as f32));
                let mut target = TargetRecord::new(i as u64);
                target.push(BoundingBox::new(0.0, 0.0, 2.0, 2.0).unwrap(), 1);
                ImageRecord { path, target }
            })
            .collect();
        let stats = SourceStats { bytes: 0, rows: n };
        (Arc::new(DatasetSplit::new(Stage::Train, records, pipeline, stats)), Arc::new(images))
    }

    fn ids(stream: BatchStream) -> Vec<Vec<u64>> {
        stream.map(|b| b.unwrap().image_ids).collect()
    }

    #[test]
    fn test_num_batches_and_drop_last() {
        let (s, images) = split(5, AugmentationPipeline::identity());
        let opts = LoaderOptions { batch_size: 2, ..LoaderOptions::default() };
        assert_eq!(DataLoader::new(s.clone(), images.clone(), opts).num_batches(), 3);
        let opts = LoaderOptions { drop_last: true, ..opts };
        let loader = DataLoader::new(s, images, opts);
        assert_eq!(loader.num_batches(), 2);
        assert_eq!(ids(loader.epoch(0)), vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_workers_preserve_submission_order() {
        let (s, images) = split(11, AugmentationPipeline::identity());
        let inline = DataLoader::new(
            s.clone(),
            images.clone(),
            LoaderOptions { batch_size: 2, ..LoaderOptions::default() },
        );
        let pooled = DataLoader::new(
            s,
            images,
            LoaderOptions { batch_size: 2, num_workers: 3, prefetch_factor: 1, ..LoaderOptions::default() },
        );
        let expected = ids(inline.epoch(0));
        assert_eq!(expected.len(), 6);
        assert_eq!(ids(pooled.epoch(0)), expected);
    }

    #[test]
    fn test_shuffle_is_reproducible_per_epoch() {
        let (s, images) = split(16, AugmentationPipeline::identity());
        let opts = LoaderOptions { batch_size: 4, shuffle: true, seed: 7, ..LoaderOptions::default() };
        let a = DataLoader::new(s.clone(), images.clone(), opts);
        let b = DataLoader::new(s, images, LoaderOptions { num_workers: 2, ..opts });
        assert_eq!(a.batch_plan(1), b.batch_plan(1));
        assert_eq!(ids(a.epoch(1)), ids(b.epoch(1)));
        assert_ne!(a.batch_plan(1), a.batch_plan(2));
    }

    #[test]
    fn test_augmentation_independent_of_worker_count() {
        let pipeline =
            AugmentationPipeline::new(vec![TransformSpec::HorizontalFlip { p: 0.5 }]).unwrap();
        let (s, images) = split(8, pipeline);
        let opts = LoaderOptions { batch_size: 3, seed: 11, ..LoaderOptions::default() };
        let inline: Vec<Batch> =
            DataLoader::new(s.clone(), images.clone(), opts).epoch(0).map(|b| b.unwrap()).collect();
        let pooled: Vec<Batch> = DataLoader::new(s, images, LoaderOptions { num_workers: 4, ..opts })
            .epoch(0)
            .map(|b| b.unwrap())
            .collect();
        for (a, b) in inline.iter().zip(&pooled) {
            assert_eq!(a.images, b.images);
            assert_eq!(a.targets, b.targets);
        }
    }

    #[test]
    fn test_worker_error_surfaces() {
        let (s, _) = split(4, AugmentationPipeline::identity());
        let empty: Arc<dyn ImageLoader> = Arc::new(InMemoryImageLoader::new());
        let loader = DataLoader::new(
            s,
            empty,
            LoaderOptions { batch_size: 2, num_workers: 2, ..LoaderOptions::default() },
        );
        let first = loader.epoch(0).next().unwrap();
        assert!(matches!(first, Err(Error::Configuration(_))));
    }

    /// Counts loads; panics on `panic_at` if set
    struct CountingLoader {
        loads: AtomicUsize,
        panic_at: Option<PathBuf>,
    }

    impl ImageLoader for CountingLoader {
        fn load(&self, path: &Path) -> Result<ImageTensor> {
            if self.panic_at.as_deref() == Some(path) {
                panic!("corrupt image {}", path.display());
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Array3::zeros((3, 4, 4)))
        }
    }

    #[test]
    fn test_workers_block_when_consumer_lags() {
        let (s, _) = split(50, AugmentationPipeline::identity());
        let counting = Arc::new(CountingLoader { loads: AtomicUsize::new(0), panic_at: None });
        let (workers, prefetch) = (2, 1);
        let loader = DataLoader::new(
            s,
            counting.clone(),
            LoaderOptions {
                batch_size: 1,
                num_workers: workers,
                prefetch_factor: prefetch,
                ..LoaderOptions::default()
            },
        );
        let mut stream = loader.epoch(0);
        assert!(stream.next().unwrap().is_ok());
        thread::sleep(Duration::from_millis(200));

        // each worker: a full channel plus the batch blocked in `send`
        let bound = 1 + workers * (prefetch + 1);
        let loads = counting.loads.load(Ordering::SeqCst);
        assert!(loads <= bound, "{loads} images loaded, expected at most {bound}");
        drop(stream);
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let (s, _) = split(4, AugmentationPipeline::identity());
        let counting = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            panic_at: Some(PathBuf::from("img_1.png")),
        });
        let loader = DataLoader::new(
            s,
            counting,
            LoaderOptions { batch_size: 1, num_workers: 2, ..LoaderOptions::default() },
        );
        let results: Vec<Result<Batch>> = loader.epoch(0).collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(Error::Worker(msg)) => assert!(msg.contains("corrupt image img_1.png"), "{msg}"),
            other => panic!("expected worker error, got {other:?}"),
        }
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_dropping_stream_early_does_not_hang() {
        let (s, images) = split(40, AugmentationPipeline::identity());
        let loader = DataLoader::new(
            s,
            images,
            LoaderOptions { batch_size: 1, num_workers: 2, prefetch_factor: 1, ..LoaderOptions::default() },
        );
        let mut stream = loader.epoch(0);
        assert!(stream.next().unwrap().is_ok());
        drop(stream);
    }
}
