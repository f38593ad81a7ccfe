//! Batch collation for detection samples
//!
//! Images stack into one `[N, C, H, W]` array; targets cannot, because every
//! image carries a different number of boxes, so they stay a list aligned by
//! index with the image axis.

use ndarray::{s, Array4, Axis};

use super::image::ImageTensor;
use super::record::{ImageId, TargetRecord};
use crate::error::{Error, Result};

/// One augmented image and its ground truth
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: ImageTensor,
    pub target: TargetRecord,
}

impl Sample {
    pub fn new(image: ImageTensor, target: TargetRecord) -> Self {
        Self { image, target }
    }
}

/// Collated batch; index `i` of every field refers to the same image
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[N, C, H, W]`, zero-padded to the largest image in the batch
    pub images: Array4<f32>,
    pub targets: Vec<TargetRecord>,
    pub image_ids: Vec<ImageId>,
    /// `(height, width)` of each image before padding
    pub image_sizes: Vec<(usize, usize)>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Fail fast on a batch whose parts disagree in length
    pub fn validate(&self) -> Result<()> {
        let n_images = self.images.len_of(Axis(0));
        if n_images == 0 {
            return Err(Error::batch_shape("batch contains no images"));
        }
        if n_images != self.targets.len()
            || n_images != self.image_ids.len()
            || n_images != self.image_sizes.len()
        {
            return Err(Error::batch_shape(format!(
                "batch has {n_images} images, {} targets, {} ids, {} sizes",
                self.targets.len(),
                self.image_ids.len(),
                self.image_sizes.len()
            )));
        }
        Ok(())
    }
}

/// Stack samples into a batch, preserving order
pub fn collate(samples: Vec<Sample>) -> Result<Batch> {
    let first = samples.first().ok_or_else(|| Error::batch_shape("cannot collate empty batch"))?;
    let channels = first.image.len_of(Axis(0));

    let mut max_h = 0;
    let mut max_w = 0;
    for (i, sample) in samples.iter().enumerate() {
        let (c, h, w) = sample.image.dim();
        if c != channels {
            return Err(Error::batch_shape(format!(
                "sample {i} has {c} channels, expected {channels}"
            )));
        }
        max_h = max_h.max(h);
        max_w = max_w.max(w);
    }

    let n = samples.len();
    let mut images = Array4::<f32>::zeros((n, channels, max_h, max_w));
    let mut targets = Vec::with_capacity(n);
    let mut image_ids = Vec::with_capacity(n);
    let mut image_sizes = Vec::with_capacity(n);

    for (i, sample) in samples.into_iter().enumerate() {
        let (_, h, w) = sample.image.dim();
        images.slice_mut(s![i, .., ..h, ..w]).assign(&sample.image);
        image_ids.push(sample.target.image_id);
        image_sizes.push((h, w));
        targets.push(sample.target);
    }

    Ok(Batch { images, targets, image_ids, image_sizes })
}
