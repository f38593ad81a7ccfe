//! Per-stage augmentation pipelines
//!
//! Every transform acts on the image and its target together so boxes stay
//! aligned with pixels. Random transforms draw from the generator passed to
//! [`AugmentationPipeline::apply`]; nothing reads a global seed.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use ndarray::{Array2, Array3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::image::ImageTensor;
use super::record::TargetRecord;
use crate::error::{Error, Result};

fn default_flip_prob() -> f32 {
    0.5
}

/// Declarative transform, as written in the `augmentations` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    /// Triangle-filtered resize to a fixed size; boxes are rescaled
    Resize { width: usize, height: usize },
    /// Mirror left-right with probability `p`
    HorizontalFlip {
        #[serde(default = "default_flip_prob")]
        p: f32,
    },
    /// Mirror top-bottom with probability `p`
    VerticalFlip {
        #[serde(default = "default_flip_prob")]
        p: f32,
    },
    /// Per-channel `(x - mean) / std`
    Normalize { mean: Vec<f32>, std: Vec<f32> },
}

impl TransformSpec {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "Resize",
            Self::HorizontalFlip { .. } => "HorizontalFlip",
            Self::VerticalFlip { .. } => "VerticalFlip",
            Self::Normalize { .. } => "Normalize",
        }
    }

    /// Check parameters without touching any data
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Resize { width, height } if *width == 0 || *height == 0 => {
                Err(Error::config(format!("resize target {width}x{height} must be non-empty")))
            }
            Self::HorizontalFlip { p } | Self::VerticalFlip { p } if !(0.0..=1.0).contains(p) => {
                Err(Error::config(format!("{} probability {p} outside [0, 1]", self.name())))
            }
            Self::Normalize { mean, std } => {
                if mean.len() != std.len() || mean.is_empty() {
                    return Err(Error::config("normalize mean/std must be non-empty and equal length"));
                }
                if std.iter().any(|s| *s <= 0.0) {
                    return Err(Error::config("normalize std values must be > 0"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Ordered list of transforms applied to every sample of a split
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AugmentationPipeline {
    transforms: Vec<TransformSpec>,
}

impl AugmentationPipeline {
    pub fn new(transforms: Vec<TransformSpec>) -> Result<Self> {
        for t in &transforms {
            t.validate()?;
        }
        Ok(Self { transforms })
    }

    /// Pipeline that passes samples through untouched
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Transform names in application order
    pub fn describe(&self) -> Vec<&'static str> {
        self.transforms.iter().map(TransformSpec::name).collect()
    }

    /// Run every transform in order
    pub fn apply<R: Rng>(
        &self,
        mut image: ImageTensor,
        mut target: TargetRecord,
        rng: &mut R,
    ) -> Result<(ImageTensor, TargetRecord)> {
        for transform in &self.transforms {
            match transform {
                TransformSpec::Resize { width, height } => {
                    let (_, h, w) = image.dim();
                    let sx = *width as f32 / w as f32;
                    let sy = *height as f32 / h as f32;
                    image = resize_planes(&image, *height, *width)?;
                    for ann in &mut target.annotations {
                        ann.bbox = ann.bbox.scaled(sx, sy);
                    }
                }
                TransformSpec::HorizontalFlip { p } => {
                    if rng.random::<f32>() < *p {
                        let width = image.len_of(Axis(2)) as f32;
                        image.invert_axis(Axis(2));
                        for ann in &mut target.annotations {
                            ann.bbox = ann.bbox.flipped_horizontal(width);
                        }
                    }
                }
                TransformSpec::VerticalFlip { p } => {
                    if rng.random::<f32>() < *p {
                        let height = image.len_of(Axis(1)) as f32;
                        image.invert_axis(Axis(1));
                        for ann in &mut target.annotations {
                            ann.bbox = ann.bbox.flipped_vertical(height);
                        }
                    }
                }
                TransformSpec::Normalize { mean, std } => {
                    let channels = image.len_of(Axis(0));
                    if channels != mean.len() {
                        return Err(Error::batch_shape(format!(
                            "normalize expects {} channels, image has {channels}",
                            mean.len()
                        )));
                    }
                    for (c, mut plane) in image.axis_iter_mut(Axis(0)).enumerate() {
                        plane.mapv_inplace(|v| (v - mean[c]) / std[c]);
                    }
                }
            }
        }
        Ok((image, target))
    }
}

/// Resize every channel through `imageops`, one `f32` luma plane at a time
fn resize_planes(image: &ImageTensor, out_h: usize, out_w: usize) -> Result<ImageTensor> {
    let (channels, h, w) = image.dim();
    if channels == 0 || h == 0 || w == 0 {
        return Err(Error::batch_shape(format!("cannot resize empty {channels}x{h}x{w} image")));
    }
    let mut out = Array3::<f32>::zeros((channels, out_h, out_w));
    for (c, plane) in image.axis_iter(Axis(0)).enumerate() {
        let pixels: Vec<f32> = plane.iter().copied().collect();
        let buffer = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(w as u32, h as u32, pixels)
            .ok_or_else(|| Error::batch_shape(format!("channel {c} does not fill {w}x{h}")))?;
        let resized = imageops::resize(&buffer, out_w as u32, out_h as u32, FilterType::Triangle);
        let resized = Array2::from_shape_vec((out_h, out_w), resized.into_raw())
            .map_err(|e| Error::batch_shape(format!("resized channel {c}: {e}")))?;
        out.index_axis_mut(Axis(0), c).assign(&resized);
    }
    Ok(out)
}
