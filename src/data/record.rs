//! Ground-truth records: boxes, labels and per-image targets

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Image identifier, unique within a split
pub type ImageId = u64;

/// Axis-aligned box in pixel space, `(x1, y1)` top-left and `(x2, y2)` bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box, rejecting degenerate or non-finite coordinates
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        let finite = [x1, y1, x2, y2].iter().all(|v| v.is_finite());
        if !finite || x1 >= x2 || y1 >= y2 {
            return Err(Error::config(format!(
                "invalid box ({x1}, {y1}, {x2}, {y2}): requires x1 < x2 and y1 < y2"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection-over-union with another box; 0 when the union is empty
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Scale coordinates independently along each axis
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self { x1: self.x1 * sx, y1: self.y1 * sy, x2: self.x2 * sx, y2: self.y2 * sy }
    }

    /// Mirror across the vertical axis of an image `width` pixels wide
    pub fn flipped_horizontal(&self, width: f32) -> Self {
        Self { x1: width - self.x2, y1: self.y1, x2: width - self.x1, y2: self.y2 }
    }

    /// Mirror across the horizontal axis of an image `height` pixels tall
    pub fn flipped_vertical(&self, height: f32) -> Self {
        Self { x1: self.x1, y1: height - self.y2, x2: self.x2, y2: height - self.y1 }
    }
}

/// One labelled ground-truth box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub label: u32,
}

/// Per-image ground truth
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetRecord {
    pub image_id: ImageId,
    pub annotations: Vec<Annotation>,
}

impl TargetRecord {
    pub fn new(image_id: ImageId) -> Self {
        Self { image_id, annotations: Vec::new() }
    }

    pub fn push(&mut self, bbox: BoundingBox, label: u32) {
        self.annotations.push(Annotation { bbox, label });
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Label of every annotation, in order
    pub fn labels(&self) -> impl Iterator<Item = u32> + '_ {
        self.annotations.iter().map(|a| a.label)
    }
}

/// One row group of a record source: the image location and its annotations
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub target: TargetRecord,
}

impl ImageRecord {
    pub fn image_id(&self) -> ImageId {
        self.target.image_id
    }
}
