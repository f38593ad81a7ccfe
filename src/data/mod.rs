//! Detection datasets: record sources, augmentation, collation and batching

mod augment;
mod collate;
mod image;
mod loader;
mod record;
mod source;
mod stager;

pub use augment::{AugmentationPipeline, TransformSpec};
pub use collate::{collate, Batch, Sample};
pub use image::{FileImageLoader, ImageLoader, ImageTensor, InMemoryImageLoader};
pub use loader::{BatchStream, DataLoader, LoaderOptions};
pub use record::{Annotation, BoundingBox, ImageId, ImageRecord, TargetRecord};
pub use source::{read_detection_source, read_record_source, RecordSource, SourceStats};
pub use stager::{DatasetSplit, DatasetStager, Stage, StagedDatasets};
