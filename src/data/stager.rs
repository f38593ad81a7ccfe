//! Dataset staging: three record sources plus their augmentation pipelines

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::augment::AugmentationPipeline;
use super::collate::Sample;
use super::image::ImageLoader;
use super::record::{ImageRecord, TargetRecord};
use super::source::{read_record_source, SourceStats};
use crate::config::{AugmentationConfig, DataConfig};
use crate::error::{Error, Result};

/// Dataset stage; each has its own split and execution semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Train,
    Validation,
    Test,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Train => "train",
            Stage::Validation => "validation",
            Stage::Test => "test",
        };
        f.write_str(name)
    }
}

/// Records and augmentations of one stage; immutable once staged
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    stage: Stage,
    records: Arc<[ImageRecord]>,
    pipeline: AugmentationPipeline,
    stats: SourceStats,
}

impl DatasetSplit {
    pub fn new(
        stage: Stage,
        records: Vec<ImageRecord>,
        pipeline: AugmentationPipeline,
        stats: SourceStats,
    ) -> Self {
        Self { stage, records: records.into(), pipeline, stats }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn pipeline(&self) -> &AugmentationPipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    /// Ground truth of every image as recorded, before any augmentation
    pub fn ground_truth(&self) -> Vec<TargetRecord> {
        self.records.iter().map(|r| r.target.clone()).collect()
    }

    /// Load record `index` through `loader` and run the split's augmentations
    pub fn load_sample<R: Rng>(
        &self,
        index: usize,
        loader: &dyn ImageLoader,
        rng: &mut R,
    ) -> Result<Sample> {
        let record = self.records.get(index).ok_or_else(|| {
            Error::batch_shape(format!(
                "{} split has {} records, index {index} requested",
                self.stage,
                self.records.len()
            ))
        })?;
        let image = loader.load(&record.path)?;
        let (image, target) = self.pipeline.apply(image, record.target.clone(), rng)?;
        Ok(Sample::new(image, target))
    }
}

/// The three staged splits
#[derive(Debug, Clone, PartialEq)]
pub struct StagedDatasets {
    pub train: Arc<DatasetSplit>,
    pub validation: Arc<DatasetSplit>,
    pub test: Arc<DatasetSplit>,
}

impl StagedDatasets {
    pub fn split(&self, stage: Stage) -> &Arc<DatasetSplit> {
        match stage {
            Stage::Train => &self.train,
            Stage::Validation => &self.validation,
            Stage::Test => &self.test,
        }
    }
}

/// Resolves record sources and augmentation pipelines from configuration
#[derive(Debug, Clone)]
pub struct DatasetStager {
    data: DataConfig,
    augmentations: AugmentationConfig,
}

impl DatasetStager {
    pub fn new(data: DataConfig, augmentations: AugmentationConfig) -> Self {
        Self { data, augmentations }
    }

    /// Read all three sources; same configuration, same splits
    pub fn stage(&self) -> Result<StagedDatasets> {
        let train_pipeline = AugmentationPipeline::new(self.augmentations.train.clone())?;
        info!(augmentations = ?train_pipeline.describe(), "augmentations used in training");

        let train = self.stage_one(Stage::Train, train_pipeline)?;
        let validation = self.stage_one(
            Stage::Validation,
            AugmentationPipeline::new(self.augmentations.valid.clone())?,
        )?;
        let test =
            self.stage_one(Stage::Test, AugmentationPipeline::new(self.augmentations.test.clone())?)?;

        Ok(StagedDatasets {
            train: Arc::new(train),
            validation: Arc::new(validation),
            test: Arc::new(test),
        })
    }

    fn stage_one(&self, stage: Stage, pipeline: AugmentationPipeline) -> Result<DatasetSplit> {
        let path = match stage {
            Stage::Train => &self.data.train_csv,
            Stage::Validation => &self.data.valid_csv,
            Stage::Test => &self.data.test_csv,
        };
        let source = read_record_source(path, self.data.image_root.as_deref())?;
        info!(
            %stage,
            path = %path.display(),
            images = source.records.len(),
            rows = source.stats.rows,
            "serialized {stage} dataset takes {:.2} MiB",
            source.stats.mebibytes()
        );
        Ok(DatasetSplit::new(stage, source.records, pipeline, source.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryImageLoader, TransformSpec};
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use std::path::Path;

    fn write_sources(dir: &Path) -> DataConfig {
        let body = "filename,xmin,ymin,xmax,ymax,labels\na.png,0,0,4,4,1\nb.png,1,1,3,3,2\n";
        for name in ["train.csv", "valid.csv", "test.csv"] {
            fs::write(dir.join(name), body).unwrap();
        }
        DataConfig {
            train_csv: dir.join("train.csv"),
            valid_csv: dir.join("valid.csv"),
            test_csv: dir.join("test.csv"),
            image_root: None,
        }
    }

    #[test]
    fn test_stage_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let stager = DatasetStager::new(write_sources(dir.path()), AugmentationConfig::default());
        let first = stager.stage().unwrap();
        let second = stager.stage().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.train.len(), 2);
        assert_eq!(first.split(Stage::Test).stage(), Stage::Test);
    }

    #[test]
    fn test_missing_source_fails_staging() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = write_sources(dir.path());
        data.valid_csv = dir.path().join("missing.csv");
        let err = DatasetStager::new(data, AugmentationConfig::default()).stage().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_sample_applies_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let augmentations = AugmentationConfig {
            train: vec![TransformSpec::Resize { width: 8, height: 8 }],
            ..AugmentationConfig::default()
        };
        let staged =
            DatasetStager::new(write_sources(dir.path()), augmentations).stage().unwrap();
        let loader = InMemoryImageLoader::new()
            .with_image("a.png", Array3::zeros((3, 4, 4)))
            .with_image("b.png", Array3::zeros((3, 4, 4)));
        let mut rng = StdRng::seed_from_u64(0);

        let sample = staged.train.load_sample(0, &loader, &mut rng).unwrap();
        assert_eq!(sample.image.dim(), (3, 8, 8));
        assert_eq!(sample.target.annotations[0].bbox.x2, 8.0);

        // validation split has no augmentations
        let sample = staged.validation.load_sample(0, &loader, &mut rng).unwrap();
        assert_eq!(sample.image.dim(), (3, 4, 4));

        assert!(staged.train.load_sample(5, &loader, &mut rng).is_err());
    }
}
