//! CSV record sources
//!
//! A record source is a CSV file with one row per annotated box:
//!
//! ```text
//! filename,xmin,ymin,xmax,ymax,labels
//! images/cat_01.jpg,12,30,180,210,3
//! images/cat_01.jpg,200,40,310,190,3
//! images/dog_07.jpg,5,8,90,120,11
//! ```
//!
//! Rows sharing a `filename` form one image. Images keep the order in which
//! their filename first appears and are numbered from zero in that order.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::record::{BoundingBox, ImageId, ImageRecord, TargetRecord};
use crate::error::{Error, Result};
use crate::eval::{Detection, DetectionResult};

#[derive(Debug, Deserialize)]
struct AnnotationRow {
    filename: String,
    xmin: f32,
    ymin: f32,
    xmax: f32,
    ymax: f32,
    labels: i64,
}

#[derive(Debug, Deserialize)]
struct DetectionRow {
    filename: String,
    xmin: f32,
    ymin: f32,
    xmax: f32,
    ymax: f32,
    labels: i64,
    scores: f32,
}

/// Size of a record source, reported for operator visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub bytes: u64,
    pub rows: usize,
}

impl SourceStats {
    pub fn mebibytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Parsed contents of one record source
#[derive(Debug, Clone)]
pub struct RecordSource {
    pub path: PathBuf,
    pub records: Vec<ImageRecord>,
    pub stats: SourceStats,
    /// Filename column value of each image, as written in the CSV
    pub ids: HashMap<String, ImageId>,
}

fn label_from(raw: i64, path: &Path, row: usize) -> Result<u32> {
    u32::try_from(raw).map_err(|_| {
        Error::config(format!("{} row {row}: label {raw} is not a non-negative integer", path.display()))
    })
}

fn resolve(filename: &str, image_root: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(filename);
    match image_root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path,
    }
}

fn open_reader(path: &Path) -> Result<(csv::Reader<fs::File>, u64)> {
    let bytes = fs::metadata(path)
        .map_err(|e| Error::config(format!("cannot read record source {}: {e}", path.display())))?
        .len();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::config(format!("cannot open record source {}: {e}", path.display())))?;
    Ok((reader, bytes))
}

/// Read and group an annotation CSV
///
/// Fails with a configuration error when the file is unreadable, a row does
/// not parse, a box is degenerate, a label is negative, or the file holds no rows.
pub fn read_record_source(path: &Path, image_root: Option<&Path>) -> Result<RecordSource> {
    let (mut reader, bytes) = open_reader(path)?;

    let mut records: Vec<ImageRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows = 0usize;

    for (i, row) in reader.deserialize::<AnnotationRow>().enumerate() {
        // header is line 1
        let line = i + 2;
        let row = row.map_err(|e| Error::config(format!("{} row {line}: {e}", path.display())))?;
        let bbox = BoundingBox::new(row.xmin, row.ymin, row.xmax, row.ymax)
            .map_err(|e| Error::config(format!("{} row {line}: {e}", path.display())))?;
        let label = label_from(row.labels, path, line)?;

        let slot = match index.get(&row.filename) {
            Some(&slot) => slot,
            None => {
                let slot = records.len();
                records.push(ImageRecord {
                    path: resolve(&row.filename, image_root),
                    target: TargetRecord::new(slot as ImageId),
                });
                index.insert(row.filename, slot);
                slot
            }
        };
        records[slot].target.push(bbox, label);
        rows += 1;
    }

    if records.is_empty() {
        return Err(Error::config(format!("record source {} is empty", path.display())));
    }

    let ids = index.into_iter().map(|(name, slot)| (name, slot as ImageId)).collect();
    Ok(RecordSource { path: path.to_path_buf(), records, stats: SourceStats { bytes, rows }, ids })
}

/// Read a detections CSV (`filename,xmin,ymin,xmax,ymax,labels,scores`)
///
/// Filenames are resolved to image ids through `ids`, which maps the
/// filenames of a record source to the ids it assigned. Every image in `ids`
/// gets an entry, so images without a detection row evaluate as empty.
pub fn read_detection_source(
    path: &Path,
    ids: &HashMap<String, ImageId>,
) -> Result<HashMap<ImageId, DetectionResult>> {
    let (mut reader, _) = open_reader(path)?;
    let mut results: HashMap<ImageId, DetectionResult> =
        ids.values().map(|&id| (id, DetectionResult::default())).collect();

    for (i, row) in reader.deserialize::<DetectionRow>().enumerate() {
        let line = i + 2;
        let row = row.map_err(|e| Error::config(format!("{} row {line}: {e}", path.display())))?;
        let image_id = *ids.get(&row.filename).ok_or_else(|| {
            Error::config(format!(
                "{} row {line}: {} is not part of the ground truth",
                path.display(),
                row.filename
            ))
        })?;
        let bbox = BoundingBox::new(row.xmin, row.ymin, row.xmax, row.ymax)
            .map_err(|e| Error::config(format!("{} row {line}: {e}", path.display())))?;
        let label = label_from(row.labels, path, line)?;
        if !(0.0..=1.0).contains(&row.scores) {
            return Err(Error::config(format!(
                "{} row {line}: score {} outside [0, 1]",
                path.display(),
                row.scores
            )));
        }
        if let Some(result) = results.get_mut(&image_id) {
            result.detections.push(Detection { bbox, label, score: row.scores });
        }
    }

    Ok(results)
}
