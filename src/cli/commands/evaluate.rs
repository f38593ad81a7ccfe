//! Evaluate command implementation

use std::path::Path;

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::cli::{EvaluateArgs, OutputFormat};
use crate::config::IouType;
use crate::data::{read_detection_source, read_record_source, ImageId};
use crate::error::Result;
use crate::eval::{DetectionResult, EvaluationAccumulator, EvaluationSummary, PostProcessor};

/// Evaluate a detections CSV against a ground-truth record source
pub fn evaluate_files(
    ground_truth: &Path,
    detections: &Path,
    post: PostProcessor,
) -> Result<EvaluationSummary> {
    let source = read_record_source(ground_truth, None)?;
    let raw = read_detection_source(detections, &source.ids)?;

    let mut results: Vec<(ImageId, DetectionResult)> =
        raw.into_iter().map(|(id, result)| (id, post.apply(&result))).collect();
    results.sort_by_key(|(id, _)| *id);

    let targets = source.records.into_iter().map(|r| r.target).collect();
    let mut accumulator = EvaluationAccumulator::new(targets, &[IouType::Bbox])?;
    accumulator.update(results)?;
    accumulator.accumulate()?;
    accumulator.summarize()
}

/// Text rendering: the standard table, per-category AP and the primary AP
pub fn format_summary(summary: &EvaluationSummary) -> String {
    let mut out = String::new();
    for stats in &summary.per_type {
        out.push_str(&format!("IoU metric: {:?}\n", stats.iou_type));
        out.push_str(&stats.to_string());
        for (category, ap) in &stats.per_category {
            out.push_str(&format!("  category {category:>4}: AP {ap:.3}\n"));
        }
    }
    out.push_str(&format!("Primary AP: {:.4}", summary.primary_ap));
    out
}

pub fn run_evaluate(args: EvaluateArgs, level: LogLevel) -> std::result::Result<(), String> {
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "Evaluating {} against {}",
            args.detections.display(),
            args.ground_truth.display()
        ),
    );

    let post = PostProcessor::new(args.score_threshold.unwrap_or(0.0), args.nms_iou)
        .map_err(|e| format!("Invalid post-processing: {e}"))?;
    let summary = evaluate_files(&args.ground_truth, &args.detections, post)
        .map_err(|e| format!("Evaluation failed: {e}"))?;

    match args.format {
        OutputFormat::Text => println!("{}", format_summary(&summary)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&summary)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }
    Ok(())
}
