//! Rendering and persistence of evaluation results.

use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    evaluation::{EvaluationSummary, TagCount},
    gate::GateStatus,
};

pub const METRICS_FILE: &str = "metrics.json";
pub const REPORT_FILE: &str = "report.md";
pub const SUMMARY_FILE: &str = "evaluation_summary.json";

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ReportError {
    #[display("failed to write {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to encode {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Compact result of a run, for scripts deciding on promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDigest {
    pub report_path: PathBuf,
    pub regression_status: GateStatus,
    pub pressure_precision_at_k: Option<f64>,
    pub boundary_accuracy: Option<f64>,
    pub false_safe_rate: Option<f64>,
}

impl EvaluationDigest {
    #[must_use]
    pub fn new(summary: &EvaluationSummary, report_path: PathBuf) -> Self {
        Self {
            report_path,
            regression_status: summary.gate.status,
            pressure_precision_at_k: summary
                .pressure_selector
                .as_ref()
                .map(|p| p.score.precision_at_k),
            boundary_accuracy: summary.boundary_classifier.as_ref().map(|b| b.accuracy),
            false_safe_rate: summary
                .boundary_classifier
                .as_ref()
                .map(|b| b.false_safe_rate),
        }
    }
}

/// Writes `metrics.json`, `report.md` and `evaluation_summary.json` into a
/// fresh `<output>/<timestamp>/` directory.
pub fn write_reports(
    output: &Path,
    summary: &EvaluationSummary,
) -> Result<EvaluationDigest, ReportError> {
    let dir = output.join(summary.evaluated_at.format("%Y%m%d-%H%M%S").to_string());
    fs::create_dir_all(&dir).map_err(|source| ReportError::Io {
        path: dir.clone(),
        source,
    })?;

    write_json(&dir.join(METRICS_FILE), summary)?;
    let report_path = dir.join(REPORT_FILE);
    let markdown = MarkdownReport(summary).to_string();
    fs::write(&report_path, markdown).map_err(|source| ReportError::Io {
        path: report_path.clone(),
        source,
    })?;

    let digest = EvaluationDigest::new(summary, report_path);
    write_json(&dir.join(SUMMARY_FILE), &digest)?;
    tracing::info!(dir = %dir.display(), "wrote evaluation report");
    Ok(digest)
}

fn write_json<T>(path: &Path, value: &T) -> Result<(), ReportError>
where
    T: Serialize,
{
    let mut json = serde_json::to_string_pretty(value).map_err(|source| ReportError::Json {
        path: path.to_owned(),
        source,
    })?;
    json.push('\n');
    fs::write(path, json).map_err(|source| ReportError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Markdown rendering of an [`EvaluationSummary`].
pub struct MarkdownReport<'a>(pub &'a EvaluationSummary);

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        writeln!(f, "# Model Evaluation Report")?;
        writeln!(f)?;
        writeln!(
            f,
            "Evaluated at {} on {} examples ({:?} split).",
            summary.evaluated_at.to_rfc3339(),
            summary.evaluated_examples,
            summary.split
        )?;
        writeln!(f)?;

        writeln!(f, "## 1) Dataset Summary")?;
        writeln!(f, "- Total examples: {}", summary.dataset.total)?;
        writeln!(f, "- By source: {}", counts(&summary.dataset.by_source))?;
        writeln!(f, "- By category: {}", counts(&summary.dataset.by_category))?;
        writeln!(
            f,
            "- Window distribution: {}",
            counts(&summary.dataset.by_window_rule)
        )?;
        writeln!(f)?;

        writeln!(f, "## 2) Cohort Quality")?;
        match &summary.cohort {
            Some(cohort) => {
                writeln!(f, "- Version: {}", cohort.version)?;
                writeln!(f, "- Silhouette: {}", optional(cohort.assessment.silhouette))?;
                writeln!(f, "- Stability: {}", optional(cohort.assessment.stability))?;
                writeln!(f, "- Outlier rate: {:.3}", cohort.assessment.outlier_rate)?;
                writeln!(
                    f,
                    "- Cluster sizes: {:?} (min {})",
                    cohort.assessment.cluster_sizes, cohort.assessment.min_cluster_size
                )?;
            }
            None => writeln!(f, "- No cohort model found")?,
        }
        writeln!(f)?;

        writeln!(f, "## 3) Pressure Selection Quality")?;
        match &summary.pressure_selector {
            Some(pressure) => {
                let k = pressure.k;
                writeln!(f, "- Version: {}", pressure.version)?;
                writeln!(f, "- Precision@{k}: {:.3}", pressure.score.precision_at_k)?;
                writeln!(f, "- Recall@{k}: {:.3}", pressure.score.recall_at_k)?;
                writeln!(f, "- F1@{k}: {:.3}", pressure.f1_at_k)?;
                writeln!(
                    f,
                    "- Previous precision@{k}: {}",
                    optional(pressure.previous_precision_at_k())
                )?;
                writeln!(f, "- Per-category:")?;
                for (category, score) in &pressure.by_category {
                    writeln!(
                        f,
                        "  - {category}: precision@{k} {:.3}, recall@{k} {:.3}",
                        score.precision_at_k, score.recall_at_k
                    )?;
                }
                writeln!(f, "- False positives: {}", tags(&pressure.false_positives))?;
                writeln!(f, "- False negatives: {}", tags(&pressure.false_negatives))?;
            }
            None => writeln!(f, "- No pressure model found")?,
        }
        writeln!(f)?;

        writeln!(f, "## 4) Boundary Safety")?;
        match &summary.boundary_classifier {
            Some(boundary) => {
                writeln!(f, "- Version: {}", boundary.version)?;
                writeln!(f, "- Accuracy: {:.3}", boundary.accuracy)?;
                writeln!(f, "- False-safe rate: {:.3}", boundary.false_safe_rate)?;
                writeln!(
                    f,
                    "- Low mapping confidence mismatch rate: {:.3}",
                    boundary.low_confidence_mismatch_rate
                )?;
                writeln!(f, "- Per-category:")?;
                for (category, breakdown) in &boundary.by_category {
                    writeln!(
                        f,
                        "  - {category}: accuracy {:.3}, false-safe {:.3} ({} examples)",
                        breakdown.accuracy, breakdown.false_safe_rate, breakdown.examples
                    )?;
                }
                writeln!(f)?;
                writeln!(f, "| true \\ predicted | {} |", boundary.confusion.classes.join(" | "))?;
                writeln!(f, "|---|{}", "---|".repeat(boundary.confusion.classes.len()))?;
                for (class, row) in boundary.confusion.classes.iter().zip(&boundary.confusion.counts) {
                    let cells = row.iter().map(ToString::to_string).collect::<Vec<_>>();
                    writeln!(f, "| {class} | {} |", cells.join(" | "))?;
                }
            }
            None => writeln!(f, "- No boundary model found")?,
        }
        writeln!(f)?;

        writeln!(f, "## 5) Calibration Stability")?;
        match &summary.calibrator {
            Some(calibrator) => {
                writeln!(f, "- Version: {}", calibrator.version)?;
                writeln!(f, "- Scored examples: {}", calibrator.scored_examples)?;
                writeln!(f, "- MAE: {}", optional(calibrator.mae))?;
                writeln!(f, "- Residual std: {}", optional(calibrator.residual_std))?;
                for (source, mae) in &calibrator.mae_by_source {
                    writeln!(f, "- MAE ({source}): {mae:.3}")?;
                }
            }
            None => writeln!(f, "- Calibrator not enabled")?,
        }
        writeln!(f)?;

        writeln!(f, "## 6) Regression Gate")?;
        writeln!(f, "- Status: {}", summary.gate.status)?;
        writeln!(f, "- Details: {}", summary.gate.details.join("; "))?;
        if !summary.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped families:")?;
            for skipped in &summary.skipped {
                writeln!(f, "- {}: {}", skipped.family, skipped.reason)?;
            }
        }
        Ok(())
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_owned(), |v| format!("{v:.3}"))
}

fn counts(map: &BTreeMap<String, usize>) -> String {
    if map.is_empty() {
        return "none".to_owned();
    }
    map.iter()
        .map(|(key, count)| format!("{key}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn tags(counts: &[TagCount]) -> String {
    if counts.is_empty() {
        return "none".to_owned();
    }
    counts
        .iter()
        .map(|c| format!("{} ({})", c.tag, c.count))
        .collect::<Vec<_>>()
        .join(", ")
}
