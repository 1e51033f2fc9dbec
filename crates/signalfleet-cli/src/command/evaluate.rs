use std::path::PathBuf;

use anyhow::{Context, bail};
use serde::Serialize;
use signalfleet_evaluator::{
    evaluation::{self, EvaluationConfig, EvaluationSplit},
    gate::GateStatus,
    report::{self, EvaluationDigest},
};
use signalfleet_features::dataset::{self, ExampleFilter};
use signalfleet_store::ModelStore;

use crate::util::{CliConfig, Output, SchemaArg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum SplitArg {
    Full,
    Validation,
}

impl From<SplitArg> for EvaluationSplit {
    fn from(split: SplitArg) -> Self {
        match split {
            SplitArg::Full => Self::Full,
            SplitArg::Validation => Self::Validation,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvaluateArg {
    /// Models root directory
    #[arg(long)]
    models: PathBuf,
    /// JSONL file, or directory of JSONL files, with evaluation examples
    #[arg(long)]
    dataset: PathBuf,
    /// Directory receiving a timestamped report directory
    #[arg(long)]
    output: PathBuf,
    /// Only use examples with this provenance
    #[arg(long)]
    source: Option<String>,
    /// Only use examples of this business category
    #[arg(long)]
    category: Option<String>,
    /// JSON settings file; flags below take precedence
    #[arg(long)]
    config: Option<PathBuf>,
    /// Examples to score
    #[arg(long, value_enum)]
    split: Option<SplitArg>,
    #[arg(long)]
    max_false_safe_rate: Option<f64>,
    #[arg(long)]
    max_precision_drop: Option<f64>,
    /// Exit with an error when the regression gate fails
    #[arg(long)]
    fail_on_regression: bool,
    #[clap(flatten)]
    schema: SchemaArg,
}

impl EvaluateArg {
    fn evaluation_config(&self) -> anyhow::Result<EvaluationConfig> {
        let mut config = CliConfig::load(self.config.as_deref())?.evaluation;
        if let Some(split) = self.split {
            config.split = split.into();
        }
        if let Some(rate) = self.max_false_safe_rate {
            config.gate.max_false_safe_rate = rate;
        }
        if let Some(drop) = self.max_precision_drop {
            config.gate.max_precision_drop = drop;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct EvaluateOutput {
    status: &'static str,
    #[serde(flatten)]
    digest: EvaluationDigest,
}

pub(crate) fn run(arg: &EvaluateArg) -> anyhow::Result<()> {
    let schema = arg.schema.load()?;
    let config = arg.evaluation_config()?;
    let filter = ExampleFilter {
        source: arg.source.clone(),
        category: arg.category.clone(),
    };
    let examples = dataset::load_filtered(&arg.dataset, &filter)
        .with_context(|| format!("Failed to load dataset: {}", arg.dataset.display()))?;

    let store = ModelStore::new(&arg.models);
    let summary = evaluation::evaluate(&store, &schema, &examples, &config)
        .with_context(|| format!("Failed to evaluate models in {}", arg.models.display()))?;
    let digest = report::write_reports(&arg.output, &summary)
        .with_context(|| format!("Failed to write reports under {}", arg.output.display()))?;
    tracing::info!(
        report = %digest.report_path.display(),
        gate = %digest.regression_status,
        "evaluation finished"
    );

    let status = digest.regression_status;
    Output::stdout().write_json(&EvaluateOutput {
        status: "ok",
        digest,
    })?;
    if arg.fail_on_regression && status == GateStatus::Fail {
        bail!("Regression gate failed: {}", summary.gate.details.join("; "));
    }
    Ok(())
}
