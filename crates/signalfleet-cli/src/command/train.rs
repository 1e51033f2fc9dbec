use std::path::PathBuf;

use anyhow::{Context, bail};
use signalfleet_features::dataset::{self, ExampleFilter};
use signalfleet_store::ModelStore;
use signalfleet_training::{TrainingConfig, train_all};

use crate::util::{CliConfig, FamilySet, Output, SchemaArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Family to train, a comma-separated list of families, or `all`
    #[arg(long, default_value = "all")]
    pub(super) model: FamilySet,
    /// JSONL file, or directory of JSONL files, with training examples
    #[arg(long)]
    dataset: PathBuf,
    /// Models root directory
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
    #[arg(long)]
    seed: Option<u64>,
    /// Number of cohorts
    #[arg(long)]
    clusters: Option<usize>,
    #[arg(long)]
    min_examples: Option<usize>,
    #[clap(flatten)]
    schema: SchemaArg,
}

impl TrainArg {
    fn training_config(&self) -> anyhow::Result<TrainingConfig> {
        let mut config = CliConfig::load(self.config.as_deref())?.training;
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(clusters) = self.clusters {
            config.clusters = clusters;
        }
        if let Some(min_examples) = self.min_examples {
            config.min_examples = min_examples;
        }
        Ok(config)
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let schema = arg.schema.load()?;
    let config = arg.training_config()?;
    let filter = ExampleFilter {
        source: arg.source.clone(),
        category: arg.category.clone(),
    };
    let examples = dataset::load_filtered(&arg.dataset, &filter)
        .with_context(|| format!("Failed to load dataset: {}", arg.dataset.display()))?;
    tracing::info!(
        examples = examples.len(),
        schema = schema.version(),
        "loaded dataset"
    );

    let store = ModelStore::new(&arg.output);
    let summary = train_all(&store, &schema, &arg.model.0, &examples, &config)
        .with_context(|| format!("Failed to train models into {}", arg.output.display()))?;
    Output::stdout().write_json(&summary)?;

    if summary.trained().next().is_none() {
        bail!("No model family could be trained");
    }
    Ok(())
}
