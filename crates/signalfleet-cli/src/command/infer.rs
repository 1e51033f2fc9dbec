use std::{fs, path::PathBuf};

use anyhow::Context;
use signalfleet_inference::infer_json;
use signalfleet_store::{ModelStore, VersionSelector};

use crate::util::{FamilySet, Output, SchemaArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InferArg {
    /// Models root directory
    #[arg(long)]
    models: PathBuf,
    /// Feature object as JSON, or `@path` to read it from a file
    #[arg(long)]
    features: String,
    /// Family to run, a comma-separated list of families, or `all`
    #[arg(long, default_value = "all")]
    model: FamilySet,
    /// Version id to load instead of the promoted one
    #[arg(long, default_value = "latest")]
    version: String,
    #[clap(flatten)]
    schema: SchemaArg,
}

pub(crate) fn run(arg: &InferArg) -> anyhow::Result<()> {
    let schema = arg.schema.load()?;
    let features = match arg.features.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read features file: {path}"))?,
        None => arg.features.clone(),
    };

    let store = ModelStore::new(&arg.models);
    let selector = VersionSelector::parse(&arg.version);
    let result = infer_json(&store, &schema, &arg.model.0, &features, &selector)
        .with_context(|| format!("Failed to run inference with {}", arg.models.display()))?;
    Output::stdout().write_json(&result)
}
