use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use signalfleet_store::{ModelFamily, ModelStore, VersionId};

use crate::util::Output;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PromoteArg {
    /// Models root directory
    #[arg(long)]
    models: PathBuf,
    #[arg(long)]
    model: ModelFamily,
    /// Version to promote; the newest version when omitted
    #[arg(long)]
    version: Option<String>,
}

#[derive(Debug, Serialize)]
struct Promoted {
    family: ModelFamily,
    version: VersionId,
}

pub(crate) fn run(arg: &PromoteArg) -> anyhow::Result<()> {
    let PromoteArg {
        models,
        model: family,
        version,
    } = arg;
    let store = ModelStore::new(models);
    let version = match version {
        Some(version) => VersionId::new(version.as_str()),
        None => store
            .latest_version(*family)
            .with_context(|| format!("Failed to list {family} versions"))?
            .with_context(|| format!("No {family} versions in {}", models.display()))?,
    };
    store
        .promote(*family, &version)
        .with_context(|| format!("Failed to promote {family} version {version}"))?;
    Output::stdout().write_json(&Promoted {
        family: *family,
        version,
    })
}
