use std::path::PathBuf;

use crate::util::{Output, SchemaArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ExportSchemaArg {
    /// Output file path; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
    #[clap(flatten)]
    schema: SchemaArg,
}

pub(crate) fn run(arg: &ExportSchemaArg) -> anyhow::Result<()> {
    let schema = arg.schema.load()?;
    Output::save_json(&schema.to_document(), arg.output.clone())?;
    tracing::info!(
        version = schema.version(),
        hash = schema.hash(),
        keys = schema.keys().len(),
        "exported feature schema"
    );
    Ok(())
}
