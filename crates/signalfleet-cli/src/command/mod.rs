use std::io;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use self::{
    evaluate::EvaluateArg, export_schema::ExportSchemaArg, infer::InferArg, promote::PromoteArg,
    train::TrainArg,
};

mod evaluate;
mod export_schema;
mod infer;
mod promote;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// More diagnostics on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Train model families and publish new versions
    Train(#[clap(flatten)] TrainArg),
    /// Score the newest versions against a dataset and apply the regression gate
    Evaluate(#[clap(flatten)] EvaluateArg),
    /// Predict with stored models for one feature object
    Infer(#[clap(flatten)] InferArg),
    /// Point a family's LATEST pointer at a version
    Promote(#[clap(flatten)] PromoteArg),
    /// Write the feature schema document
    ExportSchema(#[clap(flatten)] ExportSchemaArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing(args.verbose);
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Evaluate(arg) => evaluate::run(&arg)?,
        Mode::Infer(arg) => infer::run(&arg)?,
        Mode::Promote(arg) => promote::run(&arg)?,
        Mode::ExportSchema(arg) => export_schema::run(&arg)?,
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
