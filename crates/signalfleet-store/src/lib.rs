//! Versioned on-disk storage for the model fleet.
//!
//! Every trained model is written once as an immutable version directory
//! under its family's namespace. Which version serves inference is decided
//! separately, by the family's LATEST pointer, which only
//! [`ModelStore::promote`] moves.
//!
//! - [`family`]: model families and their artifact types
//! - [`version`]: time-derived version ids and selectors
//! - [`metadata`]: `metadata.json` / `metrics.json` contents
//! - [`store`]: the store itself
//!
//! The only mutation of a published version is
//! [`ModelStore::patch_cohort_quality`], which records post-hoc cohort
//! quality after evaluation.

use std::{io, path::PathBuf};

pub mod family;
pub mod metadata;
pub mod store;
pub mod version;

pub use self::{
    family::ModelFamily,
    store::{ModelBundle, ModelStore},
    version::{VersionId, VersionSelector},
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum StoreError {
    #[display("model {family}/{version} not found")]
    ModelNotFound {
        family: ModelFamily,
        version: VersionId,
    },
    #[display("no promoted {family} model")]
    NoPromotedModel { family: ModelFamily },
    #[display("could not allocate a free version id for {family}")]
    PublishConflict { family: ModelFamily },
    #[display("failed to encode {what}")]
    Encode {
        what: &'static str,
        source: serde_json::Error,
    },
    #[display("I/O error on {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("invalid JSON in {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
