//! JSONL example datasets.
//!
//! A dataset path is either a single JSONL file or a directory; for a
//! directory every `*.jsonl` file directly inside it is read in file-name
//! order, so the resulting example order is stable across runs.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::example::TrainingExample;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum DatasetError {
    #[display("failed to read dataset {}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("no .jsonl files in dataset directory {}", path.display())]
    NoFiles { path: PathBuf },
    #[display("invalid example at {}:{line}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// Restricts a dataset to one provenance and/or category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleFilter {
    pub source: Option<String>,
    pub category: Option<String>,
}

impl ExampleFilter {
    #[must_use]
    pub fn matches(&self, example: &TrainingExample) -> bool {
        self.source.as_ref().is_none_or(|s| *s == example.source)
            && self.category.as_ref().is_none_or(|c| *c == example.category)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.category.is_none()
    }
}

/// Loads every example under `path`.
pub fn load_examples<P>(path: P) -> Result<Vec<TrainingExample>, DatasetError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let read_err = |source| DatasetError::Read {
        path: path.to_owned(),
        source,
    };

    if !fs::metadata(path).map_err(read_err)?.is_dir() {
        return load_jsonl_file(path);
    }

    let mut files = fs::read_dir(path)
        .map_err(read_err)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    files.retain(|file| file.is_file() && file.extension().is_some_and(|ext| ext == "jsonl"));
    files.sort();
    if files.is_empty() {
        return Err(DatasetError::NoFiles {
            path: path.to_owned(),
        });
    }

    let mut examples = vec![];
    for file in &files {
        examples.extend(load_jsonl_file(file)?);
    }
    tracing::debug!(
        files = files.len(),
        examples = examples.len(),
        "loaded dataset directory {}",
        path.display()
    );
    Ok(examples)
}

/// Loads the examples under `path` that pass `filter`.
pub fn load_filtered<P>(
    path: P,
    filter: &ExampleFilter,
) -> Result<Vec<TrainingExample>, DatasetError>
where
    P: AsRef<Path>,
{
    let mut examples = load_examples(path)?;
    if !filter.is_empty() {
        examples.retain(|example| filter.matches(example));
    }
    Ok(examples)
}

fn load_jsonl_file(path: &Path) -> Result<Vec<TrainingExample>, DatasetError> {
    let content = fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_owned(),
        source,
    })?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| DatasetError::Parse {
                path: path.to_owned(),
                line: i + 1,
                source,
            })
        })
        .collect()
}

/// Example counts by provenance, category and window rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_window_rule: BTreeMap<String, usize>,
}

impl DatasetSummary {
    #[must_use]
    pub fn new(examples: &[TrainingExample]) -> Self {
        let mut summary = Self {
            total: examples.len(),
            ..Self::default()
        };
        for example in examples {
            *summary.by_source.entry(example.source.clone()).or_default() += 1;
            *summary
                .by_category
                .entry(example.category.clone())
                .or_default() += 1;
            let rule = example.window_rule().unwrap_or("unknown");
            *summary.by_window_rule.entry(rule.to_owned()).or_default() += 1;
        }
        summary
    }
}

/// Lowercase hex SHA-256 over the example ids, each terminated by `\n`.
#[must_use]
pub fn dataset_fingerprint(examples: &[TrainingExample]) -> String {
    let mut hasher = Sha256::new();
    for example in examples {
        hasher.update(example.id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
