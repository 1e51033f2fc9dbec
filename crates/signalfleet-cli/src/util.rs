use std::{
    fs::{self, File},
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use signalfleet_evaluator::evaluation::EvaluationConfig;
use signalfleet_features::schema::FeatureSchema;
use signalfleet_store::{ModelFamily, family::UnknownFamilyError};
use signalfleet_training::TrainingConfig;

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let mut output = match output_path {
            Some(path) => Output::create(path)?,
            None => Output::stdout(),
        };
        output.write_json(value)
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    /// Creates the file and any missing parent directories.
    pub fn create(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self)
            .and_then(|()| self.flush())
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

#[derive(Debug, Clone, Default, clap::Args)]
pub(crate) struct SchemaArg {
    /// Feature schema document; the built-in signals_v1 schema when omitted
    #[arg(long)]
    schema: Option<PathBuf>,
}

impl SchemaArg {
    pub(crate) fn load(&self) -> anyhow::Result<FeatureSchema> {
        match &self.schema {
            Some(path) => FeatureSchema::load(path)
                .with_context(|| format!("Failed to load feature schema: {}", path.display())),
            None => Ok(FeatureSchema::signals_v1()),
        }
    }
}

/// Settings file shared by `train` and `evaluate`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub training: TrainingConfig,
    pub evaluation: EvaluationConfig,
}

impl CliConfig {
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => read_json_file("config", path),
            None => Ok(Self::default()),
        }
    }
}

/// `all`, or a comma-separated list of family names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FamilySet(pub Vec<ModelFamily>);

impl FromStr for FamilySet {
    type Err = UnknownFamilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self(ModelFamily::ALL.to_vec()));
        }
        let mut families = Vec::new();
        for name in s.split(',').map(str::trim) {
            let family = name.parse()?;
            if !families.contains(&family) {
                families.push(family);
            }
        }
        Ok(Self(families))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_set() {
        assert_eq!("all".parse::<FamilySet>().unwrap().0, ModelFamily::ALL);
        assert_eq!(
            "calibrator, cohort,calibrator".parse::<FamilySet>().unwrap().0,
            [ModelFamily::Calibrator, ModelFamily::Cohort]
        );
        assert!("cohort,forecaster".parse::<FamilySet>().is_err());
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"training": {"clusters": 4}, "evaluation": {"gate": {"max_false_safe_rate": 0.05}}}"#,
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.training.clusters, 4);
        assert_eq!(config.training.seed, TrainingConfig::default().seed);
        assert_eq!(config.evaluation.gate.max_false_safe_rate, 0.05);
        assert_eq!(config.evaluation.gate.top_k, 3);
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn test_missing_schema_file() {
        let arg = SchemaArg {
            schema: Some(PathBuf::from("/nonexistent/schema.json")),
        };
        let err = arg.load().unwrap_err();
        assert!(err.to_string().contains("Failed to load feature schema"));
        assert_eq!(
            SchemaArg::default().load().unwrap().version(),
            FeatureSchema::signals_v1().version()
        );
    }
}
