use std::{
    fs, io,
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    StoreError,
    family::ModelFamily,
    metadata::{CohortQuality, MetricsFile, ModelMetadata, TrainingRecord},
    version::{VersionId, VersionSelector},
};

const MODEL_FILE: &str = "model.json";
const METADATA_FILE: &str = "metadata.json";
const METRICS_FILE: &str = "metrics.json";
const LATEST_FILE: &str = "LATEST.json";
const PUBLISH_ATTEMPTS: usize = 16;

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Suffix for staging dirs and temp files, unique across processes and
/// across writers within one process.
fn scratch_suffix() -> String {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{n}", process::id())
}

/// A fitted model and everything stored alongside it.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    family: ModelFamily,
    model: serde_json::Value,
    record: TrainingRecord,
    side_artifacts: Vec<(&'static str, serde_json::Value)>,
}

impl ModelBundle {
    pub fn new<M>(family: ModelFamily, model: &M, record: TrainingRecord) -> Result<Self, StoreError>
    where
        M: Serialize,
    {
        let model = serde_json::to_value(model).map_err(|source| StoreError::Encode {
            what: MODEL_FILE,
            source,
        })?;
        Ok(Self {
            family,
            model,
            record,
            side_artifacts: vec![],
        })
    }

    pub fn with_artifact<A>(mut self, file_name: &'static str, artifact: &A) -> Result<Self, StoreError>
    where
        A: Serialize,
    {
        let value = serde_json::to_value(artifact).map_err(|source| StoreError::Encode {
            what: file_name,
            source,
        })?;
        self.side_artifacts.push((file_name, value));
        Ok(self)
    }

    #[must_use]
    pub fn family(&self) -> ModelFamily {
        self.family
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    model_version: VersionId,
}

/// Versioned model storage rooted at a directory.
///
/// ```text
/// <root>/<family>/<version>/model.json
///                          /metadata.json
///                          /metrics.json
///                          /<side artifact>.json
/// <root>/<family>/LATEST.json
/// ```
///
/// Versions are published by renaming a fully written hidden staging
/// directory into place, so a directory listing never shows a partial
/// version.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new<P>(root: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn family_dir(&self, family: ModelFamily) -> PathBuf {
        self.root.join(family.as_str())
    }

    #[must_use]
    pub fn version_dir(&self, family: ModelFamily, version: &VersionId) -> PathBuf {
        self.family_dir(family).join(version.as_str())
    }

    /// Published versions of `family`, oldest first.
    pub fn list_versions(&self, family: ModelFamily) -> Result<Vec<VersionId>, StoreError> {
        let dir = self.family_dir(family);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut versions = vec![];
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') || !entry.path().join(METADATA_FILE).is_file() {
                continue;
            }
            versions.push(VersionId::new(name));
        }
        versions.sort();
        Ok(versions)
    }

    pub fn latest_version(&self, family: ModelFamily) -> Result<Option<VersionId>, StoreError> {
        Ok(self.list_versions(family)?.pop())
    }

    /// The version published immediately before `current`.
    ///
    /// When `current` is not a published version, falls back to the
    /// second-to-last published version.
    pub fn previous_version(
        &self,
        family: ModelFamily,
        current: &VersionId,
    ) -> Result<Option<VersionId>, StoreError> {
        let versions = self.list_versions(family)?;
        let previous = match versions.iter().position(|v| v == current) {
            Some(index) => index.checked_sub(1).map(|i| versions[i].clone()),
            None => versions.len().checked_sub(2).map(|i| versions[i].clone()),
        };
        Ok(previous)
    }

    /// The version named by the family's LATEST pointer, if any.
    pub fn promoted_version(&self, family: ModelFamily) -> Result<Option<VersionId>, StoreError> {
        let path = self.family_dir(family).join(LATEST_FILE);
        match read_json::<LatestPointer>(&path) {
            Ok(pointer) => Ok(Some(pointer.model_version)),
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn resolve_promoted(&self, family: ModelFamily) -> Result<VersionId, StoreError> {
        self.promoted_version(family)?
            .ok_or(StoreError::NoPromotedModel { family })
    }

    /// Resolves a selector to a published version.
    pub fn resolve(
        &self,
        family: ModelFamily,
        selector: &VersionSelector,
    ) -> Result<VersionId, StoreError> {
        let version = match selector {
            VersionSelector::Latest => self.resolve_promoted(family)?,
            VersionSelector::Version(version) => version.clone(),
        };
        self.ensure_exists(family, &version)?;
        Ok(version)
    }

    fn ensure_exists(&self, family: ModelFamily, version: &VersionId) -> Result<(), StoreError> {
        if self.version_dir(family, version).join(METADATA_FILE).is_file() {
            Ok(())
        } else {
            Err(StoreError::ModelNotFound {
                family,
                version: version.clone(),
            })
        }
    }

    /// Publishes a new version and returns its id.
    pub fn write_version(&self, bundle: &ModelBundle) -> Result<VersionId, StoreError> {
        self.write_version_at(bundle, Utc::now())
    }

    fn write_version_at(
        &self,
        bundle: &ModelBundle,
        now: DateTime<Utc>,
    ) -> Result<VersionId, StoreError> {
        let family = bundle.family;
        let family_dir = self.family_dir(family);
        fs::create_dir_all(&family_dir).map_err(|source| StoreError::Io {
            path: family_dir.clone(),
            source,
        })?;

        let latest = self.latest_version(family)?;
        let version = VersionId::next(now, latest.as_ref());
        let staging = family_dir.join(format!(".staging-{version}-{}", scratch_suffix()));
        fs::create_dir(&staging).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;

        let result = self.publish_staged(&staging, bundle, version, now);
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        let version = result?;
        tracing::info!(%family, %version, "published model version");
        Ok(version)
    }

    fn publish_staged(
        &self,
        staging: &Path,
        bundle: &ModelBundle,
        mut version: VersionId,
        now: DateTime<Utc>,
    ) -> Result<VersionId, StoreError> {
        let family = bundle.family;
        write_json(&staging.join(MODEL_FILE), &bundle.model)?;
        for (file_name, value) in &bundle.side_artifacts {
            write_json(&staging.join(file_name), value)?;
        }

        let mut metadata = ModelMetadata {
            family,
            version: version.clone(),
            created_at: now,
            record: bundle.record.clone(),
            cohort_quality: None,
            promoted: false,
        };
        write_json(&staging.join(METRICS_FILE), &metadata.metrics_file())?;

        for _ in 0..PUBLISH_ATTEMPTS {
            metadata.version = version.clone();
            write_json(&staging.join(METADATA_FILE), &metadata)?;

            let target = self.version_dir(family, &version);
            if !target.exists() {
                match fs::rename(staging, &target) {
                    Ok(()) => return Ok(version),
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty
                        ) => {}
                    Err(source) => return Err(StoreError::Io { path: target, source }),
                }
            }
            tracing::debug!(%family, %version, "version id taken, allocating another");
            version = VersionId::next(now, Some(&version));
        }
        Err(StoreError::PublishConflict { family })
    }

    /// Points the family's LATEST pointer at `version` and flags it promoted.
    pub fn promote(&self, family: ModelFamily, version: &VersionId) -> Result<(), StoreError> {
        let mut metadata = self.read_metadata(family, version)?;
        metadata.promoted = true;
        write_json_atomic(
            &self.version_dir(family, version).join(METADATA_FILE),
            &metadata,
        )?;
        write_json_atomic(
            &self.family_dir(family).join(LATEST_FILE),
            &LatestPointer {
                model_version: version.clone(),
            },
        )?;
        tracing::info!(%family, %version, "promoted model version");
        Ok(())
    }

    pub fn read_metadata(
        &self,
        family: ModelFamily,
        version: &VersionId,
    ) -> Result<ModelMetadata, StoreError> {
        self.ensure_exists(family, version)?;
        read_json(&self.version_dir(family, version).join(METADATA_FILE))
    }

    pub fn read_metrics(
        &self,
        family: ModelFamily,
        version: &VersionId,
    ) -> Result<MetricsFile, StoreError> {
        self.ensure_exists(family, version)?;
        read_json(&self.version_dir(family, version).join(METRICS_FILE))
    }

    pub fn load_estimator<M>(&self, family: ModelFamily, version: &VersionId) -> Result<M, StoreError>
    where
        M: DeserializeOwned,
    {
        self.ensure_exists(family, version)?;
        read_json(&self.version_dir(family, version).join(MODEL_FILE))
    }

    pub fn read_side_artifact<A>(
        &self,
        family: ModelFamily,
        version: &VersionId,
        file_name: &str,
    ) -> Result<A, StoreError>
    where
        A: DeserializeOwned,
    {
        self.ensure_exists(family, version)?;
        read_json(&self.version_dir(family, version).join(file_name))
    }

    /// Atomically writes a JSON report file at the models root.
    pub fn write_root_file<T>(&self, file_name: &str, value: &T) -> Result<PathBuf, StoreError>
    where
        T: Serialize + ?Sized,
    {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.root.join(file_name);
        write_json_atomic(&path, value)?;
        Ok(path)
    }

    /// Records post-hoc cohort quality on an existing cohort version.
    ///
    /// Replaces `metadata.json` and `metrics.json` atomically; patching twice
    /// with the same quality leaves the same files.
    pub fn patch_cohort_quality(
        &self,
        version: &VersionId,
        quality: &CohortQuality,
    ) -> Result<(), StoreError> {
        let family = ModelFamily::Cohort;
        let mut metadata = self.read_metadata(family, version)?;
        metadata.cohort_quality = Some(quality.clone());
        let dir = self.version_dir(family, version);
        write_json_atomic(&dir.join(METADATA_FILE), &metadata)?;
        write_json_atomic(&dir.join(METRICS_FILE), &metadata.metrics_file())?;
        tracing::debug!(%version, "patched cohort quality");
        Ok(())
    }
}

fn read_json<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned,
{
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_owned(),
        source,
    })
}

fn write_json<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_owned(),
        source,
    })?;
    fs::write(path, json).map_err(|source| StoreError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Writes to a hidden sibling file, then renames it over `path`.
fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("file");
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", scratch_suffix()));
    write_json(&tmp, value)?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        StoreError::Io {
            path: path.to_owned(),
            source,
        }
    })
}
