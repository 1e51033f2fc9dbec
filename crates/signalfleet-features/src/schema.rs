//! Feature schema: the ordered key list and categorical encoding tables that
//! define vector positions for every model trained against it.
//!
//! A schema is a plain value. Callers load it once (usually from the
//! versioned JSON document exported alongside the upstream signal
//! extractor) and pass it explicitly to the codec, the training harness and
//! the evaluator, so that models trained against different schema versions
//! can be handled side by side in one process.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Per-key categorical tables: feature key → (string value → code).
pub type CategoricalEncoders = BTreeMap<String, BTreeMap<String, u32>>;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SchemaError {
    #[display("schema document not found: {}", path.display())]
    Unavailable { path: PathBuf },
    #[display("failed to read schema document {}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("failed to parse schema document {}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("duplicate feature key '{key}' in schema")]
    DuplicateKey { key: String },
    #[display("categorical encoder for '{key}' does not name a schema key")]
    UnknownEncoderKey { key: String },
}

/// On-disk representation of a feature schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub feature_keys: Vec<String>,
    pub schema_hash: String,
    pub schema_version: String,
    #[serde(default)]
    pub categorical_encoders: CategoricalEncoders,
}

/// Validated feature schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    version: String,
    hash: String,
    keys: Vec<String>,
    encoders: CategoricalEncoders,
}

impl FeatureSchema {
    /// Builds a schema and derives its hash from the key list.
    pub fn new<K>(
        version: impl Into<String>,
        keys: K,
        encoders: CategoricalEncoders,
    ) -> Result<Self, SchemaError>
    where
        K: IntoIterator,
        K::Item: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect::<Vec<String>>();
        let hash = compute_schema_hash(&keys);
        Self::from_document(SchemaDocument {
            feature_keys: keys,
            schema_hash: hash,
            schema_version: version.into(),
            categorical_encoders: encoders,
        })
    }

    /// Validates a schema document.
    ///
    /// The document's own hash is kept as-is; it identifies the schema
    /// version produced upstream.
    pub fn from_document(document: SchemaDocument) -> Result<Self, SchemaError> {
        let mut seen = BTreeSet::new();
        for key in &document.feature_keys {
            if !seen.insert(key.as_str()) {
                return Err(SchemaError::DuplicateKey { key: key.clone() });
            }
        }
        if let Some(key) = document
            .categorical_encoders
            .keys()
            .find(|key| !seen.contains(key.as_str()))
        {
            return Err(SchemaError::UnknownEncoderKey { key: key.clone() });
        }

        Ok(Self {
            version: document.schema_version,
            hash: document.schema_hash,
            keys: document.feature_keys,
            encoders: document.categorical_encoders,
        })
    }

    /// Loads a schema document from disk.
    ///
    /// A missing file is reported as [`SchemaError::Unavailable`].
    pub fn load<P>(path: P) -> Result<Self, SchemaError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SchemaError::Unavailable {
                    path: path.to_owned(),
                }
            } else {
                SchemaError::Read {
                    path: path.to_owned(),
                    source,
                }
            }
        })?;
        let document = serde_json::from_slice(&bytes).map_err(|source| SchemaError::Parse {
            path: path.to_owned(),
            source,
        })?;
        Self::from_document(document)
    }

    /// The `signals_v1` schema produced by the signal extractor.
    #[must_use]
    pub fn signals_v1() -> Self {
        let encoders: CategoricalEncoders = [
            (
                "industry_key",
                &[
                    ("unknown", 0),
                    ("hvac", 1),
                    ("plumbing", 2),
                    ("electrical", 3),
                    ("landscaping", 4),
                    ("cleaning", 5),
                ][..],
            ),
            ("source", &[("mock", 0), ("real", 1)][..]),
            (
                "window_rule",
                &[
                    ("last_90_days", 0),
                    ("cap_100_closed", 1),
                    ("last_12_months", 2),
                    ("custom", 3),
                ][..],
            ),
        ]
        .into_iter()
        .map(|(key, table)| {
            let table: BTreeMap<String, u32> = table
                .iter()
                .map(|(value, code)| ((*value).to_owned(), *code))
                .collect();
            (key.to_owned(), table)
        })
        .collect();

        let keys = SIGNALS_V1_KEYS.iter().map(|key| (*key).to_owned()).collect::<Vec<_>>();
        Self {
            version: "signals_v1".to_owned(),
            hash: compute_schema_hash(&keys),
            keys,
            encoders,
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[must_use]
    pub fn encoders(&self) -> &CategoricalEncoders {
        &self.encoders
    }

    #[must_use]
    pub fn encoder(&self, key: &str) -> Option<&BTreeMap<String, u32>> {
        self.encoders.get(key)
    }

    /// Schema keys that have no categorical table, in schema order.
    #[must_use]
    pub fn numeric_keys(&self) -> Vec<String> {
        self.keys
            .iter()
            .filter(|key| !self.encoders.contains_key(key.as_str()))
            .cloned()
            .collect()
    }

    /// The categorical tables restricted to `keys`.
    #[must_use]
    pub fn encoders_for(&self, keys: &[String]) -> CategoricalEncoders {
        keys.iter()
            .filter_map(|key| {
                self.encoders
                    .get(key)
                    .map(|table| (key.clone(), table.clone()))
            })
            .collect()
    }

    #[must_use]
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            feature_keys: self.keys.clone(),
            schema_hash: self.hash.clone(),
            schema_version: self.version.clone(),
            categorical_encoders: self.encoders.clone(),
        }
    }
}

/// Lowercase hex SHA-256 of the keys joined with `\n`.
#[must_use]
pub fn compute_schema_hash(keys: &[String]) -> String {
    let mut hasher = Sha256::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(key.as_bytes());
    }
    hex::encode(hasher.finalize())
}

const SIGNALS_V1_KEYS: &[&str] = &[
    "industry_key",
    "source",
    "window_rule",
    "window_days",
    "coverage_ratio",
    "mapping_confidence_level",
    "missingness_score",
    "quotes_count",
    "invoices_count",
    "paid_invoices_count",
    "calendar_events_count",
    "active_days_count",
    "quotes_per_active_day",
    "invoices_per_active_day",
    "paid_invoice_rate",
    "quote_to_invoice_rate",
    "has_quotes",
    "has_invoices",
    "has_calendar",
    "decision_lag_days_p50",
    "decision_lag_days_p90",
    "approved_to_scheduled_days_p50",
    "approved_to_scheduled_days_p90",
    "invoiced_to_paid_days_p50",
    "invoiced_to_paid_days_p90",
    "has_decision_lag",
    "has_approved_to_scheduled",
    "has_invoiced_to_paid",
    "invoice_total_sum_log",
    "invoice_total_p50_log",
    "invoice_total_p90_log",
    "top1_invoice_share",
    "top5_invoice_share",
    "gini_proxy",
    "mid_ticket_share",
    "has_amounts",
    "weekly_volume_mean",
    "weekly_volume_cv",
    "seasonality_strength",
    "has_rhythm",
    "open_quotes_count",
    "open_quotes_share",
    "has_open_quotes",
    "excluded_quotes_outside_window",
    "excluded_invoices_outside_window",
    "excluded_calendar_outside_window",
    "excluded_ratio",
    "date_parse_error_rate",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_v1_shape() {
        let schema = FeatureSchema::signals_v1();
        assert_eq!(schema.keys().len(), 48);
        assert_eq!(schema.keys()[0], "industry_key");
        assert_eq!(schema.numeric_keys().len(), 45);
        assert_eq!(schema.encoder("source").unwrap()["real"], 1);
        assert_eq!(schema.hash(), compute_schema_hash(schema.keys()));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = FeatureSchema::new("v", ["a", "b", "a"], CategoricalEncoders::new());
        assert!(matches!(result, Err(SchemaError::DuplicateKey { key }) if key == "a"));
    }

    #[test]
    fn test_encoder_for_unknown_key_rejected() {
        let mut encoders = CategoricalEncoders::new();
        encoders.insert("missing".to_owned(), BTreeMap::new());
        let result = FeatureSchema::new("v", ["a"], encoders);
        assert!(matches!(result, Err(SchemaError::UnknownEncoderKey { .. })));
    }

    #[test]
    fn test_load_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = FeatureSchema::load(dir.path().join("nope.json"));
        assert!(matches!(result, Err(SchemaError::Unavailable { .. })));
    }

    #[test]
    fn test_document_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let schema = FeatureSchema::signals_v1();
        fs::write(&path, serde_json::to_vec(&schema.to_document()).unwrap()).unwrap();
        assert_eq!(FeatureSchema::load(&path).unwrap(), schema);
    }
}
