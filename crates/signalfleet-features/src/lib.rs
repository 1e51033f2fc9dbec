//! Feature contract shared by training, evaluation and inference.
//!
//! # Overview
//!
//! Every model in the fleet consumes the same kind of input: a mapping from
//! feature key to [`value::FeatureValue`], produced upstream by the signal
//! extractor. This crate turns those mappings into numeric vectors and loads
//! labeled datasets of them.
//!
//! 1. **Schema** ([`schema::FeatureSchema`]): ordered keys and categorical tables
//! 2. **Values** ([`value::FeatureMap`]): parsed feature mappings
//! 3. **Codec** ([`codec`]): mapping to vector, single example or batch
//! 4. **Examples** ([`example::TrainingExample`]): features plus per-family targets
//! 5. **Datasets** ([`dataset`]): JSONL loading, filtering and summaries
//!
//! # Example
//!
//! ```
//! use signalfleet_features::{codec, schema::FeatureSchema, value::parse_feature_map};
//!
//! let schema = FeatureSchema::signals_v1();
//! let features = parse_feature_map(r#"{"industry_key": "plumbing", "quotes_count": 12}"#).unwrap();
//! let vector = codec::encode(&schema, &features);
//! assert_eq!(vector.len(), schema.keys().len());
//! assert_eq!(vector[0], 2.0);
//! ```

pub mod codec;
pub mod dataset;
pub mod example;
pub mod schema;
pub mod value;
