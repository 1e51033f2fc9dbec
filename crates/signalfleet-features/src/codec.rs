//! Feature codec: named feature maps to fixed-order numeric vectors.
//!
//! # Encoding rules
//!
//! For each key, in schema order:
//!
//! | value | encoded as |
//! |-------|------------|
//! | absent or `null` | missing |
//! | boolean | `1.0` / `0.0` |
//! | number | the number; NaN and infinities are missing |
//! | string with a categorical table for the key | its code, `0` when unseen |
//! | any other string | `0.0` |
//!
//! # Missing values
//!
//! The two entry points treat missing values differently:
//!
//! - [`encode`] (single example, used at inference) writes `0.0`.
//! - [`encode_batch`] (training and evaluation) writes the median of the
//!   column's observed values in that batch, or `0.0` when the column has
//!   no observed value at all.
//!
//! Models are fitted on median-imputed batches; inference callers must keep
//! this difference in mind when interpreting single-example predictions.

use std::collections::BTreeMap;

use signalfleet_stats::descriptive::finite_median;

use crate::{
    schema::{CategoricalEncoders, FeatureSchema},
    value::{FeatureMap, FeatureValue},
};

/// Encodes one value, returning `None` when it counts as missing.
#[must_use]
pub fn encode_value(value: &FeatureValue, encoder: Option<&BTreeMap<String, u32>>) -> Option<f64> {
    match value {
        FeatureValue::Missing => None,
        FeatureValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        FeatureValue::Number(n) => n.is_finite().then_some(*n),
        FeatureValue::Category(s) => Some(encoder.map_or(0.0, |table| {
            f64::from(table.get(s).copied().unwrap_or(0))
        })),
    }
}

fn encode_row(
    keys: &[String],
    encoders: &CategoricalEncoders,
    features: &FeatureMap,
) -> Vec<Option<f64>> {
    keys.iter()
        .map(|key| {
            features
                .get(key)
                .and_then(|value| encode_value(value, encoders.get(key)))
        })
        .collect()
}

/// Encodes a single example against the schema, zero-filling missing values.
///
/// ```
/// # use signalfleet_features::{codec, schema::{CategoricalEncoders, FeatureSchema}, value::FeatureMap};
/// let schema = FeatureSchema::new("v1", ["a", "b", "c"], CategoricalEncoders::new()).unwrap();
/// let mut features = FeatureMap::new();
/// features.insert("c".to_owned(), 2.0.into());
/// features.insert("a".to_owned(), true.into());
/// assert_eq!(codec::encode(&schema, &features), vec![1.0, 0.0, 2.0]);
/// ```
#[must_use]
pub fn encode(schema: &FeatureSchema, features: &FeatureMap) -> Vec<f64> {
    encode_with_keys(schema.keys(), schema.encoders(), features)
}

/// Encodes a single example against an explicit key order.
#[must_use]
pub fn encode_with_keys(
    keys: &[String],
    encoders: &CategoricalEncoders,
    features: &FeatureMap,
) -> Vec<f64> {
    encode_row(keys, encoders, features)
        .into_iter()
        .map(|value| value.unwrap_or(0.0))
        .collect()
}

/// Encodes a batch of examples, imputing missing values with column medians.
#[must_use]
pub fn encode_batch<'a, I>(schema: &FeatureSchema, rows: I) -> Vec<Vec<f64>>
where
    I: IntoIterator<Item = &'a FeatureMap>,
{
    encode_batch_with_keys(schema.keys(), schema.encoders(), rows)
}

/// Encodes a batch of examples against an explicit key order.
#[must_use]
pub fn encode_batch_with_keys<'a, I>(
    keys: &[String],
    encoders: &CategoricalEncoders,
    rows: I,
) -> Vec<Vec<f64>>
where
    I: IntoIterator<Item = &'a FeatureMap>,
{
    let raw = rows
        .into_iter()
        .map(|features| encode_row(keys, encoders, features))
        .collect::<Vec<_>>();

    let medians = (0..keys.len())
        .map(|col| finite_median(raw.iter().filter_map(|row| row[col])).unwrap_or(0.0))
        .collect::<Vec<_>>();

    raw.into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&medians)
                .map(|(value, median)| value.unwrap_or(*median))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        let mut encoders = CategoricalEncoders::new();
        encoders.insert(
            "industry".to_owned(),
            [("hvac".to_owned(), 1), ("plumbing".to_owned(), 2)]
                .into_iter()
                .collect(),
        );
        FeatureSchema::new("test", ["industry", "count", "flag", "note"], encoders).unwrap()
    }

    fn features(pairs: &[(&str, FeatureValue)]) -> FeatureMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_encode_rules() {
        let encoded = encode(
            &schema(),
            &features(&[
                ("industry", "plumbing".into()),
                ("count", 7.5.into()),
                ("flag", true.into()),
                ("note", "free text".into()),
            ]),
        );
        assert_eq!(encoded, vec![2.0, 7.5, 1.0, 0.0]);
    }

    #[test]
    fn test_unseen_category_and_missing() {
        let encoded = encode(
            &schema(),
            &features(&[("industry", "roofing".into()), ("flag", FeatureValue::Missing)]),
        );
        assert_eq!(encoded, vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_finite_numbers_encode_to_zero() {
        let encoded = encode(
            &schema(),
            &features(&[("count", f64::NAN.into()), ("flag", f64::INFINITY.into())]),
        );
        assert_eq!(encoded, vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_encode_is_deterministic_and_order_invariant() {
        let schema = schema();
        let forward = features(&[("count", 3.0.into()), ("industry", "hvac".into())]);
        let mut reversed = FeatureMap::new();
        reversed.insert("industry".to_owned(), "hvac".into());
        reversed.insert("count".to_owned(), 3.0.into());
        assert_eq!(encode(&schema, &forward), encode(&schema, &forward));
        assert_eq!(encode(&schema, &forward), encode(&schema, &reversed));
    }

    #[test]
    fn test_batch_imputes_column_median() {
        let rows = [
            features(&[("count", 1.0.into())]),
            features(&[("count", 5.0.into())]),
            features(&[("count", 4.0.into())]),
            features(&[("count", 10.0.into())]),
            features(&[]),
        ];
        let encoded = encode_batch(&schema(), &rows);
        assert_eq!(encoded[4][1], 4.5);
        assert_eq!(encoded[0][1], 1.0);
    }

    #[test]
    fn test_batch_column_missing_everywhere_is_zero() {
        let rows = [features(&[]), features(&[("flag", false.into())])];
        let encoded = encode_batch(&schema(), &rows);
        assert!(encoded.iter().all(|row| row[1] == 0.0));
    }

    #[test]
    fn test_single_example_zero_fill_differs_from_batch() {
        let rows = [
            features(&[("count", 6.0.into())]),
            features(&[("count", 8.0.into())]),
            features(&[]),
        ];
        let batch = encode_batch(&schema(), &rows);
        let single = encode(&schema(), &rows[2]);
        assert_eq!(batch[2][1], 7.0);
        assert_eq!(single[1], 0.0);
    }

    #[test]
    fn test_encode_with_keys_follows_given_order() {
        let keys = vec!["flag".to_owned(), "count".to_owned()];
        let encoded = encode_with_keys(
            &keys,
            &CategoricalEncoders::new(),
            &features(&[("count", 2.0.into()), ("flag", true.into())]),
        );
        assert_eq!(encoded, vec![1.0, 2.0]);
    }
}
