use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single extracted feature value.
///
/// JSON `null` maps to [`FeatureValue::Missing`]; arrays and objects are not
/// feature values and fail to deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Boolean(bool),
    Number(f64),
    Category(String),
    #[default]
    Missing,
}

impl FeatureValue {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Missing),
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Category(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Category(value.to_owned())
    }
}

/// Named feature values of one example. Keys absent from the map are missing.
pub type FeatureMap = BTreeMap<String, FeatureValue>;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum InvalidInputError {
    #[display("features are not valid JSON")]
    Malformed { source: serde_json::Error },
    #[display("features must be a JSON object")]
    NotAnObject,
    #[display("feature '{key}' must be a number, boolean, string or null")]
    UnsupportedValue { key: String },
}

/// Parses a JSON object into a feature map.
///
/// ```
/// # use signalfleet_features::value::{parse_feature_map, FeatureValue};
/// let features = parse_feature_map(r#"{"quotes_count": 12, "has_quotes": true, "source": "real", "gini_proxy": null}"#).unwrap();
/// assert_eq!(features["quotes_count"], FeatureValue::Number(12.0));
/// assert_eq!(features["gini_proxy"], FeatureValue::Missing);
/// assert!(parse_feature_map("[1, 2]").is_err());
/// ```
pub fn parse_feature_map(json: &str) -> Result<FeatureMap, InvalidInputError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|source| InvalidInputError::Malformed { source })?;
    let serde_json::Value::Object(object) = value else {
        return Err(InvalidInputError::NotAnObject);
    };
    object
        .iter()
        .map(|(key, value)| {
            FeatureValue::from_json(value)
                .map(|value| (key.clone(), value))
                .ok_or_else(|| InvalidInputError::UnsupportedValue { key: key.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_variants() {
        let features: FeatureMap =
            serde_json::from_str(r#"{"a": 1, "b": false, "c": "hvac", "d": null, "e": 2.5}"#)
                .unwrap();
        assert_eq!(features["a"], FeatureValue::Number(1.0));
        assert_eq!(features["b"], FeatureValue::Boolean(false));
        assert_eq!(features["c"], FeatureValue::Category("hvac".to_owned()));
        assert_eq!(features["d"], FeatureValue::Missing);
        assert_eq!(features["e"], FeatureValue::Number(2.5));
    }

    #[test]
    fn test_nested_values_rejected() {
        assert!(serde_json::from_str::<FeatureMap>(r#"{"a": [1]}"#).is_err());
        assert!(matches!(
            parse_feature_map(r#"{"a": {"b": 1}}"#),
            Err(InvalidInputError::UnsupportedValue { key }) if key == "a"
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parse_feature_map("{not json"),
            Err(InvalidInputError::Malformed { .. })
        ));
        assert!(matches!(
            parse_feature_map("42"),
            Err(InvalidInputError::NotAnObject)
        ));
    }
}
