//! Regression gate deciding whether a newly trained model may be promoted.
//!
//! The gate is advisory: it reports a status and the reasons for it, and
//! never moves a LATEST pointer itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Thresholds of the regression gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Highest acceptable boundary false-safe rate.
    pub max_false_safe_rate: f64,
    /// Largest acceptable drop in pressure precision@k versus the previous version.
    pub max_precision_drop: f64,
    /// `k` for the pressure ranking metrics.
    pub top_k: usize,
    /// Number of false-positive / false-negative tags listed per report.
    pub top_confusions: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_false_safe_rate: 0.02,
            max_precision_drop: 0.05,
            top_k: 3,
            top_confusions: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    Pass,
    Fail,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

/// Measurements the gate looks at; families that were not evaluated are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GateInputs {
    pub false_safe_rate: Option<f64>,
    pub precision_at_k: Option<f64>,
    pub previous_precision_at_k: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub status: GateStatus,
    /// One entry per trigger, or a single "no regression triggers".
    pub details: Vec<String>,
}

impl GateDecision {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }
}

/// Applies the gate.
///
/// ```
/// # use signalfleet_evaluator::gate::{GateConfig, GateInputs, GateStatus, decide};
/// let inputs = GateInputs {
///     false_safe_rate: Some(0.0),
///     precision_at_k: Some(0.50),
///     previous_precision_at_k: Some(0.60),
/// };
/// assert_eq!(decide(&GateConfig::default(), &inputs).status, GateStatus::Fail);
/// ```
#[must_use]
pub fn decide(config: &GateConfig, inputs: &GateInputs) -> GateDecision {
    let mut details = vec![];

    if let Some(rate) = inputs
        .false_safe_rate
        .filter(|rate| *rate > config.max_false_safe_rate)
    {
        details.push(format!(
            "false-safe rate {rate:.3} > {:.3}",
            config.max_false_safe_rate
        ));
    }
    if let (Some(current), Some(previous)) = (inputs.precision_at_k, inputs.previous_precision_at_k)
    {
        let drop = previous - current;
        if drop > config.max_precision_drop {
            details.push(format!(
                "precision@{} drop {drop:.3} > {:.3}",
                config.top_k, config.max_precision_drop
            ));
        }
    }

    let status = if details.is_empty() {
        details.push("no regression triggers".to_owned());
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };
    GateDecision { status, details }
}
