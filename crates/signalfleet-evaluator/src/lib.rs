//! Quality measurement for the model fleet.
//!
//! This crate owns the definition of every family metric, so the training
//! harness and the evaluation run cannot disagree on them:
//!
//! - [`targets`]: per-family supervision targets and the deterministic split
//! - [`metrics`]: precision@k, false-safe rate, confusion matrix, MAE
//! - [`cohort`]: silhouette, stability and outlier rate of a clustering
//! - [`evaluation`]: scoring the newest version of each family against a dataset
//! - [`gate`]: the regression gate applied to an evaluation
//! - [`report`]: Markdown and JSON reports of an evaluation
//!
//! # Example
//!
//! ```
//! use signalfleet_evaluator::{
//!     metrics::precision_recall_at_k,
//!     targets::BoundaryClass,
//! };
//!
//! let score = precision_recall_at_k(&[vec![0, 1, 2]], &[vec![0.9, 0.8, 0.7, 0.1]], 3);
//! assert_eq!(score.precision_at_k, 1.0);
//! assert!(BoundaryClass::NeedsFollowup.is_unsafe());
//! ```

pub mod cohort;
pub mod evaluation;
pub mod gate;
pub mod metrics;
pub mod report;
pub mod targets;
