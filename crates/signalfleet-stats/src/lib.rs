//! Statistical utilities shared by the signalfleet crates.
//!
//! This crate provides a collection of statistical tools including:
//!
//! - **Descriptive statistics**: Calculate mean, median, variance, standard deviation, etc.
//! - **Percentiles**: Compute and store linearly interpolated percentile values
//! - **Clustering quality**: Silhouette coefficient and adjusted Rand index
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and storage
//! - [`clustering`]: Cluster sizes, silhouette and labeling agreement
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use signalfleet_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Computing percentiles
//!
//! ```
//! use signalfleet_stats::percentiles::Percentiles;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
//! assert_eq!(percentiles.get(50.0), Some(3.0));
//! ```
//!
//! ## Comparing two clusterings
//!
//! ```
//! use signalfleet_stats::clustering::adjusted_rand_index;
//!
//! let original = [0, 0, 1, 1, 2, 2];
//! let refit = [2, 2, 0, 0, 1, 1];
//! assert_eq!(adjusted_rand_index(&original, &refit), 1.0);
//! ```

pub mod clustering;
pub mod descriptive;
pub mod percentiles;
