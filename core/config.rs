/*!
This module defines the `Config` struct, which collects every tunable constant of the engine. The values here are configurable defaults, not hard requirements: they can be overridden from a YAML config file, and they are passed explicitly into each evaluation call rather than read from ambient globals.
*/

use anyhow::{Context, Result};
use std::path::Path;

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct Config {
	/// A row is approved when its predicted probability is strictly greater than this threshold.
	pub approval_threshold: f32,
	/// A statistical parity ratio strictly below this value raises the bias flag.
	pub parity_ratio_threshold: f32,
	/// An absolute demographic parity difference strictly above this value raises the bias flag.
	pub demographic_parity_threshold: f32,
	/// The number of equal width buckets used to slice number features.
	pub n_slice_buckets: usize,
	/// Training fails with `InsufficientData` below this many rows.
	pub min_rows: usize,
	/// The seed for the training shuffle, fixed so repeated uploads of the same file produce identical models.
	pub shuffle_seed: u64,
	/// The label column, if the caller declared one. Otherwise the first of `label_column_candidates` present in the header is used.
	pub label_column: Option<String>,
	pub label_column_candidates: Vec<String>,
	/// Label values that mark the positive (approved) class, compared case insensitively.
	pub positive_labels: Vec<String>,
	/// The sensitive attributes, if the caller declared them. Otherwise they are auto detected: every categorical column plus every number column with at most `max_sensitive_unique_values` distinct integer values, the label column excluded.
	pub sensitive_columns: Option<Vec<String>>,
	pub max_sensitive_unique_values: usize,
	/// Columns dropped before training, identifiers that would otherwise leak into the features.
	pub ignored_columns: Vec<String>,
	pub linear: LinearModelConfig,
	pub tree: TreeModelConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct LinearModelConfig {
	pub l2_regularization: f32,
	pub learning_rate: f32,
	pub max_epochs: usize,
	pub n_examples_per_batch: usize,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct TreeModelConfig {
	pub max_depth: usize,
	pub min_examples_leaf: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			approval_threshold: 0.5,
			parity_ratio_threshold: 0.8,
			demographic_parity_threshold: 0.1,
			n_slice_buckets: 10,
			min_rows: 20,
			shuffle_seed: 42,
			label_column: None,
			label_column_candidates: vec![
				"loan_status".to_owned(),
				"risk".to_owned(),
				"approved".to_owned(),
			],
			positive_labels: vec![
				"approved".to_owned(),
				"good".to_owned(),
				"1".to_owned(),
				"yes".to_owned(),
			],
			sensitive_columns: None,
			max_sensitive_unique_values: 15,
			ignored_columns: vec!["loan_id".to_owned()],
			linear: LinearModelConfig::default(),
			tree: TreeModelConfig::default(),
		}
	}
}

impl Default for LinearModelConfig {
	fn default() -> Self {
		Self {
			l2_regularization: 0.0,
			learning_rate: 0.1,
			max_epochs: 100,
			n_examples_per_batch: 128,
		}
	}
}

impl Default for TreeModelConfig {
	fn default() -> Self {
		Self {
			max_depth: 4,
			min_examples_leaf: 5,
		}
	}
}

impl Config {
	pub fn from_path(config_path: &Path) -> Result<Self> {
		let config = std::fs::read_to_string(config_path)
			.with_context(|| format!("failed to read config file {}", config_path.display()))?;
		let config = serde_yaml::from_str(&config)
			.with_context(|| format!("failed to parse config file {}", config_path.display()))?;
		Ok(config)
	}
}

#[test]
fn test_config_from_yaml() {
	let config: Config = serde_yaml::from_str(
		"approval_threshold: 0.6\nsensitive_columns:\n  - gender\n",
	)
	.unwrap();
	assert_eq!(config.approval_threshold, 0.6);
	assert_eq!(config.sensitive_columns, Some(vec!["gender".to_owned()]));
	// Unspecified fields keep their defaults.
	assert_eq!(config.n_slice_buckets, 10);
	assert_eq!(config.min_rows, 20);
}
