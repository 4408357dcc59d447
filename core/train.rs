use crate::{config::Config, error::EvaluateError, progress::Progress};
use fairlens_dataframe::{Column, ColumnType, DataFrame, FromCsvOptions};
use fairlens_features::{
	compute_features, value_mappings, FeatureGroup, IdentityFeatureGroup, LabelEncodedFeatureGroup,
	NormalizedFeatureGroup,
};
use fairlens_util::ProgressCounter;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::collections::{BTreeMap, BTreeSet};

/// The two model families the engine can fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelFamily {
	LogisticRegression,
	DecisionTree,
}

impl ModelFamily {
	/// Parse the wire form of the model type. The short forms are accepted for compatibility with older callers.
	pub fn parse(value: &str) -> Result<Self, EvaluateError> {
		match value {
			"logistic_regression" | "logistic" => Ok(ModelFamily::LogisticRegression),
			"decision_tree" | "tree" => Ok(ModelFamily::DecisionTree),
			_ => Err(EvaluateError::malformed(format!(
				"unknown model_type \"{}\", expected \"logistic_regression\" or \"decision_tree\"",
				value
			))),
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ModelFamily::LogisticRegression => "logistic_regression",
			ModelFamily::DecisionTree => "decision_tree",
		}
	}
}

#[derive(Debug)]
pub enum FittedModel {
	Logistic(fairlens_linear::BinaryClassifier),
	Tree(fairlens_tree::BinaryClassifier),
}

/**
A `TrainedBundle` owns everything needed to score a row the same way the training run did: the fitted model parameters, the fitted feature groups, and the column schema. It is created once per training request and never mutated afterwards.
*/
#[derive(Debug)]
pub struct TrainedBundle {
	pub family: ModelFamily,
	pub model: FittedModel,
	pub feature_groups: Vec<FeatureGroup>,
	/// The feature columns in training order, with the types needed to encode a raw applicant record.
	pub feature_columns: Vec<(String, ColumnType)>,
	pub label_column: String,
	pub positive_class: String,
	pub negative_class: String,
	pub sensitive_columns: Vec<String>,
	/// The header renames applied at ingestion, empty unless the legacy alias schema was used.
	pub column_mapping: BTreeMap<String, String>,
	pub value_mapping: BTreeMap<String, BTreeMap<String, i64>>,
	pub row_count: usize,
}

impl TrainedBundle {
	pub fn feature_names(&self) -> Vec<String> {
		self.feature_columns
			.iter()
			.map(|(name, _)| name.clone())
			.collect()
	}
}

/// The header aliases of the legacy "biased" dataset branch, which uses German credit style column names. Applied only when the caller's bias flag hint is set, and echoed back as `column_mapping` so the UI can label columns.
pub const LEGACY_COLUMN_ALIASES: &[(&str, &str)] = &[
	("sex", "gender"),
	("credit amount", "loan_amount"),
	("creditamount", "loan_amount"),
	("duration", "credit_score"),
	("job", "income_proxy"),
	("risk", "loan_status"),
];

/// Train a model on the uploaded CSV bytes. Returns the bundle together with the ingested dataframe and the binary labels, which the caller feeds to the fairness evaluator.
pub fn train(
	file_bytes: &[u8],
	family: ModelFamily,
	apply_legacy_aliases: bool,
	config: &Config,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<(TrainedBundle, DataFrame, Vec<bool>), EvaluateError> {
	// Load the dataframe from the csv bytes.
	let progress_counter = ProgressCounter::new(file_bytes.len().to_u64().unwrap());
	update_progress(Progress::Loading(progress_counter.clone()));
	let mut csv_reader = csv::Reader::from_reader(std::io::Cursor::new(file_bytes));
	let mut dataframe = DataFrame::from_csv(&mut csv_reader, FromCsvOptions::default(), |byte| {
		progress_counter.set(byte)
	})
	.map_err(|error| EvaluateError::malformed(format!("failed to parse csv: {}", error)))?;
	if dataframe.nrows() == 0 {
		return Err(EvaluateError::malformed("the file has no data rows"));
	}

	// Normalize the header and apply the legacy aliases if requested, recording the applied renames.
	let mut column_mapping = BTreeMap::new();
	for column in dataframe.columns.iter_mut() {
		let normalized = column.name().trim().to_lowercase();
		let renamed = if apply_legacy_aliases {
			LEGACY_COLUMN_ALIASES
				.iter()
				.find(|(alias, _)| *alias == normalized.as_str())
				.map(|(_, canonical)| (*canonical).to_owned())
		} else {
			None
		};
		match renamed {
			Some(canonical) => {
				column_mapping.insert(normalized, canonical.clone());
				column.rename(canonical);
			}
			None => column.rename(normalized),
		}
	}

	// Resolve the label column.
	let column_names: Vec<String> = dataframe
		.columns
		.iter()
		.map(|column| column.name().to_owned())
		.collect();
	let label_column = match &config.label_column {
		Some(label_column) => {
			let label_column = label_column.trim().to_lowercase();
			if !column_names.iter().any(|name| *name == label_column) {
				return Err(EvaluateError::malformed(format!(
					"label column \"{}\" not found among columns \"{}\"",
					label_column,
					column_names.join(", ")
				)));
			}
			label_column
		}
		None => config
			.label_column_candidates
			.iter()
			.find(|candidate| column_names.iter().any(|name| name == *candidate))
			.cloned()
			.ok_or_else(|| {
				EvaluateError::malformed(format!(
					"no label column found: expected one of \"{}\" among columns \"{}\"",
					config.label_column_candidates.join(", "),
					column_names.join(", ")
				))
			})?,
	};

	// Resolve the sensitive columns, validating declared ones and auto detecting otherwise.
	let sensitive_columns = match &config.sensitive_columns {
		Some(sensitive_columns) => {
			let sensitive_columns: Vec<String> = sensitive_columns
				.iter()
				.map(|name| name.trim().to_lowercase())
				.collect();
			for sensitive_column in sensitive_columns.iter() {
				if !column_names.iter().any(|name| name == sensitive_column) {
					return Err(EvaluateError::malformed(format!(
						"sensitive column \"{}\" not found among columns \"{}\"",
						sensitive_column,
						column_names.join(", ")
					)));
				}
			}
			sensitive_columns
		}
		None => detect_sensitive_columns(&dataframe, &label_column, config),
	};

	if dataframe.nrows() < config.min_rows {
		return Err(EvaluateError::insufficient(format!(
			"the dataset has {} rows but at least {} are required",
			dataframe.nrows(),
			config.min_rows
		)));
	}

	// Derive the binary labels and the class names from the label column.
	let (labels, positive_class, negative_class) =
		derive_labels(&dataframe, &label_column, config)?;
	let n_positives = labels.iter().filter(|label| **label).count();
	if n_positives == 0 || n_positives == labels.len() {
		return Err(EvaluateError::insufficient(
			"the label column has fewer than 2 distinct classes",
		));
	}

	// Fit the feature groups. Number columns are normalized for the logistic family and passed through for the tree family, so tree rules stay in the units of the raw data.
	update_progress(Progress::ComputingFeatures);
	let mut feature_groups = Vec::new();
	let mut feature_columns = Vec::new();
	for column in dataframe.columns.iter() {
		if column.name() == label_column
			|| config
				.ignored_columns
				.iter()
				.any(|ignored| ignored == column.name())
		{
			continue;
		}
		let group = match column {
			Column::Number(column) => match family {
				ModelFamily::LogisticRegression => {
					FeatureGroup::Normalized(NormalizedFeatureGroup::fit(&column.view()))
				}
				ModelFamily::DecisionTree => {
					FeatureGroup::Identity(IdentityFeatureGroup::fit(&column.view()))
				}
			},
			Column::Enum(column) => {
				FeatureGroup::LabelEncoded(LabelEncodedFeatureGroup::fit(&column.view()))
			}
			// Text and unknown columns carry no usable signal and are not features.
			_ => continue,
		};
		feature_groups.push(group);
		feature_columns.push((column.name().to_owned(), column.column_type()));
	}
	if feature_groups.is_empty() {
		return Err(EvaluateError::malformed(
			"the dataset has no usable feature columns",
		));
	}
	let features = compute_features(&dataframe.view(), &feature_groups, &|| {});
	let labels_array: Array1<usize> = labels.iter().map(|label| *label as usize).collect();

	// Shuffle the training views with a fixed seed. The permutation only affects fitting: predictions and fairness metrics are computed over the dataframe in its original row order.
	let mut permutation: Vec<usize> = (0..features.nrows()).collect();
	let mut rng = Xoshiro256Plus::seed_from_u64(config.shuffle_seed);
	permutation.shuffle(&mut rng);
	let features_train = features.select(Axis(0), &permutation);
	let labels_train = labels_array.select(Axis(0), &permutation);

	update_progress(Progress::Training);
	let model = match family {
		ModelFamily::LogisticRegression => {
			let options = fairlens_linear::TrainOptions {
				l2_regularization: config.linear.l2_regularization,
				learning_rate: config.linear.learning_rate,
				max_epochs: config.linear.max_epochs,
				n_examples_per_batch: config.linear.n_examples_per_batch,
				..Default::default()
			};
			FittedModel::Logistic(fairlens_linear::BinaryClassifier::train(
				features_train.view(),
				labels_train.view(),
				&options,
			))
		}
		ModelFamily::DecisionTree => {
			let options = fairlens_tree::TrainOptions {
				max_depth: config.tree.max_depth,
				min_examples_leaf: config.tree.min_examples_leaf,
				..Default::default()
			};
			FittedModel::Tree(fairlens_tree::BinaryClassifier::train(
				features_train.view(),
				labels_train.view(),
				&options,
			))
		}
	};

	let value_mapping = value_mappings(&feature_groups);
	let row_count = dataframe.nrows();
	let bundle = TrainedBundle {
		family,
		model,
		feature_groups,
		feature_columns,
		label_column,
		positive_class,
		negative_class,
		sensitive_columns,
		column_mapping,
		value_mapping,
		row_count,
	};
	Ok((bundle, dataframe, labels))
}

/// Map the label column to binary labels using the configured positive label values, and pick display names for the two classes.
fn derive_labels(
	dataframe: &DataFrame,
	label_column: &str,
	config: &Config,
) -> Result<(Vec<bool>, String, String), EvaluateError> {
	let is_positive = |value: &str| {
		let value = value.trim().to_lowercase();
		config.positive_labels.iter().any(|positive| *positive == value)
	};
	let column = dataframe
		.columns
		.iter()
		.find(|column| column.name() == label_column)
		.unwrap();
	match column {
		Column::Enum(column) => {
			let labels = column
				.data
				.iter()
				.map(|value| {
					value
						.map(|value| is_positive(&column.options[value.get() - 1]))
						.unwrap_or(false)
				})
				.collect();
			let positive_class = column
				.options
				.iter()
				.find(|option| is_positive(option))
				.cloned()
				.unwrap_or_else(|| "Approved".to_owned());
			let negative_class = column
				.options
				.iter()
				.find(|option| !is_positive(option))
				.cloned()
				.unwrap_or_else(|| "Rejected".to_owned());
			Ok((labels, positive_class, negative_class))
		}
		Column::Number(column) => {
			let labels = column.data.iter().map(|value| *value == 1.0).collect();
			Ok((labels, "1".to_owned(), "0".to_owned()))
		}
		Column::Text(column) => {
			let labels = column.data.iter().map(|value| is_positive(value)).collect();
			let positive_class = column
				.data
				.iter()
				.find(|value| is_positive(value))
				.cloned()
				.unwrap_or_else(|| "Approved".to_owned());
			let negative_class = column
				.data
				.iter()
				.find(|value| !is_positive(value))
				.cloned()
				.unwrap_or_else(|| "Rejected".to_owned());
			Ok((labels, positive_class, negative_class))
		}
		Column::Unknown(_) => Err(EvaluateError::malformed(format!(
			"label column \"{}\" has no values",
			label_column
		))),
	}
}

/// Auto detect candidate sensitive attributes: every categorical column, plus every number column whose values are a small set of integers, which is how encoded demographic columns usually look.
fn detect_sensitive_columns(
	dataframe: &DataFrame,
	label_column: &str,
	config: &Config,
) -> Vec<String> {
	dataframe
		.columns
		.iter()
		.filter(|column| column.name() != label_column)
		.filter(|column| {
			!config
				.ignored_columns
				.iter()
				.any(|ignored| ignored == column.name())
		})
		.filter(|column| match column {
			Column::Enum(_) => true,
			Column::Number(column) => {
				let mut distinct = BTreeSet::new();
				for value in column.data.iter() {
					if !value.is_finite() || value.fract() != 0.0 {
						return false;
					}
					distinct.insert(value.to_bits());
					if distinct.len() > config.max_sensitive_unique_values {
						return false;
					}
				}
				true
			}
			_ => false,
		})
		.map(|column| column.name().to_owned())
		.collect()
}
