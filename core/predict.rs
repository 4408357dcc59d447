/*!
This module is the single predictor both entry points share. Bulk evaluation and single applicant scoring build features with the same fitted groups and score them with the same code path, so there is no second scoring implementation anywhere that could drift from the first.
*/

use crate::{
	error::EvaluateError,
	train::{FittedModel, TrainedBundle},
};
use fairlens_dataframe::{Column, DataFrame, DataFrameView};
use fairlens_features::compute_features;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// One probability and the decision derived from it. The decision is `probability > threshold`, with the threshold fixed in the configuration rather than per request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
	pub probability: f32,
	pub approved: bool,
}

/// Predict every row of `dataframe`, one prediction per row in row order.
pub fn predict_all(
	bundle: &TrainedBundle,
	dataframe: &DataFrameView,
	threshold: f32,
) -> Vec<Prediction> {
	let features = compute_features(dataframe, &bundle.feature_groups, &|| {});
	predict_features(bundle, features.view(), threshold)
}

/// Predict a single raw applicant record. The record is validated once at the boundary: every feature column must be present and no extra fields are allowed. Values are then encoded with the mappings and scaling recorded at training time, never re-derived.
pub fn predict_one(
	bundle: &TrainedBundle,
	applicant_data: &serde_json::Map<String, serde_json::Value>,
	threshold: f32,
) -> Result<Prediction, EvaluateError> {
	// Normalize the record's keys the same way headers are normalized at ingestion.
	let record: std::collections::BTreeMap<String, &serde_json::Value> = applicant_data
		.iter()
		.map(|(key, value)| (key.trim().to_lowercase(), value))
		.collect();
	let missing: Vec<&str> = bundle
		.feature_columns
		.iter()
		.filter(|(name, _)| !record.contains_key(name))
		.map(|(name, _)| name.as_str())
		.collect();
	if !missing.is_empty() {
		return Err(EvaluateError::malformed(format!(
			"applicant_data is missing fields: {}",
			missing.join(", ")
		)));
	}
	let extra: Vec<&str> = record
		.keys()
		.filter(|key| {
			!bundle
				.feature_columns
				.iter()
				.any(|(name, _)| name == *key)
		})
		.map(|key| key.as_str())
		.collect();
	if !extra.is_empty() {
		return Err(EvaluateError::malformed(format!(
			"applicant_data has unexpected fields: {}",
			extra.join(", ")
		)));
	}
	// Build a one row dataframe with the training schema and run it through the shared predictor.
	let column_names = bundle
		.feature_columns
		.iter()
		.map(|(name, _)| name.clone())
		.collect();
	let column_types = bundle
		.feature_columns
		.iter()
		.map(|(_, column_type)| column_type.clone())
		.collect();
	let mut dataframe = DataFrame::new(column_names, column_types);
	for column in dataframe.columns.iter_mut() {
		let value = *record.get(column.name()).unwrap();
		match column {
			Column::Number(column) => {
				let value = match value {
					serde_json::Value::Number(value) => value
						.as_f64()
						.and_then(|value| value.to_f32())
						.unwrap_or(std::f32::NAN),
					serde_json::Value::String(value) => {
						match lexical::parse::<f32, &str>(value.as_str()) {
							Ok(value) if value.is_finite() => value,
							_ => std::f32::NAN,
						}
					}
					_ => std::f32::NAN,
				};
				column.data.push(value);
			}
			Column::Enum(column) => {
				let value = match value {
					// A string is looked up in the recorded options. An unseen value stays `None` and encodes to the reserved unknown code.
					serde_json::Value::String(value) => column.value_for_option(value.as_str()),
					// A number is interpreted as an already encoded categorical code, which is what the original applicant form submits.
					serde_json::Value::Number(value) => value
						.as_u64()
						.and_then(|code| code.to_usize())
						.filter(|code| *code < column.options.len())
						.and_then(|code| std::num::NonZeroUsize::new(code + 1)),
					_ => None,
				};
				column.data.push(value);
			}
			_ => unreachable!(),
		}
	}
	let predictions = predict_all(bundle, &dataframe.view(), threshold);
	Ok(predictions[0])
}

fn predict_features(
	bundle: &TrainedBundle,
	features: ArrayView2<f32>,
	threshold: f32,
) -> Vec<Prediction> {
	let mut probabilities = Array::zeros(features.nrows());
	match &bundle.model {
		FittedModel::Logistic(model) => model.predict(features, probabilities.view_mut()),
		FittedModel::Tree(model) => model.predict(features, probabilities.view_mut()),
	}
	probabilities
		.iter()
		.map(|probability| Prediction {
			probability: *probability,
			approved: *probability > threshold,
		})
		.collect()
}
