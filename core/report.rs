/*!
This module is the report assembler. It merges the trained bundle, the predictions, and the fairness report into the two JSON contracts the caller consumes. Everything here is a pure transformation of values computed elsewhere: no I/O, no recomputation of metrics.
*/

use crate::train::{FittedModel, TrainedBundle};
use fairlens_metrics::FairnessReport;
use itertools::Itertools;
use std::collections::BTreeMap;

/// The response of a bulk evaluation.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct BulkReport {
	pub overall_accuracy: f32,
	pub approval_rate: f32,
	pub average_probability: f32,
	pub bias_flag: bool,
	/// `null` when the primary sensitive attribute has fewer than two observed groups: zero would misleadingly read as "perfectly fair".
	pub demographic_parity_difference: Option<f32>,
	/// `null` when either compared group's selection rate is zero, a valid degenerate case that must still render.
	pub statistical_parity_ratio: Option<f32>,
	pub selection_rate_gap: Option<f32>,
	pub primary_fairness_axis: String,
	pub fairness_slices: BTreeMap<String, BTreeMap<String, SliceReport>>,
	pub logistic_equation: Option<String>,
	pub logistic_coefficients: Option<Vec<LogisticCoefficient>>,
	pub decision_tree_rules: Option<String>,
	pub sensitive_features: Vec<String>,
	pub columns: Vec<String>,
	pub row_count: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub column_mapping: Option<BTreeMap<String, String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value_mapping: Option<BTreeMap<String, BTreeMap<String, i64>>>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SliceReport {
	pub accuracy: f32,
	pub selection_rate: f32,
	pub count: usize,
}

/// One row of the coefficient table. The field casing matches the wire contract.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct LogisticCoefficient {
	#[serde(rename = "Feature")]
	pub feature: String,
	/// The unrounded coefficient. Rounding happens only in the equation string.
	#[serde(rename = "Coefficient")]
	pub coefficient: f32,
	/// The sign of the coefficient: 1 when the feature pushes toward approval, -1 when it pushes away, 0 when it has no influence.
	#[serde(rename = "Influence")]
	pub influence: i32,
}

/// The response of a single applicant evaluation.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ApplicantResponse {
	pub probability: f32,
	pub approved: bool,
}

/// Assemble the bulk response. `include_mappings` reflects the caller's bias flag hint, which toggles the presentation only mapping fields and nothing else.
pub fn assemble_bulk_report(
	bundle: &TrainedBundle,
	fairness: &FairnessReport,
	include_mappings: bool,
) -> BulkReport {
	let feature_names = bundle.feature_names();
	let (logistic_equation, logistic_coefficients) = match &bundle.model {
		FittedModel::Logistic(model) => {
			let coefficients = feature_names
				.iter()
				.zip(model.weights.iter())
				.map(|(feature, coefficient)| LogisticCoefficient {
					feature: feature.clone(),
					coefficient: *coefficient,
					influence: influence_sign(*coefficient),
				})
				.collect();
			let equation =
				build_logistic_equation(&feature_names, model.weights.as_slice().unwrap(), model.bias);
			(Some(equation), Some(coefficients))
		}
		FittedModel::Tree(_) => (None, None),
	};
	let decision_tree_rules = match &bundle.model {
		FittedModel::Tree(model) => Some(model.rules(
			&feature_names,
			&bundle.negative_class,
			&bundle.positive_class,
		)),
		FittedModel::Logistic(_) => None,
	};
	let primary = fairness.attributes.first();
	BulkReport {
		overall_accuracy: fairness.overall_accuracy,
		approval_rate: fairness.approval_rate,
		average_probability: fairness.average_probability,
		bias_flag: fairness.bias_flag,
		demographic_parity_difference: primary
			.and_then(|attribute| attribute.demographic_parity_difference),
		statistical_parity_ratio: primary.and_then(|attribute| attribute.statistical_parity_ratio),
		selection_rate_gap: primary.and_then(|attribute| attribute.selection_rate_gap),
		primary_fairness_axis: fairness
			.primary_fairness_axis
			.clone()
			.unwrap_or_else(|| "none".to_owned()),
		fairness_slices: fairness
			.slices
			.iter()
			.map(|(feature, slices)| {
				let slices = slices
					.iter()
					.map(|(range, slice)| {
						(
							range.clone(),
							SliceReport {
								accuracy: slice.accuracy,
								selection_rate: slice.selection_rate,
								count: slice.count,
							},
						)
					})
					.collect();
				(feature.clone(), slices)
			})
			.collect(),
		logistic_equation,
		logistic_coefficients,
		decision_tree_rules,
		sensitive_features: bundle.sensitive_columns.clone(),
		columns: feature_names,
		row_count: bundle.row_count,
		column_mapping: if include_mappings {
			Some(bundle.column_mapping.clone())
		} else {
			None
		},
		value_mapping: if include_mappings {
			Some(bundle.value_mapping.clone())
		} else {
			None
		},
	}
}

fn influence_sign(coefficient: f32) -> i32 {
	if coefficient > 0.0 {
		1
	} else if coefficient < 0.0 {
		-1
	} else {
		0
	}
}

/// Build the human readable equation by walking the coefficients in training order. Coefficients are rounded to 4 decimals here and only here.
pub fn build_logistic_equation(feature_names: &[String], weights: &[f32], bias: f32) -> String {
	let terms = feature_names
		.iter()
		.zip(weights.iter())
		.map(|(feature, coefficient)| format!("({:.4} * {})", coefficient, feature))
		.join(" + ");
	format!("logit(p) = {} + (intercept={:.4})", terms, bias)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_build_logistic_equation() {
		let equation = build_logistic_equation(
			&["cibil_score".to_owned(), "income_annum".to_owned()],
			&[0.75, -0.125],
			-0.1,
		);
		insta::assert_snapshot!(equation, @"logit(p) = (0.7500 * cibil_score) + (-0.1250 * income_annum) + (intercept=-0.1000)");
	}

	#[test]
	fn test_influence_sign() {
		assert_eq!(influence_sign(0.5), 1);
		assert_eq!(influence_sign(-0.5), -1);
		assert_eq!(influence_sign(0.0), 0);
	}
}
