/*!
This module computes group fairness metrics over the predictions for a dataset.

For each sensitive attribute, the rows are partitioned by the attribute's value in the original, unencoded dataset, so the report keys read as the values a person would recognize ("Male", "Female"), not as encoded codes. Pairwise metrics compare the advantaged group (highest selection rate) with the disadvantaged group (lowest selection rate), which reduces attributes with more than two groups to the max minus min gap. An attribute with a single observed group yields `None` for every pairwise metric: zero would misleadingly read as "perfectly fair".
*/

use crate::{
	slices::{compute_slices, SliceMetrics},
	Accuracy, Mean, StreamingMetric,
};
use fairlens_dataframe::{ColumnView, DataFrameView};
use itertools::izip;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct FairnessOptions {
	/// A statistical parity ratio strictly below this value raises the bias flag. The comparison is exact, not tolerance adjusted.
	pub parity_ratio_threshold: f32,
	/// An absolute demographic parity difference strictly above this value raises the bias flag.
	pub demographic_parity_threshold: f32,
	/// The number of equal width buckets used to slice number features.
	pub n_slice_buckets: usize,
}

impl Default for FairnessOptions {
	fn default() -> Self {
		Self {
			parity_ratio_threshold: 0.8,
			demographic_parity_threshold: 0.1,
			n_slice_buckets: 10,
		}
	}
}

#[derive(Clone, Debug)]
pub struct GroupMetrics {
	pub group: String,
	pub count: usize,
	pub selection_rate: f32,
	pub accuracy: f32,
	/// `None` when the group has no positive label rows.
	pub true_positive_rate: Option<f32>,
	/// `None` when the group has no negative label rows.
	pub false_positive_rate: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct AttributeFairness {
	pub attribute: String,
	pub groups: Vec<GroupMetrics>,
	pub demographic_parity_difference: Option<f32>,
	pub equal_opportunity_difference: Option<f32>,
	pub average_odds_difference: Option<f32>,
	pub statistical_parity_ratio: Option<f32>,
	pub selection_rate_gap: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct FairnessReport {
	pub overall_accuracy: f32,
	pub approval_rate: f32,
	pub average_probability: f32,
	pub bias_flag: bool,
	/// The first sensitive attribute, which is the one the bias flag is computed against.
	pub primary_fairness_axis: Option<String>,
	pub attributes: Vec<AttributeFairness>,
	pub slices: BTreeMap<String, BTreeMap<String, SliceMetrics>>,
}

#[derive(Clone, Debug, Default)]
struct GroupCounts {
	count: usize,
	approved: usize,
	correct: usize,
	true_positives: usize,
	false_positives: usize,
	positives: usize,
	negatives: usize,
}

impl GroupCounts {
	fn update(&mut self, approved: bool, label: bool) {
		self.count += 1;
		if approved {
			self.approved += 1;
		}
		if approved == label {
			self.correct += 1;
		}
		if label {
			self.positives += 1;
			if approved {
				self.true_positives += 1;
			}
		} else {
			self.negatives += 1;
			if approved {
				self.false_positives += 1;
			}
		}
	}

	fn finalize(self, group: String) -> GroupMetrics {
		let count = self.count.to_f32().unwrap();
		GroupMetrics {
			group,
			count: self.count,
			selection_rate: self.approved.to_f32().unwrap() / count,
			accuracy: self.correct.to_f32().unwrap() / count,
			true_positive_rate: if self.positives > 0 {
				Some(self.true_positives.to_f32().unwrap() / self.positives.to_f32().unwrap())
			} else {
				None
			},
			false_positive_rate: if self.negatives > 0 {
				Some(self.false_positives.to_f32().unwrap() / self.negatives.to_f32().unwrap())
			} else {
				None
			},
		}
	}
}

impl FairnessReport {
	/// Compute the fairness report for `dataframe`. `probabilities`, `approved`, and `labels` must each have one entry per row, in row order.
	pub fn compute(
		dataframe: &DataFrameView,
		probabilities: &[f32],
		approved: &[bool],
		labels: &[bool],
		label_column: &str,
		sensitive_columns: &[String],
		options: &FairnessOptions,
	) -> Self {
		let mut overall_accuracy = Accuracy::new();
		let mut average_probability = Mean::new();
		for (probability, approved, label) in
			izip!(probabilities.iter(), approved.iter(), labels.iter())
		{
			overall_accuracy.update((*approved as usize, *label as usize));
			average_probability.update(*probability);
		}
		// The approval rate must be exactly the fraction of approved predictions, so it is computed as a plain count ratio.
		let n_approved = approved.iter().filter(|approved| **approved).count();
		let approval_rate = n_approved.to_f32().unwrap() / approved.len().to_f32().unwrap();
		let attributes: Vec<AttributeFairness> = sensitive_columns
			.iter()
			.filter_map(|sensitive_column| {
				dataframe.column(sensitive_column).map(|column| {
					compute_attribute_fairness(sensitive_column, column, approved, labels)
				})
			})
			.collect();
		let bias_flag = attributes
			.first()
			.map(|attribute| {
				let ratio_breach = attribute
					.statistical_parity_ratio
					.map(|ratio| ratio < options.parity_ratio_threshold)
					.unwrap_or(false);
				let parity_breach = attribute
					.demographic_parity_difference
					.map(|difference| difference.abs() > options.demographic_parity_threshold)
					.unwrap_or(false);
				ratio_breach || parity_breach
			})
			.unwrap_or(false);
		let slices = compute_slices(
			dataframe,
			label_column,
			approved,
			labels,
			options.n_slice_buckets,
		);
		Self {
			overall_accuracy: overall_accuracy.finalize().unwrap_or(0.0),
			approval_rate,
			average_probability: average_probability.finalize().unwrap_or(0.0),
			bias_flag,
			primary_fairness_axis: attributes.first().map(|attribute| attribute.attribute.clone()),
			attributes,
			slices,
		}
	}
}

fn compute_attribute_fairness(
	attribute: &str,
	column: &ColumnView,
	approved: &[bool],
	labels: &[bool],
) -> AttributeFairness {
	let mut counts: BTreeMap<String, GroupCounts> = BTreeMap::new();
	for (index, (approved, label)) in izip!(approved.iter(), labels.iter()).enumerate() {
		let group = group_label(column, index);
		counts.entry(group).or_default().update(*approved, *label);
	}
	let groups: Vec<GroupMetrics> = counts
		.into_iter()
		.map(|(group, counts)| counts.finalize(group))
		.collect();
	if groups.len() < 2 {
		return AttributeFairness {
			attribute: attribute.to_owned(),
			groups,
			demographic_parity_difference: None,
			equal_opportunity_difference: None,
			average_odds_difference: None,
			statistical_parity_ratio: None,
			selection_rate_gap: None,
		};
	}
	// The canonical pair: the advantaged group has the highest selection rate, the disadvantaged the lowest. Ties resolve to the first group in lexicographic order, which keeps the choice deterministic.
	let advantaged = groups
		.iter()
		.fold(&groups[0], |best, group| {
			if group.selection_rate > best.selection_rate {
				group
			} else {
				best
			}
		});
	let disadvantaged = groups
		.iter()
		.fold(&groups[0], |worst, group| {
			if group.selection_rate < worst.selection_rate {
				group
			} else {
				worst
			}
		});
	let demographic_parity_difference = advantaged.selection_rate - disadvantaged.selection_rate;
	let selection_rate_gap = demographic_parity_difference.abs();
	let statistical_parity_ratio =
		if disadvantaged.selection_rate == 0.0 || advantaged.selection_rate == 0.0 {
			None
		} else {
			Some(disadvantaged.selection_rate / advantaged.selection_rate)
		};
	let equal_opportunity_difference =
		match (advantaged.true_positive_rate, disadvantaged.true_positive_rate) {
			(Some(advantaged), Some(disadvantaged)) => Some(advantaged - disadvantaged),
			_ => None,
		};
	let average_odds_difference = match (
		equal_opportunity_difference,
		advantaged.false_positive_rate,
		disadvantaged.false_positive_rate,
	) {
		(Some(tpr_difference), Some(advantaged_fpr), Some(disadvantaged_fpr)) => {
			Some((tpr_difference + (advantaged_fpr - disadvantaged_fpr)) / 2.0)
		}
		_ => None,
	};
	AttributeFairness {
		attribute: attribute.to_owned(),
		groups,
		demographic_parity_difference: Some(demographic_parity_difference),
		equal_opportunity_difference,
		average_odds_difference,
		statistical_parity_ratio,
		selection_rate_gap: Some(selection_rate_gap),
	}
}

/// The group a row belongs to is the display form of the attribute's value in the original dataset. Missing values form their own "missing" group so they stay visible in the report.
fn group_label(column: &ColumnView, index: usize) -> String {
	match column {
		ColumnView::Number(column) => {
			let value = column.data[index];
			if value.is_finite() {
				value.to_string()
			} else {
				"missing".to_owned()
			}
		}
		ColumnView::Enum(column) => column.data[index]
			.map(|value| column.options[value.get() - 1].clone())
			.unwrap_or_else(|| "missing".to_owned()),
		ColumnView::Text(column) => column.data[index].clone(),
		ColumnView::Unknown(_) => "missing".to_owned(),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use fairlens_dataframe::{Column, DataFrame, EnumColumn, NumberColumn};
	use std::num::NonZeroUsize;

	fn gender_dataframe(values: &[usize]) -> DataFrame {
		let mut column = EnumColumn::new(
			"gender".to_owned(),
			vec!["Male".to_owned(), "Female".to_owned()],
		);
		column.data = values.iter().map(|value| NonZeroUsize::new(*value)).collect();
		DataFrame {
			columns: vec![
				Column::Number(NumberColumn {
					name: "income".to_owned(),
					data: values.iter().map(|value| *value as f32).collect(),
				}),
				Column::Enum(column),
			],
		}
	}

	#[test]
	fn test_two_group_metrics() {
		// Males: approved 2/2, females: approved 1/2.
		let dataframe = gender_dataframe(&[1, 1, 2, 2]);
		let approved = vec![true, true, true, false];
		let labels = vec![true, true, true, true];
		let probabilities = vec![0.9, 0.8, 0.7, 0.2];
		let report = FairnessReport::compute(
			&dataframe.view(),
			&probabilities,
			&approved,
			&labels,
			"income",
			&["gender".to_owned()],
			&FairnessOptions::default(),
		);
		let attribute = &report.attributes[0];
		assert_eq!(attribute.demographic_parity_difference, Some(0.5));
		assert_eq!(attribute.selection_rate_gap, Some(0.5));
		assert_eq!(attribute.statistical_parity_ratio, Some(0.5));
		assert_eq!(attribute.equal_opportunity_difference, Some(0.5));
		assert!(report.bias_flag);
		assert_eq!(report.approval_rate, 0.75);
		assert_eq!(report.overall_accuracy, 0.75);
	}

	#[test]
	fn test_single_group_yields_null_metrics() {
		let dataframe = gender_dataframe(&[1, 1, 1, 1]);
		let approved = vec![true, false, true, false];
		let labels = vec![true, false, true, false];
		let probabilities = vec![0.9, 0.1, 0.8, 0.2];
		let report = FairnessReport::compute(
			&dataframe.view(),
			&probabilities,
			&approved,
			&labels,
			"income",
			&["gender".to_owned()],
			&FairnessOptions::default(),
		);
		let attribute = &report.attributes[0];
		assert_eq!(attribute.groups.len(), 1);
		assert_eq!(attribute.demographic_parity_difference, None);
		assert_eq!(attribute.equal_opportunity_difference, None);
		assert_eq!(attribute.average_odds_difference, None);
		assert_eq!(attribute.statistical_parity_ratio, None);
		assert_eq!(attribute.selection_rate_gap, None);
		assert!(!report.bias_flag);
	}

	#[test]
	fn test_zero_selection_rate_yields_null_ratio() {
		// No approvals in the female group, so the parity ratio is null rather than a division by zero.
		let dataframe = gender_dataframe(&[1, 1, 2, 2]);
		let approved = vec![true, true, false, false];
		let labels = vec![true, true, false, false];
		let probabilities = vec![0.9, 0.8, 0.1, 0.2];
		let report = FairnessReport::compute(
			&dataframe.view(),
			&probabilities,
			&approved,
			&labels,
			"income",
			&["gender".to_owned()],
			&FairnessOptions::default(),
		);
		let attribute = &report.attributes[0];
		assert_eq!(attribute.statistical_parity_ratio, None);
		assert_eq!(attribute.demographic_parity_difference, Some(1.0));
		// The flag still raises on the demographic parity difference.
		assert!(report.bias_flag);
	}

	#[test]
	fn test_no_sensitive_columns() {
		let dataframe = gender_dataframe(&[1, 2, 1, 2]);
		let approved = vec![true, true, false, false];
		let labels = vec![true, true, false, false];
		let probabilities = vec![0.9, 0.8, 0.1, 0.2];
		let report = FairnessReport::compute(
			&dataframe.view(),
			&probabilities,
			&approved,
			&labels,
			"income",
			&[],
			&FairnessOptions::default(),
		);
		assert!(report.attributes.is_empty());
		assert_eq!(report.primary_fairness_axis, None);
		assert!(!report.bias_flag);
	}

	#[test]
	fn test_missing_sensitive_values_form_their_own_group() {
		let mut column = EnumColumn::new("gender".to_owned(), vec!["Male".to_owned()]);
		column.data = vec![NonZeroUsize::new(1), None, NonZeroUsize::new(1)];
		let dataframe = DataFrame {
			columns: vec![Column::Enum(column)],
		};
		let approved = vec![true, false, true];
		let labels = vec![true, false, true];
		let probabilities = vec![0.9, 0.1, 0.8];
		let report = FairnessReport::compute(
			&dataframe.view(),
			&probabilities,
			&approved,
			&labels,
			"label",
			&["gender".to_owned()],
			&FairnessOptions::default(),
		);
		let groups: Vec<&str> = report.attributes[0]
			.groups
			.iter()
			.map(|group| group.group.as_str())
			.collect();
		assert_eq!(groups, vec!["Male", "missing"]);
	}
}
