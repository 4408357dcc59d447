/*!
This module partitions predictions into per-feature value slices and computes accuracy, selection rate, and count for each slice. Number features are partitioned into equal width buckets bounded by the observed min and max, and enum features get one bucket per option. Slices with zero rows are omitted rather than reported with NaN.
*/

use fairlens_dataframe::{ColumnView, DataFrameView};
use itertools::izip;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;

/// The label used for rows whose number feature value is missing.
pub const MISSING_RANGE_LABEL: &str = "missing";
/// The label used for rows whose enum feature value is missing or was never seen in training.
pub const UNKNOWN_RANGE_LABEL: &str = "unknown";

#[derive(Clone, Debug, PartialEq)]
pub struct SliceMetrics {
	pub accuracy: f32,
	pub selection_rate: f32,
	pub count: usize,
}

#[derive(Clone, Debug, Default)]
struct SliceCounts {
	count: usize,
	correct: usize,
	approved: usize,
}

impl SliceCounts {
	fn update(&mut self, approved: bool, correct: bool) {
		self.count += 1;
		if approved {
			self.approved += 1;
		}
		if correct {
			self.correct += 1;
		}
	}

	fn finalize(self) -> SliceMetrics {
		SliceMetrics {
			accuracy: self.correct.to_f32().unwrap() / self.count.to_f32().unwrap(),
			selection_rate: self.approved.to_f32().unwrap() / self.count.to_f32().unwrap(),
			count: self.count,
		}
	}
}

/// Compute the slice table for every feature column of `dataframe` except the label column. `approved` and `labels` must have one entry per row, in row order.
pub fn compute_slices(
	dataframe: &DataFrameView,
	label_column: &str,
	approved: &[bool],
	labels: &[bool],
	n_buckets: usize,
) -> BTreeMap<String, BTreeMap<String, SliceMetrics>> {
	let mut slices = BTreeMap::new();
	for column in dataframe.columns.iter() {
		if column.name() == label_column {
			continue;
		}
		let feature_slices = match column {
			ColumnView::Number(column) => {
				compute_number_slices(column.data, approved, labels, n_buckets)
			}
			ColumnView::Enum(column) => {
				compute_enum_slices(column.options, column.data, approved, labels)
			}
			// Text and unknown columns are not features, so they are not sliced.
			_ => continue,
		};
		slices.insert(column.name().to_owned(), feature_slices);
	}
	slices
}

fn compute_number_slices(
	data: &[f32],
	approved: &[bool],
	labels: &[bool],
	n_buckets: usize,
) -> BTreeMap<String, SliceMetrics> {
	let mut min = std::f32::INFINITY;
	let mut max = std::f32::NEG_INFINITY;
	for value in data {
		if value.is_finite() {
			min = min.min(*value);
			max = max.max(*value);
		}
	}
	let mut missing = SliceCounts::default();
	// A column with no finite value at all has only the missing bucket.
	if min > max {
		for (approved, label) in izip!(approved.iter(), labels.iter()) {
			missing.update(*approved, *approved == *label);
		}
		let mut slices = BTreeMap::new();
		if missing.count > 0 {
			slices.insert(MISSING_RANGE_LABEL.to_owned(), missing.finalize());
		}
		return slices;
	}
	// A degenerate column where every value is the same gets a single bucket.
	let n_buckets = if max == min { 1 } else { n_buckets };
	let width = (max - min) / n_buckets.to_f32().unwrap();
	let mut buckets = vec![SliceCounts::default(); n_buckets];
	for (value, approved, label) in izip!(data.iter(), approved.iter(), labels.iter()) {
		if !value.is_finite() {
			missing.update(*approved, *approved == *label);
			continue;
		}
		let index = if width == 0.0 {
			0
		} else {
			(((value - min) / width).to_usize().unwrap_or(0)).min(n_buckets - 1)
		};
		buckets[index].update(*approved, *approved == *label);
	}
	let mut slices = BTreeMap::new();
	for (index, bucket) in buckets.into_iter().enumerate() {
		if bucket.count == 0 {
			continue;
		}
		slices.insert(range_label(min, max, width, index, n_buckets), bucket.finalize());
	}
	if missing.count > 0 {
		slices.insert(MISSING_RANGE_LABEL.to_owned(), missing.finalize());
	}
	slices
}

/// Format the label for bucket `index`. All buckets are half open except the last, which includes the observed max.
fn range_label(min: f32, max: f32, width: f32, index: usize, n_buckets: usize) -> String {
	let lo = min + width * index.to_f32().unwrap();
	if index == n_buckets - 1 {
		format!("[{:.2}, {:.2}]", lo, max)
	} else {
		format!("[{:.2}, {:.2})", lo, lo + width)
	}
}

fn compute_enum_slices(
	options: &[String],
	data: &[Option<std::num::NonZeroUsize>],
	approved: &[bool],
	labels: &[bool],
) -> BTreeMap<String, SliceMetrics> {
	let mut buckets = vec![SliceCounts::default(); options.len()];
	let mut unknown = SliceCounts::default();
	for (value, approved, label) in izip!(data.iter(), approved.iter(), labels.iter()) {
		match value {
			Some(value) => buckets[value.get() - 1].update(*approved, *approved == *label),
			None => unknown.update(*approved, *approved == *label),
		}
	}
	let mut slices = BTreeMap::new();
	for (option, bucket) in izip!(options.iter(), buckets.into_iter()) {
		if bucket.count == 0 {
			continue;
		}
		slices.insert(option.clone(), bucket.finalize());
	}
	if unknown.count > 0 {
		slices.insert(UNKNOWN_RANGE_LABEL.to_owned(), unknown.finalize());
	}
	slices
}

#[cfg(test)]
mod test {
	use super::*;
	use fairlens_dataframe::{Column, DataFrame, EnumColumn, NumberColumn};
	use std::num::NonZeroUsize;

	#[test]
	fn test_number_slices_are_equal_width() {
		let data: Vec<f32> = (0..10).map(|value| value.to_f32().unwrap()).collect();
		let approved = vec![true; 10];
		let labels = vec![true; 10];
		let slices = compute_number_slices(&data, &approved, &labels, 3);
		let keys: Vec<&String> = slices.keys().collect();
		assert_eq!(keys, vec!["[0.00, 3.00)", "[3.00, 6.00)", "[6.00, 9.00]"]);
		assert_eq!(slices["[0.00, 3.00)"].count, 3);
		assert_eq!(slices["[6.00, 9.00]"].count, 4);
	}

	#[test]
	fn test_range_label() {
		insta::assert_snapshot!(range_label(0.0, 9.0, 3.0, 0, 3), @"[0.00, 3.00)");
		insta::assert_snapshot!(range_label(0.0, 9.0, 3.0, 2, 3), @"[6.00, 9.00]");
	}

	#[test]
	fn test_no_zero_count_slices() {
		// All mass in the low and high buckets leaves the middle buckets empty, and empty buckets must be omitted.
		let data = vec![0.0, 0.1, 9.9, 10.0];
		let approved = vec![true, false, true, false];
		let labels = vec![true, true, true, true];
		let slices = compute_number_slices(&data, &approved, &labels, 10);
		assert!(slices.values().all(|slice| slice.count > 0));
		assert_eq!(slices.len(), 2);
	}

	#[test]
	fn test_missing_bucket() {
		let data = vec![1.0, std::f32::NAN, 2.0];
		let approved = vec![true, true, false];
		let labels = vec![true, false, false];
		let slices = compute_number_slices(&data, &approved, &labels, 2);
		let missing = &slices[MISSING_RANGE_LABEL];
		assert_eq!(missing.count, 1);
		assert_eq!(missing.accuracy, 0.0);
		assert_eq!(missing.selection_rate, 1.0);
	}

	#[test]
	fn test_degenerate_single_value_column() {
		let data = vec![5.0, 5.0, 5.0];
		let approved = vec![true, true, false];
		let labels = vec![true, true, false];
		let slices = compute_number_slices(&data, &approved, &labels, 10);
		assert_eq!(slices.len(), 1);
		assert_eq!(slices["[5.00, 5.00]"].count, 3);
	}

	#[test]
	fn test_enum_slices() {
		let options = vec!["Male".to_owned(), "Female".to_owned()];
		let data = vec![
			NonZeroUsize::new(1),
			NonZeroUsize::new(2),
			NonZeroUsize::new(1),
			None,
		];
		let approved = vec![true, false, true, false];
		let labels = vec![true, true, true, false];
		let slices = compute_enum_slices(&options, &data, &approved, &labels);
		assert_eq!(slices["Male"].count, 2);
		assert_eq!(slices["Male"].selection_rate, 1.0);
		assert_eq!(slices["Female"].count, 1);
		assert_eq!(slices["Female"].selection_rate, 0.0);
		assert_eq!(slices[UNKNOWN_RANGE_LABEL].count, 1);
		assert_eq!(slices[UNKNOWN_RANGE_LABEL].accuracy, 1.0);
	}

	#[test]
	fn test_label_column_is_not_sliced() {
		let dataframe = DataFrame {
			columns: vec![
				Column::Number(NumberColumn {
					name: "income".to_owned(),
					data: vec![1.0, 2.0],
				}),
				Column::Enum({
					let mut column =
						EnumColumn::new("loan_status".to_owned(), vec!["Approved".to_owned()]);
					column.data = vec![NonZeroUsize::new(1), NonZeroUsize::new(1)];
					column
				}),
			],
		};
		let slices = compute_slices(
			&dataframe.view(),
			"loan_status",
			&[true, false],
			&[true, false],
			10,
		);
		assert!(slices.contains_key("income"));
		assert!(!slices.contains_key("loan_status"));
	}
}
