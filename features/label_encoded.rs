use fairlens_dataframe::{ColumnView, EnumColumnView};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;

/// The code assigned to categorical values that are missing or were never seen in training. Mapping to a reserved code instead of erroring is the documented recovery policy for unseen categories: production inputs commonly include them, and the mapping stays deterministic and visible through the value mapping in the report.
pub const UNKNOWN_CATEGORY_CODE: f32 = -1.0;

/**
A `LabelEncodedFeatureGroup` encodes an enum column as integer codes in the order the options were first seen in the training data.

# Example

| value      | code |
|------------|------|
| "Male"     | 0    |
| "Female"   | 1    |
| missing    | -1   |
| "INVALID!" | -1   |
*/
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncodedFeatureGroup {
	pub source_column_name: String,
	/// The enum options in first seen order. Option `i` encodes to code `i`.
	pub options: Vec<String>,
}

impl LabelEncodedFeatureGroup {
	pub fn fit(column: &EnumColumnView) -> Self {
		Self {
			source_column_name: column.name.to_owned(),
			options: column.options.to_owned(),
		}
	}

	/// The mapping from raw categorical value to code, as surfaced in the report.
	pub fn value_mapping(&self) -> BTreeMap<String, i64> {
		self.options
			.iter()
			.enumerate()
			.map(|(index, option)| (option.clone(), index.to_i64().unwrap()))
			.collect()
	}

	pub fn compute(&self, column: &ColumnView, mut features: ArrayViewMut1<f32>) {
		match column {
			ColumnView::Enum(column) => {
				for (feature, value) in izip!(features.iter_mut(), column.data.iter()) {
					*feature = value
						.map(|value| (value.get() - 1).to_f32().unwrap())
						.unwrap_or(UNKNOWN_CATEGORY_CODE);
				}
			}
			_ => unimplemented!(),
		}
	}
}

#[test]
fn test_label_encoded() {
	use fairlens_dataframe::EnumColumn;
	use std::num::NonZeroUsize;
	let mut column = EnumColumn::new(
		"education".to_owned(),
		vec!["Graduate".to_owned(), "Not Graduate".to_owned()],
	);
	column.data = vec![
		NonZeroUsize::new(2),
		NonZeroUsize::new(1),
		None,
	];
	let group = LabelEncodedFeatureGroup::fit(&column.view());
	let mut features = Array::zeros(3);
	group.compute(&ColumnView::Enum(column.view()), features.view_mut());
	assert_eq!(features.to_vec(), vec![1.0, 0.0, UNKNOWN_CATEGORY_CODE]);
	let mapping = group.value_mapping();
	assert_eq!(mapping["Graduate"], 0);
	assert_eq!(mapping["Not Graduate"], 1);
}
