/*!
This crate turns the typed columns of a dataframe into the all numeric feature matrix the models train and predict on. A `FeatureGroup` is fitted once from the training dataframe and records everything needed to encode any later row the exact same way, which is what keeps bulk evaluation and single applicant scoring consistent: encoding is a pure function of the fitted groups, never re-derived.
*/

use fairlens_dataframe::{ColumnView, DataFrameView};
use ndarray::prelude::*;
use std::collections::BTreeMap;

mod identity;
mod label_encoded;
mod normalized;

pub use self::identity::IdentityFeatureGroup;
pub use self::label_encoded::{LabelEncodedFeatureGroup, UNKNOWN_CATEGORY_CODE};
pub use self::normalized::NormalizedFeatureGroup;

/// This enum describes how to transform one column from the input dataframe into one column of the output features.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGroup {
	Identity(IdentityFeatureGroup),
	Normalized(NormalizedFeatureGroup),
	LabelEncoded(LabelEncodedFeatureGroup),
}

impl FeatureGroup {
	pub fn source_column_name(&self) -> &str {
		match self {
			FeatureGroup::Identity(group) => &group.source_column_name,
			FeatureGroup::Normalized(group) => &group.source_column_name,
			FeatureGroup::LabelEncoded(group) => &group.source_column_name,
		}
	}

	/// Write this group's feature values for `column` into `features`, one value per row.
	pub fn compute(&self, column: &ColumnView, features: ArrayViewMut1<f32>) {
		match self {
			FeatureGroup::Identity(group) => group.compute(column, features),
			FeatureGroup::Normalized(group) => group.compute(column, features),
			FeatureGroup::LabelEncoded(group) => group.compute(column, features),
		}
	}
}

/// Compute the feature matrix for `dataframe` using the fitted `groups`. Each group produces one feature column, in group order.
pub fn compute_features(
	dataframe: &DataFrameView,
	groups: &[FeatureGroup],
	progress: &impl Fn(),
) -> Array2<f32> {
	let mut features = Array::zeros((dataframe.nrows(), groups.len()));
	for (group, features) in groups.iter().zip(features.axis_iter_mut(Axis(1))) {
		let column = dataframe
			.column(group.source_column_name())
			.unwrap_or_else(|| {
				panic!(
					"feature group references unknown column \"{}\"",
					group.source_column_name()
				)
			});
		group.compute(column, features);
		progress();
	}
	features
}

/// The per column categorical value mappings recorded by the label encoded groups, keyed by column name. The caller surfaces this in the report so coefficients can be traced back to raw values.
pub fn value_mappings(groups: &[FeatureGroup]) -> BTreeMap<String, BTreeMap<String, i64>> {
	groups
		.iter()
		.filter_map(|group| match group {
			FeatureGroup::LabelEncoded(group) => Some((
				group.source_column_name.clone(),
				group.value_mapping(),
			)),
			_ => None,
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;
	use fairlens_dataframe::{Column, DataFrame, EnumColumn, NumberColumn};
	use std::num::NonZeroUsize;

	#[test]
	fn test_compute_features() {
		let mut gender = EnumColumn::new(
			"gender".to_owned(),
			vec!["Male".to_owned(), "Female".to_owned()],
		);
		gender.data = vec![NonZeroUsize::new(1), NonZeroUsize::new(2), None];
		let dataframe = DataFrame {
			columns: vec![
				Column::Number(NumberColumn {
					name: "income".to_owned(),
					data: vec![1.0, 2.0, 3.0],
				}),
				Column::Enum(gender),
			],
		};
		let view = dataframe.view();
		let groups = vec![
			FeatureGroup::Identity(IdentityFeatureGroup::fit(
				view.column("income").unwrap().as_number().unwrap(),
			)),
			FeatureGroup::LabelEncoded(LabelEncodedFeatureGroup::fit(
				view.column("gender").unwrap().as_enum().unwrap(),
			)),
		];
		let features = compute_features(&view, &groups, &|| {});
		assert_eq!(features.shape(), &[3, 2]);
		assert_eq!(features.column(0).to_vec(), vec![1.0, 2.0, 3.0]);
		assert_eq!(features.column(1).to_vec(), vec![0.0, 1.0, -1.0]);
		let mappings = value_mappings(&groups);
		assert_eq!(mappings["gender"]["Male"], 0);
		assert_eq!(mappings["gender"]["Female"], 1);
	}
}
