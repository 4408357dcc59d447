use fairlens_dataframe::{ColumnView, NumberColumnView};
use fairlens_metrics::MeanVariance;
use itertools::izip;
use ndarray::prelude::*;

/**
An `IdentityFeatureGroup` passes a number column through to the features unchanged, except that missing values are imputed with the column mean recorded at fit time. The tree model family uses identity features so its rule dumps read in the units of the raw data.

# Example

| dataframe value | feature value |
|-----------------|---------------|
| 0.2             | 0.2           |
| 3.0             | 3.0           |
| missing         | fill_value    |
*/
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityFeatureGroup {
	pub source_column_name: String,
	/// The mean of the column at fit time, used to impute missing values.
	pub fill_value: f32,
}

impl IdentityFeatureGroup {
	pub fn fit(column: &NumberColumnView) -> Self {
		let mean_variance = MeanVariance::compute(column.data);
		Self {
			source_column_name: column.name.to_owned(),
			fill_value: mean_variance.mean,
		}
	}

	pub fn compute(&self, column: &ColumnView, mut features: ArrayViewMut1<f32>) {
		match column {
			ColumnView::Number(column) => {
				for (feature, value) in izip!(features.iter_mut(), column.data.iter()) {
					*feature = if value.is_finite() {
						*value
					} else {
						self.fill_value
					};
				}
			}
			_ => unimplemented!(),
		}
	}
}

#[test]
fn test_identity_imputes_missing_with_mean() {
	use fairlens_dataframe::NumberColumn;
	let column = NumberColumn {
		name: "income".to_owned(),
		data: vec![1.0, 3.0, std::f32::NAN],
	};
	let group = IdentityFeatureGroup::fit(&column.view());
	assert_eq!(group.fill_value, 2.0);
	let mut features = Array::zeros(3);
	group.compute(&ColumnView::Number(column.view()), features.view_mut());
	assert_eq!(features.to_vec(), vec![1.0, 3.0, 2.0]);
}
