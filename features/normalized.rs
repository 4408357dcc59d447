use fairlens_dataframe::{ColumnView, NumberColumnView};
use fairlens_metrics::MeanVariance;
use itertools::izip;
use ndarray::prelude::*;

/**
A `NormalizedFeatureGroup` transforms a number column to zero mean and unit variance. [Learn more](https://en.wikipedia.org/wiki/Feature_scaling#Standardization_(Z-score_Normalization)).

The mean and variance are fitted once from the training column and recorded here, so scoring a later row applies exactly the same scaling the model was trained with. Missing values map to 0.0, which is the column mean in normalized space.

# Example

Mean: 2.16667, Standard Deviation: 2.70617

`feature_value = (value - mean) / std`

| dataframe value | feature value                         |
|-----------------|---------------------------------------|
| 0.0             | (0.0 - 2.16667) / 2.70617  = -0.80064 |
| 5.2             | (5.2 - 2.16667) / 2.70617  = 1.12089  |
| 1.3             | (1.3 - 2.16667) / 2.70617  = -0.32026 |
*/
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeatureGroup {
	pub source_column_name: String,
	pub mean: f32,
	pub variance: f32,
}

impl NormalizedFeatureGroup {
	pub fn fit(column: &NumberColumnView) -> Self {
		let mean_variance = MeanVariance::compute(column.data);
		Self {
			source_column_name: column.name.to_owned(),
			mean: mean_variance.mean,
			variance: mean_variance.variance,
		}
	}

	pub fn compute(&self, column: &ColumnView, mut features: ArrayViewMut1<f32>) {
		match column {
			ColumnView::Number(column) => {
				for (feature, value) in izip!(features.iter_mut(), column.data.iter()) {
					*feature = if value.is_nan() || self.variance == 0.0 {
						0.0
					} else {
						(*value - self.mean) / f32::sqrt(self.variance)
					};
				}
			}
			_ => unimplemented!(),
		}
	}
}

#[test]
fn test_normalized() {
	use fairlens_dataframe::NumberColumn;
	let column = NumberColumn {
		name: "income".to_owned(),
		data: vec![0.0, 5.2, 1.3, 10.0],
	};
	let group = NormalizedFeatureGroup::fit(&column.view());
	assert!((group.mean - 4.125).abs() < 1e-3);
	let mut features = Array::zeros(4);
	group.compute(&ColumnView::Number(column.view()), features.view_mut());
	// Normalized features have zero mean.
	let sum: f32 = features.iter().sum();
	assert!(sum.abs() < 1e-5);
}

#[test]
fn test_normalized_zero_variance() {
	use fairlens_dataframe::NumberColumn;
	let column = NumberColumn {
		name: "constant".to_owned(),
		data: vec![7.0, 7.0],
	};
	let group = NormalizedFeatureGroup::fit(&column.view());
	let mut features = Array::zeros(2);
	group.compute(&ColumnView::Number(column.view()), features.view_mut());
	assert_eq!(features.to_vec(), vec![0.0, 0.0]);
}
