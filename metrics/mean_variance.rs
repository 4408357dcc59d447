//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Welford's_online_algorithm

use num_traits::ToPrimitive;

/// The mean and population variance of a slice of values. Non-finite values are skipped, which makes this usable on number columns that retain NaN as the missing marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanVariance {
	pub mean: f32,
	pub variance: f32,
}

impl MeanVariance {
	pub fn compute(values: &[f32]) -> Self {
		let mut n: u64 = 0;
		let mut mean = 0.0f64;
		let mut m2 = 0.0f64;
		for value in values {
			if !value.is_finite() {
				continue;
			}
			n += 1;
			let value = value.to_f64().unwrap();
			let delta = value - mean;
			mean += delta / n.to_f64().unwrap();
			m2 += delta * (value - mean);
		}
		if n == 0 {
			return Self {
				mean: 0.0,
				variance: 0.0,
			};
		}
		Self {
			mean: mean.to_f32().unwrap(),
			variance: (m2 / n.to_f64().unwrap()).to_f32().unwrap(),
		}
	}
}

#[test]
fn test_mean_variance() {
	let mean_variance = MeanVariance::compute(&[1.0, 2.0, 3.0, 4.0]);
	assert!((mean_variance.mean - 2.5).abs() < 1e-6);
	assert!((mean_variance.variance - 1.25).abs() < 1e-6);
}

#[test]
fn test_mean_variance_skips_missing() {
	let mean_variance = MeanVariance::compute(&[1.0, std::f32::NAN, 3.0]);
	assert!((mean_variance.mean - 2.0).abs() < 1e-6);
	assert!((mean_variance.variance - 1.0).abs() < 1e-6);
}
