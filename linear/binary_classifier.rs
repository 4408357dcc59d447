use super::{
	early_stopping::{train_early_stopping_split, EarlyStoppingMonitor},
	TrainOptions,
};
use fairlens_metrics::{BinaryCrossEntropy, BinaryCrossEntropyInput, StreamingMetric};
use itertools::izip;
use ndarray::prelude::*;
use std::ops::Neg;

/// A `BinaryClassifier` predicts the probability of the positive class with the sigmoid of a linear combination of the features.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryClassifier {
	pub weights: Array1<f32>,
	pub bias: f32,
	/// The cross entropy loss on the early stopping set after each epoch, empty if early stopping was disabled.
	pub losses: Vec<f32>,
}

impl BinaryClassifier {
	/// Train a binary classifier on `features` with `labels`, where a label of 1 marks the positive class and 0 the negative class.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		options: &TrainOptions,
	) -> BinaryClassifier {
		let n_features = features.ncols();
		let early_stopping_fraction = options
			.early_stopping_options
			.as_ref()
			.map(|early_stopping_options| early_stopping_options.early_stopping_fraction)
			.unwrap_or(0.0);
		let (features_train, labels_train, features_early_stopping, labels_early_stopping) =
			train_early_stopping_split(features, labels, early_stopping_fraction);
		let mut model = BinaryClassifier {
			bias: 0.0,
			weights: Array1::<f32>::zeros(n_features),
			losses: vec![],
		};
		let mut early_stopping_monitor =
			options
				.early_stopping_options
				.as_ref()
				.map(|early_stopping_options| {
					EarlyStoppingMonitor::new(
						early_stopping_options.min_decrease_in_loss_for_significant_change,
						early_stopping_options.n_epochs_without_improvement_to_stop,
					)
				});
		for _ in 0..options.max_epochs {
			izip!(
				features_train.axis_chunks_iter(Axis(0), options.n_examples_per_batch),
				labels_train.axis_chunks_iter(Axis(0), options.n_examples_per_batch),
			)
			.for_each(|(features, labels)| {
				model.train_batch(features, labels, options);
			});
			if let Some(early_stopping_monitor) = early_stopping_monitor.as_mut() {
				let early_stopping_metric_value = model.compute_early_stopping_metric_value(
					features_early_stopping,
					labels_early_stopping,
				);
				model.losses.push(early_stopping_metric_value);
				if early_stopping_monitor.update(early_stopping_metric_value) {
					break;
				}
			}
		}
		model
	}

	fn train_batch(
		&mut self,
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		options: &TrainOptions,
	) {
		if features.nrows() == 0 {
			return;
		}
		let learning_rate = options.learning_rate;
		let logits = features.dot(&self.weights) + self.bias;
		let mut predictions = logits.mapv_into(|logit| 1.0 / (logit.neg().exp() + 1.0));
		izip!(predictions.view_mut(), labels).for_each(|(prediction, label)| {
			*prediction -= if *label == 1 { 1.0 } else { 0.0 };
		});
		let py = predictions.insert_axis(Axis(1));
		let weight_gradients = (&features * &py).mean_axis(Axis(0)).unwrap();
		let bias_gradient = py.mean_axis(Axis(0)).unwrap()[0];
		izip!(self.weights.view_mut(), weight_gradients.view()).for_each(
			|(weight, weight_gradient)| {
				*weight += -learning_rate
					* (weight_gradient + options.l2_regularization * *weight);
			},
		);
		self.bias += -learning_rate * bias_gradient;
	}

	fn compute_early_stopping_metric_value(
		&self,
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
	) -> f32 {
		let mut probabilities = Array::zeros(features.nrows());
		self.predict(features, probabilities.view_mut());
		let mut metric = BinaryCrossEntropy::new();
		for (probability, label) in izip!(probabilities.iter(), labels.iter()) {
			metric.update(BinaryCrossEntropyInput {
				probability: *probability,
				label: *label,
			});
		}
		metric.finalize().unwrap_or(0.0)
	}

	/// Write the predicted probability of the positive class for each row of `features` into `probabilities`.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		probabilities.fill(self.bias);
		ndarray::linalg::general_mat_vec_mul(1.0, &features, &self.weights, 1.0, &mut probabilities);
		for probability in probabilities.iter_mut() {
			*probability = 1.0 / (probability.neg().exp() + 1.0);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn separable_dataset() -> (Array2<f32>, Array1<usize>) {
		// One feature, positive iff the feature is positive.
		let features = Array::from_shape_vec(
			(8, 1),
			vec![-2.0, -1.5, -1.0, -0.5, 0.5, 1.0, 1.5, 2.0],
		)
		.unwrap();
		let labels = arr1(&[0, 0, 0, 0, 1, 1, 1, 1]);
		(features, labels)
	}

	#[test]
	fn test_train_learns_positive_weight() {
		let (features, labels) = separable_dataset();
		let options = TrainOptions {
			early_stopping_options: None,
			..Default::default()
		};
		let model = BinaryClassifier::train(features.view(), labels.view(), &options);
		assert!(model.weights[0] > 0.0);
		let mut probabilities = Array::zeros(8);
		model.predict(features.view(), probabilities.view_mut());
		assert!(probabilities[0] < 0.5);
		assert!(probabilities[7] > 0.5);
	}

	#[test]
	fn test_train_is_deterministic() {
		let (features, labels) = separable_dataset();
		let options = TrainOptions::default();
		let model_a = BinaryClassifier::train(features.view(), labels.view(), &options);
		let model_b = BinaryClassifier::train(features.view(), labels.view(), &options);
		assert_eq!(model_a, model_b);
	}
}
