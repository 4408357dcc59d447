/*!
This crate is an implementation of the logistic regression model family. The [`BinaryClassifier`](struct.BinaryClassifier.html) is trained with batched gradient descent on the sigmoid cross entropy objective. Batches are applied sequentially from zero initialized weights, so training is fully deterministic: the same features and labels always produce the same coefficients, which the rest of the system relies on.
*/

mod binary_classifier;
mod early_stopping;

pub use self::binary_classifier::BinaryClassifier;

/// These are the options passed to `BinaryClassifier::train`.
#[derive(Debug, Clone)]
pub struct TrainOptions {
	/// Specify options for early stopping. If the value is `Some`, early stopping will be enabled. If it is `None`, early stopping will be disabled.
	pub early_stopping_options: Option<EarlyStoppingOptions>,
	/// This is the L2 regularization value to use when updating the model parameters.
	pub l2_regularization: f32,
	/// This is the learning rate to use when updating the model parameters.
	pub learning_rate: f32,
	/// This is the maximum number of epochs to train.
	pub max_epochs: usize,
	/// This is the number of examples to use for each batch of training.
	pub n_examples_per_batch: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			early_stopping_options: Some(EarlyStoppingOptions {
				early_stopping_fraction: 0.1,
				n_epochs_without_improvement_to_stop: 3,
				min_decrease_in_loss_for_significant_change: 1e-3,
			}),
			l2_regularization: 0.0,
			learning_rate: 0.1,
			max_epochs: 100,
			n_examples_per_batch: 128,
		}
	}
}

/// The parameters in this struct control how to determine whether training should stop early after each epoch.
#[derive(Debug, Clone)]
pub struct EarlyStoppingOptions {
	/// This is the fraction of the dataset that is set aside to compute the early stopping metric.
	pub early_stopping_fraction: f32,
	/// If this many epochs pass by without a significant improvement in the early stopping metric over the previous epoch, training will be stopped early.
	pub n_epochs_without_improvement_to_stop: usize,
	/// This is the minimum decrease in the early stopping metric for an epoch to be considered a significant improvement over the previous epoch.
	pub min_decrease_in_loss_for_significant_change: f32,
}
