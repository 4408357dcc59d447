/*!
This crate defines the [`StreamingMetric`](trait.StreamingMetric.html) trait, a number of concrete types that implement it such as [`Accuracy`](struct.Accuracy.html) and [`BinaryCrossEntropy`](struct.BinaryCrossEntropy.html), and the fairness evaluator that turns predictions into per-group and per-slice fairness metrics.
*/

mod accuracy;
mod binary_cross_entropy;
pub mod fairness;
mod mean;
mod mean_variance;
pub mod slices;

pub use self::accuracy::Accuracy;
pub use self::binary_cross_entropy::{BinaryCrossEntropy, BinaryCrossEntropyInput};
pub use self::fairness::{
	AttributeFairness, FairnessOptions, FairnessReport, GroupMetrics,
};
pub use self::mean::Mean;
pub use self::mean_variance::MeanVariance;
pub use self::slices::SliceMetrics;

/**
The `StreamingMetric` trait defines a common interface to metrics that can be computed in a streaming manner, where the input is available in chunks.

After being initialized, a value of type `T` implementing the `StreamingMetric` trait can have `update()` called on it with values of the associated type `Input`. Multiple values of `T` can be merged together by calling `merge()`. When finished aggregating, you can call `finalize()` on the metric to produce the associated type `Output`.

The seemingly unused generic lifetime `'a` exists here to allow `Input`s and `Output`s to borrow from their enclosing scope. When Rust stabilizes Generic Associated Types (GATs), the generic lifetime will move to the associated types.
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}
