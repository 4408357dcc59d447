/*!
This crate is an implementation of the decision tree model family: a single CART style classification tree trained with gini impurity over numeric features. The depth is capped so the rule dump produced by [`BinaryClassifier::rules`](struct.BinaryClassifier.html#method.rules) stays readable: an unbounded tree produces explanations nobody can follow.

All features are numeric by the time they reach this crate (categorical columns are label encoded upstream), so every split is a continuous `<=` threshold split.
*/

use ndarray::prelude::*;

mod rules;
mod train;
mod types;

pub use self::types::{BinaryClassifier, BranchNode, LeafNode, Node, TrainOptions, Tree};

impl BinaryClassifier {
	/// Write the predicted probability of the positive class for each row of `features` into `probabilities`.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		for (features, probability) in features
			.axis_iter(Axis(0))
			.zip(probabilities.iter_mut())
		{
			*probability = self.tree.predict(features);
		}
	}
}

impl Tree {
	pub fn predict(&self, features: ArrayView1<f32>) -> f32 {
		let mut node_index = 0;
		loop {
			match &self.nodes[node_index] {
				Node::Leaf(leaf) => return leaf.value,
				Node::Branch(branch) => {
					node_index = if features[branch.feature_index] <= branch.split_value {
						branch.left_child_index
					} else {
						branch.right_child_index
					};
				}
			}
		}
	}
}
