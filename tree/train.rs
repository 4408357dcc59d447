use crate::types::{BinaryClassifier, BranchNode, LeafNode, Node, TrainOptions, Tree};
use itertools::Itertools;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

impl BinaryClassifier {
	/// Train a binary classifier on `features` with `labels`, where a label of 1 marks the positive class and 0 the negative class. Training is deterministic: splits are scanned in feature order and ties keep the first candidate.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		options: &TrainOptions,
	) -> BinaryClassifier {
		let mut nodes = Vec::new();
		let row_indexes: Vec<usize> = (0..features.nrows()).collect();
		train_node(&mut nodes, features, labels, row_indexes, 0, options);
		BinaryClassifier {
			tree: Tree { nodes },
		}
	}
}

/// Grow the node for `row_indexes` and append it, and its subtree, to `nodes`. Returns the index of the appended node.
fn train_node(
	nodes: &mut Vec<Node>,
	features: ArrayView2<f32>,
	labels: ArrayView1<usize>,
	row_indexes: Vec<usize>,
	depth: usize,
	options: &TrainOptions,
) -> usize {
	let n_examples = row_indexes.len();
	let n_positives = row_indexes
		.iter()
		.filter(|row_index| labels[**row_index] == 1)
		.count();
	let is_pure = n_positives == 0 || n_positives == n_examples;
	let split = if depth < options.max_depth && !is_pure {
		choose_best_split(features, labels, &row_indexes, options)
	} else {
		None
	};
	match split {
		Some(split) => {
			let (left_row_indexes, right_row_indexes): (Vec<usize>, Vec<usize>) = row_indexes
				.into_iter()
				.partition(|row_index| features[(*row_index, split.feature_index)] <= split.split_value);
			// Reserve this node's slot before growing the children so child indexes are known.
			let node_index = nodes.len();
			nodes.push(Node::Leaf(LeafNode {
				value: 0.0,
				n_examples: 0,
			}));
			let left_child_index = train_node(
				nodes,
				features,
				labels,
				left_row_indexes,
				depth + 1,
				options,
			);
			let right_child_index = train_node(
				nodes,
				features,
				labels,
				right_row_indexes,
				depth + 1,
				options,
			);
			nodes[node_index] = Node::Branch(BranchNode {
				left_child_index,
				right_child_index,
				feature_index: split.feature_index,
				split_value: split.split_value,
			});
			node_index
		}
		None => {
			let node_index = nodes.len();
			nodes.push(Node::Leaf(LeafNode {
				value: n_positives.to_f32().unwrap() / n_examples.to_f32().unwrap(),
				n_examples,
			}));
			node_index
		}
	}
}

struct Split {
	feature_index: usize,
	split_value: f32,
	gain: f32,
}

/// Scan every feature for the threshold with the highest gini gain. Candidate thresholds are the midpoints between consecutive distinct sorted values.
fn choose_best_split(
	features: ArrayView2<f32>,
	labels: ArrayView1<usize>,
	row_indexes: &[usize],
	options: &TrainOptions,
) -> Option<Split> {
	let n_examples = row_indexes.len();
	let n_positives = row_indexes
		.iter()
		.filter(|row_index| labels[**row_index] == 1)
		.count();
	let parent_impurity = gini(n_positives, n_examples);
	let mut best: Option<Split> = None;
	for feature_index in 0..features.ncols() {
		// Sort this node's examples by the feature value.
		let sorted: Vec<(f32, usize)> = row_indexes
			.iter()
			.map(|row_index| (features[(*row_index, feature_index)], labels[*row_index]))
			.sorted_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
			.collect();
		let mut left_count = 0;
		let mut left_positives = 0;
		for index in 0..n_examples - 1 {
			let (value, label) = sorted[index];
			left_count += 1;
			if label == 1 {
				left_positives += 1;
			}
			let next_value = sorted[index + 1].0;
			// Splitting between equal values would route them inconsistently.
			if value == next_value {
				continue;
			}
			let right_count = n_examples - left_count;
			if left_count < options.min_examples_leaf || right_count < options.min_examples_leaf {
				continue;
			}
			let right_positives = n_positives - left_positives;
			let left_weight = left_count.to_f32().unwrap() / n_examples.to_f32().unwrap();
			let right_weight = right_count.to_f32().unwrap() / n_examples.to_f32().unwrap();
			let gain = parent_impurity
				- left_weight * gini(left_positives, left_count)
				- right_weight * gini(right_positives, right_count);
			if gain <= options.min_gain_to_split {
				continue;
			}
			let is_improvement = best
				.as_ref()
				.map(|best| gain > best.gain)
				.unwrap_or(true);
			if is_improvement {
				best = Some(Split {
					feature_index,
					split_value: (value + next_value) / 2.0,
					gain,
				});
			}
		}
	}
	best
}

fn gini(n_positives: usize, n_examples: usize) -> f32 {
	if n_examples == 0 {
		return 0.0;
	}
	let p = n_positives.to_f32().unwrap() / n_examples.to_f32().unwrap();
	2.0 * p * (1.0 - p)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_train_separable() {
		// Ten examples, positive iff the feature is above 5.
		let features = Array::from_shape_vec(
			(10, 1),
			vec![0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 7.0, 8.0, 9.0, 10.0],
		)
		.unwrap();
		let labels = arr1(&[0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
		let model = BinaryClassifier::train(
			features.view(),
			labels.view(),
			&TrainOptions::default(),
		);
		// The root split is at the midpoint of the gap.
		match &model.tree.nodes[0] {
			Node::Branch(branch) => {
				assert_eq!(branch.feature_index, 0);
				assert_eq!(branch.split_value, 5.0);
			}
			Node::Leaf(_) => panic!("expected a branch at the root"),
		}
		let mut probabilities = Array::zeros(10);
		model.predict(features.view(), probabilities.view_mut());
		for (index, probability) in probabilities.iter().enumerate() {
			if index < 5 {
				assert_eq!(*probability, 0.0);
			} else {
				assert_eq!(*probability, 1.0);
			}
		}
	}

	#[test]
	fn test_max_depth_is_respected() {
		let features = Array::from_shape_vec(
			(8, 1),
			vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
		)
		.unwrap();
		// Alternating labels force the tree to want many splits.
		let labels = arr1(&[0, 1, 0, 1, 0, 1, 0, 1]);
		let options = TrainOptions {
			max_depth: 1,
			min_examples_leaf: 1,
			..Default::default()
		};
		let model = BinaryClassifier::train(features.view(), labels.view(), &options);
		let max_depth = tree_depth(&model.tree, 0);
		assert!(max_depth <= 1);
	}

	#[test]
	fn test_pure_node_is_a_leaf() {
		let features = Array::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
		let labels = arr1(&[1, 1, 1, 1]);
		let model = BinaryClassifier::train(
			features.view(),
			labels.view(),
			&TrainOptions::default(),
		);
		assert_eq!(
			model.tree.nodes,
			vec![Node::Leaf(LeafNode {
				value: 1.0,
				n_examples: 4,
			})]
		);
	}

	#[test]
	fn test_train_is_deterministic() {
		let features = Array::from_shape_vec(
			(10, 2),
			vec![
				0.0, 5.0, 1.0, 4.0, 2.0, 3.0, 3.0, 2.0, 4.0, 1.0, 6.0, 9.0, 7.0, 8.0, 8.0, 7.0,
				9.0, 6.0, 10.0, 5.0,
			],
		)
		.unwrap();
		let labels = arr1(&[0, 0, 1, 0, 0, 1, 1, 0, 1, 1]);
		let options = TrainOptions {
			min_examples_leaf: 1,
			..Default::default()
		};
		let model_a = BinaryClassifier::train(features.view(), labels.view(), &options);
		let model_b = BinaryClassifier::train(features.view(), labels.view(), &options);
		assert_eq!(model_a, model_b);
	}

	fn tree_depth(tree: &Tree, node_index: usize) -> usize {
		match &tree.nodes[node_index] {
			Node::Leaf(_) => 0,
			Node::Branch(branch) => {
				1 + tree_depth(tree, branch.left_child_index)
					.max(tree_depth(tree, branch.right_child_index))
			}
		}
	}
}
