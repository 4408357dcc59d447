use crate::types::{BinaryClassifier, Node, Tree};
use std::fmt::Write;

impl BinaryClassifier {
	/// Render the tree as a human readable list of rule paths, one branch per line:
	///
	/// ```text
	/// |--- cibil_score <= 5.00
	/// |   |--- class: Rejected
	/// |--- cibil_score >  5.00
	/// |   |--- class: Approved
	/// ```
	///
	/// A leaf reports the majority class, the class with the higher predicted probability.
	pub fn rules(
		&self,
		feature_names: &[String],
		negative_class: &str,
		positive_class: &str,
	) -> String {
		let mut output = String::new();
		write_node(
			&mut output,
			&self.tree,
			0,
			0,
			feature_names,
			negative_class,
			positive_class,
		);
		output
	}
}

fn write_node(
	output: &mut String,
	tree: &Tree,
	node_index: usize,
	depth: usize,
	feature_names: &[String],
	negative_class: &str,
	positive_class: &str,
) {
	let indent = "|   ".repeat(depth);
	match &tree.nodes[node_index] {
		Node::Leaf(leaf) => {
			let class = if leaf.value > 0.5 {
				positive_class
			} else {
				negative_class
			};
			writeln!(output, "{}|--- class: {}", indent, class).unwrap();
		}
		Node::Branch(branch) => {
			let feature_name = &feature_names[branch.feature_index];
			writeln!(
				output,
				"{}|--- {} <= {:.2}",
				indent, feature_name, branch.split_value
			)
			.unwrap();
			write_node(
				output,
				tree,
				branch.left_child_index,
				depth + 1,
				feature_names,
				negative_class,
				positive_class,
			);
			writeln!(
				output,
				"{}|--- {} >  {:.2}",
				indent, feature_name, branch.split_value
			)
			.unwrap();
			write_node(
				output,
				tree,
				branch.right_child_index,
				depth + 1,
				feature_names,
				negative_class,
				positive_class,
			);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::types::{BranchNode, LeafNode};

	#[test]
	fn test_rules() {
		let model = BinaryClassifier {
			tree: Tree {
				nodes: vec![
					Node::Branch(BranchNode {
						left_child_index: 1,
						right_child_index: 2,
						feature_index: 0,
						split_value: 600.0,
					}),
					Node::Leaf(LeafNode {
						value: 0.1,
						n_examples: 40,
					}),
					Node::Leaf(LeafNode {
						value: 0.9,
						n_examples: 60,
					}),
				],
			},
		};
		let rules = model.rules(&["cibil_score".to_owned()], "Rejected", "Approved");
		let expected = "|--- cibil_score <= 600.00\n\
			|   |--- class: Rejected\n\
			|--- cibil_score >  600.00\n\
			|   |--- class: Approved\n";
		assert_eq!(rules, expected);
	}
}
