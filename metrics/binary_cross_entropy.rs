use super::StreamingMetric;
use num_traits::ToPrimitive;

/// The binary cross entropy loss, used as the early stopping metric when training the logistic model.
#[derive(Clone, Debug, Default)]
pub struct BinaryCrossEntropy {
	total: f64,
	n: u64,
}

pub struct BinaryCrossEntropyInput {
	/// The predicted probability of the positive class.
	pub probability: f32,
	/// The label, 0 for the negative class and 1 for the positive class.
	pub label: usize,
}

impl BinaryCrossEntropy {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for BinaryCrossEntropy {
	type Input = BinaryCrossEntropyInput;

	type Output = Option<f32>;

	fn update(&mut self, value: BinaryCrossEntropyInput) {
		// Clamp the probability away from 0 and 1 so the loss stays finite.
		let probability = value
			.probability
			.to_f64()
			.unwrap()
			.max(std::f64::EPSILON)
			.min(1.0 - std::f64::EPSILON);
		let loss = match value.label {
			1 => -probability.ln(),
			_ => -(1.0 - probability).ln(),
		};
		self.total += loss;
		self.n += 1;
	}

	fn merge(&mut self, other: Self) {
		self.total += other.total;
		self.n += other.n;
	}

	fn finalize(self) -> Self::Output {
		if self.n == 0 {
			None
		} else {
			Some((self.total / self.n.to_f64().unwrap()).to_f32().unwrap())
		}
	}
}
