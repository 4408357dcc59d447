use derive_more::{Display, Error};

/**
The error taxonomy of the evaluation engine.

Every operation here is a deterministic pure computation, so no failure is worth retrying: an error is always a permanent defect in the input, reported to the caller with a descriptive message. Numerical degeneracies (a zero selection rate group, a single observed group) are not errors at all: they are recovered locally by emitting `None` in the report. Unseen categorical values at scoring time are likewise recovered by the encoder's reserved unknown code rather than surfaced here.
*/
#[derive(Debug, Display, Error)]
pub enum EvaluateError {
	/// The file could not be parsed as delimited tabular text, has no data rows, or a required column is absent. Also raised for an invalid applicant record or an unknown model type.
	#[display(fmt = "malformed input: {}", message)]
	MalformedInput { message: String },
	/// The dataset has too few rows or too few label classes to fit a model.
	#[display(fmt = "insufficient data: {}", message)]
	InsufficientData { message: String },
}

impl EvaluateError {
	pub fn malformed(message: impl Into<String>) -> Self {
		EvaluateError::MalformedInput {
			message: message.into(),
		}
	}

	pub fn insufficient(message: impl Into<String>) -> Self {
		EvaluateError::InsufficientData {
			message: message.into(),
		}
	}
}
