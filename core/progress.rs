use fairlens_util::ProgressCounter;

/// The stages of a bulk evaluation, reported through the `update_progress` callback so callers can render a progress view without the engine knowing anything about terminals or requests.
#[derive(Clone, Debug)]
pub enum Progress {
	Loading(ProgressCounter),
	ComputingFeatures,
	Training,
	Evaluating,
}
