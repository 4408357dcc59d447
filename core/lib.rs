/*!
This crate ties the engine together: ingest an uploaded dataset, fit a model, predict every row, evaluate fairness, and assemble the response contracts. Each call is independent and stateless: an upload produces its own dataframe, model, and report, and nothing is shared across calls.
*/

pub mod config;
pub mod error;
pub mod predict;
pub mod progress;
pub mod report;
pub mod train;

pub use self::config::Config;
pub use self::error::EvaluateError;
pub use self::predict::{predict_all, predict_one, Prediction};
pub use self::progress::Progress;
pub use self::report::{ApplicantResponse, BulkReport};
pub use self::train::{ModelFamily, TrainedBundle};

use fairlens_metrics::{FairnessOptions, FairnessReport};

/// Evaluate an uploaded dataset in bulk: train, predict every row, compute the fairness report, and assemble the response. Returns the bundle alongside the report so the caller can keep it for single applicant scoring.
pub fn evaluate_bulk(
	file_bytes: &[u8],
	model_type: &str,
	bias_flag: bool,
	config: &Config,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<(BulkReport, TrainedBundle), EvaluateError> {
	let family = ModelFamily::parse(model_type)?;
	let (bundle, dataframe, labels) =
		train::train(file_bytes, family, bias_flag, config, update_progress)?;
	update_progress(Progress::Evaluating);
	let predictions = predict_all(&bundle, &dataframe.view(), config.approval_threshold);
	let probabilities: Vec<f32> = predictions
		.iter()
		.map(|prediction| prediction.probability)
		.collect();
	let approved: Vec<bool> = predictions
		.iter()
		.map(|prediction| prediction.approved)
		.collect();
	let fairness = FairnessReport::compute(
		&dataframe.view(),
		&probabilities,
		&approved,
		&labels,
		&bundle.label_column,
		&bundle.sensitive_columns,
		&FairnessOptions {
			parity_ratio_threshold: config.parity_ratio_threshold,
			demographic_parity_threshold: config.demographic_parity_threshold,
			n_slice_buckets: config.n_slice_buckets,
		},
	);
	let bulk_report = report::assemble_bulk_report(&bundle, &fairness, bias_flag);
	Ok((bulk_report, bundle))
}

/// Evaluate a single applicant against a previously trained bundle.
pub fn evaluate_applicant(
	bundle: &TrainedBundle,
	applicant_data: &serde_json::Map<String, serde_json::Value>,
	config: &Config,
) -> Result<ApplicantResponse, EvaluateError> {
	let prediction = predict_one(bundle, applicant_data, config.approval_threshold)?;
	Ok(ApplicantResponse {
		probability: prediction.probability,
		approved: prediction.approved,
	})
}

#[cfg(test)]
mod test {
	use super::*;
	use num_traits::ToPrimitive;

	/// 100 rows with cibil_score uniform in [300, 894], approved iff the score is above 600.
	fn cibil_csv() -> String {
		let mut csv = String::from("cibil_score,gender,loan_status\n");
		for index in 0..100 {
			let score = 300 + index * 6;
			let gender = if index % 2 == 0 { "Male" } else { "Female" };
			let status = if score > 600 { "Approved" } else { "Rejected" };
			csv.push_str(&format!("{},{},{}\n", score, gender, status));
		}
		csv
	}

	#[test]
	fn test_end_to_end_logistic() {
		let csv = cibil_csv();
		let (report, _) = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap();
		assert!(report.overall_accuracy >= 0.95);
		let coefficients = report.logistic_coefficients.as_ref().unwrap();
		let cibil = coefficients
			.iter()
			.find(|coefficient| coefficient.feature == "cibil_score")
			.unwrap();
		assert!(cibil.coefficient > 0.0);
		assert_eq!(cibil.influence, 1);
		let equation = report.logistic_equation.as_ref().unwrap();
		assert!(equation.starts_with("logit(p) = "));
		assert!(equation.contains("cibil_score"));
		assert!(report.decision_tree_rules.is_none());
		assert_eq!(report.row_count, 100);
		assert_eq!(report.columns, vec!["cibil_score", "gender"]);
		// The mapping fields only appear when the bias flag hint is set.
		assert!(report.column_mapping.is_none());
		assert!(report.value_mapping.is_none());
	}

	#[test]
	fn test_end_to_end_decision_tree() {
		let csv = cibil_csv();
		let (report, _) = evaluate_bulk(
			csv.as_bytes(),
			"decision_tree",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap();
		assert!(report.overall_accuracy >= 0.95);
		assert!(report.logistic_equation.is_none());
		assert!(report.logistic_coefficients.is_none());
		let rules = report.decision_tree_rules.as_ref().unwrap();
		assert!(rules.contains("cibil_score <="));
		assert!(rules.contains("class: Approved"));
		assert!(rules.contains("class: Rejected"));
	}

	#[test]
	fn test_training_is_idempotent() {
		let csv = cibil_csv();
		let config = Config::default();
		let (report_a, _) = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&config,
			&mut |_| {},
		)
		.unwrap();
		let (report_b, _) = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&config,
			&mut |_| {},
		)
		.unwrap();
		assert_eq!(report_a.logistic_coefficients, report_b.logistic_coefficients);
		assert_eq!(report_a, report_b);
	}

	#[test]
	fn test_approval_rate_matches_predictions_exactly() {
		let csv = cibil_csv();
		let config = Config::default();
		let family = ModelFamily::parse("logistic_regression").unwrap();
		let (bundle, dataframe, labels) =
			train::train(csv.as_bytes(), family, false, &config, &mut |_| {}).unwrap();
		let predictions = predict_all(&bundle, &dataframe.view(), config.approval_threshold);
		let fairness = fairlens_metrics::FairnessReport::compute(
			&dataframe.view(),
			&predictions
				.iter()
				.map(|prediction| prediction.probability)
				.collect::<Vec<f32>>(),
			&predictions
				.iter()
				.map(|prediction| prediction.approved)
				.collect::<Vec<bool>>(),
			&labels,
			&bundle.label_column,
			&bundle.sensitive_columns,
			&fairlens_metrics::FairnessOptions::default(),
		);
		let report = report::assemble_bulk_report(&bundle, &fairness, false);
		let n_approved = predictions
			.iter()
			.filter(|prediction| prediction.approved)
			.count();
		let expected = n_approved.to_f32().unwrap() / predictions.len().to_f32().unwrap();
		assert_eq!(report.approval_rate, expected);
	}

	#[test]
	fn test_slices_have_no_zero_counts() {
		let csv = cibil_csv();
		let (report, _) = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap();
		assert!(!report.fairness_slices.is_empty());
		for slices in report.fairness_slices.values() {
			assert!(!slices.is_empty());
			for slice in slices.values() {
				assert!(slice.count > 0);
			}
		}
		// The label column is never sliced.
		assert!(!report.fairness_slices.contains_key("loan_status"));
	}

	#[test]
	fn test_single_applicant_consistent_with_bulk() {
		let csv = cibil_csv();
		let config = Config::default();
		let family = ModelFamily::parse("logistic_regression").unwrap();
		let (bundle, dataframe, _) =
			train::train(csv.as_bytes(), family, false, &config, &mut |_| {}).unwrap();
		let predictions = predict_all(&bundle, &dataframe.view(), config.approval_threshold);
		// Row 99 has the highest score, which the bulk run approved.
		let row_index = 99;
		assert!(predictions[row_index].approved);
		let mut applicant_data = serde_json::Map::new();
		applicant_data.insert(
			"cibil_score".to_owned(),
			serde_json::json!(300 + row_index * 6),
		);
		applicant_data.insert("gender".to_owned(), serde_json::json!("Female"));
		let response = evaluate_applicant(&bundle, &applicant_data, &config).unwrap();
		assert!(response.approved);
		assert!(response.probability > 0.5);
		assert!((response.probability - predictions[row_index].probability).abs() < 1e-6);
	}

	#[test]
	fn test_unseen_category_is_recovered_not_an_error() {
		let csv = cibil_csv();
		let config = Config::default();
		let family = ModelFamily::parse("logistic_regression").unwrap();
		let (bundle, _, _) =
			train::train(csv.as_bytes(), family, false, &config, &mut |_| {}).unwrap();
		let mut applicant_data = serde_json::Map::new();
		applicant_data.insert("cibil_score".to_owned(), serde_json::json!(700));
		applicant_data.insert("gender".to_owned(), serde_json::json!("Nonbinary"));
		let response = evaluate_applicant(&bundle, &applicant_data, &config).unwrap();
		assert!(response.probability >= 0.0 && response.probability <= 1.0);
	}

	#[test]
	fn test_applicant_with_missing_field_is_rejected() {
		let csv = cibil_csv();
		let config = Config::default();
		let family = ModelFamily::parse("logistic_regression").unwrap();
		let (bundle, _, _) =
			train::train(csv.as_bytes(), family, false, &config, &mut |_| {}).unwrap();
		let mut applicant_data = serde_json::Map::new();
		applicant_data.insert("cibil_score".to_owned(), serde_json::json!(700));
		let error = evaluate_applicant(&bundle, &applicant_data, &config).unwrap_err();
		match error {
			EvaluateError::MalformedInput { message } => assert!(message.contains("gender")),
			_ => panic!("expected MalformedInput"),
		}
		let mut applicant_data = serde_json::Map::new();
		applicant_data.insert("cibil_score".to_owned(), serde_json::json!(700));
		applicant_data.insert("gender".to_owned(), serde_json::json!("Male"));
		applicant_data.insert("favorite_color".to_owned(), serde_json::json!("blue"));
		let error = evaluate_applicant(&bundle, &applicant_data, &config).unwrap_err();
		match error {
			EvaluateError::MalformedInput { message } => {
				assert!(message.contains("favorite_color"))
			}
			_ => panic!("expected MalformedInput"),
		}
	}

	#[test]
	fn test_zero_data_rows() {
		let csv = "cibil_score,loan_status\n";
		let error = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap_err();
		match error {
			EvaluateError::MalformedInput { .. } => {}
			_ => panic!("expected MalformedInput"),
		}
	}

	#[test]
	fn test_ragged_rows_are_malformed() {
		let csv = "cibil_score,gender,loan_status\n700\n";
		let error = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap_err();
		match error {
			EvaluateError::MalformedInput { .. } => {}
			_ => panic!("expected MalformedInput"),
		}
	}

	#[test]
	fn test_missing_label_column() {
		let csv = "cibil_score,gender\n700,Male\n650,Female\n";
		let error = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap_err();
		match error {
			EvaluateError::MalformedInput { message } => {
				assert!(message.contains("label column"))
			}
			_ => panic!("expected MalformedInput"),
		}
	}

	#[test]
	fn test_too_few_rows() {
		let mut csv = String::from("cibil_score,loan_status\n");
		for index in 0..5 {
			csv.push_str(&format!(
				"{},{}\n",
				600 + index,
				if index % 2 == 0 { "Approved" } else { "Rejected" }
			));
		}
		let error = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap_err();
		match error {
			EvaluateError::InsufficientData { .. } => {}
			_ => panic!("expected InsufficientData"),
		}
	}

	#[test]
	fn test_single_label_class() {
		let mut csv = String::from("cibil_score,loan_status\n");
		for index in 0..25 {
			csv.push_str(&format!("{},Approved\n", 600 + index));
		}
		let error = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap_err();
		match error {
			EvaluateError::InsufficientData { message } => {
				assert!(message.contains("classes"))
			}
			_ => panic!("expected InsufficientData"),
		}
	}

	#[test]
	fn test_unknown_model_type() {
		let error = ModelFamily::parse("random_forest").unwrap_err();
		match error {
			EvaluateError::MalformedInput { message } => {
				assert!(message.contains("random_forest"))
			}
			_ => panic!("expected MalformedInput"),
		}
		assert_eq!(
			ModelFamily::parse("logistic").unwrap(),
			ModelFamily::LogisticRegression
		);
		assert_eq!(ModelFamily::parse("tree").unwrap(), ModelFamily::DecisionTree);
	}

	#[test]
	fn test_legacy_alias_schema() {
		// A German credit style header, evaluated through the biased branch.
		let mut csv = String::from("Age,Sex,Job,Credit amount,Duration,Risk\n");
		for index in 0..24 {
			let sex = if index % 2 == 0 { "male" } else { "female" };
			let risk = if index % 3 == 0 { "bad" } else { "good" };
			csv.push_str(&format!(
				"{},{},{},{},{},{}\n",
				20 + index,
				sex,
				index % 4,
				1000 + index * 217,
				6 + index,
				risk
			));
		}
		let (report, _) = evaluate_bulk(
			csv.as_bytes(),
			"logistic_regression",
			true,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap();
		let column_mapping = report.column_mapping.as_ref().unwrap();
		assert_eq!(column_mapping["sex"], "gender");
		assert_eq!(column_mapping["risk"], "loan_status");
		assert_eq!(column_mapping["duration"], "credit_score");
		assert_eq!(report.primary_fairness_axis, "gender");
		assert!(report.sensitive_features.contains(&"gender".to_owned()));
		let value_mapping = report.value_mapping.as_ref().unwrap();
		assert_eq!(value_mapping["gender"]["male"], 0);
		assert_eq!(value_mapping["gender"]["female"], 1);
	}

	#[test]
	fn test_fair_dataset_has_no_bias_flag() {
		// Approval depends only on the score and the score is distributed identically across genders, so the selection rate gap is zero.
		let mut csv = String::from("cibil_score,gender,loan_status\n");
		for index in 0..50 {
			let score = 300 + (index / 2) * 24;
			let gender = if index % 2 == 0 { "Male" } else { "Female" };
			let status = if score > 600 { "Approved" } else { "Rejected" };
			csv.push_str(&format!("{},{},{}\n", score, gender, status));
		}
		let (report, _) = evaluate_bulk(
			csv.as_bytes(),
			"decision_tree",
			false,
			&Config::default(),
			&mut |_| {},
		)
		.unwrap();
		assert!(!report.bias_flag);
		assert_eq!(report.primary_fairness_axis, "gender");
		assert_eq!(report.demographic_parity_difference, Some(0.0));
		assert_eq!(report.statistical_parity_ratio, Some(1.0));
	}
}
