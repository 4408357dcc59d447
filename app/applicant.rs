use crate::{error, Context};
use anyhow::Result;
use fairlens_core::ModelFamily;
use hyper::{Body, Request, Response};
use std::sync::Arc;

#[derive(Debug, serde::Deserialize)]
struct ApplicantRequest {
	applicant_data: serde_json::Map<String, serde_json::Value>,
	model_type: String,
	#[serde(default)]
	bias_flag: bool,
}

/// Handle a single applicant scoring request. The applicant is scored against the bundle stored by the most recent bulk evaluation for the same model type and bias hint; with no prior bulk run there is nothing to score against, which is an input error, not a server fault.
pub async fn post(context: &Arc<Context>, mut request: Request<Body>) -> Result<Response<Body>> {
	let data = match hyper::body::to_bytes(request.body_mut()).await {
		Ok(data) => data,
		Err(_) => return Ok(error::bad_request("failed to read request body")),
	};
	let applicant_request: ApplicantRequest = match serde_json::from_slice(&data) {
		Ok(applicant_request) => applicant_request,
		Err(_) => return Ok(error::bad_request("failed to parse request body")),
	};
	let family = match ModelFamily::parse(&applicant_request.model_type) {
		Ok(family) => family,
		Err(evaluate_error) => return Ok(error::evaluate_error(&evaluate_error)),
	};
	let bundle = context
		.bundles
		.read()
		.unwrap()
		.get(&(family, applicant_request.bias_flag))
		.cloned();
	let bundle = match bundle {
		Some(bundle) => bundle,
		None => {
			return Ok(error::bad_request(&format!(
				"no trained {} model available; run a bulk evaluation first",
				family.as_str()
			)))
		}
	};
	match fairlens_core::evaluate_applicant(
		&bundle,
		&applicant_request.applicant_data,
		&context.config,
	) {
		Ok(response) => Ok(error::json_response(serde_json::to_string(&response)?)),
		Err(evaluate_error) => Ok(error::evaluate_error(&evaluate_error)),
	}
}
