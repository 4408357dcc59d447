use crate::{error, Context};
use anyhow::Result;
use bytes::Buf;
use hyper::{Body, Request, Response};
use multer::Multipart;
use std::sync::Arc;

/// Handle a bulk evaluation request: a multipart upload with a `file` field, a `model_type` field, and a `bias_flag` field. Training and evaluation run to completion inside this request; there is no shared state to lock because every upload gets its own dataset, model, and report.
pub async fn post(context: &Arc<Context>, request: Request<Body>) -> Result<Response<Body>> {
	let boundary = match request
		.headers()
		.get(hyper::header::CONTENT_TYPE)
		.and_then(|content_type| content_type.to_str().ok())
		.and_then(|content_type| multer::parse_boundary(content_type).ok())
	{
		Some(boundary) => boundary,
		None => return Ok(error::bad_request("expected a multipart request")),
	};
	let mut file: Option<Vec<u8>> = None;
	let mut model_type: Option<String> = None;
	let mut bias_flag = false;
	let mut multipart = Multipart::new(request.into_body(), boundary);
	while let Some(mut field) = multipart.next_field().await? {
		let name = match field.name() {
			Some(name) => name.to_owned(),
			None => return Ok(error::bad_request("multipart field is missing a name")),
		};
		let mut field_data = Vec::new();
		while let Some(chunk) = field.chunk().await? {
			field_data.extend(chunk.bytes());
		}
		match name.as_str() {
			"file" => file = Some(field_data),
			"model_type" => {
				model_type = Some(String::from_utf8_lossy(&field_data).trim().to_owned())
			}
			"bias_flag" => bias_flag = String::from_utf8_lossy(&field_data).trim() == "true",
			_ => {
				return Ok(error::bad_request(&format!(
					"unexpected multipart field \"{}\"",
					name
				)))
			}
		}
	}
	let file = match file {
		Some(file) => file,
		None => return Ok(error::bad_request("a file is required")),
	};
	let model_type = match model_type {
		Some(model_type) => model_type,
		None => return Ok(error::bad_request("a model_type is required")),
	};
	match fairlens_core::evaluate_bulk(&file, &model_type, bias_flag, &context.config, &mut |_| {})
	{
		Ok((report, bundle)) => {
			// Keep the bundle so single applicant requests can score against it.
			let key = (bundle.family, bias_flag);
			context
				.bundles
				.write()
				.unwrap()
				.insert(key, Arc::new(bundle));
			Ok(error::json_response(serde_json::to_string(&report)?))
		}
		Err(evaluate_error) => Ok(error::evaluate_error(&evaluate_error)),
	}
}
