use fairlens_core::EvaluateError;
use hyper::{Body, Response, StatusCode};

/// Build a JSON error body in the shape the frontend expects: `{"error": message}`.
fn json_error(status: StatusCode, message: &str) -> Response<Body> {
	let body = serde_json::json!({ "error": message }).to_string();
	Response::builder()
		.status(status)
		.header(hyper::header::CONTENT_TYPE, "application/json")
		.body(Body::from(body))
		.unwrap()
}

pub fn bad_request(message: &str) -> Response<Body> {
	json_error(StatusCode::BAD_REQUEST, message)
}

pub fn not_found() -> Response<Body> {
	json_error(StatusCode::NOT_FOUND, "not found")
}

pub fn internal_server_error() -> Response<Body> {
	json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

/// Every engine error is a permanent input defect, so both variants surface as a 400 with the descriptive message. Nothing here is retried: the computation is deterministic and would fail again.
pub fn evaluate_error(error: &EvaluateError) -> Response<Body> {
	json_error(StatusCode::BAD_REQUEST, &error.to_string())
}

pub fn json_response(body: String) -> Response<Body> {
	Response::builder()
		.status(StatusCode::OK)
		.header(hyper::header::CONTENT_TYPE, "application/json")
		.body(Body::from(body))
		.unwrap()
}
