/*!
This crate is the HTTP boundary of the engine. It exposes two operations: bulk evaluation of an uploaded dataset and single applicant scoring, plus a health check. The engine itself is stateless; the only mutable state lives here, in the bundle store that keeps the most recent trained model per (model family, bias hint) so applicant requests have something to score against.
*/

use anyhow::Result;
use backtrace::Backtrace;
use futures::FutureExt;
use hyper::{
	service::{make_service_fn, service_fn},
	Body, Method, Request, Response,
};
use std::{
	cell::RefCell,
	collections::BTreeMap,
	convert::Infallible,
	panic::AssertUnwindSafe,
	sync::{Arc, RwLock},
};

use fairlens_core::{Config, ModelFamily, TrainedBundle};

mod analyze;
mod applicant;
mod error;
mod health;

pub struct Options {
	pub host: std::net::IpAddr,
	pub port: u16,
}

pub struct Context {
	pub options: Options,
	pub config: Config,
	/// The most recent trained bundle per (model family, bias hint). This is the in memory analogue of a model bundle directory: bulk evaluation writes it, applicant scoring reads it, and a restart simply starts empty.
	pub bundles: RwLock<BTreeMap<(ModelFamily, bool), Arc<TrainedBundle>>>,
}

async fn handle(request: Request<Body>, context: Arc<Context>) -> Response<Body> {
	let method = request.method().clone();
	let path = request.uri().path().to_owned();
	let path_components: Vec<_> = path.split('/').skip(1).collect();
	let result = match (&method, path_components.as_slice()) {
		(&Method::GET, &["health"]) => health::get(&context, request).await,
		(&Method::POST, &["analyze"]) | (&Method::POST, &["predict-bulk"]) => {
			analyze::post(&context, request).await
		}
		(&Method::POST, &["predict-applicant"]) => applicant::post(&context, request).await,
		_ => Ok(error::not_found()),
	};
	let response = result.unwrap_or_else(|error| {
		tracing::error!("request failed: {}", error);
		error::internal_server_error()
	});
	tracing::info!("{} {} {}", method, path, response.status());
	response
}

pub fn run(options: Options, config: Config) -> Result<()> {
	tokio::runtime::Builder::new()
		.threaded_scheduler()
		.enable_all()
		.build()
		.unwrap()
		.block_on(run_impl(options, config))
}

async fn run_impl(options: Options, config: Config) -> Result<()> {
	// Create a task local that will store the panic message and backtrace if a panic occurs, so a panicking request produces a 500 with context instead of tearing the server down.
	tokio::task_local! {
		static PANIC_MESSAGE_AND_BACKTRACE: RefCell<Option<(String, Backtrace)>>;
	}
	let hook = std::panic::take_hook();
	std::panic::set_hook(Box::new(|panic_info| {
		let value = (panic_info.to_string(), Backtrace::new());
		PANIC_MESSAGE_AND_BACKTRACE.with(|panic_message_and_backtrace| {
			panic_message_and_backtrace.borrow_mut().replace(value);
		})
	}));
	let context = Arc::new(Context {
		options,
		config,
		bundles: RwLock::new(BTreeMap::new()),
	});
	let service = make_service_fn(|_| {
		let context = context.clone();
		async move {
			Ok::<_, Infallible>(service_fn(move |request| {
				let method = request.method().clone();
				let path = request.uri().path().to_owned();
				let context = context.clone();
				PANIC_MESSAGE_AND_BACKTRACE.scope(RefCell::new(None), async move {
					let response = AssertUnwindSafe(handle(request, context))
						.catch_unwind()
						.await
						.unwrap_or_else(|_| {
							let message =
								PANIC_MESSAGE_AND_BACKTRACE.with(|panic_message_and_backtrace| {
									let panic_message_and_backtrace =
										panic_message_and_backtrace.borrow();
									let (message, backtrace) =
										panic_message_and_backtrace.as_ref().unwrap();
									format!("{}\n{:?}", message, backtrace)
								});
							tracing::error!("{} {} panicked: {}", method, path, message);
							error::internal_server_error()
						});
					Ok::<_, Infallible>(response)
				})
			}))
		}
	});
	let addr = std::net::SocketAddr::new(context.options.host, context.options.port);
	let listener = std::net::TcpListener::bind(&addr)?;
	tracing::info!("serving on port {}", context.options.port);
	hyper::Server::from_tcp(listener)?.serve(service).await?;
	std::panic::set_hook(hook);
	Ok(())
}
