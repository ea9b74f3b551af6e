use crate::{
	error::FetchError,
	loader::{FetchRequest, FetchResponse},
};
use futures::future::{self, Either};
use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;
use tracing::trace;

/// Performs `request`, giving up after its timeout.
///
/// Any status is a response here. Deciding what counts as success is up to the loader.
///
/// # Errors
///
/// [`FetchError::Timeout`] if no complete response arrived in time, [`FetchError::Network`] if
/// the request failed or the body couldn't be read.
pub async fn fetch(request: &FetchRequest) -> Result<FetchResponse, FetchError> {
	debug_assert_eq!(request.method, "GET");
	trace!("GET {}", request.url);

	let mut builder = Request::get(&request.url);
	for (name, value) in &request.headers {
		builder = builder.header(name, value);
	}

	let send = async move {
		let response = builder.send().await.map_err(|error| FetchError::Network(error.to_string()))?;
		let status = response.status();
		let body = response.text().await.map_err(|error| FetchError::Network(error.to_string()))?;
		Ok::<_, FetchError>(FetchResponse { status, body })
	};

	match future::select(Box::pin(send), Box::pin(TimeoutFuture::new(request.timeout_ms))).await {
		Either::Left((outcome, _)) => outcome,
		Either::Right(((), _)) => Err(FetchError::Timeout { after_ms: request.timeout_ms }),
	}
}
