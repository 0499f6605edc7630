//! Transport primitives for calls against the tracker API.
//!
//! The module exposes [`ApiRequest`] and [`ApiResponse`], fully buffered wire values that can
//! be replayed after a token refresh, alongside the [`ApiHttpClient`] trait that the gateway
//! uses as its only dependency on an HTTP stack. The reqwest-backed [`ReqwestHttpClient`] is
//! enabled by default.

mod failure;

pub use failure::ApiErrorBody;

// crates.io
use ::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Boxed future returned by [`ApiHttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, crate::error::TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports able to execute buffered API requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// gateway, the refresh collaborator, and the health probes. Transports report network-level
/// failures only; any HTTP status, including 401, is a successful [`ApiResponse`].
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response body.
	fn execute(&self, request: ApiRequest) -> HttpFuture<'_>;
}

/// Outbound API call captured by value so it can be replayed with a new bearer token.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers supplied by the caller.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(url: Url) -> Self {
		Self::new(Method::PUT, url)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(url: Url) -> Self {
		Self::new(Method::DELETE, url)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: impl AsRef<str>) -> Result<Self> {
		let value = HeaderValue::from_str(value.as_ref())
			.map_err(|_| ConfigError::InvalidHeader { name: name.to_string() })?;

		self.headers.insert(name, value);

		Ok(self)
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let bytes =
			serde_json::to_vec(body).map_err(|source| ConfigError::Serialize { source })?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}

	/// Returns `true` when the caller supplied its own `Authorization` header.
	pub fn has_authorization(&self) -> bool {
		self.headers.contains_key(AUTHORIZATION)
	}

	/// Returns a copy carrying `token` as its bearer credential.
	pub(crate) fn with_bearer(&self, token: &TokenSecret) -> Result<Self> {
		let mut signed = self.clone();
		let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
			.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		value.set_sensitive(true);
		signed.headers.insert(AUTHORIZATION, value);

		Ok(signed)
	}
}

/// Fully buffered API response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` when the API rejected the bearer credential.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Returns `true` when the response declares a JSON body.
	pub fn is_json(&self) -> bool {
		self.headers
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.is_some_and(|value| value.contains("json"))
	}

	/// Returns the body as (lossy) UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, reporting the failing field path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Turns a non-success response into [`Error::Api`] with a user-facing message.
	pub fn error_for_status(self, fallback: &str) -> Result<Self> {
		if self.is_success() {
			Ok(self)
		} else {
			let message = self.failure_message(fallback);

			Err(Error::Api { status: self.status.as_u16(), message })
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Redirects are followed according to the wrapped client's policy; configure a custom
/// [`ReqwestClient`] through [`ReqwestHttpClient::with_client`] for timeouts or proxies.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn send(client: ReqwestClient, request: ApiRequest) -> Result<ApiResponse, ReqwestError> {
		let mut builder = client.request(request.method, request.url).headers(request.headers);

		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send().await?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await?.to_vec();

		Ok(ApiResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	fn execute(&self, request: ApiRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move { Self::send(client, request).await.map_err(Into::into) })
	}
}
